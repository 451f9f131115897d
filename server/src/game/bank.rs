//! Append-only question bank persisted as a flat JSON snapshot.
//!
//! Every successful add rewrites the whole file (`{data_dir}/questions.json`)
//! through a temporary file and a rename, so a crash never leaves a torn snapshot.

use parking_lot::RwLock;
use std::path::{Path, PathBuf};

use crate::error::{GameError, StoreError};
use crate::game::question::{NewQuestion, Question};

const SNAPSHOT_FILE: &str = "questions.json";

pub struct QuestionBank {
    questions: RwLock<Vec<Question>>,
    path: PathBuf,
}

impl QuestionBank {
    /// An empty bank whose snapshot lives in `data_dir`.
    pub fn new(data_dir: impl AsRef<Path>) -> Self {
        Self {
            questions: RwLock::new(Vec::new()),
            path: data_dir.as_ref().join(SNAPSHOT_FILE),
        }
    }

    /// Open the bank and read the last snapshot if one exists.
    pub fn open(data_dir: impl AsRef<Path>) -> Result<Self, StoreError> {
        let bank = Self::new(data_dir);
        bank.load()?;
        Ok(bank)
    }

    /// Replace the in-memory set with the snapshot on disk.
    /// A missing file leaves the bank empty.
    pub fn load(&self) -> Result<(), StoreError> {
        let data = match std::fs::read(&self.path) {
            Ok(data) => data,
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => {
                tracing::info!(path = %self.path.display(), "No question snapshot, starting empty");
                return Ok(());
            }
            Err(e) => return Err(e.into()),
        };
        let loaded: Vec<Question> = serde_json::from_slice(&data)?;
        tracing::info!(count = loaded.len(), "Loaded question bank");
        *self.questions.write() = loaded;
        Ok(())
    }

    /// Validate, number and append a question, then persist the full set.
    ///
    /// A snapshot write failure is returned, but the question stays in memory.
    pub fn add(&self, new: NewQuestion) -> Result<Question, GameError> {
        new.validate()?;

        let mut questions = self.questions.write();
        let id = questions.last().map_or(1, |q| q.id + 1);
        let question = new.into_question(id);
        questions.push(question.clone());

        if let Err(e) = write_snapshot(&self.path, &questions) {
            tracing::error!(
                question_id = id,
                error = %e,
                "Failed to persist question snapshot"
            );
            return Err(e.into());
        }

        tracing::debug!(question_id = id, "Question added");
        Ok(question)
    }

    /// The current ordered question set.
    pub fn all(&self) -> Vec<Question> {
        self.questions.read().clone()
    }

    pub fn len(&self) -> usize {
        self.questions.read().len()
    }

    pub fn is_empty(&self) -> bool {
        self.questions.read().is_empty()
    }
}

fn write_snapshot(path: &Path, questions: &[Question]) -> Result<(), StoreError> {
    if let Some(dir) = path.parent() {
        std::fs::create_dir_all(dir)?;
    }
    let data = serde_json::to_vec_pretty(questions)?;
    let tmp = path.with_extension("json.tmp");
    std::fs::write(&tmp, data)?;
    std::fs::rename(&tmp, path)?;
    Ok(())
}
