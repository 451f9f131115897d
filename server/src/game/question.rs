use serde::{Deserialize, Serialize};
use std::collections::HashSet;

use crate::error::GameError;

/// Points awarded for each correctly answered question.
pub const POINTS_PER_CORRECT: u32 = 10;

/// Number of options every question must carry.
pub const OPTION_COUNT: usize = 4;

/// How a submitted answer is compared against the correct value.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum QuestionKind {
    /// Exactly one option is correct; answers must match verbatim.
    #[default]
    Single,
    /// The correct value is a comma-joined set of options.
    Multiple,
}

/// A trivia question as stored in the bank and snapshotted into sessions.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Question {
    pub id: u32,
    pub text: String,
    pub options: Vec<String>,
    #[serde(rename = "type", default)]
    pub kind: QuestionKind,
    pub correct: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub time_limit_secs: Option<u32>,
}

/// An add-question request before it has been assigned an id.
#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct NewQuestion {
    pub text: String,
    pub options: Vec<String>,
    #[serde(rename = "type", default)]
    pub kind: QuestionKind,
    pub correct: String,
    #[serde(default)]
    pub time_limit_secs: Option<u32>,
}

impl NewQuestion {
    /// Check the shape of the question: non-empty text, four options, a correct value.
    pub fn validate(&self) -> Result<(), GameError> {
        if self.text.trim().is_empty() {
            return Err(GameError::Validation("question text is required".to_string()));
        }
        if self.options.len() != OPTION_COUNT {
            return Err(GameError::Validation(format!(
                "expected {} options, got {}",
                OPTION_COUNT,
                self.options.len()
            )));
        }
        if self.correct.trim().is_empty() {
            return Err(GameError::Validation("correct answer is required".to_string()));
        }
        Ok(())
    }

    pub(crate) fn into_question(self, id: u32) -> Question {
        Question {
            id,
            text: self.text,
            options: self.options,
            kind: self.kind,
            correct: self.correct,
            time_limit_secs: self.time_limit_secs,
        }
    }
}

impl Question {
    /// Whether `answer` is correct for this question.
    pub fn accepts(&self, answer: &str) -> bool {
        match self.kind {
            QuestionKind::Single => answer == self.correct,
            QuestionKind::Multiple => same_answer_set(&self.correct, answer),
        }
    }
}

/// Order-independent comparison of two comma-joined answer lists.
/// Both lists must have the same number of entries and the same trimmed members.
fn same_answer_set(correct: &str, submitted: &str) -> bool {
    let correct: Vec<&str> = correct.split(',').map(str::trim).collect();
    let submitted: Vec<&str> = submitted.split(',').map(str::trim).collect();
    if correct.len() != submitted.len() {
        return false;
    }
    let correct: HashSet<&str> = correct.into_iter().collect();
    let submitted: HashSet<&str> = submitted.into_iter().collect();
    correct == submitted
}

#[cfg(test)]
mod tests {
    use super::*;

    fn question(kind: QuestionKind, correct: &str) -> Question {
        Question {
            id: 1,
            text: "Pick".to_string(),
            options: vec!["a".into(), "b".into(), "c".into(), "d".into()],
            kind,
            correct: correct.to_string(),
            time_limit_secs: None,
        }
    }

    #[test]
    fn single_choice_requires_exact_match() {
        let q = question(QuestionKind::Single, "4");
        assert!(q.accepts("4"));
        assert!(!q.accepts(" 4"));
        assert!(!q.accepts("5"));
    }

    #[test]
    fn multiple_choice_ignores_order_and_whitespace() {
        let q = question(QuestionKind::Multiple, "a, c");
        assert!(q.accepts("c,a"));
        assert!(q.accepts(" a ,c "));
        assert!(!q.accepts("a"));
        assert!(!q.accepts("a,b"));
        assert!(!q.accepts("a,c,d"));
    }

    #[test]
    fn multiple_choice_sizes_must_match() {
        let q = question(QuestionKind::Multiple, "a,b");
        assert!(!q.accepts("a,a"));
        assert!(!q.accepts("a,b,b"));
    }

    #[test]
    fn validate_rejects_malformed_questions() {
        let ok = NewQuestion {
            text: "2+2?".to_string(),
            options: vec!["3".into(), "4".into(), "5".into(), "6".into()],
            kind: QuestionKind::Single,
            correct: "4".to_string(),
            time_limit_secs: Some(20),
        };
        assert!(ok.validate().is_ok());

        let mut blank = ok.clone();
        blank.text = "   ".to_string();
        assert!(matches!(blank.validate(), Err(GameError::Validation(_))));

        let mut three = ok.clone();
        three.options.pop();
        assert!(matches!(three.validate(), Err(GameError::Validation(_))));

        let mut no_answer = ok;
        no_answer.correct = String::new();
        assert!(matches!(no_answer.validate(), Err(GameError::Validation(_))));
    }

    #[test]
    fn kind_defaults_to_single_when_absent() {
        let q: Question = serde_json::from_str(
            r#"{"id":3,"text":"t","options":["a","b","c","d"],"correct":"a"}"#,
        )
        .unwrap();
        assert_eq!(q.kind, QuestionKind::Single);
        assert_eq!(q.time_limit_secs, None);
    }
}
