use rusqlite_migration::{Migrations, M};

/// Define all schema migrations.
/// Tracked through the SQLite user_version pragma.
pub fn migrations() -> Migrations<'static> {
    Migrations::new(vec![M::up(
        "-- Migration 1: Game snapshots

CREATE TABLE games (
    id TEXT PRIMARY KEY,
    name TEXT NOT NULL,
    is_active INTEGER NOT NULL DEFAULT 0,
    start_time TEXT,
    end_time TEXT,
    questions TEXT NOT NULL DEFAULT '[]',
    created_at TEXT NOT NULL
);
",
    )])
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn migrations_are_valid() {
        assert!(migrations().validate().is_ok());
    }
}
