//! Trivia game engine: question bank, per-game state machine, and the registry of games.
//!
//! Locking: the registry map guards membership only; each `Session` carries
//! its own lock over roster, round and lifecycle fields. The connection hub
//! (`crate::ws::Hub`) keeps a third, disjoint set of locks.

pub mod bank;
pub mod question;
pub mod registry;
pub mod session;
pub mod snapshot;
