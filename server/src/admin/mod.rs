//! Host-side HTTP endpoints: game lifecycle and the question bank.

pub mod games;
pub mod questions;
