//! Live multi-player trivia server library.
//! This crate exposes internal modules for integration testing.
//! The binary entry point is in main.rs.

pub mod admin;
pub mod config;
pub mod db;
pub mod error;
pub mod game;
pub mod players;
pub mod routes;
pub mod state;
pub mod ws;
