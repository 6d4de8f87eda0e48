//! CLI module for ollamachat
//!
//! Handles command-line argument parsing.

pub mod args;

pub use args::{Args, Commands, ConfigAction, Toggle, Verbosity};
