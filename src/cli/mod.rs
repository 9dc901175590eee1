//! CLI module for the voluntrack application
//!
//! This module handles the command-line interface for interacting with the
//! opportunity and session stores.
mod app;
mod args;

pub use app::*;
pub use args::*;
