//! Volunteer opportunity store library
//!
//! This library keeps a list of volunteer opportunities in a key-value
//! store, fills in map coordinates for their addresses, filters them by
//! name, category and distance, and tracks the local user's session.

mod cli;
mod config;
mod errors;
mod events;
mod filter;
mod geocoding;
mod helper;
mod kv_store;
mod opportunity;
mod session;
mod storage;
mod types;

// Re-export key components
pub use cli::*;
pub use config::*;
pub use errors::*;
pub use events::*;
pub use filter::*;
pub use geocoding::*;
pub use helper::*;
pub use kv_store::*;
pub use opportunity::*;
pub use session::*;
pub use storage::*;
pub use types::*;
