//! Error types for the voluntrack application.
//!
//! This module defines the error type shared by the opportunity store, the
//! session store, and the external collaborators they talk to.

use std::io;

use thiserror::Error;

/// The main error type for the voluntrack application.
#[derive(Error, Debug)]
pub enum StoreError {
    /// Errors related to file I/O operations.
    #[error("I/O error: {0}")]
    Io(#[from] io::Error),

    /// Errors related to serialization/deserialization operations.
    #[error("Serialization error: {0}")]
    Serialization(#[from] serde_json::Error),

    /// Opportunity was not found when performing an operation.
    #[error("Opportunity not found: {id}")]
    NotFound { id: String },

    /// Opportunity with the same ID already exists.
    #[error("Opportunity already exists: {id}")]
    AlreadyExists { id: String },

    /// A mutation was attempted before the stored list was read.
    #[error("Opportunities have not been loaded yet")]
    NotLoaded,

    /// Reading a key from the key-value store failed or returned unusable data.
    #[error("Failed to read '{key}' from storage: {message}")]
    StorageRead { key: String, message: String },

    /// Writing a key to the key-value store failed.
    #[error("Failed to write '{key}' to storage: {message}")]
    StorageWrite { key: String, message: String },

    /// Key contains characters the backing store cannot represent.
    #[error("Invalid storage key: {key}")]
    InvalidKey { key: String },

    /// Input rejected before it reached storage.
    #[error("Validation failed: {message}")]
    Validation { message: String },

    /// The geocoding service could not be reached or answered garbage.
    #[error("Geocoding error: {message}")]
    Geocoding { message: String },

    /// Errors related to configuration.
    #[error("Configuration error: {message}")]
    ConfigError { message: String },

    /// The current session is not allowed to perform the operation.
    #[error("Permission denied: {message}")]
    PermissionDenied { message: String },

    /// for mutex lock acquisition issues
    #[error("{message}")]
    LockAcquisitionFailed { message: String },

    /// Generic application error with a custom message.
    #[error("{message}")]
    ApplicationError { message: String },
}

impl StoreError {
    /// True for failures of the key-value store itself, as opposed to
    /// rejected input.
    pub fn is_storage_failure(&self) -> bool {
        matches!(
            self,
            StoreError::StorageRead { .. } | StoreError::StorageWrite { .. } | StoreError::Io(_)
        )
    }
}
