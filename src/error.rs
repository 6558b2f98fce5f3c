//! Error types for mutation testing

use std::path::PathBuf;
use thiserror::Error;

/// Errors that can occur during mutation testing
#[derive(Debug, Error)]
pub enum MutestingError {
    /// Target file or directory doesn't exist
    #[error("File not found: {}", file.display())]
    FileNotFound { file: PathBuf },

    /// Failed to read source file
    #[error("Failed to read file '{}': {error}", file.display())]
    FileReadError { file: PathBuf, error: String },

    /// Failed to parse source file as Rust
    #[error("Failed to parse '{}' as Rust: {error}", file.display())]
    ParseError { file: PathBuf, error: String },

    /// Failed to write a mutant or its bookkeeping files
    #[error("Failed to write '{}': {error}", file.display())]
    WriteError { file: PathBuf, error: String },

    /// Requested mutator name is not registered
    #[error("Unknown mutator '{name}'")]
    UnknownMutator { name: String },

    /// Blacklist entry is not a checksum
    #[error("'{entry}' in blacklist '{}' is not a 32 character hex checksum", file.display())]
    InvalidChecksum { file: PathBuf, entry: String },

    /// The verification command could not be started or awaited
    #[error("Could not execute '{command}': {error}")]
    Exec { command: String, error: String },

    /// Swapping the mutant into place or restoring the original failed
    #[error("Could not swap mutant into '{}': {error}", file.display())]
    SwapError { file: PathBuf, error: String },

    /// The tree did not print identically after a revert
    #[error("Mutation {mutation} of '{}' was not reverted cleanly", file.display())]
    RevertMismatch { file: PathBuf, mutation: usize },

    /// Configuration error
    #[error("Configuration error: {message}")]
    ConfigError { message: String },
}

impl MutestingError {
    /// Whether the whole run has to stop. Other errors only abandon the
    /// file being mutated.
    pub fn is_fatal(&self) -> bool {
        matches!(
            self,
            MutestingError::Exec { .. }
                | MutestingError::SwapError { .. }
                | MutestingError::RevertMismatch { .. }
        )
    }
}

/// Result type for mutation operations
pub type Result<T> = std::result::Result<T, MutestingError>;
