// src/exit.rs
//! Standardized process exit codes for `netsieve`.
//!
//! Provides a stable contract for scripts and automation.

use std::process::Termination;

use crate::error::NetsieveError;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[repr(i32)]
pub enum NetsieveExit {
    /// Scan completed, including the "nothing new" case.
    Success = 0,
    /// Anything not covered below.
    Error = 1,
    /// Scan root missing or not a directory.
    PathError = 2,
    /// Rule file missing, unreadable or unwritable.
    RuleFileError = 3,
    /// Explicit config file unreadable or invalid.
    ConfigError = 4,
}

impl NetsieveExit {
    #[must_use]
    pub fn code(self) -> i32 {
        self as i32
    }

    /// Picks the exit code for an error that reached `main`.
    #[must_use]
    pub fn for_error(err: &anyhow::Error) -> Self {
        match err.downcast_ref::<NetsieveError>() {
            Some(NetsieveError::Path { .. }) => Self::PathError,
            Some(NetsieveError::RuleFile { .. }) => Self::RuleFileError,
            Some(NetsieveError::Config { .. }) => Self::ConfigError,
            None => Self::Error,
        }
    }
}

impl Termination for NetsieveExit {
    fn report(self) -> std::process::ExitCode {
        #[allow(clippy::cast_sign_loss, clippy::cast_possible_truncation)]
        std::process::ExitCode::from(self.code() as u8)
    }
}
