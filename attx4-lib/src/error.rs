use thiserror::Error;

use crate::frame::Command;

/// The primary error type for the `attx4-lib` library.
#[derive(Error, Debug)]
pub enum AmbientError {
    #[error("bus transport error: {0}")]
    Transport(#[source] Box<dyn std::error::Error + Send + Sync>),

    #[error("timeout during bus exchange: {0}")]
    Timeout(#[from] tokio::time::error::Elapsed),

    #[error("invalid response from module for {command:?}")]
    InvalidResponse { command: Command },

    #[error("cannot establish communication with module after {attempts} attempts")]
    CannotConnect { attempts: u32 },

    #[error("trigger level {0} is outside 0.0..=1.0")]
    TriggerLevelOutOfRange(f64),
}

impl AmbientError {
    /// Wrap an implementation-specific bus error.
    pub fn transport<E>(err: E) -> Self
    where
        E: std::error::Error + Send + Sync + 'static,
    {
        AmbientError::Transport(Box::new(err))
    }
}
