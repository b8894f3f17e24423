//! Input subsystem errors.

use thiserror::Error;

#[derive(Debug, Error)]
pub enum InputError {
    #[error("failed to read pointer position: {0}")]
    Pointer(String),

    #[error("failed to inject event: {0}")]
    Inject(String),

    #[error(transparent)]
    Other(#[from] anyhow::Error),
}
