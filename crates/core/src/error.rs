//! Error types for Codebreak Core

use thiserror::Error;

#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum Error {
    #[error("Invalid code: {0}")]
    InvalidCode(String),

    #[error("Invalid lobby key: {0}")]
    InvalidLobbyKey(String),
}

pub type Result<T> = std::result::Result<T, Error>;
