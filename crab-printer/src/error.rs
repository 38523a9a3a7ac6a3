//! Error types for the printer library

use thiserror::Error;

/// Printer error types
#[derive(Debug, Error)]
pub enum PrintError {
    /// Print server unreachable or connection dropped
    #[error("Connection failed: {0}")]
    Connection(String),

    /// IO error while reading the document
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    /// Timeout waiting for the print server
    #[error("Timeout: {0}")]
    Timeout(String),

    /// HTTP-level rejection (e.g. 401 from a CUPS server)
    #[error("HTTP error: status {status}")]
    Http { status: u16 },

    /// IPP-level rejection carried in the response status code
    #[error("IPP error 0x{status:04x}: {message}")]
    Ipp { status: u16, message: String },

    /// Malformed IPP payload
    #[error("Protocol error: {0}")]
    Protocol(String),

    /// Invalid printer configuration
    #[error("Invalid config: {0}")]
    InvalidConfig(String),
}

impl PrintError {
    /// Status code reported to callers
    ///
    /// IPP and HTTP rejections pass their code through; failures without a
    /// protocol reply map to `-1`.
    pub fn status_code(&self) -> i32 {
        match self {
            PrintError::Ipp { status, .. } => i32::from(*status),
            PrintError::Http { status } => i32::from(*status),
            _ => -1,
        }
    }
}

impl From<reqwest::Error> for PrintError {
    fn from(e: reqwest::Error) -> Self {
        if e.is_timeout() {
            PrintError::Timeout(e.to_string())
        } else if let Some(status) = e.status() {
            PrintError::Http {
                status: status.as_u16(),
            }
        } else {
            PrintError::Connection(e.to_string())
        }
    }
}

/// Result type for printer operations
pub type PrintResult<T> = Result<T, PrintError>;
