use std::fmt::{Display, Formatter};
use std::io;

use crate::nt_status::NtStatus;

/// Workspace-wide error type.
///
/// `ResponseError` carries a protocol status destined for the peer; the
/// dispatch engine converts it into an error response instead of tearing
/// anything down. The remaining variants are host-side failures.
#[derive(Debug)]
pub enum SMBError {
    ResponseError(SMBResponseError),
    CryptoError(SMBCryptoError),
    IOError(SMBIOError),
    ServerError(SMBServerError),
    PreconditionFailed(SMBPreconditionFailedError),
}

impl SMBError {
    pub fn response_error<T: Into<SMBResponseError>>(error: T) -> Self {
        Self::ResponseError(error.into())
    }

    pub fn crypto_error<T: ToString>(error: T) -> Self {
        Self::CryptoError(SMBCryptoError { message: error.to_string() })
    }

    pub fn io_error<T: Into<io::Error>>(error: T) -> Self {
        Self::IOError(SMBIOError { error: error.into() })
    }

    pub fn server_error<T: Into<SMBServerError>>(error: T) -> Self {
        Self::ServerError(error.into())
    }

    pub fn precondition_failed<T: Into<SMBPreconditionFailedError>>(error: T) -> Self {
        Self::PreconditionFailed(error.into())
    }

    /// The protocol status to answer with, if this error maps to one.
    pub fn status(&self) -> Option<NtStatus> {
        match self {
            Self::ResponseError(inner) => Some(inner.status),
            _ => None,
        }
    }
}

#[derive(Debug)]
pub struct SMBResponseError {
    status: NtStatus,
}

impl From<NtStatus> for SMBResponseError {
    fn from(status: NtStatus) -> Self {
        Self { status }
    }
}

impl Display for SMBResponseError {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        write!(f, "Operation failed with protocol status: {:?}", self.status)
    }
}

#[derive(Debug)]
pub struct SMBCryptoError {
    message: String,
}

impl Display for SMBCryptoError {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        write!(f, "Crypto operation failed with error: {}", self.message)
    }
}

#[derive(Debug)]
pub struct SMBIOError {
    error: io::Error,
}

impl Display for SMBIOError {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        write!(f, "SMB I/O operation failed with error: {}", self.error)
    }
}

#[derive(Debug)]
pub struct SMBServerError {
    message: String,
}

impl<T: Into<String>> From<T> for SMBServerError {
    fn from(value: T) -> Self {
        Self { message: value.into() }
    }
}

impl Display for SMBServerError {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        write!(f, "Server failure: {}", self.message)
    }
}

#[derive(Debug)]
pub struct SMBPreconditionFailedError {
    message: String,
}

impl<T: Into<String>> From<T> for SMBPreconditionFailedError {
    fn from(value: T) -> Self {
        Self { message: value.into() }
    }
}

impl Display for SMBPreconditionFailedError {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        write!(f, "Operation failed with unmet precondition: {}", self.message)
    }
}

impl Display for SMBError {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::ResponseError(x) => write!(f, "{}", x),
            Self::CryptoError(x) => write!(f, "{}", x),
            Self::IOError(x) => write!(f, "{}", x),
            Self::ServerError(x) => write!(f, "{}", x),
            Self::PreconditionFailed(x) => write!(f, "{}", x),
        }
    }
}

impl std::error::Error for SMBError {}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn response_error_exposes_status() {
        let error = SMBError::response_error(NtStatus::AccessDenied);
        assert_eq!(error.status(), Some(NtStatus::AccessDenied));
    }

    #[test]
    fn host_errors_have_no_status() {
        let error = SMBError::server_error("no share table");
        assert_eq!(error.status(), None);
    }
}
