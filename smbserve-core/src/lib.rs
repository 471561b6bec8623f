//! Shared foundation for the `smbserve` workspace: the protocol status-code
//! taxonomy, the crate error type, and feature-gated logging macros.

pub mod error;
pub mod logging;
pub mod nt_status;

use error::SMBError;

pub type SMBResult<T, E = SMBError> = Result<T, E>;
