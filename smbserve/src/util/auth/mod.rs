pub use user::User;

use smbserve_core::nt_status::NtStatus;

pub mod challenge;
mod user;

/// The authenticated principal a provider yields once a credential exchange
/// completes.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct AuthenticatedPrincipal {
    pub user_name: String,
    pub machine_name: String,
    pub session_key: Vec<u8>,
    pub guest: bool,
}

/// External authentication mechanism.
///
/// The dispatch engine only drives this seam and reacts to its status codes:
/// `SecIContinueNeeded` keeps the exchange open, `Success` establishes a
/// principal, anything else is a logon failure.
pub trait SecurityProvider: Send + Sync + 'static {
    type Context: AuthContext + Send + Sync + 'static;

    /// Start an exchange: produce the context and the initial challenge
    /// token for the peer.
    fn get_challenge(&self, negotiate_blob: &[u8]) -> (Self::Context, Vec<u8>, NtStatus);

    /// Feed a peer token into the exchange; returns the output token and
    /// the exchange status.
    fn accept_security_token(&self, context: &mut Self::Context, input_blob: &[u8]) -> (Vec<u8>, NtStatus);

    /// Dispose of provider-side state for the exchange.
    fn delete_security_context(&self, context: &mut Self::Context);

    /// The established principal, present once the exchange succeeded.
    fn authenticated_principal(&self, context: &Self::Context) -> Option<AuthenticatedPrincipal>;
}

pub trait AuthContext {
    fn init() -> Self;
}
