//! A challenge/response security provider over an in-memory user list.
//!
//! The token format is a serialized [`ChallengeMessage`]; the response proof
//! is `HMAC-SHA256(SHA256(password), server_challenge)`. This is the
//! provider tests and the demo binary run against; production deployments
//! plug their own [`SecurityProvider`] in at the same seam.

use hmac::{Hmac, Mac};
use rand::RngCore;
use serde::{Deserialize, Serialize};
use sha2::{Digest, Sha256};

use smbserve_core::nt_status::NtStatus;

use crate::util::auth::{AuthContext, AuthenticatedPrincipal, SecurityProvider, User};

#[derive(Serialize, Deserialize, Debug, Clone, PartialEq, Eq)]
pub enum ChallengeMessage {
    Challenge {
        server_challenge: [u8; 16],
    },
    Authenticate {
        user_name: String,
        machine_name: String,
        proof: Vec<u8>,
    },
}

impl ChallengeMessage {
    pub fn as_bytes(&self) -> Vec<u8> {
        // Message variants contain no unserializable state.
        bincode::serialize(self).unwrap_or_default()
    }

    pub fn parse(data: &[u8]) -> Option<Self> {
        bincode::deserialize(data).ok()
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ChallengeAuthProvider {
    accepted_users: Vec<User>,
    guest_supported: bool,
}

pub struct ChallengeAuthContext {
    server_challenge: [u8; 16],
    principal: Option<AuthenticatedPrincipal>,
}

impl AuthContext for ChallengeAuthContext {
    fn init() -> Self {
        Self {
            server_challenge: [0; 16],
            principal: None,
        }
    }
}

fn password_key(password: &str) -> [u8; 32] {
    let digest = Sha256::digest(password.as_bytes());
    digest.into()
}

fn compute_proof(password: &str, server_challenge: &[u8; 16]) -> Vec<u8> {
    // Key length is fixed at 32 bytes, new_from_slice cannot fail.
    let mut hmac = Hmac::<Sha256>::new_from_slice(&password_key(password)).expect("fixed-size key");
    hmac.update(server_challenge);
    hmac.finalize().into_bytes().to_vec()
}

fn derive_session_key(password: &str, user_name: &str, server_challenge: &[u8; 16]) -> Vec<u8> {
    let mut hmac = Hmac::<Sha256>::new_from_slice(&password_key(password)).expect("fixed-size key");
    hmac.update(user_name.as_bytes());
    hmac.update(server_challenge);
    hmac.finalize().into_bytes().to_vec()
}

impl ChallengeAuthProvider {
    pub fn new(accepted_users: Vec<User>, guest_supported: bool) -> Self {
        Self {
            accepted_users,
            guest_supported,
        }
    }

    /// Client-side helper: build the authenticate token answering a
    /// previously received challenge token.
    pub fn client_token(challenge_blob: &[u8], user: &User, machine_name: &str) -> Vec<u8> {
        let server_challenge = match ChallengeMessage::parse(challenge_blob) {
            Some(ChallengeMessage::Challenge { server_challenge }) => server_challenge,
            _ => [0; 16],
        };
        ChallengeMessage::Authenticate {
            user_name: user.username.clone(),
            machine_name: machine_name.into(),
            proof: compute_proof(&user.password, &server_challenge),
        }
        .as_bytes()
    }

    fn authenticate(&self, context: &ChallengeAuthContext, user_name: &str, machine_name: &str, proof: &[u8]) -> Option<AuthenticatedPrincipal> {
        let known = self
            .accepted_users
            .iter()
            .find(|user| user.username.eq_ignore_ascii_case(user_name));
        match known {
            Some(user) if compute_proof(&user.password, &context.server_challenge) == proof => {
                Some(AuthenticatedPrincipal {
                    user_name: user.username.clone(),
                    machine_name: machine_name.into(),
                    session_key: derive_session_key(&user.password, &user.username, &context.server_challenge),
                    guest: false,
                })
            }
            Some(_) => None,
            None if self.guest_supported => Some(AuthenticatedPrincipal {
                user_name: user_name.into(),
                machine_name: machine_name.into(),
                session_key: Vec::new(),
                guest: true,
            }),
            None => None,
        }
    }
}

impl SecurityProvider for ChallengeAuthProvider {
    type Context = ChallengeAuthContext;

    fn get_challenge(&self, _negotiate_blob: &[u8]) -> (Self::Context, Vec<u8>, NtStatus) {
        let mut context = ChallengeAuthContext::init();
        rand::thread_rng().fill_bytes(&mut context.server_challenge);
        let token = ChallengeMessage::Challenge {
            server_challenge: context.server_challenge,
        };
        (context, token.as_bytes(), NtStatus::SecIContinueNeeded)
    }

    fn accept_security_token(&self, context: &mut Self::Context, input_blob: &[u8]) -> (Vec<u8>, NtStatus) {
        match ChallengeMessage::parse(input_blob) {
            Some(ChallengeMessage::Authenticate {
                user_name,
                machine_name,
                proof,
            }) => match self.authenticate(context, &user_name, &machine_name, &proof) {
                Some(principal) => {
                    context.principal = Some(principal);
                    (Vec::new(), NtStatus::Success)
                }
                None => (Vec::new(), NtStatus::LogonFailure),
            },
            // A fresh negotiate-style token re-issues the challenge.
            Some(ChallengeMessage::Challenge { .. }) | None => {
                rand::thread_rng().fill_bytes(&mut context.server_challenge);
                let token = ChallengeMessage::Challenge {
                    server_challenge: context.server_challenge,
                };
                (token.as_bytes(), NtStatus::SecIContinueNeeded)
            }
        }
    }

    fn delete_security_context(&self, context: &mut Self::Context) {
        context.principal = None;
        context.server_challenge = [0; 16];
    }

    fn authenticated_principal(&self, context: &Self::Context) -> Option<AuthenticatedPrincipal> {
        context.principal.clone()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn provider() -> ChallengeAuthProvider {
        ChallengeAuthProvider::new(vec![User::new("alice", "hunter2")], false)
    }

    #[test]
    fn valid_credentials_establish_principal() {
        let provider = provider();
        let (mut context, challenge, status) = provider.get_challenge(&[]);
        assert_eq!(status, NtStatus::SecIContinueNeeded);

        let token = ChallengeAuthProvider::client_token(&challenge, &User::new("alice", "hunter2"), "workstation");
        let (_, status) = provider.accept_security_token(&mut context, &token);
        assert_eq!(status, NtStatus::Success);

        let principal = provider.authenticated_principal(&context).unwrap();
        assert_eq!(principal.user_name, "alice");
        assert_eq!(principal.machine_name, "workstation");
        assert!(!principal.guest);
        assert!(!principal.session_key.is_empty());
    }

    #[test]
    fn wrong_password_is_logon_failure() {
        let provider = provider();
        let (mut context, challenge, _) = provider.get_challenge(&[]);
        let token = ChallengeAuthProvider::client_token(&challenge, &User::new("alice", "wrong"), "ws");
        let (_, status) = provider.accept_security_token(&mut context, &token);
        assert_eq!(status, NtStatus::LogonFailure);
        assert!(provider.authenticated_principal(&context).is_none());
    }

    #[test]
    fn unknown_user_falls_back_to_guest_when_enabled() {
        let provider = ChallengeAuthProvider::new(vec![], true);
        let (mut context, challenge, _) = provider.get_challenge(&[]);
        let token = ChallengeAuthProvider::client_token(&challenge, &User::new("visitor", ""), "ws");
        let (_, status) = provider.accept_security_token(&mut context, &token);
        assert_eq!(status, NtStatus::Success);
        assert!(provider.authenticated_principal(&context).unwrap().guest);
    }

    #[test]
    fn delete_context_clears_principal() {
        let provider = provider();
        let (mut context, challenge, _) = provider.get_challenge(&[]);
        let token = ChallengeAuthProvider::client_token(&challenge, &User::new("alice", "hunter2"), "ws");
        provider.accept_security_token(&mut context, &token);
        provider.delete_security_context(&mut context);
        assert!(provider.authenticated_principal(&context).is_none());
    }
}
