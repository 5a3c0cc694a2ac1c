//! Collaborator interfaces the session manager depends on.

use std::fmt;

use async_trait::async_trait;

use super::{Identity, Secret, Token};
use crate::Result;

/// Supplies the identity to work with and the secret for it.
///
/// Implementations typically prompt a human; validation of what they
/// return is their responsibility.
#[async_trait]
pub trait CredentialProvider: Send + Sync {
    /// Choose the identity for this run.
    async fn identity(&self) -> Result<Identity>;

    /// Produce the secret for `identity`.
    async fn secret(&self, identity: &Identity) -> Result<Secret>;
}

/// Reason the token service gave for refusing an exchange.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ExchangeFailure {
    pub reason: String,
}

impl ExchangeFailure {
    pub fn new(reason: impl Into<String>) -> Self {
        Self {
            reason: reason.into(),
        }
    }
}

impl fmt::Display for ExchangeFailure {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.reason)
    }
}

impl std::error::Error for ExchangeFailure {}

/// Exchanges credentials for a token with the remote account service.
///
/// Timeouts and retries, if any, live inside the implementation.
#[async_trait]
pub trait TokenService: Send + Sync {
    async fn exchange(
        &self,
        identity: &Identity,
        secret: &Secret,
    ) -> std::result::Result<Token, ExchangeFailure>;
}
