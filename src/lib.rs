//! # session-keeper
//!
//! Persistent credential sessions for a single account service.
//!
//! Tokens obtained from the service are stored per account identity in a
//! durable JSON document. On each run the [`SessionManager`] hands back the
//! stored token while it is still valid, and otherwise exchanges fresh
//! credentials for a new one and stores it before returning it.
//!
//! ## Features
//!
//! - **One session per identity**: upserts replace, never append
//! - **Crash-safe persistence**: every mutation is fsynced and renamed into place
//! - **Pluggable collaborators**: prompting and the remote exchange sit behind
//!   the [`CredentialProvider`] and [`TokenService`] traits
//!
//! ## Quick Start
//!
//! ```no_run
//! use std::sync::Arc;
//! use session_keeper::{
//!     CredentialProvider, ExchangeFailure, Identity, Secret, SessionManager, SessionStore,
//!     Token, TokenService,
//! };
//!
//! struct Prompt;
//!
//! #[async_trait::async_trait]
//! impl CredentialProvider for Prompt {
//!     async fn identity(&self) -> session_keeper::Result<Identity> {
//!         Ok(Identity::new("12345678901"))
//!     }
//!     async fn secret(&self, _identity: &Identity) -> session_keeper::Result<Secret> {
//!         Ok(Secret::new("hunter2"))
//!     }
//! }
//!
//! struct Service;
//!
//! #[async_trait::async_trait]
//! impl TokenService for Service {
//!     async fn exchange(&self, _: &Identity, _: &Secret) -> Result<Token, ExchangeFailure> {
//!         Err(ExchangeFailure::new("offline"))
//!     }
//! }
//!
//! async fn run() -> session_keeper::Result<()> {
//!     session_keeper::logging::try_init().ok();
//!
//!     let store = Arc::new(SessionStore::open("sessions.json")?);
//!     let manager = SessionManager::new(store, Arc::new(Prompt), Arc::new(Service));
//!
//!     let obtained = manager.obtain_for(None).await?;
//!     println!("token valid until {}", obtained.record.token.expires_at());
//!     Ok(())
//! }
//! ```

pub mod admin;
pub mod cli;
pub mod config;
pub mod error;
pub mod logging;
pub mod session;

// Re-export commonly used types
pub use error::{Error, Result};
pub use session::{
    CredentialProvider, ExchangeFailure, Identity, Obtained, Origin, Phase, Secret,
    SessionManager, SessionRecord, SessionStore, Token, TokenService,
};
