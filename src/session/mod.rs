//! Session management module.
//!
//! This module provides the persisted session store, the collaborator
//! traits, and the manager that decides whether a stored token can be
//! reused or a new one must be acquired.

mod identity;
mod manager;
mod provider;
mod record;
mod state;
mod store;

pub use identity::{Identity, Secret};
pub use manager::{Obtained, Origin, SessionManager};
pub use provider::{CredentialProvider, ExchangeFailure, TokenService};
pub use record::{SessionRecord, Token, EXPIRES_AT, REFRESH_BEFORE};
pub use state::Phase;
pub use store::SessionStore;
