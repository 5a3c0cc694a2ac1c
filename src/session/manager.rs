//! Reuse-or-acquire decision logic.

use std::sync::Arc;

use chrono::{DateTime, Utc};
use tracing::{info, warn};

use super::{CredentialProvider, Identity, Phase, SessionRecord, SessionStore, TokenService};
use crate::error::Error;
use crate::Result;

/// Which path produced the token handed back by [`SessionManager::obtain`].
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Origin {
    /// A stored, unexpired token was returned without any exchange.
    Reused,
    /// The stored token had expired and was replaced by a new one.
    Refreshed,
    /// Nothing was stored; a new token was acquired.
    Acquired,
}

/// Result of a successful `obtain`.
#[derive(Debug, Clone, PartialEq)]
pub struct Obtained {
    /// The record now stored for the identity.
    pub record: SessionRecord,
    /// Which decision path produced the record.
    pub origin: Origin,
}

impl Obtained {
    /// Whether a credential exchange took place.
    pub fn was_exchanged(&self) -> bool {
        self.origin != Origin::Reused
    }
}

/// Hands out a valid token per identity, reusing stored ones while they last.
pub struct SessionManager {
    store: Arc<SessionStore>,
    credentials: Arc<dyn CredentialProvider>,
    tokens: Arc<dyn TokenService>,
}

impl SessionManager {
    /// Create a new session manager.
    pub fn new(
        store: Arc<SessionStore>,
        credentials: Arc<dyn CredentialProvider>,
        tokens: Arc<dyn TokenService>,
    ) -> Self {
        Self {
            store,
            credentials,
            tokens,
        }
    }

    /// The backing store.
    pub fn store(&self) -> &Arc<SessionStore> {
        &self.store
    }

    /// Obtain a valid token for `identity` as of the current time.
    pub async fn obtain(&self, identity: &Identity) -> Result<Obtained> {
        self.obtain_at(identity, Utc::now()).await
    }

    /// Obtain a token for `identity`, or for whichever identity the
    /// credential provider picks when none is given.
    pub async fn obtain_for(&self, identity: Option<Identity>) -> Result<Obtained> {
        let identity = match identity {
            Some(identity) => identity,
            None => self.credentials.identity().await?,
        };
        self.obtain(&identity).await
    }

    /// Obtain a valid token for `identity`, judging expiry against `now`.
    ///
    /// A stored token is reused only while `expires_at > now`. Otherwise the
    /// stale record is dropped first and a new token is exchanged and stored
    /// before being returned. A failed exchange is reported once, leaving no
    /// record for the identity.
    pub async fn obtain_at(&self, identity: &Identity, now: DateTime<Utc>) -> Result<Obtained> {
        let mut phase = Phase::Start;
        phase.transition_to(Phase::Lookup)?;

        let origin = match self.store.find(identity)? {
            Some(record) if record.is_valid_at(now) => {
                phase.transition_to(Phase::Reuse)?;
                info!(
                    %identity,
                    expires_at = %record.token.expires_at(),
                    "using stored session"
                );
                phase.transition_to(Phase::Done)?;
                return Ok(Obtained {
                    record,
                    origin: Origin::Reused,
                });
            }
            Some(record) => {
                phase.transition_to(Phase::Expired)?;
                info!(
                    %identity,
                    expired_at = %record.token.expires_at(),
                    "stored session expired"
                );
                self.store.remove(identity)?;
                Origin::Refreshed
            }
            None => {
                phase.transition_to(Phase::Missing)?;
                info!(%identity, "no stored session");
                Origin::Acquired
            }
        };

        phase.transition_to(Phase::Acquire)?;
        match self.acquire(identity).await {
            Ok(record) => {
                phase.transition_to(Phase::Done)?;
                info!(
                    %identity,
                    expires_at = %record.token.expires_at(),
                    "new session stored"
                );
                Ok(Obtained { record, origin })
            }
            Err(e) => {
                phase.transition_to(Phase::Failed)?;
                warn!(%identity, error = %e, "session acquisition failed");
                Err(e)
            }
        }
    }

    /// Drop the stored session for `identity`, forcing a fresh exchange on
    /// the next `obtain`. Returns whether anything was stored.
    pub fn invalidate(&self, identity: &Identity) -> Result<bool> {
        let removed = self.store.remove(identity)?;
        if removed {
            info!(%identity, "session invalidated");
        }
        Ok(removed)
    }

    async fn acquire(&self, identity: &Identity) -> Result<SessionRecord> {
        let secret = self.credentials.secret(identity).await?;
        let token = self
            .tokens
            .exchange(identity, &secret)
            .await
            .map_err(|failure| Error::Acquisition(failure.reason))?;

        let record = SessionRecord::new(identity.clone(), token);
        self.store.upsert(record.clone())?;
        Ok(record)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::session::{ExchangeFailure, Secret, Token};
    use async_trait::async_trait;
    use chrono::{Duration, TimeZone};
    use std::sync::atomic::{AtomicUsize, Ordering};
    use std::sync::Mutex;
    use tempfile::TempDir;

    fn now() -> DateTime<Utc> {
        Utc.timestamp_opt(1_700_000_000, 0).unwrap()
    }

    #[derive(Default)]
    struct Prompt {
        identity_calls: AtomicUsize,
        secret_calls: AtomicUsize,
    }

    #[async_trait]
    impl CredentialProvider for Prompt {
        async fn identity(&self) -> Result<Identity> {
            self.identity_calls.fetch_add(1, Ordering::SeqCst);
            Ok(Identity::new("prompted"))
        }

        async fn secret(&self, _identity: &Identity) -> Result<Secret> {
            self.secret_calls.fetch_add(1, Ordering::SeqCst);
            Ok(Secret::new("pw"))
        }
    }

    struct Service {
        reply: Mutex<Option<std::result::Result<Token, ExchangeFailure>>>,
        calls: AtomicUsize,
    }

    impl Service {
        fn replying(reply: std::result::Result<Token, ExchangeFailure>) -> Self {
            Self {
                reply: Mutex::new(Some(reply)),
                calls: AtomicUsize::new(0),
            }
        }
    }

    #[async_trait]
    impl TokenService for Service {
        async fn exchange(
            &self,
            _identity: &Identity,
            secret: &Secret,
        ) -> std::result::Result<Token, ExchangeFailure> {
            assert_eq!(secret.expose(), "pw");
            self.calls.fetch_add(1, Ordering::SeqCst);
            self.reply
                .lock()
                .unwrap()
                .take()
                .expect("exchange called more than once")
        }
    }

    fn setup(
        reply: std::result::Result<Token, ExchangeFailure>,
    ) -> (TempDir, SessionManager, Arc<Prompt>, Arc<Service>) {
        let dir = TempDir::new().unwrap();
        let store = Arc::new(SessionStore::open(dir.path().join("sessions.json")).unwrap());
        let prompt = Arc::new(Prompt::default());
        let service = Arc::new(Service::replying(reply));
        let manager = SessionManager::new(store, prompt.clone(), service.clone());
        (dir, manager, prompt, service)
    }

    #[tokio::test]
    async fn test_missing_acquires_and_stores() {
        let token = Token::new(now() + Duration::seconds(3600));
        let (_dir, manager, prompt, service) = setup(Ok(token.clone()));
        let alice = Identity::new("alice");

        let obtained = manager.obtain_at(&alice, now()).await.unwrap();

        assert_eq!(obtained.origin, Origin::Acquired);
        assert_eq!(obtained.record.token, token);
        assert_eq!(service.calls.load(Ordering::SeqCst), 1);
        assert_eq!(prompt.secret_calls.load(Ordering::SeqCst), 1);
        assert_eq!(manager.store().find(&alice).unwrap().unwrap().token, token);
    }

    #[tokio::test]
    async fn test_expiring_now_is_refreshed() {
        let fresh = Token::new(now() + Duration::seconds(60));
        let (_dir, manager, _prompt, service) = setup(Ok(fresh.clone()));
        let alice = Identity::new("alice");
        manager
            .store()
            .upsert(SessionRecord::new(alice.clone(), Token::new(now())))
            .unwrap();

        let obtained = manager.obtain_at(&alice, now()).await.unwrap();

        assert_eq!(obtained.origin, Origin::Refreshed);
        assert!(obtained.was_exchanged());
        assert_eq!(obtained.record.token, fresh);
        assert_eq!(service.calls.load(Ordering::SeqCst), 1);
        assert_eq!(manager.store().len(), 1);
    }

    #[tokio::test]
    async fn test_obtain_for_prompts_for_identity() {
        let token = Token::new(now() + Duration::seconds(3600));
        let (_dir, manager, prompt, _service) = setup(Ok(token));

        let obtained = manager.obtain_for(None).await.unwrap();

        assert_eq!(obtained.record.identity, Identity::new("prompted"));
        assert_eq!(prompt.identity_calls.load(Ordering::SeqCst), 1);
    }

    #[tokio::test]
    async fn test_obtain_for_given_identity_skips_prompt() {
        let token = Token::new(Utc::now() + Duration::seconds(3600));
        let (_dir, manager, prompt, _service) = setup(Ok(token));

        let obtained = manager.obtain_for(Some(Identity::new("bob"))).await.unwrap();

        assert_eq!(obtained.record.identity, Identity::new("bob"));
        assert_eq!(prompt.identity_calls.load(Ordering::SeqCst), 0);
    }

    #[tokio::test]
    async fn test_invalidate() {
        let (_dir, manager, _prompt, _service) =
            setup(Err(ExchangeFailure::new("unused")));
        let alice = Identity::new("alice");
        manager
            .store()
            .upsert(SessionRecord::new(
                alice.clone(),
                Token::new(now() + Duration::seconds(60)),
            ))
            .unwrap();

        assert!(manager.invalidate(&alice).unwrap());
        assert!(!manager.invalidate(&alice).unwrap());
        assert!(manager.store().is_empty());
    }

    #[tokio::test]
    async fn test_failure_leaves_no_record() {
        let (_dir, manager, _prompt, service) =
            setup(Err(ExchangeFailure::new("bad credentials")));
        let alice = Identity::new("alice");
        manager
            .store()
            .upsert(SessionRecord::new(
                alice.clone(),
                Token::new(now() - Duration::seconds(10)),
            ))
            .unwrap();

        let err = manager.obtain_at(&alice, now()).await.unwrap_err();

        assert!(matches!(err, Error::Acquisition(ref reason) if reason == "bad credentials"));
        assert_eq!(service.calls.load(Ordering::SeqCst), 1);
        assert!(manager.store().find(&alice).unwrap().is_none());
    }
}
