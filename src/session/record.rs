//! Tokens and the persisted session record.

use std::fmt;

use chrono::{DateTime, SecondsFormat, Utc};
use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};

use super::Identity;

/// Key under which a token's expiry is normally stored.
pub const EXPIRES_AT: &str = "expires_at";

/// Older expiry key some services use instead of [`EXPIRES_AT`].
pub const REFRESH_BEFORE: &str = "refresh_before";

/// Credential artifact issued by the token service.
///
/// The service's field map is kept verbatim, including the key the expiry
/// was found under, so the token serializes back exactly as it was issued.
/// Only the expiry is interpreted: it is read from `expires_at`, or from
/// `refresh_before` when `expires_at` is absent.
#[derive(Clone, PartialEq, Serialize, Deserialize)]
#[serde(try_from = "Map<String, Value>", into = "Map<String, Value>")]
pub struct Token {
    expires_at: DateTime<Utc>,
    fields: Map<String, Value>,
}

impl Token {
    /// Create a token holding only an `expires_at` field.
    pub fn new(expires_at: DateTime<Utc>) -> Self {
        let mut fields = Map::new();
        fields.insert(EXPIRES_AT.to_string(), expiry_value(expires_at));
        Self { expires_at, fields }
    }

    /// Attach an opaque field.
    ///
    /// Setting one of the expiry keys to a valid timestamp also moves the
    /// expiry, following the same precedence as deserialization.
    pub fn with_field(mut self, key: impl Into<String>, value: impl Into<Value>) -> Self {
        let key = key.into();
        let touches_expiry = key == EXPIRES_AT || key == REFRESH_BEFORE;
        self.fields.insert(key, value.into());
        if touches_expiry {
            if let Ok(expires_at) = expiry_of(&self.fields) {
                self.expires_at = expires_at;
            }
        }
        self
    }

    /// Instant after which the token must not be reused.
    pub fn expires_at(&self) -> DateTime<Utc> {
        self.expires_at
    }

    /// Every field as issued by the service, expiry included.
    pub fn fields(&self) -> &Map<String, Value> {
        &self.fields
    }

    /// Look up a single field.
    pub fn field(&self, key: &str) -> Option<&Value> {
        self.fields.get(key)
    }

    /// Whether the token may still be used at `now`.
    ///
    /// A token expiring exactly at `now` is already expired.
    pub fn is_valid_at(&self, now: DateTime<Utc>) -> bool {
        self.expires_at > now
    }
}

impl TryFrom<Map<String, Value>> for Token {
    type Error = String;

    fn try_from(fields: Map<String, Value>) -> Result<Self, Self::Error> {
        let expires_at = expiry_of(&fields)?;
        Ok(Self { expires_at, fields })
    }
}

impl From<Token> for Map<String, Value> {
    fn from(token: Token) -> Self {
        token.fields
    }
}

fn expiry_value(expires_at: DateTime<Utc>) -> Value {
    Value::String(expires_at.to_rfc3339_opts(SecondsFormat::AutoSi, true))
}

fn expiry_of(fields: &Map<String, Value>) -> Result<DateTime<Utc>, String> {
    let (key, value) = [EXPIRES_AT, REFRESH_BEFORE]
        .into_iter()
        .find_map(|key| fields.get(key).map(|value| (key, value)))
        .ok_or_else(|| format!("token has no `{}` or `{}` field", EXPIRES_AT, REFRESH_BEFORE))?;

    serde_json::from_value(value.clone()).map_err(|e| format!("invalid `{}`: {}", key, e))
}

impl fmt::Debug for Token {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Token")
            .field("expires_at", &self.expires_at)
            .field("fields", &self.fields.keys().collect::<Vec<_>>())
            .finish()
    }
}

/// A stored pairing of identity and token.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SessionRecord {
    pub identity: Identity,
    pub token: Token,
}

impl SessionRecord {
    pub fn new(identity: Identity, token: Token) -> Self {
        Self { identity, token }
    }

    /// Shorthand for `self.token.is_valid_at(now)`.
    pub fn is_valid_at(&self, now: DateTime<Utc>) -> bool {
        self.token.is_valid_at(now)
    }
}
