//! Authenticated session and user identity.

use chrono::{DateTime, Duration, Utc};
use secrecy::SecretString;
use serde::{Deserialize, Deserializer, Serialize};

use cafe_loyalty_core::{Email, UserId};

/// Profile identity of a signed-in user.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct User {
    pub id: UserId,
    /// Missing for accounts created without an email (e.g. phone sign-in).
    #[serde(default, deserialize_with = "lenient_email")]
    pub email: Option<Email>,
    #[serde(default)]
    pub created_at: Option<DateTime<Utc>>,
    /// Free-form profile data kept by the identity provider.
    #[serde(default, rename = "user_metadata")]
    pub metadata: serde_json::Map<String, serde_json::Value>,
}

impl User {
    /// Display name from profile metadata, falling back to the email.
    #[must_use]
    pub fn display_name(&self) -> Option<&str> {
        ["full_name", "name"]
            .iter()
            .find_map(|key| self.metadata.get(*key).and_then(serde_json::Value::as_str))
            .or_else(|| self.email.as_ref().map(Email::as_str))
    }
}

/// Proof of authentication for the current user.
///
/// Tokens are wrapped in [`SecretString`] so they never show up in `Debug`
/// output or logs.
#[derive(Debug, Serialize, Deserialize)]
pub struct Session {
    #[serde(with = "secret")]
    pub access_token: SecretString,
    #[serde(with = "secret")]
    pub refresh_token: SecretString,
    pub token_type: String,
    /// When the access token stops being accepted, if the provider said.
    #[serde(default, with = "chrono::serde::ts_seconds_option")]
    pub expires_at: Option<DateTime<Utc>>,
    pub user: User,
}

impl Session {
    /// Whether the access token expires within `leeway` of `now`.
    ///
    /// Sessions without an expiry never expire.
    #[must_use]
    pub fn expires_within(&self, leeway: Duration, now: DateTime<Utc>) -> bool {
        self.expires_at.is_some_and(|at| at - leeway <= now)
    }
}

/// Accept absent, empty or malformed emails as `None`.
fn lenient_email<'de, D>(deserializer: D) -> Result<Option<Email>, D::Error>
where
    D: Deserializer<'de>,
{
    let raw = Option::<String>::deserialize(deserializer)?;
    Ok(raw.and_then(|s| s.parse().ok()))
}

mod secret {
    use secrecy::{ExposeSecret, SecretString};
    use serde::{Deserialize, Deserializer, Serializer};

    pub fn serialize<S: Serializer>(value: &SecretString, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.serialize_str(value.expose_secret())
    }

    pub fn deserialize<'de, D: Deserializer<'de>>(deserializer: D) -> Result<SecretString, D::Error> {
        String::deserialize(deserializer).map(SecretString::from)
    }
}
