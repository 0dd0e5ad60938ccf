//! Profile rows in the auth provider's REST database.
//!
//! The `usuarios` table is read and updated through its PostgREST endpoint
//! (`/rest/v1/usuarios`) with the signed-in user's access token, so row
//! level security limits every call to the user's own row.

use chrono::NaiveDate;
use reqwest::StatusCode;
use secrecy::{ExposeSecret, SecretString};
use serde::{Deserialize, Serialize};
use tracing::{debug, info, instrument};
use url::Url;

use cafe_loyalty_core::{Gender, Profile, ProfileUpdate};

use super::types::Session;
use crate::api::ApiError;
use crate::config::AuthConfig;

const PROFILE_COLUMNS: &str = "nombre,apellidos,telefono,genero,fecha_nacimiento";

/// PostgREST answers a single-object request matching no row with 406.
const NO_ROW: StatusCode = StatusCode::NOT_ACCEPTABLE;

/// Reads and updates the signed-in user's profile.
pub struct ProfileClient {
    client: reqwest::Client,
    base_url: Url,
    anon_key: SecretString,
}

impl ProfileClient {
    #[must_use]
    pub fn new(config: &AuthConfig) -> Self {
        Self {
            client: reqwest::Client::new(),
            base_url: config.url.clone(),
            anon_key: config.anon_key.clone(),
        }
    }

    fn table_url(&self, session: &Session) -> Result<Url, ApiError> {
        let mut url = self
            .base_url
            .join("rest/v1/usuarios")
            .map_err(|e| ApiError::InvalidUrl(format!("rest/v1/usuarios: {e}")))?;
        url.query_pairs_mut()
            .append_pair("id", &format!("eq.{}", session.user.id));
        Ok(url)
    }

    fn authorized(
        &self,
        request: reqwest::RequestBuilder,
        session: &Session,
    ) -> reqwest::RequestBuilder {
        request
            .header("apikey", self.anon_key.expose_secret())
            .bearer_auth(session.access_token.expose_secret())
    }

    /// The profile of the session's user, or `None` if no row exists yet.
    ///
    /// # Errors
    ///
    /// Returns an error if the request fails or the row cannot be decoded.
    #[instrument(skip_all, fields(user_id = %session.user.id))]
    pub async fn profile(&self, session: &Session) -> Result<Option<Profile>, ApiError> {
        let mut url = self.table_url(session)?;
        url.query_pairs_mut().append_pair("select", PROFILE_COLUMNS);

        let request = self
            .authorized(self.client.get(url), session)
            .header("accept", "application/vnd.pgrst.object+json");
        let response = request.send().await?;
        let status = response.status();
        let body = response.text().await?;

        if status == NO_ROW {
            debug!("no profile row");
            return Ok(None);
        }
        if !status.is_success() {
            return Err(status_error(status, &body));
        }

        let row: ProfileRow = serde_json::from_str(&body)?;
        Ok(Some(row.into()))
    }

    /// Save `update` as the session user's profile.
    ///
    /// # Errors
    ///
    /// Returns an error if the request fails or the database rejects it.
    #[instrument(skip_all, fields(user_id = %session.user.id))]
    pub async fn update_profile(
        &self,
        session: &Session,
        update: &ProfileUpdate,
    ) -> Result<(), ApiError> {
        let url = self.table_url(session)?;
        let request = self
            .authorized(self.client.patch(url), session)
            .header("prefer", "return=minimal")
            .json(&ProfileChanges::from(update.profile()));
        let response = request.send().await?;
        let status = response.status();

        if !status.is_success() {
            let body = response.text().await?;
            return Err(status_error(status, &body));
        }
        info!("profile updated");
        Ok(())
    }
}

impl std::fmt::Debug for ProfileClient {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ProfileClient")
            .field("base_url", &self.base_url.as_str())
            .field("anon_key", &"[REDACTED]")
            .finish_non_exhaustive()
    }
}

/// Non-success status, using the database's `message` when it sent one.
fn status_error(status: StatusCode, body: &str) -> ApiError {
    let message = serde_json::from_str::<ErrorBody>(body)
        .ok()
        .and_then(|b| b.message)
        .unwrap_or_else(|| body.chars().take(200).collect());
    debug!(%status, %message, "profile request rejected");
    ApiError::Status {
        status: status.as_u16(),
        message,
    }
}

// =============================================================================
// Wire types
// =============================================================================

#[derive(Deserialize)]
struct ErrorBody {
    message: Option<String>,
}

/// Row as stored; every column may be null.
#[derive(Deserialize)]
struct ProfileRow {
    nombre: Option<String>,
    apellidos: Option<String>,
    telefono: Option<String>,
    genero: Option<String>,
    fecha_nacimiento: Option<NaiveDate>,
}

impl From<ProfileRow> for Profile {
    fn from(row: ProfileRow) -> Self {
        let gender = row
            .genero
            .filter(|g| !g.trim().is_empty())
            .and_then(|g| match g.parse::<Gender>() {
                Ok(gender) => Some(gender),
                Err(e) => {
                    debug!(error = %e, "ignoring stored gender");
                    None
                }
            });
        Self {
            first_name: row.nombre.unwrap_or_default(),
            last_name: row.apellidos.unwrap_or_default(),
            phone: row.telefono.unwrap_or_default(),
            gender,
            birth_date: row.fecha_nacimiento,
        }
    }
}

/// Columns written on save. An unset gender is stored as an empty string.
#[derive(Serialize)]
struct ProfileChanges<'a> {
    nombre: &'a str,
    apellidos: &'a str,
    telefono: &'a str,
    genero: &'static str,
    fecha_nacimiento: Option<NaiveDate>,
}

impl<'a> From<&'a Profile> for ProfileChanges<'a> {
    fn from(profile: &'a Profile) -> Self {
        Self {
            nombre: &profile.first_name,
            apellidos: &profile.last_name,
            telefono: &profile.phone,
            genero: profile.gender.map_or("", Gender::wire_label),
            fecha_nacimiento: profile.birth_date,
        }
    }
}
