//! Per-browser session state, kept in encrypted private cookies.
//!
//! The flow works on a plain [`SessionState`] value; handlers load it from the
//! cookie jar before a step and persist (or destroy) it afterwards.

use crate::db::UserRecord;
use crate::error::LinkerError;
use axum_extra::extract::cookie::{Cookie, Key, PrivateCookieJar, SameSite};
use oauth2::CsrfToken;
use serde::{Deserialize, Serialize};
use subtle::ConstantTimeEq;
use time::Duration;
use tracing::warn;

pub const SESSION_COOKIE: &str = "linker_session";
pub const GITHUB_STATE_COOKIE: &str = "github_oauth_state";
pub const LINKEDIN_STATE_COOKIE: &str = "linkedin_oauth_state";

/// Browsers cap a cookie at 4 KiB; encryption adds nonce, tag and base64.
const MAX_SESSION_JSON_BYTES: usize = 2800;

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct SessionState {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub github_username: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub github_access_token: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub github_profile_url: Option<String>,
    /// Logged-in identity: the row image as of the last sign-in.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub user: Option<UserRecord>,
}

/// GitHub identity captured by the first hop, waiting for LinkedIn.
#[derive(Debug, Clone, PartialEq)]
pub struct PendingGithub {
    pub username: String,
    pub access_token: String,
    pub profile_url: String,
}

impl SessionState {
    pub fn pending_github(&self) -> Option<PendingGithub> {
        Some(PendingGithub {
            username: self.github_username.clone()?,
            access_token: self.github_access_token.clone()?,
            profile_url: self.github_profile_url.clone().unwrap_or_default(),
        })
    }

    pub fn set_pending_github(&mut self, pending: PendingGithub) {
        self.github_username = Some(pending.username);
        self.github_access_token = Some(pending.access_token);
        self.github_profile_url = Some(pending.profile_url);
    }

    pub fn is_empty(&self) -> bool {
        *self == Self::default()
    }
}

/// Cookie policy shared by the session and OAuth `state` cookies.
#[derive(Debug, Clone, Copy)]
pub struct SessionCookies {
    secure: bool,
}

impl SessionCookies {
    pub fn new(insecure_cookie: bool) -> Self {
        Self {
            secure: !insecure_cookie,
        }
    }

    /// Read the session; a missing or unreadable cookie yields an empty session.
    pub fn load(&self, jar: &PrivateCookieJar) -> SessionState {
        let Some(cookie) = jar.get(SESSION_COOKIE) else {
            return SessionState::default();
        };
        serde_json::from_str(cookie.value())
            .inspect_err(|e| warn!(error = %e, "discarding unreadable session cookie"))
            .unwrap_or_default()
    }

    /// Write the session back into the jar.
    pub fn persist(
        &self,
        jar: PrivateCookieJar,
        state: &SessionState,
    ) -> Result<PrivateCookieJar, (PrivateCookieJar, LinkerError)> {
        let json = match serde_json::to_string(state) {
            Ok(json) => json,
            Err(e) => return Err((jar, e.into())),
        };
        if json.len() > MAX_SESSION_JSON_BYTES {
            return Err((
                jar,
                LinkerError::Session(format!(
                    "session payload of {} bytes does not fit in a cookie",
                    json.len()
                )),
            ));
        }
        let cookie = Cookie::build(Cookie::new(SESSION_COOKIE, json))
            .path("/")
            .http_only(true)
            .secure(self.secure)
            .same_site(SameSite::Lax)
            .build();
        Ok(jar.add(cookie))
    }

    pub fn destroy(&self, jar: PrivateCookieJar) -> PrivateCookieJar {
        jar.remove(self.clear_cookie(SESSION_COOKIE))
    }

    /// Remember the CSRF `state` sent with an authorization redirect.
    pub fn store_oauth_state(
        &self,
        jar: PrivateCookieJar,
        name: &'static str,
        csrf: &CsrfToken,
    ) -> PrivateCookieJar {
        let cookie = Cookie::build(Cookie::new(name, csrf.secret().to_string()))
            .path("/")
            .http_only(true)
            .secure(self.secure)
            .same_site(SameSite::Lax)
            .max_age(Duration::minutes(15))
            .build();
        jar.add(cookie)
    }

    /// Consume the CSRF `state` cookie; it is single use.
    pub fn take_oauth_state(
        &self,
        jar: PrivateCookieJar,
        name: &'static str,
    ) -> (Option<String>, PrivateCookieJar) {
        let value = jar.get(name).map(|c| c.value().to_owned());
        (value, jar.remove(self.clear_cookie(name)))
    }

    fn clear_cookie(&self, name: &'static str) -> Cookie<'static> {
        Cookie::build(Cookie::new(name, ""))
            .path("/")
            .http_only(true)
            .secure(self.secure)
            .same_site(SameSite::Lax)
            .build()
    }
}

pub fn state_matches(expected: &str, received: &str) -> bool {
    bool::from(expected.as_bytes().ct_eq(received.as_bytes()))
}

/// Build the cookie encryption key from the configured secret, or a random
/// one when none is configured.
pub fn session_key(secret: Option<&str>) -> Result<Key, LinkerError> {
    match secret {
        Some(secret) => Key::try_from(secret.as_bytes()).map_err(|e| {
            LinkerError::Session(format!("session secret must be at least 64 bytes: {e}"))
        }),
        None => {
            warn!("no session secret configured; sessions will not survive a restart");
            Ok(Key::generate())
        }
    }
}
