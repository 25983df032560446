//! Identity provider clients.
//!
//! The reconciliation flow talks to providers only through [`GithubIdentity`]
//! and [`LinkedinIdentity`]; the concrete clients here wrap `oauth2` for the
//! authorization-code grant and `reqwest` for everything else.

pub mod github;
pub mod jwks;
pub mod linkedin;

use crate::error::LinkerError;
use oauth2::CsrfToken;
use serde::Deserialize;
use std::future::Future;
use std::time::Duration;
use url::Url;

pub use github::GithubClient;
pub use jwks::JwksVerifier;
pub use linkedin::LinkedinClient;

/// Canonical GitHub identity as returned by `GET /user`.
#[derive(Debug, Clone, PartialEq, Deserialize)]
pub struct GithubProfile {
    pub login: String,
    #[serde(default)]
    pub avatar_url: String,
}

/// Result of the LinkedIn authorization-code exchange.
#[derive(Debug, Clone)]
pub struct LinkedinTokens {
    pub access_token: String,
    pub id_token: String,
}

/// Verified OpenID claims from a LinkedIn identity token.
#[derive(Debug, Clone, PartialEq, Deserialize)]
pub struct LinkedinClaims {
    pub sub: String,
    #[serde(default)]
    pub name: Option<String>,
    #[serde(default)]
    pub email: Option<String>,
    #[serde(default)]
    pub picture: Option<String>,
}

pub trait GithubIdentity: Send + Sync {
    /// Authorization URL plus the CSRF `state` embedded in it.
    fn authorize_url(&self) -> Result<(Url, CsrfToken), LinkerError>;

    /// Exchange an authorization code for a bearer token.
    fn exchange_code(&self, code: &str)
    -> impl Future<Output = Result<String, LinkerError>> + Send;

    fn fetch_profile(
        &self,
        access_token: &str,
    ) -> impl Future<Output = Result<GithubProfile, LinkerError>> + Send;
}

pub trait LinkedinIdentity: Send + Sync {
    /// Authorization URL plus the CSRF `state` embedded in it.
    fn authorize_url(&self) -> Result<(Url, CsrfToken), LinkerError>;

    /// Exchange an authorization code for a bearer token and an identity token.
    fn exchange_code(
        &self,
        code: &str,
    ) -> impl Future<Output = Result<LinkedinTokens, LinkerError>> + Send;

    /// Check the identity token's signature and claims.
    fn verify_id_token(
        &self,
        id_token: &str,
    ) -> impl Future<Output = Result<LinkedinClaims, LinkerError>> + Send;
}

/// Shared outbound HTTP client.
///
/// Redirects are disabled: token endpoints must answer directly.
pub fn build_http_client(proxy: Option<&Url>) -> Result<reqwest::Client, LinkerError> {
    let mut builder = reqwest::Client::builder()
        .user_agent(concat!("identity-linker/", env!("CARGO_PKG_VERSION")))
        .connect_timeout(Duration::from_secs(5))
        .timeout(Duration::from_secs(15))
        .redirect(reqwest::redirect::Policy::none());
    if let Some(proxy_url) = proxy {
        builder = builder.proxy(reqwest::Proxy::all(proxy_url.as_str())?);
    }
    Ok(builder.build()?)
}

fn ensure_client_id(provider: &str, client_id: &str) -> Result<(), LinkerError> {
    if client_id.trim().is_empty() {
        return Err(LinkerError::OauthFlow(format!(
            "{provider} client id is not configured"
        )));
    }
    Ok(())
}
