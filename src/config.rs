use figment::{
    Figment,
    providers::{Env, Format, Serialized, Toml},
};
use serde::{Deserialize, Serialize};
use url::Url;

use crate::error::LinkerError;

pub const GITHUB_AUTH_URL: &str = "https://github.com/login/oauth/authorize";
pub const GITHUB_TOKEN_URL: &str = "https://github.com/login/oauth/access_token";
pub const GITHUB_USER_URL: &str = "https://api.github.com/user";

pub const LINKEDIN_AUTH_URL: &str = "https://www.linkedin.com/oauth/v2/authorization";
pub const LINKEDIN_TOKEN_URL: &str = "https://www.linkedin.com/oauth/v2/accessToken";
pub const LINKEDIN_JWKS_URL: &str = "https://www.linkedin.com/oauth/openid/jwks";
pub const LINKEDIN_ISSUER: &str = "https://www.linkedin.com/oauth";

/// Path of the (external) registration page used as redirect target.
pub const REGISTER_PATH: &str = "/users/register";
/// Path of the (external) login page used when the session cannot be saved.
pub const LOGIN_PATH: &str = "/users/login";

/// Runtime configuration, layered as defaults -> `config.toml` -> environment.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct Config {
    pub basic: BasicConfig,
    pub github: GithubConfig,
    pub linkedin: LinkedinConfig,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct BasicConfig {
    pub listen_addr: String,
    pub database_url: String,
    pub loglevel: String,
    /// Master key for the private session cookies; at least 64 bytes.
    pub session_secret: Option<String>,
    /// Drop the `Secure` attribute from cookies (plain-http development).
    pub insecure_cookie: bool,
    /// Outbound proxy for provider calls.
    pub proxy: Option<Url>,
}

impl Default for BasicConfig {
    fn default() -> Self {
        Self {
            listen_addr: "0.0.0.0:8000".to_string(),
            database_url: "sqlite://data.db".to_string(),
            loglevel: "info".to_string(),
            session_secret: None,
            insecure_cookie: false,
            proxy: None,
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct GithubConfig {
    pub client_id: String,
    pub client_secret: String,
    pub callback_url: Url,
    pub auth_url: Url,
    pub token_url: Url,
    pub user_url: Url,
    pub scopes: Vec<String>,
}

impl Default for GithubConfig {
    fn default() -> Self {
        Self {
            client_id: String::new(),
            client_secret: String::new(),
            callback_url: parse_default("http://localhost:8000/github/callback"),
            auth_url: parse_default(GITHUB_AUTH_URL),
            token_url: parse_default(GITHUB_TOKEN_URL),
            user_url: parse_default(GITHUB_USER_URL),
            scopes: vec!["repo".to_string()],
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct LinkedinConfig {
    pub client_id: String,
    pub client_secret: String,
    pub callback_url: Url,
    pub auth_url: Url,
    pub token_url: Url,
    pub jwks_url: Url,
    pub issuer: String,
    pub scopes: Vec<String>,
    pub jwks_cache_ttl_secs: u64,
    /// Minimum age of the cached key set before an unknown `kid` may refetch it.
    pub jwks_min_refetch_secs: u64,
}

impl Default for LinkedinConfig {
    fn default() -> Self {
        Self {
            client_id: String::new(),
            client_secret: String::new(),
            callback_url: parse_default("http://localhost:8000/linkedin/callback"),
            auth_url: parse_default(LINKEDIN_AUTH_URL),
            token_url: parse_default(LINKEDIN_TOKEN_URL),
            jwks_url: parse_default(LINKEDIN_JWKS_URL),
            issuer: LINKEDIN_ISSUER.to_string(),
            scopes: ["openid", "profile", "email", "w_member_social"]
                .into_iter()
                .map(String::from)
                .collect(),
            jwks_cache_ttl_secs: 3600,
            jwks_min_refetch_secs: 10,
        }
    }
}

impl Config {
    /// Load from `config.toml` (optional) and the process environment.
    pub fn load() -> Result<Self, LinkerError> {
        Self::from_figment(Self::figment())
    }

    pub fn figment() -> Figment {
        Figment::from(Serialized::defaults(Config::default()))
            .merge(Toml::file("config.toml"))
            .merge(Env::prefixed("LINKER_").map(|k| format!("basic.{k}").into()))
            .merge(Env::prefixed("GITHUB_").map(|k| {
                // `GITHUB_AUTH_CALLBACK_URL` is the historical variable name.
                let key = k.as_str().to_ascii_lowercase();
                let key = if key == "auth_callback_url" { "callback_url" } else { key.as_str() };
                format!("github.{key}").into()
            }))
            .merge(Env::prefixed("LINKEDIN_").map(|k| format!("linkedin.{k}").into()))
    }

    pub fn from_figment(figment: Figment) -> Result<Self, LinkerError> {
        Ok(figment.extract()?)
    }
}

// Only used for the compile-time constants above.
fn parse_default(raw: &str) -> Url {
    Url::parse(raw).unwrap_or_else(|e| panic!("invalid built-in url {raw}: {e}"))
}
