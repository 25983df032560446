use super::{GithubIdentity, GithubProfile, ensure_client_id};
use crate::config::GithubConfig;
use crate::error::LinkerError;

use oauth2::{
    AuthType, AuthUrl, AuthorizationCode, ClientId, ClientSecret, CsrfToken, EndpointNotSet,
    EndpointSet, RedirectUrl, Scope, TokenResponse, TokenUrl, basic::BasicClient,
};
use tracing::info;
use url::Url;

type GithubOauth2Client =
    BasicClient<EndpointSet, EndpointNotSet, EndpointNotSet, EndpointNotSet, EndpointSet>;

/// GitHub OAuth App client.
pub struct GithubClient {
    oauth: GithubOauth2Client,
    http: reqwest::Client,
    client_id: String,
    user_url: Url,
    scopes: Vec<String>,
}

impl GithubClient {
    pub fn new(cfg: &GithubConfig, http: reqwest::Client) -> Self {
        let oauth = BasicClient::new(ClientId::new(cfg.client_id.clone()))
            .set_client_secret(ClientSecret::new(cfg.client_secret.clone()))
            .set_auth_type(AuthType::RequestBody)
            .set_auth_uri(AuthUrl::from_url(cfg.auth_url.clone()))
            .set_token_uri(TokenUrl::from_url(cfg.token_url.clone()))
            .set_redirect_uri(RedirectUrl::from_url(cfg.callback_url.clone()));
        Self {
            oauth,
            http,
            client_id: cfg.client_id.clone(),
            user_url: cfg.user_url.clone(),
            scopes: cfg.scopes.clone(),
        }
    }
}

impl GithubIdentity for GithubClient {
    fn authorize_url(&self) -> Result<(Url, CsrfToken), LinkerError> {
        ensure_client_id("GitHub", &self.client_id)?;
        Ok(self
            .oauth
            .authorize_url(CsrfToken::new_random)
            .add_scopes(self.scopes.iter().cloned().map(Scope::new))
            .url())
    }

    async fn exchange_code(&self, code: &str) -> Result<String, LinkerError> {
        let token = self
            .oauth
            .exchange_code(AuthorizationCode::new(code.to_owned()))
            .request_async(&self.http)
            .await?;
        info!("GitHub authorization code exchanged");
        Ok(token.access_token().secret().clone())
    }

    async fn fetch_profile(&self, access_token: &str) -> Result<GithubProfile, LinkerError> {
        let profile: GithubProfile = self
            .http
            .get(self.user_url.clone())
            .bearer_auth(access_token)
            .header("Accept", "application/vnd.github+json")
            .send()
            .await?
            .error_for_status()?
            .json()
            .await?;
        info!(github_username = %profile.login, "Fetched GitHub profile");
        Ok(profile)
    }
}
