use super::jwks::JwksVerifier;
use super::{LinkedinClaims, LinkedinIdentity, LinkedinTokens, ensure_client_id};
use crate::config::LinkedinConfig;
use crate::error::LinkerError;

use oauth2::{
    AuthType, AuthUrl, AuthorizationCode, Client as OAuth2Client, ClientId, ClientSecret,
    CsrfToken, EndpointNotSet, EndpointSet, ExtraTokenFields, RedirectUrl, Scope,
    StandardRevocableToken, StandardTokenResponse, TokenResponse, TokenUrl,
    basic::{
        BasicErrorResponse, BasicRevocationErrorResponse, BasicTokenIntrospectionResponse,
        BasicTokenType,
    },
};
use serde::{Deserialize, Serialize};
use std::time::Duration;
use tracing::info;
use url::Url;

/// LinkedIn (OpenID Connect) client.
pub struct LinkedinClient {
    oauth: LinkedinOauth2Client,
    http: reqwest::Client,
    verifier: JwksVerifier,
    client_id: String,
    scopes: Vec<String>,
}

impl LinkedinClient {
    pub fn new(cfg: &LinkedinConfig, http: reqwest::Client) -> Self {
        let oauth = OAuth2Client::new(ClientId::new(cfg.client_id.clone()))
            .set_client_secret(ClientSecret::new(cfg.client_secret.clone()))
            // LinkedIn only accepts client credentials in the form body.
            .set_auth_type(AuthType::RequestBody)
            .set_auth_uri(AuthUrl::from_url(cfg.auth_url.clone()))
            .set_token_uri(TokenUrl::from_url(cfg.token_url.clone()))
            .set_redirect_uri(RedirectUrl::from_url(cfg.callback_url.clone()));
        let verifier = JwksVerifier::new(
            http.clone(),
            cfg.jwks_url.clone(),
            cfg.issuer.clone(),
            cfg.client_id.clone(),
            Duration::from_secs(cfg.jwks_cache_ttl_secs),
            Duration::from_secs(cfg.jwks_min_refetch_secs),
        );
        Self {
            oauth,
            http,
            verifier,
            client_id: cfg.client_id.clone(),
            scopes: cfg.scopes.clone(),
        }
    }
}

impl LinkedinIdentity for LinkedinClient {
    fn authorize_url(&self) -> Result<(Url, CsrfToken), LinkerError> {
        ensure_client_id("LinkedIn", &self.client_id)?;
        Ok(self
            .oauth
            .authorize_url(CsrfToken::new_random)
            .add_scopes(self.scopes.iter().cloned().map(Scope::new))
            .url())
    }

    async fn exchange_code(&self, code: &str) -> Result<LinkedinTokens, LinkerError> {
        let token: LinkedinTokenResponse = self
            .oauth
            .exchange_code(AuthorizationCode::new(code.to_owned()))
            .request_async(&self.http)
            .await?;
        info!("LinkedIn authorization code exchanged");
        let id_token = token
            .extra_fields()
            .id_token
            .clone()
            .ok_or(LinkerError::MissingIdToken)?;
        Ok(LinkedinTokens {
            access_token: token.access_token().secret().clone(),
            id_token,
        })
    }

    async fn verify_id_token(&self, id_token: &str) -> Result<LinkedinClaims, LinkerError> {
        self.verifier.verify(id_token).await
    }
}

#[derive(Debug, Clone, Deserialize, Serialize)]
pub(super) struct LinkedinTokenField {
    #[serde(rename = "id_token")]
    pub id_token: Option<String>,
}
impl ExtraTokenFields for LinkedinTokenField {}

pub(super) type LinkedinTokenResponse = StandardTokenResponse<LinkedinTokenField, BasicTokenType>;

pub(super) type LinkedinOauth2Client = OAuth2Client<
    BasicErrorResponse,
    LinkedinTokenResponse,
    BasicTokenIntrospectionResponse,
    StandardRevocableToken,
    BasicRevocationErrorResponse,
    EndpointSet,
    EndpointNotSet,
    EndpointNotSet,
    EndpointNotSet,
    EndpointSet,
>;
