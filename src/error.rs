use axum::{Json, http::StatusCode, response::IntoResponse};
use oauth2::basic::BasicErrorResponseType;
use oauth2::reqwest::Error as ReqwestClientError;
use oauth2::{HttpClientError, RequestTokenError, StandardErrorResponse};
use serde::Serialize;
use sqlx::Error as SqlxError;
use thiserror::Error as ThisError;

#[derive(Debug, ThisError)]
pub enum LinkerError {
    #[error("URL parse error: {0}")]
    UrlParse(#[from] url::ParseError),

    #[error("HTTP request error: {0}")]
    Reqwest(#[from] reqwest::Error),

    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),

    #[error("Configuration error: {0}")]
    Config(#[from] Box<figment::Error>),

    #[error("OAuth2 token request error: {0}")]
    Oauth2Token(String),

    #[error("OAuth2 server error: {error}")]
    Oauth2Server { error: String },

    #[error("OAuth flow error: {0}")]
    OauthFlow(String),

    #[error("token response is missing `id_token`")]
    MissingIdToken,

    #[error("JWT error: {0}")]
    Jwt(#[from] jsonwebtoken::errors::Error),

    #[error("no signing key found for kid `{kid}`")]
    KeyNotFound { kid: String },

    #[error("Database error: {0}")]
    Database(#[from] SqlxError),

    #[error("Session error: {0}")]
    Session(String),
}

impl From<figment::Error> for LinkerError {
    fn from(e: figment::Error) -> Self {
        LinkerError::Config(Box::new(e))
    }
}

impl
    From<
        RequestTokenError<
            HttpClientError<ReqwestClientError>,
            StandardErrorResponse<BasicErrorResponseType>,
        >,
    > for LinkerError
{
    fn from(
        e: RequestTokenError<
            HttpClientError<ReqwestClientError>,
            StandardErrorResponse<BasicErrorResponseType>,
        >,
    ) -> Self {
        match e {
            RequestTokenError::ServerResponse(err) => LinkerError::Oauth2Server {
                error: err.error().to_string(),
            },
            RequestTokenError::Request(req_e) => {
                LinkerError::Oauth2Token(format!("request failed: {}", req_e))
            }
            RequestTokenError::Parse(parse_err, _body) => LinkerError::Json(parse_err.into_inner()),
            RequestTokenError::Other(s) => LinkerError::Oauth2Token(s),
        }
    }
}

impl IntoResponse for LinkerError {
    fn into_response(self) -> axum::response::Response {
        let (status, error_body) = match self {
            LinkerError::Database(_) | LinkerError::Config(_) | LinkerError::Session(_) => {
                let status = StatusCode::INTERNAL_SERVER_ERROR;
                let body = ApiErrorBody {
                    code: "INTERNAL_ERROR".to_string(),
                    message: "An internal server error occurred.".to_string(),
                };
                (status, body)
            }
            LinkerError::Json(_)
            | LinkerError::Oauth2Token(_)
            | LinkerError::Oauth2Server { .. }
            | LinkerError::OauthFlow(_)
            | LinkerError::MissingIdToken
            | LinkerError::Jwt(_)
            | LinkerError::KeyNotFound { .. } => {
                let status = StatusCode::UNAUTHORIZED;
                let body = ApiErrorBody {
                    code: "UNAUTHORIZED".to_string(),
                    message: "Authentication error.".to_string(),
                };
                (status, body)
            }
            LinkerError::Reqwest(_) | LinkerError::UrlParse(_) => {
                let status = StatusCode::BAD_GATEWAY;
                let body = ApiErrorBody {
                    code: "BAD_GATEWAY".to_string(),
                    message: "Upstream service is unavailable.".to_string(),
                };
                (status, body)
            }
        };
        (status, Json(ApiErrorResponse { error: error_body })).into_response()
    }
}

/// Standardized API error response body
#[derive(Serialize)]
pub struct ApiErrorBody {
    pub code: String,
    pub message: String,
}

#[derive(Serialize)]
pub struct ApiErrorResponse {
    pub error: ApiErrorBody,
}
