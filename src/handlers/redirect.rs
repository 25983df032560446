use crate::config::{LOGIN_PATH, REGISTER_PATH};
use url::form_urlencoded;

pub const GITHUB_AUTH_FAILED: &str = "githubAuthFailed";
pub const LINKEDIN_AUTH_FAILED: &str = "linkedinAuthFailed";
pub const TOKEN_VERIFICATION_FAILED: &str = "openidTokenVerificationFailed";
pub const SESSION_ERROR: &str = "sessionError";

/// `/users/register` with the given query parameters; `None` values are skipped.
pub fn register_url(params: &[(&str, Option<&str>)]) -> String {
    with_query(REGISTER_PATH, params)
}

pub fn session_error_url() -> String {
    with_query(LOGIN_PATH, &[("error", Some(SESSION_ERROR))])
}

fn with_query(path: &str, params: &[(&str, Option<&str>)]) -> String {
    let mut serializer = form_urlencoded::Serializer::new(String::new());
    for (key, value) in params {
        if let Some(value) = value {
            serializer.append_pair(key, value);
        }
    }
    let query = serializer.finish();
    if query.is_empty() {
        path.to_string()
    } else {
        format!("{path}?{query}")
    }
}
