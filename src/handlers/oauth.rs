use crate::handlers::redirect::{
    GITHUB_AUTH_FAILED, LINKEDIN_AUTH_FAILED, TOKEN_VERIFICATION_FAILED, register_url,
    session_error_url,
};
use crate::service::link_flow::{FlowError, GithubOutcome, LinkedinOutcome};
use crate::session::{
    GITHUB_STATE_COOKIE, LINKEDIN_STATE_COOKIE, SessionCookies, SessionState, state_matches,
};
use crate::{LinkerError, router::LinkerState};
use axum::{
    extract::{Query, State},
    response::{IntoResponse, Redirect, Response},
};
use axum_extra::extract::cookie::PrivateCookieJar;
use serde::Deserialize;
use tracing::{error, info, warn};

#[derive(Debug, Deserialize)]
pub struct AuthCallbackQuery {
    pub code: Option<String>,
    pub state: Option<String>,
}

/// GET /github -> redirects to GitHub's authorization page.
pub async fn github_entry(State(state): State<LinkerState>, jar: PrivateCookieJar) -> Response {
    match state.flow.github_authorize_url() {
        Ok((auth_url, csrf_token)) => {
            let jar = state
                .cookies
                .store_oauth_state(jar, GITHUB_STATE_COOKIE, &csrf_token);
            info!("Dispatching GitHub OAuth redirect");
            (jar, Redirect::temporary(auth_url.as_str())).into_response()
        }
        Err(e) => {
            error!(error = %e, "Error building GitHub authorization URL");
            (
                jar,
                Redirect::to(&register_url(&[("error", Some(GITHUB_AUTH_FAILED))])),
            )
                .into_response()
        }
    }
}

/// GET /github/callback -> exchanges the code and either signs the user in or
/// parks the GitHub identity in the session until LinkedIn completes.
pub async fn github_callback(
    State(state): State<LinkerState>,
    Query(query): Query<AuthCallbackQuery>,
    jar: PrivateCookieJar,
) -> Response {
    let failure = || Redirect::to(&register_url(&[("error", Some(GITHUB_AUTH_FAILED))]));

    let (expected_state, jar) = state.cookies.take_oauth_state(jar, GITHUB_STATE_COOKIE);
    let code = match checked_code(&query, expected_state.as_deref()) {
        Ok(code) => code,
        Err(e) => {
            warn!(error = %e, "Rejected GitHub callback");
            return (jar, failure()).into_response();
        }
    };

    let mut session = state.cookies.load(&jar);
    match state.flow.complete_github(code, &mut session).await {
        Ok(GithubOutcome::SignedIn(_)) => persist_then_redirect(state.cookies, jar, &session, "/"),
        Ok(GithubOutcome::PendingLink { github_username }) => persist_then_redirect(
            state.cookies,
            jar,
            &session,
            &register_url(&[("githubUsername", Some(&github_username))]),
        ),
        Err(FlowError::Store(e)) => {
            error!(error = %e, "Database error during GitHub authentication");
            (jar, e.into_response()).into_response()
        }
        Err(e) => {
            error!(error = %e, "Error during GitHub authentication");
            (jar, failure()).into_response()
        }
    }
}

/// GET /linkedin -> redirects to LinkedIn's authorization page.
pub async fn linkedin_entry(State(state): State<LinkerState>, jar: PrivateCookieJar) -> Response {
    match state.flow.linkedin_authorize_url() {
        Ok((auth_url, csrf_token)) => {
            let jar = state
                .cookies
                .store_oauth_state(jar, LINKEDIN_STATE_COOKIE, &csrf_token);
            info!("Dispatching LinkedIn OAuth redirect");
            (jar, Redirect::temporary(auth_url.as_str())).into_response()
        }
        Err(e) => {
            error!(error = %e, "Error during LinkedIn authorization");
            let pending = state.cookies.load(&jar).github_username;
            let target = register_url(&[
                ("githubUsername", pending.as_deref()),
                ("error", Some(LINKEDIN_AUTH_FAILED)),
            ]);
            (jar, Redirect::to(&target)).into_response()
        }
    }
}

/// GET /linkedin/callback -> exchanges the code, verifies the OpenID token and
/// reconciles the LinkedIn identity with the store.
pub async fn linkedin_callback(
    State(state): State<LinkerState>,
    Query(query): Query<AuthCallbackQuery>,
    jar: PrivateCookieJar,
) -> Response {
    let (expected_state, jar) = state.cookies.take_oauth_state(jar, LINKEDIN_STATE_COOKIE);
    let mut session = state.cookies.load(&jar);
    let pending = session.github_username.clone();
    let failure = |tag: &str| {
        Redirect::to(&register_url(&[
            ("githubUsername", pending.as_deref()),
            ("error", Some(tag)),
        ]))
    };

    let code = match checked_code(&query, expected_state.as_deref()) {
        Ok(code) => code,
        Err(e) => {
            warn!(error = %e, "Rejected LinkedIn callback");
            return (jar, failure(LINKEDIN_AUTH_FAILED)).into_response();
        }
    };

    match state.flow.complete_linkedin(code, &mut session).await {
        Ok(LinkedinOutcome::SignedIn(_)) => {
            persist_then_redirect(state.cookies, jar, &session, "/")
        }
        Ok(LinkedinOutcome::Registered {
            user,
            github_username,
            linkedin_id,
        }) => {
            let jar = state.cookies.destroy(jar);
            info!(user_id = user.id, "Session data destroyed after registration");
            let target = register_url(&[
                ("githubUsername", github_username.as_deref()),
                ("linkedinId", Some(linkedin_id.as_str())),
            ]);
            (jar, Redirect::to(&target)).into_response()
        }
        Err(FlowError::Verification(e)) => {
            error!(error = %e, "Error verifying openid token");
            (jar, failure(TOKEN_VERIFICATION_FAILED)).into_response()
        }
        Err(FlowError::Exchange(e)) => {
            error!(error = %e, "Error during LinkedIn access token exchange");
            (jar, failure(LINKEDIN_AUTH_FAILED)).into_response()
        }
        Err(FlowError::Store(e)) => {
            error!(error = %e, "Database error during LinkedIn authentication");
            (jar, e.into_response()).into_response()
        }
    }
}

/// Validate the callback's `state` against the cookie and return the code.
fn checked_code<'q>(
    query: &'q AuthCallbackQuery,
    expected_state: Option<&str>,
) -> Result<&'q str, LinkerError> {
    let expected = expected_state
        .ok_or_else(|| LinkerError::OauthFlow("missing OAuth state cookie".to_string()))?;
    let received = query
        .state
        .as_deref()
        .ok_or_else(|| LinkerError::OauthFlow("missing `state` in callback".to_string()))?;
    if !state_matches(expected, received) {
        return Err(LinkerError::OauthFlow("CSRF token mismatch".to_string()));
    }
    query
        .code
        .as_deref()
        .ok_or_else(|| LinkerError::OauthFlow("missing `code` in callback".to_string()))
}

fn persist_then_redirect(
    cookies: SessionCookies,
    jar: PrivateCookieJar,
    session: &SessionState,
    target: &str,
) -> Response {
    match cookies.persist(jar, session) {
        Ok(jar) => {
            info!("Session saved successfully");
            (jar, Redirect::to(target)).into_response()
        }
        Err((jar, e)) => {
            error!(error = %e, "Session save error");
            (jar, Redirect::to(&session_error_url())).into_response()
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn query(code: Option<&str>, state: Option<&str>) -> AuthCallbackQuery {
        AuthCallbackQuery {
            code: code.map(String::from),
            state: state.map(String::from),
        }
    }

    #[test]
    fn matching_state_yields_the_code() {
        let q = query(Some("the-code"), Some("s1"));
        assert_eq!(checked_code(&q, Some("s1")).unwrap(), "the-code");
    }

    #[test]
    fn missing_cookie_or_param_is_rejected() {
        assert!(checked_code(&query(Some("c"), Some("s1")), None).is_err());
        assert!(checked_code(&query(Some("c"), None), Some("s1")).is_err());
    }

    #[test]
    fn mismatched_state_is_rejected() {
        assert!(checked_code(&query(Some("c"), Some("s2")), Some("s1")).is_err());
    }

    #[test]
    fn missing_code_is_rejected() {
        assert!(checked_code(&query(None, Some("s1")), Some("s1")).is_err());
    }
}
