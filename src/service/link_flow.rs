//! Two-hop identity reconciliation: GitHub first, LinkedIn second.
//!
//! Each step takes the caller's [`SessionState`] by mutable reference and only
//! touches it once the step has succeeded, so a failed step leaves the session
//! exactly as it was. Persisting the session is the caller's job.

use crate::db::{LinkedUser, UserRecord, UsersStorage};
use crate::error::LinkerError;
use crate::oauth::{GithubIdentity, LinkedinIdentity};
use crate::session::{PendingGithub, SessionState};
use oauth2::CsrfToken;
use thiserror::Error as ThisError;
use tracing::{debug, info};
use url::Url;

/// Failure of a flow step, tagged with the stage that failed.
#[derive(Debug, ThisError)]
pub enum FlowError {
    /// Code exchange or profile fetch against the provider.
    #[error("provider exchange failed: {0}")]
    Exchange(LinkerError),

    /// Identity token signature or claims rejected.
    #[error("identity token verification failed: {0}")]
    Verification(LinkerError),

    #[error("credential store failure: {0}")]
    Store(LinkerError),
}

#[derive(Debug, Clone, PartialEq)]
pub enum GithubOutcome {
    /// A row already carried this GitHub username; it was refreshed and the
    /// session now holds its post-update image.
    SignedIn(UserRecord),
    /// No row yet; the GitHub identity now waits in the session.
    PendingLink { github_username: String },
}

#[derive(Debug, Clone, PartialEq)]
pub enum LinkedinOutcome {
    /// A row already carried this LinkedIn subject; it was refreshed and the
    /// session now holds its post-update image.
    SignedIn(UserRecord),
    /// A new linked row was written and the session was emptied.
    ///
    /// `github_username` and `linkedin_id` are the identities this request
    /// proved, which can differ from the row's when a concurrent completion
    /// claimed the row first.
    Registered {
        user: UserRecord,
        github_username: Option<String>,
        linkedin_id: String,
    },
}

pub struct LinkFlow<G, L> {
    github: G,
    linkedin: L,
    storage: UsersStorage,
}

impl<G, L> LinkFlow<G, L>
where
    G: GithubIdentity,
    L: LinkedinIdentity,
{
    pub fn new(github: G, linkedin: L, storage: UsersStorage) -> Self {
        Self {
            github,
            linkedin,
            storage,
        }
    }

    pub fn github_authorize_url(&self) -> Result<(Url, CsrfToken), LinkerError> {
        self.github.authorize_url()
    }

    pub fn linkedin_authorize_url(&self) -> Result<(Url, CsrfToken), LinkerError> {
        self.linkedin.authorize_url()
    }

    /// First hop: resolve the GitHub identity behind `code`.
    pub async fn complete_github(
        &self,
        code: &str,
        session: &mut SessionState,
    ) -> Result<GithubOutcome, FlowError> {
        let access_token = self
            .github
            .exchange_code(code)
            .await
            .map_err(FlowError::Exchange)?;
        let profile = self
            .github
            .fetch_profile(&access_token)
            .await
            .map_err(FlowError::Exchange)?;

        let existing = self
            .storage
            .find_by_github_username(&profile.login)
            .await
            .map_err(FlowError::Store)?;

        if existing.is_some() {
            let user = self
                .storage
                .refresh_github_credentials(&profile.login, &access_token, &profile.avatar_url)
                .await
                .map_err(FlowError::Store)?;
            info!(
                user_id = user.id,
                github_username = %profile.login,
                "Existing user refreshed github_token"
            );
            session.user = Some(user.clone());
            return Ok(GithubOutcome::SignedIn(user));
        }

        info!(
            github_username = %profile.login,
            "No linked account yet; holding GitHub identity in session"
        );
        session.set_pending_github(PendingGithub {
            username: profile.login.clone(),
            access_token,
            profile_url: profile.avatar_url,
        });
        Ok(GithubOutcome::PendingLink {
            github_username: profile.login,
        })
    }

    /// Second hop: resolve the LinkedIn identity behind `code` and reconcile
    /// it with the store and the pending GitHub identity.
    ///
    /// Verification failure returns before any claim is used.
    pub async fn complete_linkedin(
        &self,
        code: &str,
        session: &mut SessionState,
    ) -> Result<LinkedinOutcome, FlowError> {
        let tokens = self
            .linkedin
            .exchange_code(code)
            .await
            .map_err(FlowError::Exchange)?;
        let claims = self
            .linkedin
            .verify_id_token(&tokens.id_token)
            .await
            .map_err(FlowError::Verification)?;
        debug!(
            linkedin_id = %claims.sub,
            name = ?claims.name,
            email = ?claims.email,
            picture = ?claims.picture,
            "Decoded LinkedIn identity"
        );

        let existing = self
            .storage
            .find_by_linkedin_id(&claims.sub)
            .await
            .map_err(FlowError::Store)?;

        if existing.is_some() {
            let user = self
                .storage
                .refresh_linkedin_token(&claims.sub, &tokens.access_token)
                .await
                .map_err(FlowError::Store)?;
            info!(
                user_id = user.id,
                linkedin_id = %claims.sub,
                "Existing user refreshed linkedin_token"
            );
            session.user = Some(user.clone());
            return Ok(LinkedinOutcome::SignedIn(user));
        }

        let pending = session.pending_github();
        let github_username = pending.as_ref().map(|p| p.username.clone());
        let user = self
            .storage
            .upsert_linked(LinkedUser {
                github_username: github_username.clone(),
                github_token: pending.as_ref().map(|p| p.access_token.clone()),
                github_profileurl: pending.map(|p| p.profile_url),
                linkedin_id: claims.sub.clone(),
                linkedin_token: tokens.access_token,
            })
            .await
            .map_err(FlowError::Store)?;
        info!(
            user_id = user.id,
            github_username = ?user.github_username,
            linkedin_id = %claims.sub,
            "Linked account stored"
        );

        *session = SessionState::default();
        Ok(LinkedinOutcome::Registered {
            user,
            github_username,
            linkedin_id: claims.sub,
        })
    }
}
