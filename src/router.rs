use crate::handlers::oauth::{github_callback, github_entry, linkedin_callback, linkedin_entry};
use crate::oauth::{GithubClient, LinkedinClient};
use crate::service::link_flow::LinkFlow;
use crate::session::SessionCookies;
use axum::{Router, extract::FromRef, routing::get};
use axum_extra::extract::cookie::Key;
use std::sync::Arc;

pub type ProductionFlow = LinkFlow<GithubClient, LinkedinClient>;

#[derive(Clone)]
pub struct LinkerState {
    pub flow: Arc<ProductionFlow>,
    pub cookies: SessionCookies,
    key: Key,
}

impl LinkerState {
    pub fn new(flow: ProductionFlow, key: Key, insecure_cookie: bool) -> Self {
        Self {
            flow: Arc::new(flow),
            cookies: SessionCookies::new(insecure_cookie),
            key,
        }
    }
}

impl FromRef<LinkerState> for Key {
    fn from_ref(state: &LinkerState) -> Self {
        state.key.clone()
    }
}

pub fn linker_router(state: LinkerState) -> Router {
    Router::new()
        .route("/github", get(github_entry))
        .route("/github/callback", get(github_callback))
        .route("/linkedin", get(linkedin_entry))
        .route("/linkedin/callback", get(linkedin_callback))
        .with_state(state)
}
