use identity_linker::config::Config;
use identity_linker::db::UsersStorage;
use identity_linker::oauth::{GithubClient, LinkedinClient, build_http_client};
use identity_linker::router::{LinkerState, linker_router};
use identity_linker::{LinkFlow, session};
use mimalloc::MiMalloc;
use tokio::net::TcpListener;
use tracing::{info, warn};
use tracing_subscriber::{EnvFilter, layer::SubscriberExt, util::SubscriberInitExt};

#[global_allocator]
static GLOBAL: MiMalloc = MiMalloc;

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    dotenvy::dotenv().ok();

    let cfg = Config::load()?;

    let env_filter =
        EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(cfg.basic.loglevel.clone()));
    tracing_subscriber::registry()
        .with(env_filter)
        .with(
            tracing_subscriber::fmt::layer()
                .with_level(true)
                .with_target(false),
        )
        .init();

    info!(
        database_url = %cfg.basic.database_url,
        proxy = %cfg.basic.proxy.as_ref().map(|u| u.as_str()).unwrap_or("<none>"),
        loglevel = %cfg.basic.loglevel,
        github_callback = %cfg.github.callback_url,
        linkedin_callback = %cfg.linkedin.callback_url,
    );
    if cfg.github.client_id.is_empty() || cfg.linkedin.client_id.is_empty() {
        warn!("GitHub or LinkedIn client id is empty; authorization redirects will fail");
    }

    let storage = UsersStorage::connect(&cfg.basic.database_url).await?;
    let http = build_http_client(cfg.basic.proxy.as_ref())?;
    let flow = LinkFlow::new(
        GithubClient::new(&cfg.github, http.clone()),
        LinkedinClient::new(&cfg.linkedin, http),
        storage,
    );

    let key = session::session_key(cfg.basic.session_secret.as_deref())?;
    let state = LinkerState::new(flow, key, cfg.basic.insecure_cookie);
    let app = linker_router(state);

    let listener = TcpListener::bind(&cfg.basic.listen_addr).await?;
    info!("HTTP server listening on {}", cfg.basic.listen_addr);
    axum::serve(listener, app)
        .with_graceful_shutdown(shutdown_signal())
        .await?;
    Ok(())
}

async fn shutdown_signal() {
    if let Err(e) = tokio::signal::ctrl_c().await {
        warn!(error = %e, "failed to listen for shutdown signal");
        std::future::pending::<()>().await;
    }
    info!("Shutdown signal received");
}
