mod error;
mod routes;

use std::path::PathBuf;
use std::sync::Arc;
use std::time::Duration;

use axum::{
    Router,
    extract::FromRef,
    routing::{get, patch, post},
};
use tower_http::cors::{Any, CorsLayer};
use tower_http::trace::TraceLayer;

use gitmemo_cache::MemoryCache;
use gitmemo_core::crypto;
use gitmemo_github::GithubClient;
use gitmemo_store::Store;
use gitmemo_sync::{EnvOverrides, Reconciler, resolve_config};

/// Application state shared across all handlers.
#[derive(Clone)]
pub struct AppState {
    pub svc: Arc<Service>,
    pub config: AppConfig,
}

/// The reconciliation engine plus the repository it serves.
pub struct Service {
    pub reconciler: Reconciler<GithubClient>,
    pub store: Arc<Store>,
    pub owner: String,
    pub repo: String,
}

/// Server configuration loaded from environment variables.
#[derive(Clone)]
pub struct AppConfig {
    pub secret_key: String,
    pub admin_password: Option<String>,
}

impl FromRef<AppState> for AppConfig {
    fn from_ref(state: &AppState) -> Self {
        state.config.clone()
    }
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    // Initialize tracing
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "gitmemo_server=info,tower_http=info".into()),
        )
        .init();

    // Data directory
    let data_dir = std::env::var("GITMEMO_DATA_DIR")
        .map(PathBuf::from)
        .unwrap_or_else(|_| PathBuf::from("data"));
    tracing::info!("data directory: {}", data_dir.display());

    let store = Arc::new(Store::open_path(&data_dir.join("gitmemo.db"))?);
    tracing::info!("database initialized");

    let cache = Arc::new(MemoryCache::new());

    let secret_key = match std::env::var("GITMEMO_SECRET_KEY") {
        Ok(s) if !s.is_empty() => s,
        _ => {
            tracing::warn!(
                "GITMEMO_SECRET_KEY not set — sealed credentials will not survive a restart"
            );
            crypto::random_secret()?
        }
    };

    let admin_password = std::env::var("GITMEMO_ADMIN_PASSWORD")
        .ok()
        .filter(|s| !s.is_empty());
    if admin_password.is_none() {
        tracing::warn!("GITMEMO_ADMIN_PASSWORD not set — write endpoints are disabled");
    }

    // Repository configuration: environment wins, then the persisted row.
    let env_overrides = EnvOverrides::from_env();
    let repo_config = resolve_config(&store, &secret_key, &env_overrides)?;
    tracing::info!(
        "serving mirror of {}/{} ({} issues per page)",
        repo_config.owner,
        repo_config.repo,
        repo_config.issues_per_page,
    );
    // Keep the resolved (and freshly sealed) config durable for later boots.
    store.save_config(&repo_config)?;

    let token = repo_config
        .token
        .as_deref()
        .map(|sealed| crypto::unseal(&secret_key, sealed))
        .transpose()?;
    if token.is_none() {
        tracing::warn!("no upstream token configured — running in public read-only mode");
    }

    let mut github = GithubClient::new(token, Duration::from_secs(30))?;
    if let Ok(base) = std::env::var("GITMEMO_API_URL") {
        if !base.is_empty() {
            tracing::info!("using upstream API at {base}");
            github = github.with_base_url(&base);
        }
    }

    let reconciler = Reconciler::new(
        store.clone(),
        cache,
        github,
        repo_config.issues_per_page,
    );

    let state = AppState {
        svc: Arc::new(Service {
            reconciler,
            store,
            owner: repo_config.owner.clone(),
            repo: repo_config.repo.clone(),
        }),
        config: AppConfig {
            secret_key,
            admin_password,
        },
    };

    // Build API routes
    let api = Router::new()
        // Health
        .route("/health", get(routes::health::health))
        // Auth
        .route("/auth/verify", post(routes::auth::verify))
        // Issues
        .route("/issues", get(routes::issues::list_issues))
        .route("/issues", post(routes::issues::create_issue))
        .route("/issues/{number}", get(routes::issues::get_issue))
        .route("/issues/{number}", patch(routes::issues::update_issue))
        // Labels
        .route("/labels", get(routes::labels::list_labels))
        .route("/labels", post(routes::labels::create_label))
        // Config (client view, no token)
        .route("/config", get(routes::config::get_config));

    let app = Router::new()
        .nest("/api", api)
        .layer(TraceLayer::new_for_http())
        .layer(
            CorsLayer::new()
                .allow_origin(Any)
                .allow_methods(Any)
                .allow_headers(Any),
        )
        .with_state(state);

    let port = std::env::var("PORT").unwrap_or_else(|_| "8080".into());
    tracing::info!("starting server on port {port}");

    let listener = tokio::net::TcpListener::bind(format!("0.0.0.0:{port}")).await?;
    axum::serve(listener, app).await?;

    Ok(())
}
