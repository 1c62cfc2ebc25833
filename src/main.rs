use std::sync::Arc;

use profile_onboarding::catalog::QuestionCatalog;
use profile_onboarding::config::OnboardingConfig;
use profile_onboarding::onboarding::{OnboardingRouteState, SessionOrchestrator, onboarding_routes};
use profile_onboarding::remote::{HttpProfileApi, ProfileApi};
use profile_onboarding::store::{self, Database, LibSqlBackend, ProgressStore};
use tower_http::cors::CorsLayer;

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    // Initialize tracing
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new("info")),
        )
        .with_target(false)
        .init();

    let config = OnboardingConfig::from_env().unwrap_or_else(|e| {
        eprintln!("Error: {e}");
        eprintln!("  export ONBOARDING_API_TOKEN=...");
        std::process::exit(1);
    });

    eprintln!("📝 Profile Onboarding v{}", env!("CARGO_PKG_VERSION"));
    eprintln!("   Profile API: {}", config.api_url);
    eprintln!("   User: {}", config.user_id);

    // ── Database ─────────────────────────────────────────────────────────
    let db: Arc<dyn Database> = Arc::new(
        LibSqlBackend::new_local(&config.db_path)
            .await
            .unwrap_or_else(|e| {
                eprintln!(
                    "Error: Failed to open database at {}: {}",
                    config.db_path.display(),
                    e
                );
                std::process::exit(1);
            }),
    );
    eprintln!("   Database: {}", config.db_path.display());

    // ── Profile service + progress store ────────────────────────────────
    let api: Arc<dyn ProfileApi> =
        Arc::new(HttpProfileApi::new(&config.api_url, config.request_timeout)?);
    let catalog = Arc::new(QuestionCatalog::reference());
    let progress = Arc::new(ProgressStore::new(
        Arc::clone(&db),
        api,
        catalog,
        config.save_timeout,
    ));

    let ctx = config.session_context();
    let _flusher = store::spawn_outbox_flusher(
        Arc::clone(&progress),
        ctx.clone(),
        config.retry_interval,
    );

    let orchestrator = Arc::new(SessionOrchestrator::new(
        ctx,
        progress,
        config.session.clone(),
    ));

    // ── Presenter ───────────────────────────────────────────────────────
    match config.http_port {
        Some(port) => {
            orchestrator.start().await?;
            let app = onboarding_routes(OnboardingRouteState {
                orchestrator: Arc::clone(&orchestrator),
            })
            .layer(CorsLayer::permissive());

            let listener = tokio::net::TcpListener::bind(format!("0.0.0.0:{port}")).await?;
            eprintln!("   REST: http://0.0.0.0:{port}/api/onboarding/status");
            eprintln!("   Events WS: ws://0.0.0.0:{port}/ws\n");
            tracing::info!(port, "Onboarding server started");
            axum::serve(listener, app).await?;
        }
        None => {
            eprintln!();
            profile_onboarding::cli::run(orchestrator).await?;
        }
    }

    Ok(())
}
