use std::sync::Arc;

use chatclass::api::{AppState, app_routes};
use chatclass::assistant::{AgentProvider, AssistantGateway, OpenAiAssistants};
use chatclass::chat::{ChatOrchestrator, UploadStore};
use chatclass::config::AppConfig;
use chatclass::provision::Importer;
use chatclass::store::{Database, LibSqlBackend};

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    // Install rustls crypto provider before any TLS usage
    rustls::crypto::ring::default_provider()
        .install_default()
        .expect("Failed to install rustls crypto provider");

    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new("info")),
        )
        .with_target(false)
        .init();

    let config = AppConfig::from_env();

    eprintln!("ChatClass v{}", env!("CARGO_PKG_VERSION"));
    eprintln!("   API: http://0.0.0.0:{}/api", config.port);
    eprintln!("   Database: {}", config.db_path);

    let db_path = std::path::Path::new(&config.db_path);
    let store: Arc<dyn Database> = Arc::new(
        LibSqlBackend::new_local(db_path).await.unwrap_or_else(|e| {
            eprintln!("Error: Failed to open database at {}: {}", config.db_path, e);
            std::process::exit(1);
        }),
    );

    // A missing credential degrades gracefully: every reply becomes the
    // configuration diagnostic instead of the service refusing to start.
    let provider: Option<Arc<dyn AgentProvider>> = match OpenAiAssistants::from_config(&config.provider) {
        Ok(client) => Some(Arc::new(client)),
        Err(e) => {
            tracing::warn!(error = %e, "Agent provider unconfigured; replies will fail soft");
            None
        }
    };

    let gateway = AssistantGateway::new(provider, config.provider.clone());

    let uploads = UploadStore::new(config.upload_root.clone());
    if let Err(e) = tokio::fs::create_dir_all(&config.upload_root).await {
        eprintln!(
            "   Warning: Could not create upload dir {}: {}",
            config.upload_root.display(),
            e
        );
    }

    let orchestrator = Arc::new(ChatOrchestrator::new(store.clone(), gateway, uploads));
    let importer = Arc::new(Importer::new(store.clone(), &config.default_password));

    let state = AppState {
        store,
        orchestrator,
        importer,
    };

    let app = app_routes(state);
    let listener = tokio::net::TcpListener::bind(format!("0.0.0.0:{}", config.port)).await?;
    tracing::info!(port = config.port, "ChatClass server started");
    axum::serve(listener, app).await?;

    Ok(())
}
