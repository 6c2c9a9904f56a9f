use lucy_ai::{
    CompletionBackend, Dispatcher, HttpBackend, HttpBackendConfig, Provider, ProviderTable,
};
use lucy_conversation::{
    ConversationController, EntityRegistry, FileStore, InMemoryStore, KeyValueStore,
};
use lucy_server::{
    AppState,
    config::{ServerConfig, StorageBackend},
    error::StartupError,
    router,
};
use lucy_social::{SharePublisher, XApiClient, XApiConfig};
use std::process::ExitCode;
use std::sync::Arc;
use std::time::Duration;
use tower_http::trace::TraceLayer;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

#[tokio::main]
async fn main() -> ExitCode {
    tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "info,tower_http=debug".into()),
        )
        .with(tracing_subscriber::fmt::layer())
        .init();

    match run().await {
        Ok(()) => ExitCode::SUCCESS,
        Err(report) => {
            tracing::error!(error = %report, "server stopped");
            ExitCode::FAILURE
        }
    }
}

async fn run() -> lucy_core::Result<(), StartupError> {
    // Load configuration from environment
    let config = ServerConfig::from_env().map_err(|e| StartupError::Config {
        details: e.to_string(),
    })?;
    tracing::info!("Loaded configuration");

    let http = reqwest::Client::new();
    let backend = |provider: Provider, url: &str, key: &str| -> Arc<dyn CompletionBackend> {
        Arc::new(HttpBackend::with_client(
            HttpBackendConfig::new(provider, url, key),
            http.clone(),
        ))
    };
    let providers = &config.providers;
    let dispatcher = Dispatcher::new(ProviderTable {
        cerebras: backend(
            Provider::Cerebras,
            &providers.cerebras_api_url,
            &providers.cerebras_api_key,
        ),
        deepseek: backend(
            Provider::DeepSeek,
            &providers.deepseek_api_url,
            &providers.deepseek_api_key,
        ),
        fallback: backend(
            Provider::OpenAi,
            &providers.openai_api_url,
            &providers.openai_api_key,
        ),
    });

    let kv: Arc<dyn KeyValueStore> = match config.storage.backend {
        StorageBackend::Memory => {
            tracing::warn!("Using in-memory storage, conversations are lost on restart");
            Arc::new(InMemoryStore::new())
        }
        StorageBackend::File => {
            let store = FileStore::open(config.storage.path.clone())
                .await
                .map_err(|e| StartupError::Storage {
                    details: e.to_string(),
                })?;
            tracing::info!(path = %store.root().display(), "Opened file storage");
            Arc::new(store)
        }
    };

    let registry = EntityRegistry::new(kv, config.conversation.store());
    let mut controller =
        ConversationController::new(registry, dispatcher, config.conversation.controller());

    match &config.social.bearer_token {
        Some(token) => {
            let network = XApiClient::with_client(
                XApiConfig {
                    api_url: config.social.api_url.clone(),
                    max_post_chars: config.social.max_post_chars,
                    ..XApiConfig::new(token.clone())
                },
                http.clone(),
            );
            controller = controller.with_publisher(Arc::new(SharePublisher::new(
                Arc::new(network),
                config.social.account_handle.clone(),
            )));
            tracing::info!(account = %config.social.account_handle, "Sharing claimed conversations");
        }
        None => tracing::info!("No social bearer token, claims are archived without sharing"),
    }
    let controller = Arc::new(controller);

    // Spawn periodic sweep of idle entity cells
    let prune_controller = controller.clone();
    let prune_interval_secs = config.prune_interval_seconds.max(1);
    tokio::spawn(async move {
        let mut interval = tokio::time::interval(Duration::from_secs(prune_interval_secs));
        loop {
            interval.tick().await;
            prune_controller.registry().prune_idle();
        }
    });

    let app = router(AppState::new(controller)).layer(TraceLayer::new_for_http());

    let listener = tokio::net::TcpListener::bind(&config.bind_addr)
        .await
        .map_err(|e| StartupError::Bind {
            addr: config.bind_addr.clone(),
            details: e.to_string(),
        })?;

    tracing::info!("listening on http://{}", config.bind_addr);

    axum::serve(listener, app)
        .with_graceful_shutdown(shutdown_signal())
        .await
        .map_err(|e| StartupError::Serve {
            details: e.to_string(),
        })?;
    Ok(())
}

async fn shutdown_signal() {
    if let Err(e) = tokio::signal::ctrl_c().await {
        tracing::warn!(error = %e, "Failed to listen for shutdown signal");
        std::future::pending::<()>().await;
    }
    tracing::info!("Shutting down");
}
