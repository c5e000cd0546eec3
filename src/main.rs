use anyhow::{Context, Result};
use clap::{Parser, Subcommand};
use repoapi::api::{ApiRepositories, Project, Stack, build_router, project_name_key};
use repoapi::config::AppConfig;
use repoapi::migrations::{Migration, SetStackStatus};
use repoapi::storage::{
    InMemoryIndexStore, InMemoryRepository, IndexMapping, IndexRepository, IndexStore,
    RefreshTarget,
};
use serde_json::json;
use std::sync::Arc;
use tracing::{error, info};
use tracing_subscriber::{EnvFilter, layer::SubscriberExt, util::SubscriberInitExt};

#[derive(Parser)]
#[command(name = "repoapi")]
#[command(about = "Resource API and index migrations over a document store")]
struct Cli {
    #[command(subcommand)]
    command: Option<Command>,
}

#[derive(Subcommand)]
enum Command {
    /// Serve the resource API (default).
    Serve {
        /// Index a few legacy stacks before serving.
        #[arg(long)]
        demo: bool,
    },
    /// Run the stack status migration once and exit.
    Migrate {
        /// Index a few legacy stacks first so the run has something to do.
        #[arg(long)]
        demo: bool,
    },
}

#[tokio::main]
async fn main() -> Result<()> {
    init_tracing();

    let cli = Cli::parse();
    let config = AppConfig::from_env().context("failed to load application configuration")?;

    match cli.command.unwrap_or(Command::Serve { demo: false }) {
        Command::Serve { demo } => {
            let store = open_index_store(&config, demo).await?;
            serve(store, config).await
        }
        Command::Migrate { demo } => {
            let store = open_index_store(&config, demo).await?;
            migrate(store, &config).await
        }
    }
}

fn init_tracing() {
    tracing_subscriber::registry()
        .with(
            EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| EnvFilter::new("repoapi=debug,tower_http=info")),
        )
        .with(tracing_subscriber::fmt::layer())
        .init();
}

/// The stack index backs both the stack resource and its migrations.
async fn open_index_store(config: &AppConfig, demo: bool) -> Result<Arc<InMemoryIndexStore>> {
    let store = Arc::new(InMemoryIndexStore::new());
    store
        .create_index(&config.stack_index, IndexMapping::new().keyword("project_id"))
        .await
        .with_context(|| format!("failed to create index {}", config.stack_index))?;
    if demo {
        seed_legacy_stacks(&store, &config.stack_index).await?;
    }
    Ok(store)
}

async fn seed_legacy_stacks(store: &InMemoryIndexStore, index: &str) -> Result<()> {
    let legacy = [
        (
            "s1",
            json!({ "project_id": "demo", "title": "NullReference", "is_regressed": true, "is_hidden": true }),
        ),
        (
            "s2",
            json!({ "project_id": "demo", "title": "Timeout", "disable_notifications": true }),
        ),
        ("s3", json!({ "project_id": "demo", "title": "Disk full", "is_fixed": true })),
        ("s4", json!({ "project_id": "demo", "title": "Unhandled" })),
    ];
    for (id, source) in legacy {
        let source = source.as_object().cloned().unwrap_or_default();
        store
            .index_document(index, id, source)
            .await
            .with_context(|| format!("failed to index stack {id}"))?;
    }
    store
        .refresh(RefreshTarget::Index(index.to_string()))
        .await
        .with_context(|| format!("failed to refresh index {index}"))?;
    info!(index, documents = 4, "seeded legacy stacks");
    Ok(())
}

async fn migrate(store: Arc<InMemoryIndexStore>, config: &AppConfig) -> Result<()> {
    let migration = SetStackStatus::new(store.clone(), config.stack_index.clone());
    let report = migration
        .run()
        .await
        .with_context(|| format!("migration {} failed", migration.name()))?;
    // Make migrated stacks visible to listings before serving.
    store
        .refresh(RefreshTarget::Index(config.stack_index.clone()))
        .await
        .context("failed to refresh the stack index")?;

    info!(
        migration = report.name,
        version = ?report.version,
        updated = report.updated,
        total = report.total,
        errors = report.errors(),
        "migration finished"
    );
    Ok(())
}

async fn serve(store: Arc<InMemoryIndexStore>, config: AppConfig) -> Result<()> {
    if config.run_migrations {
        migrate(store.clone(), &config).await?;
    }

    let repositories = ApiRepositories {
        projects: Arc::new(
            InMemoryRepository::<Project>::with_cache_capacity(config.cache_capacity)
                .with_unique_key(project_name_key()),
        ),
        stacks: Arc::new(IndexRepository::<Stack>::new(store, config.stack_index.clone())),
    };
    let app = build_router(&config.api_prefix, repositories);

    let addr = config.address();
    let listener = tokio::net::TcpListener::bind(&addr)
        .await
        .with_context(|| format!("failed to bind to {addr}"))?;

    info!(address = %addr, prefix = %config.api_prefix, "resource api started");

    axum::serve(listener, app)
        .with_graceful_shutdown(shutdown_signal())
        .await
        .context("server error")?;

    Ok(())
}

async fn shutdown_signal() {
    let ctrl_c = async {
        if let Err(err) = tokio::signal::ctrl_c().await {
            error!(error = %err, "unable to install Ctrl+C signal handler");
        }
    };

    #[cfg(unix)]
    let terminate = async {
        use tokio::signal::unix::{SignalKind, signal};

        match signal(SignalKind::terminate()) {
            Ok(mut signal) => {
                signal.recv().await;
            }
            Err(err) => {
                error!(error = %err, "unable to install SIGTERM handler");
                std::future::pending::<()>().await;
            }
        }
    };

    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    tokio::select! {
        _ = ctrl_c => {},
        _ = terminate => {},
    }
}
