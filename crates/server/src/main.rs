use std::path::PathBuf;
use std::sync::Arc;

use anyhow::Result;
use clickrush_common::{AppConfig, LoggingConfig};
use clickrush_game::{spawn_maintenance, GameService, MaintenanceSchedule};
use tokio_util::sync::CancellationToken;
use tracing::{error, info};
use tracing_subscriber::{fmt, EnvFilter};

#[tokio::main]
async fn main() -> Result<()> {
    // Optional config path; environment-only configuration otherwise
    let config_path = std::env::args().nth(1).map(PathBuf::from);
    let config = match &config_path {
        Some(path) => AppConfig::load(path)?,
        None => AppConfig::from_env()?,
    };

    init_tracing(&config.logging);

    info!(
        config_path = ?config_path,
        data_dir = %config.storage.data_dir.display(),
        max_connections = config.rate_limit.max_connections,
        max_requests_per_minute = config.rate_limit.max_requests_per_minute,
        "starting clickrush"
    );

    let schedule = MaintenanceSchedule::from_config(&config);
    let admin = config.admin.clone();

    let service = Arc::new(GameService::open(config)?);
    let shutdown = CancellationToken::new();

    let maintenance = spawn_maintenance(Arc::clone(&service), schedule, shutdown.clone());

    let admin_task = if admin.enabled {
        let state = clickrush_admin::new_shared_state(Arc::clone(&service));
        let token = shutdown.clone();
        Some(tokio::spawn(async move {
            if let Err(e) = clickrush_admin::run_admin_server(state, &admin.listen, token).await {
                error!(error = %e, "admin API server error");
            }
        }))
    } else {
        info!("admin API disabled");
        None
    };

    info!("clickrush started successfully");

    tokio::signal::ctrl_c().await?;
    info!("shutdown signal received");
    shutdown.cancel();

    if let Err(e) = maintenance.await {
        error!(error = %e, "maintenance worker ended abnormally");
    }
    if let Some(task) = admin_task {
        if let Err(e) = task.await {
            error!(error = %e, "admin API task ended abnormally");
        }
    }

    info!(count = service.counter().count, "clickrush stopped");
    Ok(())
}

/// `RUST_LOG` wins over the configured level.
fn init_tracing(logging: &LoggingConfig) {
    let filter = EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| EnvFilter::new(logging.level.as_str()));

    if logging.json {
        fmt().with_env_filter(filter).json().init();
    } else {
        fmt().with_env_filter(filter).init();
    }
}
