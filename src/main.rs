mod calendar;
mod config;
mod differ;
mod error;
mod ics;
mod merge;
mod pipeline;
mod reconcile;
mod scheduler;
mod source;
mod storage;
mod timeline;
mod types;

use anyhow::Result;
use chrono::Utc;
use std::sync::Arc;
use tracing::info;
use tracing_subscriber::EnvFilter;

#[tokio::main]
async fn main() -> Result<()> {
    // Inicializa o sistema de logging (tracing); RUST_LOG sobrescreve o nível
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")),
        )
        .init();

    // Carrega e valida a configuração (Arc para compartilhar com o agendador)
    let config: Arc<config::Config> = Arc::new(config::Config::load()?);
    info!(
        "Configuração carregada: {} endereço(s), fuso {}",
        config.addresses.len(),
        config.timezone
    );
    for address in &config.addresses {
        info!("  [{}] {}", address.id, address.display());
    }

    let source = source::JsonSnapshotSource::new(&config.snapshot_path);
    let storage = storage::Storage::open(&config.state_path);
    let sink = ics::IcsDirectorySink::new(&config.output_dir, config.tz()?);

    if config.run_once {
        let report = pipeline::run_cycle(&config, &source, &storage, &sink, Utc::now())?;
        info!(
            "Execução única concluída: {} endereço(s), {} alerta(s), falhas: {:?}",
            report.processed, report.alerts, report.failed
        );
        return Ok(());
    }

    scheduler::run_scheduler(config, source, storage, sink).await;
    Ok(())
}
