// src/scheduler.rs

use crate::ics::CalendarSink;
use crate::source::OutageSource;
use crate::{config::Config, pipeline, storage::Storage};
use chrono::Utc;
use std::{sync::Arc, time::Duration, time::Instant};
use tokio::time::{MissedTickBehavior, interval};
use tracing::{error, info, warn};

/// Estados do agendador: aguardando o primeiro snapshot do coletor ou publicando.
enum SchedulerState {
    WaitingForSnapshot,
    Publishing,
}

/// Agendador principal: espera o coletor uma vez, depois executa ciclos
/// periódicos até receber Ctrl+C / SIGTERM.
pub async fn run_scheduler<S, K>(config: Arc<Config>, source: S, storage: Storage, sink: K)
where
    S: OutageSource,
    K: CalendarSink,
{
    let mut state = SchedulerState::WaitingForSnapshot;

    loop {
        match state {
            SchedulerState::WaitingForSnapshot => {
                if source.is_ready() {
                    info!("[AGENDADOR] Snapshot do coletor disponível, iniciando ciclos.");
                    state = SchedulerState::Publishing;
                } else {
                    warn!(
                        "[AGENDADOR] Snapshot {} ainda não existe. Nova tentativa em 10 segundos...",
                        config.snapshot_path
                    );
                    tokio::select! {
                        _ = tokio::time::sleep(Duration::from_secs(10)) => {}
                        _ = shutdown_signal() => {
                            info!("[AGENDADOR] Encerrando a pedido do sistema.");
                            return;
                        }
                    }
                }
            }
            SchedulerState::Publishing => {
                let mut ticker = interval(Duration::from_secs(config.cycle_interval_secs));
                ticker.set_missed_tick_behavior(MissedTickBehavior::Skip);
                let mut cycle_number: u64 = 0;

                info!(
                    "[AGENDADOR] Intervalo entre ciclos: {} minutos.",
                    config.cycle_interval_secs / 60
                );

                loop {
                    tokio::select! {
                        _ = ticker.tick() => {}
                        _ = shutdown_signal() => {
                            info!("[AGENDADOR] Encerrando a pedido do sistema.");
                            return;
                        }
                    }
                    cycle_number += 1;
                    let cycle_start = Instant::now();
                    info!(
                        "[CICLO {}] Iniciando verificação em {}.",
                        cycle_number,
                        Utc::now()
                    );

                    match pipeline::run_cycle(&config, &source, &storage, &sink, Utc::now()) {
                        Ok(report) => info!(
                            "[CICLO {}] Fim do ciclo. Endereços: {}, alertas: {}, calendários atualizados: {}, falhas: {:?}. Duração: {:?}",
                            cycle_number,
                            report.processed,
                            report.alerts,
                            report.published,
                            report.failed,
                            cycle_start.elapsed()
                        ),
                        Err(e) => error!(
                            "[CICLO {}] Ciclo abortado: {:?}. Duração: {:?}",
                            cycle_number,
                            e,
                            cycle_start.elapsed()
                        ),
                    }
                }
            }
        }
    }
}

async fn shutdown_signal() {
    #[cfg(unix)]
    {
        use tokio::signal::unix::{SignalKind, signal};
        match signal(SignalKind::terminate()) {
            Ok(mut term) => {
                tokio::select! {
                    _ = tokio::signal::ctrl_c() => {}
                    _ = term.recv() => {}
                }
            }
            Err(_) => {
                let _ = tokio::signal::ctrl_c().await;
            }
        }
    }
    #[cfg(not(unix))]
    {
        let _ = tokio::signal::ctrl_c().await;
    }
}
