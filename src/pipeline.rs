use crate::calendar::{DayPlan, DaySummary, EmitContext, alert_event, calendar_description, emit};
use crate::config::{AddressConfig, Config};
use crate::differ::diff;
use crate::error::{ConfigError, SlotError, TimestampError};
use crate::ics::CalendarSink;
use crate::merge::merge;
use crate::reconcile::reconcile;
use crate::source::{OutageSource, RawAddressData, parse_local_stamp, parse_override, parse_schedules};
use crate::storage::Storage;
use crate::timeline::{DayBounds, date_of_key, tomorrow_key};
use crate::types::{AddressState, CalendarEvent, ChangeEvent, Observation, Urgency};
use anyhow::Result;
use chrono::{DateTime, Duration, NaiveDate, Utc};
use chrono_tz::Tz;
use std::collections::BTreeMap;
use tracing::{debug, error, info, warn};

/// Parâmetros fixos de uma execução.
#[derive(Debug, Clone)]
pub struct RunContext {
    pub tz: Tz,
    /// "Agora" no fuso de origem.
    pub now: DateTime<Tz>,
    pub reminder_minutes: i64,
    pub alert_duration_minutes: i64,
    pub emit_power: bool,
}

impl RunContext {
    pub fn from_config(config: &Config, now: DateTime<Utc>) -> Result<Self, ConfigError> {
        let tz = config.tz()?;
        Ok(Self {
            tz,
            now: now.with_timezone(&tz),
            reminder_minutes: config.reminder_minutes,
            alert_duration_minutes: config.alert_duration_minutes,
            emit_power: config.emit_power_events,
        })
    }
}

/// Resultado do processamento de um endereço.
#[derive(Debug, Clone)]
pub struct AddressPlan {
    /// Texto de cabeçalho do calendário.
    pub description: String,
    pub events: Vec<CalendarEvent>,
    pub alert: Option<ChangeEvent>,
    pub next_state: AddressState,
    pub rejected_slots: Vec<SlotError>,
    pub override_error: Option<TimestampError>,
}

/// Processa um endereço sem efeitos colaterais.
///
/// `popup` é a classificação do popup do site, compartilhada entre endereços.
pub fn plan_address(
    address: &AddressConfig,
    raw: &RawAddressData,
    popup: Option<Urgency>,
    previous: &AddressState,
    ctx: &RunContext,
) -> AddressPlan {
    let tz = ctx.tz;

    // 1. Grafos e classificação
    let (schedules, rejected_slots) = parse_schedules(&raw.schedules, tz);
    let per_address = raw
        .status_text
        .as_deref()
        .and_then(Urgency::classify)
        .or_else(|| {
            raw.current_outage
                .as_ref()
                .and_then(|o| Urgency::classify(&o.reason))
        });
    let classification = Urgency::resolve(popup, per_address);

    // 2. Janela corrente; carimbo inválido equivale a não ter janela
    let (window, override_error) = match &raw.current_outage {
        None => (None, None),
        Some(outage) => match parse_override(outage, tz, classification) {
            Ok(window) => (Some(window), None),
            Err(e) => (None, Some(e)),
        },
    };

    // 3. Intervalos por dia, reconciliados com a janela
    let mut days: BTreeMap<NaiveDate, DayPlan> = BTreeMap::new();
    let mut summaries = Vec::with_capacity(schedules.len());
    for schedule in &schedules {
        let Some(date) = date_of_key(tz, schedule.day_epoch_seconds) else {
            continue;
        };
        let merged = merge(schedule);
        summaries.push(DaySummary {
            date,
            outage_minutes: merged
                .iter()
                .filter(|i| i.is_outage())
                .map(|i| i.end - i.start)
                .sum(),
        });
        let bounds = DayBounds::new(tz, date);
        let intervals = reconcile(&merged, window.as_ref(), &bounds);
        days.insert(date, DayPlan { bounds, intervals });
    }
    let scheduled_day_keys = days.values().map(|d| d.bounds.key()).collect();

    // Dias tocados pela janela mas ainda sem grafo publicado: só a falta
    if let Some(w) = &window {
        let mut date = w.start.with_timezone(&tz).date_naive();
        let last = (w.end - Duration::seconds(1)).with_timezone(&tz).date_naive();
        while date <= last {
            days.entry(date).or_insert_with(|| {
                let bounds = DayBounds::new(tz, date);
                let intervals = reconcile(&[], Some(w), &bounds)
                    .into_iter()
                    .filter(|i| i.is_outage())
                    .collect();
                DayPlan { bounds, intervals }
            });
            match date.succ_opt() {
                Some(next) => date = next,
                None => break,
            }
        }
    }

    // 4. Eventos
    let plans: Vec<DayPlan> = days.into_values().collect();
    let emit_ctx = EmitContext {
        address,
        classification,
        updated_at: raw
            .update_time
            .as_deref()
            .and_then(|t| parse_local_stamp(t).ok()),
        override_window: window.as_ref(),
        schedule_days: &summaries,
        now: ctx.now,
        reminder_minutes: ctx.reminder_minutes,
        emit_power: ctx.emit_power,
    };
    let mut events = emit(&plans, &emit_ctx);
    let description = calendar_description(&emit_ctx);

    // 5. Detecção de mudança
    let observation = Observation {
        classification,
        scheduled_day_keys,
        override_fingerprint: window.as_ref().map(|w| w.fingerprint()),
    };
    let alert = diff(
        previous,
        &observation,
        tomorrow_key(tz, ctx.now.date_naive()),
    );
    if let Some(change) = &alert {
        events.push(alert_event(
            change,
            address,
            ctx.now,
            ctx.alert_duration_minutes,
        ));
        events.sort_by_key(|e| (e.start, e.end));
    }

    AddressPlan {
        description,
        events,
        alert,
        next_state: AddressState::from_observation(&observation, ctx.now.with_timezone(&Utc)),
        rejected_slots,
        override_error,
    }
}

/// Resumo de um ciclo.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct CycleReport {
    pub processed: usize,
    pub alerts: usize,
    pub published: usize,
    pub failed: Vec<String>,
}

/// Executa um ciclo completo: lê estado e snapshot, processa cada endereço,
/// publica os calendários e grava o novo estado.
///
/// A falha de um endereço não interrompe os demais; o estado desse endereço
/// fica como estava para que o alerta não se perca.
pub fn run_cycle(
    config: &Config,
    source: &dyn OutageSource,
    storage: &Storage,
    sink: &dyn CalendarSink,
    now: DateTime<Utc>,
) -> Result<CycleReport> {
    let ctx = RunContext::from_config(config, now)?;
    let mut states = storage.load();
    let snapshot = source.fetch()?;
    let popup = snapshot.popup_text.as_deref().and_then(Urgency::classify);
    if let Some(urgency) = popup {
        info!("[CICLO] Popup do site indica: {}", urgency.title());
    }

    let mut report = CycleReport::default();
    for address in &config.addresses {
        let Some(raw) = snapshot.addresses.get(&address.id) else {
            error!(
                "[ENDEREÇO {}] Ausente no snapshot do coletor; estado mantido.",
                address.id
            );
            report.failed.push(address.id.clone());
            continue;
        };

        let previous = states.get(&address.id).cloned().unwrap_or_default();
        let plan = plan_address(address, raw, popup, &previous, &ctx);

        for rejected in &plan.rejected_slots {
            warn!("[ENDEREÇO {}] Grafo: dado descartado: {}", address.id, rejected);
        }
        if let Some(e) = &plan.override_error {
            warn!(
                "[ENDEREÇO {}] Aviso de desligamento ignorado: {}",
                address.id, e
            );
        }
        debug!(
            "[ENDEREÇO {}] {} eventos gerados.",
            address.id,
            plan.events.len()
        );

        match sink.publish(address, &plan.description, &plan.events) {
            Ok(true) => {
                info!("[ENDEREÇO {}] Calendário atualizado.", address.id);
                report.published += 1;
            }
            Ok(false) => debug!("[ENDEREÇO {}] Calendário sem mudanças.", address.id),
            Err(e) => {
                error!(
                    "[ENDEREÇO {}] Erro ao publicar calendário: {:?}",
                    address.id, e
                );
                report.failed.push(address.id.clone());
                continue;
            }
        }

        if let Some(alert) = &plan.alert {
            info!("[ENDEREÇO {}] ALERTA: {}", address.id, alert.message);
            report.alerts += 1;
        }
        states.insert(address.id.clone(), plan.next_state);
        report.processed += 1;
    }

    storage.save(&states)?;
    Ok(report)
}
