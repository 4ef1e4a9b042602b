use crate::config::AddressConfig;
use crate::timeline::DayBounds;
use crate::types::{
    CalendarEvent, ChangeEvent, EventKind, Interval, IntervalKind, OverrideWindow, Urgency,
};
use chrono::{DateTime, Duration, NaiveDate, NaiveDateTime};
use chrono_tz::Tz;

const SCHEDULED_LABEL: &str = "📊 Планове відключення";
const POWER_LABEL: &str = "⚡ Є струм";
const LIVE_MARKER: &str = "(зараз)";

/// Intervalos finais de um dia, já reconciliados.
#[derive(Debug, Clone)]
pub struct DayPlan {
    pub bounds: DayBounds,
    pub intervals: Vec<Interval>,
}

/// Dia publicado no grafo, com o total de minutos sem luz.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct DaySummary {
    pub date: NaiveDate,
    pub outage_minutes: u32,
}

/// Dados de uma execução necessários para rotular os eventos.
#[derive(Debug, Clone)]
pub struct EmitContext<'a> {
    pub address: &'a AddressConfig,
    pub classification: Option<Urgency>,
    pub updated_at: Option<NaiveDateTime>,
    /// Janela corrente inteira, antes do recorte por dia.
    pub override_window: Option<&'a OverrideWindow>,
    /// Dias publicados no grafo, em ordem de data.
    pub schedule_days: &'a [DaySummary],
    /// "Agora" no fuso de origem.
    pub now: DateTime<Tz>,
    pub reminder_minutes: i64,
    pub emit_power: bool,
}

/// Um evento por intervalo, em ordem crescente de início.
///
/// Intervalos já encerrados (`end <= now`) e intervalos de duração nula não
/// viram eventos. Só o intervalo que cobre "agora" recebe a urgência no rótulo.
pub fn emit(days: &[DayPlan], ctx: &EmitContext<'_>) -> Vec<CalendarEvent> {
    let mut events = Vec::new();

    for day in days {
        for interval in &day.intervals {
            if interval.kind == IntervalKind::Power && !ctx.emit_power {
                continue;
            }
            let start = day.bounds.instant(interval.start);
            let end = day.bounds.instant(interval.end);
            if end <= start || end <= ctx.now {
                continue;
            }
            let live = start <= ctx.now;

            events.push(CalendarEvent {
                start: start.fixed_offset(),
                end: end.fixed_offset(),
                kind: match interval.kind {
                    IntervalKind::Outage => EventKind::Outage,
                    IntervalKind::Power => EventKind::Power,
                },
                label: label(interval, live, ctx),
                description: description(interval, day.bounds.date, &start, &end, ctx),
                reminder_minutes_before: ctx.reminder_minutes,
            });
        }
    }

    events.sort_by_key(|e| (e.start, e.end));
    events
}

/// Descrição do calendário como um todo: tipo de desligamento, carimbo de
/// atualização e lista dos dias com grafo publicado.
pub fn calendar_description(ctx: &EmitContext<'_>) -> String {
    let kind = ctx
        .classification
        .map_or("Планове відключення за графіком", Urgency::title);
    let mut text = format!(
        "Розклад відключень електроенергії для адреси: {}\n\nТип: {kind}",
        ctx.address.display()
    );
    if matches!(
        ctx.classification,
        Some(Urgency::Emergency | Urgency::Accident)
    ) {
        text.insert_str(0, "⚠️ УВАГА: ");
    }
    if let Some(updated) = ctx.updated_at {
        text.push_str(&format!("\nДані оновлено: {}", updated.format("%H:%M %d.%m.%Y")));
    }
    if !ctx.schedule_days.is_empty() {
        text.push_str("\n\n📋 Графіки на:");
        for day in ctx.schedule_days {
            text.push_str(&format!("\n  • {}", day.date.format("%d.%m.%Y")));
        }
    }
    text
}

/// Evento curto de alerta, começando "agora" e com lembrete imediato.
pub fn alert_event(
    change: &ChangeEvent,
    address: &AddressConfig,
    now: DateTime<Tz>,
    duration_minutes: i64,
) -> CalendarEvent {
    CalendarEvent {
        start: now.fixed_offset(),
        end: (now + Duration::minutes(duration_minutes.max(1))).fixed_offset(),
        kind: EventKind::Alert,
        label: change.message.clone(),
        description: format!(
            "На сайті з'явилась оновлена інформація про відключення.\nАдреса: {}",
            address.display()
        ),
        reminder_minutes_before: 0,
    }
}

fn label(interval: &Interval, live: bool, ctx: &EmitContext<'_>) -> String {
    let mut label = match (interval.kind, live) {
        (IntervalKind::Power, false) => POWER_LABEL.to_string(),
        (IntervalKind::Power, true) => format!("{POWER_LABEL} {LIVE_MARKER}"),
        (IntervalKind::Outage, false) => SCHEDULED_LABEL.to_string(),
        (IntervalKind::Outage, true) => {
            let urgency = interval
                .tag
                .or(ctx.classification)
                .unwrap_or(Urgency::Stabilization);
            format!("{} {} {LIVE_MARKER}", urgency.icon(), urgency.title())
        }
    };
    if let Some(updated) = ctx.updated_at {
        label.push_str(&format!(" · оновлено {}", updated.format("%H:%M")));
    }
    label
}

fn description(
    interval: &Interval,
    date: NaiveDate,
    start: &DateTime<Tz>,
    end: &DateTime<Tz>,
    ctx: &EmitContext<'_>,
) -> String {
    let mut lines = vec![
        format!("Адреса: {}", ctx.address.display()),
        format!(
            "Час: {} – {} {}",
            start.format("%H:%M"),
            end.format("%H:%M"),
            start.format("%d.%m.%Y")
        ),
    ];
    match (interval.kind, interval.tag) {
        (IntervalKind::Power, _) => {
            lines.push("Електропостачання працює за графіком.".to_string());
        }
        (IntervalKind::Outage, Some(urgency)) => {
            lines.push(format!("Тип: {}", urgency.title()));
            if let Some(window) = ctx.override_window {
                if !window.reason_text.is_empty() {
                    lines.push(format!("Причина: {}", window.reason_text));
                }
                // Cada fragmento do recorte mostra a janela inteira
                let tz = start.timezone();
                let (from, to) = (window.start.with_timezone(&tz), window.end.with_timezone(&tz));
                lines.push(format!("Початок: {}", from.format("%H:%M %d.%m.%Y")));
                let restore = if to.date_naive() == from.date_naive() {
                    to.format("%H:%M").to_string()
                } else {
                    to.format("%H:%M %d.%m.%Y").to_string()
                };
                lines.push(format!("Орієнтовне відновлення: {restore}"));
            }
        }
        (IntervalKind::Outage, None) => {
            lines.push("Тип: Планове відключення за графіком".to_string());
            let upcoming: Vec<String> = ctx
                .schedule_days
                .iter()
                .filter(|d| d.date > date && d.outage_minutes > 0)
                .map(|d| {
                    format!(
                        "  • {} ({} г.)",
                        d.date.format("%d.%m.%Y"),
                        format_hours(d.outage_minutes)
                    )
                })
                .collect();
            if !upcoming.is_empty() {
                lines.push(String::new());
                lines.push("📋 Графіки на наступні дні:".to_string());
                lines.extend(upcoming);
            }
        }
    }
    if let Some(updated) = ctx.updated_at {
        lines.push(format!("Дані оновлено: {}", updated.format("%H:%M %d.%m.%Y")));
    }
    lines.join("\n")
}

/// Horas sem luz: inteiro quando exato, senão com uma casa decimal ("2,5").
fn format_hours(minutes: u32) -> String {
    if minutes % 60 == 0 {
        (minutes / 60).to_string()
    } else {
        format!("{:.1}", f64::from(minutes) / 60.0).replace('.', ",")
    }
}
