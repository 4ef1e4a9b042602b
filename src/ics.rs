use crate::config::AddressConfig;
use crate::storage::write_atomic;
use crate::types::{CalendarEvent, EventKind};
use anyhow::{Context, Result};
use chrono::{DateTime, Datelike, Duration, FixedOffset, Offset, TimeZone, Utc};
use chrono_tz::{OffsetComponents, Tz, TzOffset};
use ical::generator::{Emitter, IcalCalendarBuilder, IcalEvent, Property};
use ical::parser::ical::component::{
    IcalAlarm, IcalTimeZone, IcalTimeZoneTransition, IcalTimeZoneTransitionType,
};
use ical::{ical_param, ical_property};
use std::fs;
use std::path::PathBuf;

const PRODID: &str = "-//calendario-desligamentos//Scheduler//UK";
const LOCAL_FORMAT: &str = "%Y%m%dT%H%M%S";
const UTC_FORMAT: &str = "%Y%m%dT%H%M%SZ";

/// Destino dos eventos emitidos para um endereço.
pub trait CalendarSink {
    /// Publica o calendário do endereço. Devolve `true` se o artefato mudou.
    fn publish(
        &self,
        address: &AddressConfig,
        description: &str,
        events: &[CalendarEvent],
    ) -> Result<bool>;
}

/// Um arquivo `<id>.ics` por endereço num diretório.
pub struct IcsDirectorySink {
    dir: PathBuf,
    tz: Tz,
}

impl IcsDirectorySink {
    pub fn new(dir: impl Into<PathBuf>, tz: Tz) -> Self {
        Self { dir: dir.into(), tz }
    }

    pub fn path_for(&self, address: &AddressConfig) -> PathBuf {
        self.dir.join(format!("{}.ics", address.id))
    }
}

impl CalendarSink for IcsDirectorySink {
    fn publish(
        &self,
        address: &AddressConfig,
        description: &str,
        events: &[CalendarEvent],
    ) -> Result<bool> {
        let path = self.path_for(address);
        let rendered = render(address, description, events, self.tz);

        // Conteúdo idêntico: o arquivo anterior fica intocado
        if let Ok(existing) = fs::read_to_string(&path) {
            if existing == rendered {
                return Ok(false);
            }
        }
        write_atomic(&path, rendered.as_bytes())
            .with_context(|| format!("gravando calendário {}", path.display()))?;
        Ok(true)
    }
}

/// Gera o texto do calendário. Determinístico para a mesma entrada.
///
/// Horários saem no fuso de origem (`TZID`), acompanhados do VTIMEZONE.
pub fn render(
    address: &AddressConfig,
    description: &str,
    events: &[CalendarEvent],
    tz: Tz,
) -> String {
    let mut calendar = IcalCalendarBuilder::version("2.0")
        .gregorian()
        .prodid(PRODID)
        .set(ical_property!("METHOD", "PUBLISH"))
        .set(ical_property!("X-WR-CALNAME", escape_text(&address.display())))
        .set(ical_property!("X-WR-CALDESC", escape_text(description)))
        .set(ical_property!("X-WR-TIMEZONE", tz.name()));
    if let Some(timezone) = vtimezone(tz, events) {
        calendar = calendar.add_tz(timezone);
    }
    for event in events {
        calendar = calendar.add_event(vevent(address, event, tz));
    }
    calendar.build().generate()
}

fn vevent(address: &AddressConfig, event: &CalendarEvent, tz: Tz) -> IcalEvent {
    let mut vevent = IcalEvent::new();
    vevent.properties = vec![
        ical_property!(
            "UID",
            format!("{}@calendario-desligamentos", uid(address, event))
        ),
        ical_property!(
            "DTSTAMP",
            event.start.with_timezone(&Utc).format(UTC_FORMAT).to_string()
        ),
        date_time("DTSTART", &event.start, tz),
        date_time("DTEND", &event.end, tz),
        ical_property!("SUMMARY", escape_text(&event.label)),
        ical_property!("DESCRIPTION", escape_text(&event.description)),
        ical_property!("LOCATION", escape_text(&address.display())),
        ical_property!("CATEGORIES", category(event.kind)),
        ical_property!("STATUS", "CONFIRMED"),
        ical_property!("TRANSP", "TRANSPARENT"),
    ];

    let mut alarm = IcalAlarm::new();
    alarm.properties = vec![
        ical_property!("ACTION", "DISPLAY"),
        ical_property!(
            "TRIGGER",
            format!("-PT{}M", event.reminder_minutes_before.max(0))
        ),
        ical_property!("DESCRIPTION", escape_text(&event.label)),
    ];
    vevent.alarms.push(alarm);
    vevent
}

/// Data/hora com `TZID`. A segunda ocorrência de um horário repetido (fim do
/// horário de verão) não tem forma local inequívoca e sai em UTC.
fn date_time(name: &str, instant: &DateTime<FixedOffset>, tz: Tz) -> Property {
    let local = instant.with_timezone(&tz);
    let naive = local.naive_local();
    if tz.from_local_datetime(&naive).earliest() == Some(local) {
        Property {
            name: name.to_string(),
            params: Some(vec![ical_param!("TZID", tz.name())]),
            value: Some(naive.format(LOCAL_FORMAT).to_string()),
        }
    } else {
        Property {
            name: name.to_string(),
            params: None,
            value: Some(instant.with_timezone(&Utc).format(UTC_FORMAT).to_string()),
        }
    }
}

/// VTIMEZONE com as transições do fuso, do ano anterior ao primeiro evento
/// até o ano seguinte ao último.
fn vtimezone(tz: Tz, events: &[CalendarEvent]) -> Option<IcalTimeZone> {
    let first = events.iter().map(|e| e.start).min()?;
    let last = events.iter().map(|e| e.end).max()?;
    let from = tz
        .with_ymd_and_hms(first.with_timezone(&tz).year() - 1, 1, 1, 0, 0, 0)
        .earliest()?
        .with_timezone(&Utc);
    let until = tz
        .with_ymd_and_hms(last.with_timezone(&tz).year() + 2, 1, 1, 0, 0, 0)
        .earliest()?
        .with_timezone(&Utc);

    let offset_at = |instant: DateTime<Utc>| tz.offset_from_utc_datetime(&instant.naive_utc());

    let mut timezone = IcalTimeZone::new();
    timezone.properties.push(ical_property!("TZID", tz.name()));
    let mut current = offset_at(from);
    timezone.transitions.push(observance(from, current, current));

    let mut cursor = from;
    while cursor < until {
        let next = cursor + Duration::hours(1);
        if offset_at(next).fix() != current.fix() {
            let onset = (1..=60)
                .map(|m| cursor + Duration::minutes(m))
                .find(|t| offset_at(*t).fix() != current.fix())
                .unwrap_or(next);
            let after = offset_at(onset);
            timezone.transitions.push(observance(onset, current, after));
            current = after;
        }
        cursor = next;
    }
    Some(timezone)
}

/// Observância que começa em `onset`; o DTSTART é o relógio local antes da mudança.
fn observance(onset: DateTime<Utc>, before: TzOffset, after: TzOffset) -> IcalTimeZoneTransition {
    let kind = if after.dst_offset() == Duration::zero() {
        IcalTimeZoneTransitionType::STANDARD
    } else {
        IcalTimeZoneTransitionType::DAYLIGHT
    };
    let local_start = onset.naive_utc() + Duration::seconds(i64::from(before.fix().local_minus_utc()));

    let mut transition = IcalTimeZoneTransition::new(kind);
    transition.properties = vec![
        ical_property!("DTSTART", local_start.format(LOCAL_FORMAT).to_string()),
        ical_property!("TZOFFSETFROM", utc_offset(before.fix())),
        ical_property!("TZOFFSETTO", utc_offset(after.fix())),
    ];
    transition
}

fn utc_offset(offset: FixedOffset) -> String {
    let seconds = offset.local_minus_utc();
    let sign = if seconds < 0 { '-' } else { '+' };
    let minutes = seconds.abs() / 60;
    format!("{sign}{:02}{:02}", minutes / 60, minutes % 60)
}

fn category(kind: EventKind) -> &'static str {
    match kind {
        EventKind::Outage => "OUTAGE",
        EventKind::Power => "POWER",
        EventKind::Alert => "ALERT",
    }
}

fn uid(address: &AddressConfig, event: &CalendarEvent) -> String {
    let key = format!(
        "{}|{}|{}|{}",
        address.id,
        category(event.kind),
        event.start.timestamp(),
        event.end.timestamp()
    );
    blake3::hash(key.as_bytes()).to_hex()[..32].to_string()
}

/// Escapa valores TEXT; o emissor do `ical` só protege parâmetros.
fn escape_text(text: &str) -> String {
    let mut escaped = String::with_capacity(text.len());
    for c in text.chars() {
        match c {
            '\\' => escaped.push_str("\\\\"),
            ';' => escaped.push_str("\\;"),
            ',' => escaped.push_str("\\,"),
            '\n' => escaped.push_str("\\n"),
            '\r' => {}
            other => escaped.push(other),
        }
    }
    escaped
}
