//! Dados brutos entregues pelo coletor do site e sua interpretação.
//!
//! A automação do navegador fica fora deste serviço: o coletor grava um JSON
//! com o que extraiu da página e aqui ele é lido e validado.

use crate::error::{SlotError, TimestampError};
use crate::timeline::{date_of_key, is_plausible};
use crate::types::{DaySchedule, OverrideWindow, Slot, SlotState, Urgency};
use anyhow::{Context, Result};
use chrono::{DateTime, Duration, NaiveDateTime, NaiveTime, TimeZone, Utc};
use chrono_tz::Tz;
use serde::Deserialize;
use std::collections::{BTreeMap, BTreeSet, HashMap};
use std::path::PathBuf;

/// Fonte dos dados brutos de uma execução.
pub trait OutageSource {
    fn fetch(&self) -> Result<RawSnapshot>;

    /// Se já há dados para buscar (o coletor pode ainda não ter rodado).
    fn is_ready(&self) -> bool {
        true
    }
}

/// Extração completa de uma execução do coletor.
#[derive(Debug, Clone, Default, Deserialize)]
#[serde(default)]
pub struct RawSnapshot {
    /// Texto do popup do site; vale para todos os endereços.
    pub popup_text: Option<String>,
    pub addresses: HashMap<String, RawAddressData>,
}

/// O que o coletor extraiu para um endereço.
#[derive(Debug, Clone, Default, Deserialize)]
#[serde(default)]
pub struct RawAddressData {
    pub status_text: Option<String>,
    /// "HH:MM DD.MM.YYYY"
    pub update_time: Option<String>,
    pub current_outage: Option<RawOutage>,
    pub schedules: Vec<RawDay>,
}

/// Aviso de desligamento corrente, como aparece na página.
#[derive(Debug, Clone, Default, Deserialize)]
#[serde(default)]
pub struct RawOutage {
    /// "HH:MM DD.MM.YYYY"
    pub start: String,
    /// "HH:MM" ou "HH:MM DD.MM.YYYY"
    pub end: String,
    pub reason: String,
}

#[derive(Debug, Clone, Deserialize)]
pub struct RawDay {
    /// Meia-noite do dia no fuso de origem.
    pub day: i64,
    /// Hora (1..=24, como texto) → código de status.
    pub slots: BTreeMap<String, String>,
}

/// Lê o JSON gravado pelo coletor.
pub struct JsonSnapshotSource {
    path: PathBuf,
}

impl JsonSnapshotSource {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self { path: path.into() }
    }
}

impl OutageSource for JsonSnapshotSource {
    fn fetch(&self) -> Result<RawSnapshot> {
        let text = std::fs::read_to_string(&self.path)
            .with_context(|| format!("lendo snapshot {}", self.path.display()))?;
        let snapshot = serde_json::from_str(&text)
            .with_context(|| format!("interpretando snapshot {}", self.path.display()))?;
        Ok(snapshot)
    }

    fn is_ready(&self) -> bool {
        self.path.exists()
    }
}

/// Interpreta os grafos do endereço; células e dias inválidos voltam à parte.
///
/// Dois dias com a mesma data local: vale o primeiro.
pub fn parse_schedules(raw: &[RawDay], tz: Tz) -> (Vec<DaySchedule>, Vec<SlotError>) {
    let mut days = Vec::with_capacity(raw.len());
    let mut rejected = Vec::new();
    let mut seen = BTreeSet::new();

    for day in raw {
        let Some(date) = date_of_key(tz, day.day).filter(|d| is_plausible(*d)) else {
            rejected.push(SlotError::DayOutOfRange(day.day));
            continue;
        };
        if !seen.insert(date) {
            rejected.push(SlotError::DuplicateDay(day.day));
            continue;
        }
        let cells = day.slots.iter().map(|(hour, code)| {
            let hour_index = hour
                .trim()
                .parse::<i64>()
                .map_err(|_| SlotError::InvalidHourKey(hour.clone()))?;
            Slot::new(hour_index, SlotState::from_code(code)?)
        });
        let (schedule, errors) = DaySchedule::collect(day.day, cells);
        rejected.extend(errors);
        days.push(schedule);
    }

    days.sort_by_key(|d| d.day_epoch_seconds);
    (days, rejected)
}

/// Interpreta "HH:MM DD.MM.YYYY" no fuso de origem.
pub fn parse_local_stamp(text: &str) -> Result<NaiveDateTime, TimestampError> {
    let text = text.trim();
    if text.is_empty() {
        return Err(TimestampError::Empty);
    }
    NaiveDateTime::parse_from_str(text, "%H:%M %d.%m.%Y")
        .map_err(|_| TimestampError::Format(text.to_string()))
}

/// Monta a janela corrente a partir do aviso da página.
///
/// Fim sem data herda a data do início; se isso o colocar antes do início,
/// o fim passa para o dia seguinte ("до 01:30" num desligamento noturno).
pub fn parse_override(
    raw: &RawOutage,
    tz: Tz,
    fallback: Option<Urgency>,
) -> Result<OverrideWindow, TimestampError> {
    let start = parse_local_stamp(&raw.start)?;
    let end_text = raw.end.trim();
    let end = match parse_local_stamp(end_text) {
        Ok(end) => end,
        Err(TimestampError::Empty) => return Err(TimestampError::Empty),
        Err(_) => {
            let time = NaiveTime::parse_from_str(end_text, "%H:%M")
                .map_err(|_| TimestampError::Format(end_text.to_string()))?;
            let same_day = start.date().and_time(time);
            if same_day <= start {
                same_day + Duration::days(1)
            } else {
                same_day
            }
        }
    };

    for stamp in [start, end] {
        if !is_plausible(stamp.date()) {
            return Err(TimestampError::OutOfRange(stamp.to_string()));
        }
    }

    let start_utc = to_utc(tz, start)?;
    let end_utc = to_utc(tz, end)?;
    if end_utc <= start_utc {
        return Err(TimestampError::EndBeforeStart {
            start: raw.start.clone(),
            end: raw.end.clone(),
        });
    }

    let reason = raw.reason.trim().to_string();
    let urgency = Urgency::classify(&reason)
        .or(fallback)
        .unwrap_or(Urgency::Stabilization);

    Ok(OverrideWindow {
        start: start_utc,
        end: end_utc,
        reason_text: reason,
        urgency,
    })
}

fn to_utc(tz: Tz, local: NaiveDateTime) -> Result<DateTime<Utc>, TimestampError> {
    tz.from_local_datetime(&local)
        .earliest()
        .map(|t| t.with_timezone(&Utc))
        .ok_or_else(|| TimestampError::Nonexistent(local.to_string()))
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono_tz::Europe::Kyiv;

    fn raw_outage(start: &str, end: &str, reason: &str) -> RawOutage {
        RawOutage {
            start: start.into(),
            end: end.into(),
            reason: reason.into(),
        }
    }

    #[test]
    fn snapshot_json_is_read() {
        let json = r#"{
            "popup_text": "Увага! Екстрені відключення",
            "addresses": {
                "gora": {
                    "update_time": "09:05 10.11.2025",
                    "current_outage": {"start": "13:00 10.11.2025", "end": "15:00", "reason": "Стабілізаційне відключення"},
                    "schedules": [{"day": 1762725600, "slots": {"1": "no", "2": "no", "3": "yes", "4": "first"}}]
                }
            }
        }"#;
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("snapshot.json");
        std::fs::write(&path, json).unwrap();

        let snapshot = JsonSnapshotSource::new(&path).fetch().unwrap();
        let gora = &snapshot.addresses["gora"];
        assert!(snapshot.popup_text.unwrap().contains("Екстрені"));
        assert_eq!(gora.schedules[0].slots.len(), 4);
        assert!(gora.status_text.is_none());
    }

    #[test]
    fn missing_snapshot_is_an_error() {
        let dir = tempfile::tempdir().unwrap();
        let source = JsonSnapshotSource::new(dir.path().join("nope.json"));
        assert!(!source.is_ready());
        assert!(source.fetch().is_err());
    }

    #[test]
    fn bad_cells_are_rejected_individually() {
        let raw = vec![RawDay {
            day: 1_762_725_600,
            slots: BTreeMap::from([
                ("1".to_string(), "no".to_string()),
                ("2".to_string(), "purple".to_string()),
                ("x".to_string(), "no".to_string()),
                ("25".to_string(), "no".to_string()),
                ("4".to_string(), "second".to_string()),
            ]),
        }];

        let (days, rejected) = parse_schedules(&raw, Kyiv);
        assert_eq!(days[0].slots.len(), 2);
        assert_eq!(rejected.len(), 3);
        assert!(rejected.contains(&SlotError::HourOutOfRange(25)));
        assert!(rejected.contains(&SlotError::UnknownCode("purple".into())));
        assert!(rejected.contains(&SlotError::InvalidHourKey("x".into())));
    }

    #[test]
    fn implausible_and_repeated_days_are_rejected() {
        let cells = BTreeMap::from([("1".to_string(), "no".to_string())]);
        let min_key = chrono::NaiveDate::MIN
            .and_time(NaiveTime::MIN)
            .and_utc()
            .timestamp();
        let day = |key: i64| RawDay {
            day: key,
            slots: cells.clone(),
        };
        // o último cai na mesma data local, duas horas depois da meia-noite
        let raw = vec![
            day(1_762_725_600),
            day(min_key),
            day(i64::MAX),
            day(1_762_725_600 + 7_200),
        ];

        let (days, rejected) = parse_schedules(&raw, Kyiv);
        assert_eq!(days.len(), 1);
        assert_eq!(days[0].slots.len(), 1);
        assert_eq!(
            rejected,
            vec![
                SlotError::DayOutOfRange(min_key),
                SlotError::DayOutOfRange(i64::MAX),
                SlotError::DuplicateDay(1_762_725_600 + 7_200),
            ]
        );
    }

    #[test]
    fn override_dates_far_in_the_past_are_rejected() {
        assert!(matches!(
            parse_override(&raw_outage("13:00 10.11.1900", "15:00", ""), Kyiv, None),
            Err(TimestampError::OutOfRange(_))
        ));
    }

    #[test]
    fn override_without_end_date_uses_start_date() {
        let window = parse_override(
            &raw_outage("13:00 10.11.2025", "15:00", "Стабілізаційне відключення"),
            Kyiv,
            None,
        )
        .unwrap();

        assert_eq!(window.start.to_rfc3339(), "2025-11-10T11:00:00+00:00");
        assert_eq!(window.end.to_rfc3339(), "2025-11-10T13:00:00+00:00");
        assert_eq!(window.urgency, Urgency::Stabilization);
    }

    #[test]
    fn night_override_rolls_end_to_next_day() {
        let window = parse_override(
            &raw_outage("23:00 10.11.2025", "01:30", "Аварійне відключення"),
            Kyiv,
            None,
        )
        .unwrap();

        assert_eq!((window.end - window.start).num_minutes(), 150);
        assert_eq!(window.urgency, Urgency::Accident);
    }

    #[test]
    fn explicit_end_date_and_fallback_urgency() {
        let window = parse_override(
            &raw_outage("22:00 10.11.2025", "02:00 11.11.2025", "Роботи на лінії"),
            Kyiv,
            Some(Urgency::Emergency),
        )
        .unwrap();
        assert_eq!((window.end - window.start).num_hours(), 4);
        assert_eq!(window.urgency, Urgency::Emergency);
    }

    #[test]
    fn unparsable_override_is_an_error() {
        assert_eq!(
            parse_override(&raw_outage("", "15:00", ""), Kyiv, None),
            Err(TimestampError::Empty)
        );
        assert!(matches!(
            parse_override(&raw_outage("завтра", "15:00", ""), Kyiv, None),
            Err(TimestampError::Format(_))
        ));
        assert!(matches!(
            parse_override(&raw_outage("13:00 10.11.2025", "12:00 10.11.2025", ""), Kyiv, None),
            Err(TimestampError::EndBeforeStart { .. })
        ));
    }
}
