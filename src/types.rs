use crate::error::SlotError;
use chrono::{DateTime, FixedOffset, Utc};
use serde::{Deserialize, Serialize};
use std::collections::BTreeSet;

/// Minutos em um dia de calendário (relógio de parede).
pub const MINUTES_PER_DAY: u32 = 1440;

/// Classificação de urgência do desligamento.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Hash)]
#[serde(rename_all = "lowercase")]
pub enum Urgency {
    Stabilization,
    Emergency,
    Accident,
}

impl Urgency {
    /// Classifica um texto livre do site (popup, aviso do endereço, motivo).
    pub fn classify(text: &str) -> Option<Self> {
        let lower = text.to_lowercase();
        if lower.contains("аварійн") {
            Some(Urgency::Accident)
        } else if lower.contains("екстрен") {
            Some(Urgency::Emergency)
        } else if lower.contains("стабілізац") {
            Some(Urgency::Stabilization)
        } else {
            None
        }
    }

    /// O popup do site vale para todos os endereços e tem precedência.
    pub fn resolve(popup: Option<Self>, per_address: Option<Self>) -> Option<Self> {
        popup.or(per_address)
    }

    pub fn icon(self) -> &'static str {
        match self {
            Urgency::Stabilization => "🔌",
            Urgency::Emergency => "🚨",
            Urgency::Accident => "⚠️",
        }
    }

    /// Nome exibido no calendário (ucraniano, como no site de origem).
    pub fn title(self) -> &'static str {
        match self {
            Urgency::Stabilization => "Стабілізаційне відключення",
            Urgency::Emergency => "Екстрене відключення",
            Urgency::Accident => "Аварійне відключення",
        }
    }

    pub fn as_str(self) -> &'static str {
        match self {
            Urgency::Stabilization => "stabilization",
            Urgency::Emergency => "emergency",
            Urgency::Accident => "accident",
        }
    }
}

/// Estado de uma célula horária do grafo.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "snake_case")]
pub enum SlotState {
    Light,
    Off,
    OffFirstHalf,
    OffSecondHalf,
}

impl SlotState {
    /// Aceita tanto os códigos do feed JSON quanto as classes das células da tabela.
    pub fn from_code(code: &str) -> Result<Self, SlotError> {
        match code.trim() {
            "yes" | "light" => Ok(SlotState::Light),
            "no" | "no-light" | "cell-scheduled" => Ok(SlotState::Off),
            "first" | "no-light-first-half" | "cell-first-half" => Ok(SlotState::OffFirstHalf),
            "second" | "no-light-second-half" | "cell-second-half" => {
                Ok(SlotState::OffSecondHalf)
            }
            other => Err(SlotError::UnknownCode(other.to_string())),
        }
    }
}

/// Célula do grafo: a hora de 60 minutos que termina em `hour_index:00`.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
pub struct Slot {
    pub hour_index: u8,
    pub state: SlotState,
}

impl Slot {
    pub fn new(hour_index: i64, state: SlotState) -> Result<Self, SlotError> {
        if !(1..=24).contains(&hour_index) {
            return Err(SlotError::HourOutOfRange(hour_index));
        }
        Ok(Self {
            hour_index: hour_index as u8,
            state,
        })
    }

    /// Sub-intervalo sem luz em minutos do dia, `None` quando há luz.
    pub fn outage_minutes(&self) -> Option<(u32, u32)> {
        let hour_start = (u32::from(self.hour_index) - 1) * 60;
        match self.state {
            SlotState::Light => None,
            SlotState::Off => Some((hour_start, hour_start + 60)),
            SlotState::OffFirstHalf => Some((hour_start, hour_start + 30)),
            SlotState::OffSecondHalf => Some((hour_start + 30, hour_start + 60)),
        }
    }
}

/// Grafo de um dia para um endereço. Imutável depois de montado.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct DaySchedule {
    /// Meia-noite do dia no fuso de origem, em segundos desde a época.
    pub day_epoch_seconds: i64,
    pub slots: Vec<Slot>,
}

impl DaySchedule {
    /// Monta o dia a partir das células já interpretadas.
    ///
    /// Células inválidas ou com hora repetida são rejeitadas e devolvidas à
    /// parte; a primeira ocorrência de cada hora vence.
    pub fn collect<I>(day_epoch_seconds: i64, cells: I) -> (Self, Vec<SlotError>)
    where
        I: IntoIterator<Item = Result<Slot, SlotError>>,
    {
        let mut seen = [false; 25];
        let mut slots = Vec::new();
        let mut rejected = Vec::new();

        for cell in cells {
            match cell {
                Ok(slot) if seen[usize::from(slot.hour_index)] => {
                    rejected.push(SlotError::DuplicateHour(slot.hour_index));
                }
                Ok(slot) => {
                    seen[usize::from(slot.hour_index)] = true;
                    slots.push(slot);
                }
                Err(e) => rejected.push(e),
            }
        }

        slots.sort_by_key(|s| s.hour_index);
        (
            Self {
                day_epoch_seconds,
                slots,
            },
            rejected,
        )
    }
}

#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "lowercase")]
pub enum IntervalKind {
    Outage,
    Power,
}

/// Intervalo contínuo de um mesmo estado de energia, em minutos do dia.
///
/// `tag` só é preenchido no intervalo inserido pela janela de desligamento
/// corrente; intervalos vindos do grafo ficam sem tag.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
pub struct Interval {
    pub start: u32,
    pub end: u32,
    pub kind: IntervalKind,
    pub tag: Option<Urgency>,
}

impl Interval {
    pub fn outage(start: u32, end: u32) -> Self {
        Self {
            start,
            end,
            kind: IntervalKind::Outage,
            tag: None,
        }
    }

    pub fn power(start: u32, end: u32) -> Self {
        Self {
            start,
            end,
            kind: IntervalKind::Power,
            tag: None,
        }
    }

    pub fn tagged(start: u32, end: u32, urgency: Urgency) -> Self {
        Self {
            start,
            end,
            kind: IntervalKind::Outage,
            tag: Some(urgency),
        }
    }

    pub fn is_outage(&self) -> bool {
        self.kind == IntervalKind::Outage
    }
}

/// Janela de desligamento corrente, vinda do aviso ao vivo do site.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct OverrideWindow {
    pub start: DateTime<Utc>,
    pub end: DateTime<Utc>,
    pub reason_text: String,
    pub urgency: Urgency,
}

impl OverrideWindow {
    /// Identificador estável do conteúdo da janela entre execuções.
    pub fn fingerprint(&self) -> String {
        let canonical = format!(
            "{}|{}|{}|{}",
            self.start.timestamp(),
            self.end.timestamp(),
            self.urgency.as_str(),
            self.reason_text.trim()
        );
        blake3::hash(canonical.as_bytes()).to_hex().to_string()
    }
}

/// Observação corrente de um endereço, comparada com o estado persistido.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Observation {
    pub classification: Option<Urgency>,
    pub scheduled_day_keys: BTreeSet<i64>,
    pub override_fingerprint: Option<String>,
}

/// Estado persistido por endereço; único artefato que sobrevive entre execuções.
#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq, Eq)]
#[serde(default)]
pub struct AddressState {
    pub last_classification: Option<Urgency>,
    pub last_scheduled_day_keys: BTreeSet<i64>,
    pub last_override_fingerprint: Option<String>,
    pub last_checked: Option<DateTime<Utc>>,
}

impl AddressState {
    pub fn from_observation(observation: &Observation, checked_at: DateTime<Utc>) -> Self {
        Self {
            last_classification: observation.classification,
            last_scheduled_day_keys: observation.scheduled_day_keys.clone(),
            last_override_fingerprint: observation.override_fingerprint.clone(),
            last_checked: Some(checked_at),
        }
    }
}

#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "lowercase")]
pub enum EventKind {
    Outage,
    Power,
    Alert,
}

/// Registro de evento de calendário. Saída de mão única do pipeline.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct CalendarEvent {
    pub start: DateTime<FixedOffset>,
    pub end: DateTime<FixedOffset>,
    pub kind: EventKind,
    pub label: String,
    pub description: String,
    pub reminder_minutes_before: i64,
}

/// Motivo de um alerta de mudança.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum ChangeKind {
    ClassificationChanged {
        from: Option<Urgency>,
        to: Option<Urgency>,
    },
    OverrideChanged,
    TomorrowAdded {
        day_key: i64,
    },
    NewDays {
        day_keys: Vec<i64>,
    },
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct ChangeEvent {
    pub kind: ChangeKind,
    pub message: String,
}
