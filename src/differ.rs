use crate::types::{AddressState, ChangeEvent, ChangeKind, Observation, Urgency};
use tracing::debug;

/// Decide se a observação corrente merece um alerta.
///
/// Mudança de classificação ou da janela corrente tem prioridade sobre dias
/// novos no grafo. Observação idêntica ao estado anterior nunca alerta.
/// `tomorrow_key` é a chave do dia seguinte no fuso de origem.
pub fn diff(
    previous: &AddressState,
    current: &Observation,
    tomorrow_key: i64,
) -> Option<ChangeEvent> {
    if current.classification != previous.last_classification {
        return Some(ChangeEvent {
            kind: ChangeKind::ClassificationChanged {
                from: previous.last_classification,
                to: current.classification,
            },
            message: classification_message(current.classification),
        });
    }

    if current.override_fingerprint != previous.last_override_fingerprint {
        let message = if current.override_fingerprint.is_some() {
            "🔔 ОНОВЛЕНО: Змінилась інформація про поточне відключення".to_string()
        } else {
            "🔔 ОНОВЛЕНО: Поточне відключення знято".to_string()
        };
        return Some(ChangeEvent {
            kind: ChangeKind::OverrideChanged,
            message,
        });
    }

    let added: Vec<i64> = current
        .scheduled_day_keys
        .difference(&previous.last_scheduled_day_keys)
        .copied()
        .collect();

    debug!(
        "[DIFF] Dias anteriores: {:?}, dias correntes: {:?}, novos: {:?}",
        previous.last_scheduled_day_keys, current.scheduled_day_keys, added
    );

    if added.is_empty() {
        return None;
    }

    if added.contains(&tomorrow_key) {
        return Some(ChangeEvent {
            kind: ChangeKind::TomorrowAdded {
                day_key: tomorrow_key,
            },
            message: "🔔 ОНОВЛЕНО: З'явився графік на завтра".to_string(),
        });
    }

    Some(ChangeEvent {
        kind: ChangeKind::NewDays { day_keys: added },
        message: "🔔 ОНОВЛЕНО: Новий розклад відключень".to_string(),
    })
}

fn classification_message(current: Option<Urgency>) -> String {
    match current {
        Some(urgency) => format!("{} ОНОВЛЕНО: {}", urgency.icon(), urgency.title()),
        None => "🔔 ОНОВЛЕНО: Відключення скасовано".to_string(),
    }
}
