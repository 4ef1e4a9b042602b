//! Conversão entre minutos do dia (relógio de parede) e instantes absolutos.
//!
//! Todo cálculo usa o fuso de origem do site, nunca o fuso da máquina.

use crate::types::MINUTES_PER_DAY;
use chrono::{
    DateTime, Datelike, Duration, LocalResult, NaiveDate, NaiveTime, Offset, TimeZone, Timelike,
    Utc,
};
use chrono_tz::Tz;

/// Limites absolutos de um dia de calendário no fuso de origem.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DayBounds {
    pub tz: Tz,
    pub date: NaiveDate,
    pub start: DateTime<Tz>,
    pub end: DateTime<Tz>,
}

impl DayBounds {
    pub fn new(tz: Tz, date: NaiveDate) -> Self {
        let next = date.succ_opt().unwrap_or(NaiveDate::MAX);
        Self {
            tz,
            date,
            start: local_instant(tz, date, 0),
            end: local_instant(tz, next, 0),
        }
    }

    /// Chave do dia: meia-noite local em segundos desde a época.
    pub fn key(&self) -> i64 {
        self.start.timestamp()
    }

    pub fn intersects(&self, start: DateTime<Utc>, end: DateTime<Utc>) -> bool {
        start < self.end && end > self.start
    }

    /// Minuto do dia de `instant`, arredondado para baixo e limitado ao dia.
    pub fn minute_floor(&self, instant: DateTime<Utc>) -> u32 {
        if instant <= self.start {
            return 0;
        }
        if instant >= self.end {
            return MINUTES_PER_DAY;
        }
        let local = instant.with_timezone(&self.tz);
        local.hour() * 60 + local.minute()
    }

    /// Minuto do dia de `instant`, arredondado para cima e limitado ao dia.
    pub fn minute_ceil(&self, instant: DateTime<Utc>) -> u32 {
        let floor = self.minute_floor(instant);
        if floor == 0 || floor == MINUTES_PER_DAY {
            return floor;
        }
        let local = instant.with_timezone(&self.tz);
        if local.second() > 0 || local.nanosecond() > 0 {
            (floor + 1).min(MINUTES_PER_DAY)
        } else {
            floor
        }
    }

    /// Instante absoluto de um minuto do dia (1440 = meia-noite seguinte).
    pub fn instant(&self, minute: u32) -> DateTime<Tz> {
        if minute >= MINUTES_PER_DAY {
            return self.end;
        }
        local_instant(self.tz, self.date, minute)
    }
}

/// Converte data + minuto de relógio de parede em instante no fuso `tz`.
///
/// Horários ambíguos (fim do horário de verão) ficam com a primeira ocorrência;
/// horários inexistentes (início do horário de verão) caem no instante da transição.
pub fn local_instant(tz: Tz, date: NaiveDate, minute: u32) -> DateTime<Tz> {
    let midnight = date.and_time(NaiveTime::MIN);
    let naive = midnight
        .checked_add_signed(Duration::minutes(i64::from(minute)))
        .unwrap_or(midnight);
    match tz.from_local_datetime(&naive) {
        LocalResult::Single(t) => t,
        LocalResult::Ambiguous(earliest, _) => earliest,
        LocalResult::None => {
            let offset = naive
                .checked_sub_signed(Duration::hours(1))
                .and_then(|before| tz.from_local_datetime(&before).earliest())
                .map(|t| t.offset().fix().local_minus_utc())
                .unwrap_or(0);
            let utc = naive
                .checked_sub_signed(Duration::seconds(i64::from(offset)))
                .unwrap_or(naive);
            tz.from_utc_datetime(&utc)
        }
    }
}

/// Datas aceitas vindas do site; fora disso o dado é tratado como corrompido.
pub fn is_plausible(date: NaiveDate) -> bool {
    (2000..=2199).contains(&date.year())
}

/// Data local de uma chave de dia (segundos desde a época).
pub fn date_of_key(tz: Tz, key: i64) -> Option<NaiveDate> {
    tz.timestamp_opt(key, 0).single().map(|t| t.date_naive())
}

/// Chave do dia seguinte ao de `today`, respeitando o horário de verão.
pub fn tomorrow_key(tz: Tz, today: NaiveDate) -> i64 {
    let next = today.succ_opt().unwrap_or(NaiveDate::MAX);
    DayBounds::new(tz, next).key()
}
