//! Aplicação da janela de desligamento corrente sobre os intervalos do grafo.
//!
//! A janela ao vivo substitui qualquer falta programada no mesmo horário.
//! Janelas que atravessam a meia-noite são recortadas dia a dia.

use crate::merge::with_complement;
use crate::timeline::DayBounds;
use crate::types::{Interval, OverrideWindow};

/// Reconcilia os intervalos de um dia com a janela corrente.
///
/// Sem janela, ou com janela fora do dia, os intervalos voltam inalterados.
/// Caso contrário as faltas programadas são recortadas (até dois fragmentos
/// por intervalo), a janela entra como falta própria com sua urgência, e a
/// presença de luz é recalculada sobre o resultado.
pub fn reconcile(
    day_intervals: &[Interval],
    window: Option<&OverrideWindow>,
    bounds: &DayBounds,
) -> Vec<Interval> {
    let Some(window) = window else {
        return day_intervals.to_vec();
    };
    if !bounds.intersects(window.start, window.end) {
        return day_intervals.to_vec();
    }

    let w_start = bounds.minute_floor(window.start);
    let w_end = bounds.minute_ceil(window.end);
    if w_start >= w_end {
        return day_intervals.to_vec();
    }

    let mut outages: Vec<Interval> = Vec::with_capacity(day_intervals.len() + 2);
    for interval in day_intervals.iter().filter(|i| i.is_outage()) {
        if interval.end <= w_start || interval.start >= w_end {
            outages.push(*interval);
            continue;
        }
        // Sobra antes da janela
        if interval.start < w_start {
            outages.push(Interval {
                end: w_start,
                ..*interval
            });
        }
        // Sobra depois da janela
        if interval.end > w_end {
            outages.push(Interval {
                start: w_end,
                ..*interval
            });
        }
    }
    outages.push(Interval::tagged(w_start, w_end, window.urgency));
    outages.sort_by_key(|i| (i.start, i.end));

    with_complement(outages)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::merge::merge;
    use crate::types::{
        DaySchedule, IntervalKind, MINUTES_PER_DAY, Slot, SlotState, Urgency,
    };
    use chrono::{NaiveDate, Utc};
    use chrono_tz::Europe::Kyiv;

    fn bounds(d: u32) -> DayBounds {
        DayBounds::new(Kyiv, NaiveDate::from_ymd_opt(2025, 11, d).unwrap())
    }

    fn window(day: &DayBounds, start_min: u32, end_day: &DayBounds, end_min: u32) -> OverrideWindow {
        OverrideWindow {
            start: day.instant(start_min).with_timezone(&Utc),
            end: end_day.instant(end_min).with_timezone(&Utc),
            reason_text: "Екстрені відключення".into(),
            urgency: Urgency::Emergency,
        }
    }

    fn outages(intervals: &[Interval]) -> Vec<(u32, u32, Option<Urgency>)> {
        intervals
            .iter()
            .filter(|i| i.is_outage())
            .map(|i| (i.start, i.end, i.tag))
            .collect()
    }

    fn assert_tiles_day(intervals: &[Interval]) {
        let mut cursor = 0;
        for interval in intervals {
            assert!(interval.start < interval.end);
            assert_eq!(interval.start, cursor, "{intervals:?}");
            cursor = interval.end;
        }
        assert_eq!(cursor, MINUTES_PER_DAY);
    }

    #[test]
    fn without_window_nothing_changes() {
        let day = bounds(10);
        let intervals = vec![
            Interval::power(0, 720),
            Interval::outage(720, 960),
            Interval::power(960, 1440),
        ];
        assert_eq!(reconcile(&intervals, None, &day), intervals);
    }

    #[test]
    fn window_inside_interval_splits_it_in_two() {
        let day = bounds(10);
        let intervals = vec![
            Interval::power(0, 720),
            Interval::outage(720, 960),
            Interval::power(960, 1440),
        ];
        let w = window(&day, 780, &day, 900);

        let result = reconcile(&intervals, Some(&w), &day);
        assert_eq!(
            outages(&result),
            vec![
                (720, 780, None),
                (780, 900, Some(Urgency::Emergency)),
                (900, 960, None),
            ]
        );
        assert_tiles_day(&result);
    }

    #[test]
    fn covered_intervals_are_dropped_and_edges_truncated() {
        let day = bounds(10);
        let (schedule, _) = DaySchedule::collect(
            day.key(),
            [
                Slot::new(9, SlotState::Off),
                Slot::new(11, SlotState::OffFirstHalf),
                Slot::new(13, SlotState::Off),
                Slot::new(15, SlotState::Off),
            ],
        );
        // faltas: [480,540) [600,630) [720,780) [840,900)
        let intervals = merge(&schedule);
        let w = window(&day, 510, &day, 870);

        let result = reconcile(&intervals, Some(&w), &day);
        assert_eq!(
            outages(&result),
            vec![
                (480, 510, None),
                (510, 870, Some(Urgency::Emergency)),
                (870, 900, None),
            ]
        );
        for interval in result.iter().filter(|i| i.tag.is_none() && i.is_outage()) {
            assert!(interval.end <= 510 || interval.start >= 870);
        }
        assert_tiles_day(&result);
    }

    #[test]
    fn window_spanning_midnight_is_split_per_day() {
        let today = bounds(10);
        let tomorrow = bounds(11);
        let w = window(&today, 23 * 60, &tomorrow, 90);

        let first = reconcile(&[Interval::power(0, MINUTES_PER_DAY)], Some(&w), &today);
        let second = reconcile(
            &[Interval::outage(0, 60), Interval::power(60, MINUTES_PER_DAY)],
            Some(&w),
            &tomorrow,
        );

        assert_eq!(outages(&first), vec![(1380, 1440, Some(Urgency::Emergency))]);
        assert_eq!(outages(&second), vec![(0, 90, Some(Urgency::Emergency))]);
        assert_tiles_day(&first);
        assert_tiles_day(&second);
    }

    #[test]
    fn window_on_another_day_is_ignored() {
        let today = bounds(10);
        let later = bounds(12);
        let w = window(&later, 600, &later, 700);
        let intervals = vec![Interval::outage(0, 60), Interval::power(60, 1440)];

        assert_eq!(reconcile(&intervals, Some(&w), &today), intervals);
    }

    #[test]
    fn power_is_recomputed_after_reconciliation() {
        let day = bounds(10);
        let intervals = vec![Interval::power(0, MINUTES_PER_DAY)];
        let w = window(&day, 600, &day, 645);

        let result = reconcile(&intervals, Some(&w), &day);
        let power: Vec<(u32, u32)> = result
            .iter()
            .filter(|i| i.kind == IntervalKind::Power)
            .map(|i| (i.start, i.end))
            .collect();
        assert_eq!(power, vec![(0, 600), (645, 1440)]);
    }
}
