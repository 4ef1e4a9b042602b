use crate::types::{DaySchedule, Interval, MINUTES_PER_DAY};

/// Converte as células do dia em intervalos ordenados e disjuntos.
///
/// Os intervalos de falta são fundidos sempre que se tocam ou se sobrepõem;
/// os de presença são o complemento exato sobre `[0, 1440)`.
pub fn merge(day: &DaySchedule) -> Vec<Interval> {
    let mut raw: Vec<(u32, u32)> = day
        .slots
        .iter()
        .filter_map(|slot| slot.outage_minutes())
        .collect();
    raw.sort_unstable();

    let mut outages: Vec<Interval> = Vec::with_capacity(raw.len());
    for (start, end) in raw {
        match outages.last_mut() {
            Some(last) if start <= last.end => last.end = last.end.max(end),
            _ => outages.push(Interval::outage(start, end)),
        }
    }

    with_complement(outages)
}

/// Intervalos de presença de luz que completam `outages` no dia.
///
/// `outages` precisa estar ordenado e sem sobreposição.
pub fn complement(outages: &[Interval]) -> Vec<Interval> {
    let mut power = Vec::with_capacity(outages.len() + 1);
    let mut cursor = 0;
    for outage in outages {
        if cursor < outage.start {
            power.push(Interval::power(cursor, outage.start));
        }
        cursor = cursor.max(outage.end);
    }
    if cursor < MINUTES_PER_DAY {
        power.push(Interval::power(cursor, MINUTES_PER_DAY));
    }
    power
}

/// Junta faltas e o complemento de presença numa única lista ordenada.
pub fn with_complement(outages: Vec<Interval>) -> Vec<Interval> {
    let mut all = complement(&outages);
    all.extend(outages);
    all.sort_by_key(|i| (i.start, i.end));
    all
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::types::{IntervalKind, Slot, SlotState};

    fn day(cells: &[(i64, SlotState)]) -> DaySchedule {
        let (day, rejected) = DaySchedule::collect(
            0,
            cells.iter().map(|&(h, s)| Slot::new(h, s)),
        );
        assert!(rejected.is_empty());
        day
    }

    fn spans(intervals: &[Interval], kind: IntervalKind) -> Vec<(u32, u32)> {
        intervals
            .iter()
            .filter(|i| i.kind == kind)
            .map(|i| (i.start, i.end))
            .collect()
    }

    fn assert_tiles_day(intervals: &[Interval]) {
        let mut cursor = 0;
        for interval in intervals {
            assert!(interval.start < interval.end, "intervalo vazio: {interval:?}");
            assert_eq!(interval.start, cursor, "lacuna ou sobreposição em {interval:?}");
            cursor = interval.end;
        }
        assert_eq!(cursor, MINUTES_PER_DAY);
    }

    #[test]
    fn merges_reference_day() {
        let result = merge(&day(&[
            (1, SlotState::Off),
            (2, SlotState::Off),
            (3, SlotState::Light),
            (4, SlotState::OffFirstHalf),
        ]));

        assert_eq!(spans(&result, IntervalKind::Outage), vec![(0, 120), (180, 210)]);
        assert_eq!(spans(&result, IntervalKind::Power), vec![(120, 180), (210, 1440)]);
        assert_tiles_day(&result);
    }

    #[test]
    fn halves_touching_across_hours_are_fused() {
        let result = merge(&day(&[
            (10, SlotState::OffSecondHalf),
            (11, SlotState::OffFirstHalf),
            (12, SlotState::OffSecondHalf),
        ]));

        assert_eq!(spans(&result, IntervalKind::Outage), vec![(570, 630), (690, 720)]);
        assert_tiles_day(&result);
    }

    #[test]
    fn input_order_does_not_matter() {
        let forward = merge(&day(&[
            (5, SlotState::Off),
            (6, SlotState::Off),
            (20, SlotState::OffFirstHalf),
        ]));
        let mut reversed = day(&[(5, SlotState::Off), (6, SlotState::Off), (20, SlotState::OffFirstHalf)]);
        reversed.slots.reverse();

        assert_eq!(forward, merge(&reversed));
    }

    #[test]
    fn full_light_and_full_outage_days() {
        let light = merge(&day(&[(1, SlotState::Light), (24, SlotState::Light)]));
        assert_eq!(light, vec![Interval::power(0, MINUTES_PER_DAY)]);

        let cells: Vec<(i64, SlotState)> = (1..=24).map(|h| (h, SlotState::Off)).collect();
        let dark = merge(&day(&cells));
        assert_eq!(dark, vec![Interval::outage(0, MINUTES_PER_DAY)]);
    }

    #[test]
    fn no_two_outages_touch_for_every_alternating_pattern() {
        let states = [
            SlotState::Light,
            SlotState::Off,
            SlotState::OffFirstHalf,
            SlotState::OffSecondHalf,
        ];
        for seed in 0..64usize {
            let cells: Vec<(i64, SlotState)> = (1..=24)
                .map(|h| (h, states[(seed * 7 + h as usize * (seed % 5 + 1)) % 4]))
                .collect();
            let result = merge(&day(&cells));
            let outages: Vec<&Interval> = result.iter().filter(|i| i.is_outage()).collect();
            for pair in outages.windows(2) {
                assert!(pair[0].end < pair[1].start, "seed {seed}: {pair:?}");
            }
            assert_tiles_day(&result);
        }
    }
}
