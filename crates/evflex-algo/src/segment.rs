//! Horizon segmentation.
//!
//! A full-year program per agent is large; splitting the horizon into days,
//! weeks or months bounds each program's size. Segment ends are exclusive
//! step indices; the energy state at the end of one segment seeds the next.

use chrono::Datelike;
use evflex_core::{Event, Horizon, SegmentBoundaries, TimeGrid};

/// Segment ends for a horizon code on a time grid.
///
/// `Full` yields a single boundary at the grid end. Calendar horizons group
/// consecutive grid timestamps by day ordinal, ISO week number or month and
/// emit `index(last timestamp of the group) + 1` for each group.
pub fn plan_boundaries(grid: &TimeGrid, horizon: Horizon) -> SegmentBoundaries {
    let n_steps = grid.n_steps();
    let key = |step: usize| -> i64 {
        let ts = grid.timestamp(step);
        match horizon {
            Horizon::Full => 0,
            Horizon::Day => i64::from(ts.date().num_days_from_ce()),
            Horizon::Week => i64::from(ts.iso_week().week()),
            Horizon::Month => i64::from(ts.month()),
        }
    };
    if horizon == Horizon::Full || n_steps == 0 {
        return SegmentBoundaries::single(n_steps);
    }

    let mut ends = Vec::new();
    let mut current = key(0);
    for step in 1..n_steps {
        let k = key(step);
        if k != current {
            ends.push(step);
            current = k;
        }
    }
    ends.push(n_steps);
    // Keys change at strictly increasing steps, so the ends ascend.
    SegmentBoundaries::new(ends).unwrap_or_else(|_| SegmentBoundaries::single(n_steps))
}

/// Partition one agent's events into one group per segment.
///
/// - An event ending at or before the current boundary stays whole.
/// - An event crossing the boundary is split: the head keeps its start, ends
///   at the boundary and carries no consumption; the tail starts at
///   `boundary + 1`, keeps the original stop and consumption, and opens the
///   next group. Events spanning several boundaries are split repeatedly.
/// - An event starting at or after the boundary moves to the next group.
///
/// Segments without events get an empty group, so the result always has
/// exactly `boundaries.len()` groups.
pub fn split_events(events: &[Event], boundaries: &SegmentBoundaries) -> Vec<Vec<Event>> {
    let ends = boundaries.as_slice();
    let mut groups: Vec<Vec<Event>> = Vec::with_capacity(ends.len());
    let mut current: Vec<Event> = Vec::new();
    let mut seg = 0;

    for event in events {
        let mut piece = *event;
        loop {
            let end = ends[seg];
            let last_segment = seg + 1 == ends.len();
            if piece.stop() <= end || last_segment {
                current.push(piece);
                break;
            }
            if piece.start() < end {
                current.push(piece.with_stop(end).with_consumption(0.0));
                piece = piece.with_start(end + 1);
            }
            groups.push(std::mem::take(&mut current));
            seg += 1;
        }
    }
    groups.push(current);
    groups.resize_with(ends.len(), Vec::new);
    groups
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::{NaiveDate, NaiveDateTime};

    fn ev(start: usize, stop: usize, consumption: f64) -> Event {
        Event::new(start, stop, consumption, 1.0, 7).unwrap()
    }

    fn window(events: &[Event]) -> Vec<(usize, usize, f64)> {
        events
            .iter()
            .map(|e| (e.start(), e.stop(), e.consumption()))
            .collect()
    }

    fn dt(y: i32, m: u32, d: u32) -> NaiveDateTime {
        NaiveDate::from_ymd_opt(y, m, d)
            .unwrap()
            .and_hms_opt(0, 0, 0)
            .unwrap()
    }

    #[test]
    fn straddling_event_splits_at_boundary() {
        let boundaries = SegmentBoundaries::new(vec![100, 200, 300]).unwrap();
        let groups = split_events(&[ev(90, 150, 5.0)], &boundaries);

        assert_eq!(groups.len(), 3);
        assert_eq!(window(&groups[0]), vec![(90, 100, 0.0)]);
        assert_eq!(window(&groups[1]), vec![(101, 150, 5.0)]);
        assert!(groups[2].is_empty());
    }

    #[test]
    fn contained_events_are_kept_unchanged() {
        let boundaries = SegmentBoundaries::new(vec![10, 20]).unwrap();
        let events = vec![ev(0, 4, 1.0), ev(4, 10, 2.0), ev(10, 20, 0.0)];
        let groups = split_events(&events, &boundaries);

        assert_eq!(window(&groups[0]), vec![(0, 4, 1.0), (4, 10, 2.0)]);
        assert_eq!(window(&groups[1]), vec![(10, 20, 0.0)]);
    }

    #[test]
    fn event_starting_on_boundary_moves_to_next_group() {
        let boundaries = SegmentBoundaries::new(vec![10, 20]).unwrap();
        let groups = split_events(&[ev(0, 10, 1.0), ev(10, 15, 2.0)], &boundaries);
        assert_eq!(window(&groups[1]), vec![(10, 15, 2.0)]);
    }

    #[test]
    fn long_event_spanning_whole_segments_is_split_repeatedly() {
        let boundaries = SegmentBoundaries::new(vec![10, 20, 30, 40]).unwrap();
        let groups = split_events(&[ev(0, 5, 1.0), ev(5, 35, 4.0), ev(35, 40, 0.0)], &boundaries);

        assert_eq!(groups.len(), 4);
        assert_eq!(window(&groups[0]), vec![(0, 5, 1.0), (5, 10, 0.0)]);
        assert_eq!(window(&groups[1]), vec![(11, 20, 0.0)]);
        assert_eq!(window(&groups[2]), vec![(21, 30, 0.0)]);
        assert_eq!(window(&groups[3]), vec![(31, 35, 4.0), (35, 40, 0.0)]);
    }

    #[test]
    fn skipped_segments_get_empty_groups_and_pointer_catches_up() {
        // No event starts inside [10, 20) or [20, 30): the next event must
        // still land in the segment that contains it.
        let boundaries = SegmentBoundaries::new(vec![10, 20, 30, 40]).unwrap();
        let groups = split_events(&[ev(0, 10, 1.0), ev(32, 38, 2.0)], &boundaries);

        assert_eq!(groups.len(), 4);
        assert!(groups[1].is_empty());
        assert!(groups[2].is_empty());
        assert_eq!(window(&groups[3]), vec![(32, 38, 2.0)]);
    }

    #[test]
    fn total_consumption_is_preserved() {
        let boundaries = SegmentBoundaries::new(vec![7, 13, 29, 40]).unwrap();
        let events = vec![ev(0, 9, 1.5), ev(9, 25, 2.5), ev(25, 40, 0.75)];
        let groups = split_events(&events, &boundaries);
        let total: f64 = groups.iter().flatten().map(|e| e.consumption()).sum();
        assert!((total - 4.75).abs() < 1e-12);
    }

    #[test]
    fn full_horizon_is_a_single_segment() {
        let grid = TimeGrid::year_2030();
        let boundaries = plan_boundaries(&grid, Horizon::Full);
        assert_eq!(boundaries.as_slice(), &[35_040]);
    }

    #[test]
    fn daily_boundaries_fall_on_midnight() {
        let grid = TimeGrid::new(dt(2030, 1, 1), dt(2030, 1, 4), 900).unwrap();
        let boundaries = plan_boundaries(&grid, Horizon::Day);
        assert_eq!(boundaries.as_slice(), &[96, 192, 288]);
    }

    #[test]
    fn year_has_twelve_months_and_daily_count() {
        let grid = TimeGrid::year_2030();
        let months = plan_boundaries(&grid, Horizon::Month);
        assert_eq!(months.len(), 12);
        assert_eq!(months.as_slice()[0], 31 * 96);
        assert_eq!(months.horizon(), 35_040);

        let days = plan_boundaries(&grid, Horizon::Day);
        assert_eq!(days.len(), 365);
    }

    #[test]
    fn weeks_follow_iso_calendar() {
        // 2030-01-01 is a Tuesday, so ISO week 1 ends on Sunday 2030-01-06.
        let grid = TimeGrid::year_2030();
        let weeks = plan_boundaries(&grid, Horizon::Week);
        assert_eq!(weeks.as_slice()[0], 6 * 96);
        assert_eq!(weeks.horizon(), 35_040);
    }
}
