use chrono::{Duration, NaiveDateTime};

/// One mask-on/mask-off interval from the device summary log.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct SessionInterval {
    pub start: NaiveDateTime,
    pub end: NaiveDateTime,
}

impl SessionInterval {
    /// Builds an interval, rejecting anything that does not satisfy
    /// end > start.
    pub fn new(start: NaiveDateTime, end: NaiveDateTime) -> Option<SessionInterval> {
        if end > start {
            Some(SessionInterval { start, end })
        } else {
            None
        }
    }

    pub fn duration_seconds(&self) -> f64 {
        (self.end - self.start).num_milliseconds() as f64 / 1000.0
    }

    pub fn contains(&self, instant: NaiveDateTime) -> bool {
        self.start <= instant && instant <= self.end
    }
}

/// Maximum distance between a candidate start and an interval start for
/// a nearest-neighbor match to be accepted.
pub fn match_tolerance() -> Duration {
    Duration::hours(2)
}

/// Matches one filename-derived session start against the summary log's
/// interval list.
///
/// Containment always wins: the first interval (in input order) that
/// contains the candidate is returned immediately, even when another
/// interval's start is closer. Otherwise the interval with the minimum
/// |candidate - start| wins, and only if that distance is strictly
/// below the two-hour tolerance; else there is no match.
///
/// A linear scan is all this needs: the interval list holds tens of
/// sessions, so no indexing structure is justified.
pub fn match_interval<'a>(
    candidate: NaiveDateTime,
    intervals: &'a [SessionInterval],
) -> Option<&'a SessionInterval> {
    let mut best = None;
    let mut min_distance = match_tolerance();

    for interval in intervals {
        if interval.contains(candidate) {
            return Some(interval);
        }

        let distance = (candidate - interval.start).abs();
        if distance < min_distance {
            min_distance = distance;
            best = Some(interval);
        }
    }

    best
}

/// Positional index of a matched interval within the full list, for
/// correlating into the summary log's column-oriented statistic arrays.
///
/// An interval not found by value equality falls back to index 0. That
/// silently attributes the first session's statistics to the caller's
/// session, so a warning is logged when the fallback engages.
pub fn interval_index(matched: &SessionInterval, intervals: &[SessionInterval]) -> usize {
    match intervals.iter().position(|i| i == matched) {
        Some(index) => index,
        None => {
            log::warn!(
                "interval {} - {} not in summary list, defaulting to index 0",
                matched.start,
                matched.end
            );
            0
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn at(s: &str) -> NaiveDateTime {
        NaiveDateTime::parse_from_str(s, "%Y-%m-%d %H:%M:%S").unwrap()
    }

    fn interval(start: &str, end: &str) -> SessionInterval {
        SessionInterval::new(at(start), at(end)).unwrap()
    }

    #[test]
    fn invalid_intervals_are_rejected() {
        assert!(SessionInterval::new(at("2024-11-27 08:00:00"), at("2024-11-27 08:00:00")).is_none());
        assert!(SessionInterval::new(at("2024-11-27 08:00:00"), at("2024-11-27 07:00:00")).is_none());
    }

    #[test]
    fn containment_beats_a_closer_start() {
        // The candidate sits inside the first interval; the second
        // interval's start is much closer by distance.
        let intervals = vec![
            interval("2024-11-26 22:00:00", "2024-11-27 06:00:00"),
            interval("2024-11-27 05:10:00", "2024-11-27 05:20:00"),
        ];
        let candidate = at("2024-11-27 05:05:00");
        let matched = match_interval(candidate, &intervals).unwrap();
        assert_eq!(matched, &intervals[0]);
    }

    #[test]
    fn nearest_start_within_tolerance_matches() {
        let intervals = vec![
            interval("2024-11-26 22:00:00", "2024-11-26 23:00:00"),
            interval("2024-11-27 04:00:00", "2024-11-27 06:00:00"),
        ];
        // 119 minutes before the second interval's start.
        let matched = match_interval(at("2024-11-27 02:01:00"), &intervals).unwrap();
        assert_eq!(matched, &intervals[1]);
    }

    #[test]
    fn tolerance_cutoff_is_strict() {
        let intervals = vec![interval("2024-11-27 04:00:00", "2024-11-27 06:00:00")];
        // 119 minutes away: match. 121 minutes away: no match.
        assert!(match_interval(at("2024-11-27 02:01:00"), &intervals).is_some());
        assert!(match_interval(at("2024-11-27 01:59:00"), &intervals).is_none());
        // Exactly two hours is not strictly below the tolerance.
        assert!(match_interval(at("2024-11-27 02:00:00"), &intervals).is_none());
    }

    #[test]
    fn no_interval_within_three_hours_means_no_match() {
        let intervals = vec![interval("2024-11-27 04:00:00", "2024-11-27 06:00:00")];
        assert!(match_interval(at("2024-11-27 01:00:00"), &intervals).is_none());
    }

    #[test]
    fn index_of_matched_interval() {
        let intervals = vec![
            interval("2024-11-25 22:00:00", "2024-11-26 06:00:00"),
            interval("2024-11-26 22:00:00", "2024-11-27 06:00:00"),
        ];
        assert_eq!(interval_index(&intervals[1], &intervals), 1);

        let stranger = interval("2020-01-01 00:00:00", "2020-01-01 08:00:00");
        assert_eq!(interval_index(&stranger, &intervals), 0);
    }
}
