use chrono::{DateTime, Utc};

/// Drops notifications older than an optional cutoff.
///
/// The comparison is inclusive: an event exactly at `since` is kept, so
/// re-polling with the last seen timestamp never loses that event. The
/// price is a possible duplicate across polls.
#[derive(Debug, Clone, Copy, Default)]
pub struct RecencyFilter {
    since: Option<DateTime<Utc>>,
}

impl RecencyFilter {
    pub fn new(since: Option<DateTime<Utc>>) -> Self {
        Self { since }
    }

    pub fn since(&self) -> Option<DateTime<Utc>> {
        self.since
    }

    pub fn keep(&self, timestamp: DateTime<Utc>) -> bool {
        keep(timestamp, self.since)
    }
}

pub fn keep(timestamp: DateTime<Utc>, since: Option<DateTime<Utc>>) -> bool {
    since.map_or(true, |cutoff| timestamp >= cutoff)
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::{Duration, TimeZone};

    #[test]
    fn test_no_cutoff_keeps_everything() {
        let ts = Utc.with_ymd_and_hms(1999, 1, 1, 0, 0, 0).unwrap();
        assert!(RecencyFilter::default().keep(ts));
    }

    #[test]
    fn test_cutoff_is_inclusive() {
        let cutoff = Utc.with_ymd_and_hms(2024, 6, 1, 0, 0, 0).unwrap();
        let filter = RecencyFilter::new(Some(cutoff));

        assert!(filter.keep(cutoff));
        assert!(filter.keep(cutoff + Duration::seconds(1)));
        assert!(!filter.keep(cutoff - Duration::seconds(1)));
        assert!(!filter.keep(Utc.with_ymd_and_hms(2024, 5, 1, 0, 0, 0).unwrap()));
    }
}
