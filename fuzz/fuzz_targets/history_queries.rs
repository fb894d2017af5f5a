#![no_main]

use agelog_core::model::event::day_start;
use agelog_core::source::parse_snapshot;
use agelog_core::{Aggregator, DateRange, IssueHistory};
use chrono::NaiveDate;
use libfuzzer_sys::fuzz_target;

// Reconstruction over malformed changelogs degrades to absent values; it
// never panics and parallel rollups agree with the sequential one on counts.
fuzz_target!(|data: &[u8]| {
    let Ok(text) = std::str::from_utf8(data) else {
        return;
    };
    let Ok((raw, _)) = parse_snapshot(text) else {
        return;
    };
    let histories: Vec<IssueHistory> = raw.iter().map(IssueHistory::new).collect();

    let Some(start) = NaiveDate::from_ymd_opt(2016, 3, 1) else {
        return;
    };
    let Some(end) = NaiveDate::from_ymd_opt(2016, 3, 14) else {
        return;
    };
    let Ok(range) = DateRange::new(start, end) else {
        return;
    };

    for history in &histories {
        for day in range.days() {
            let at = day_start(day);
            let first = history.age_on(at);
            assert_eq!(first, history.age_on(at));
            if first.is_some() {
                assert!(history.state_on(at).is_some());
            }
        }
    }

    let sequential = Aggregator::new().aggregate(&histories, &range);
    let chunked = Aggregator::with_workers(3).aggregate(&histories, &range);
    for ((d1, a), (d2, b)) in sequential.days().zip(chunked.days()) {
        assert_eq!(d1, d2);
        assert_eq!(a.overall.count, b.overall.count);
    }
    assert_eq!(sequential.header(), chunked.header());
});
