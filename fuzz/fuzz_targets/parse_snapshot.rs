#![no_main]

use agelog_core::extract::{FieldExtractor, ProjectionFields, project_issue};
use agelog_core::source::parse_snapshot;
use libfuzzer_sys::fuzz_target;

// Arbitrary text must load or fail cleanly, and every loaded record must
// project without panicking.
fuzz_target!(|data: &[u8]| {
    let Ok(text) = std::str::from_utf8(data) else {
        return;
    };
    let Ok((issues, report)) = parse_snapshot(text) else {
        return;
    };
    assert_eq!(issues.len(), report.loaded);

    let fields = ProjectionFields::default();
    for issue in &issues {
        let row = project_issue(issue, &FieldExtractor::ALL, &fields);
        assert_eq!(row.len(), FieldExtractor::ALL.len());
    }
});
