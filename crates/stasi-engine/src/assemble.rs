// SPDX-License-Identifier: MIT OR Apache-2.0

#![forbid(unsafe_code)]

use stasi_core::{Breakpoints, LevelStats, SegmentRow, StateAssignment};

/// Collapses consecutive same-state segments into segment-table rows.
pub fn assemble_segment_table(
    breakpoints: &Breakpoints,
    assignment: &StateAssignment,
    stats: &LevelStats,
) -> Vec<SegmentRow> {
    let points = breakpoints.as_slice();
    let mut rows: Vec<SegmentRow> = Vec::new();

    for (segment, pair) in points.windows(2).enumerate() {
        let state = assignment.state_of(segment);
        match rows.last_mut() {
            Some(row) if row.state == state => row.stop = pair[1],
            _ => rows.push(SegmentRow {
                start: pair[0],
                stop: pair[1],
                median: stats.median(state),
                sdev: stats.sdev(state),
                state,
            }),
        }
    }

    rows
}
