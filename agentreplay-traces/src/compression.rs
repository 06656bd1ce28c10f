// Copyright 2025 AgentReplay (https://github.com/agentreplay)
//
// This program is free software: you can redistribute it and/or modify
// it under the terms of the GNU Affero General Public License as published by
// the Free Software Foundation, either version 3 of the License, or
// (at your option) any later version.
//
// This program is distributed in the hope that it will be useful,
// but WITHOUT ANY WARRANTY; without even the implied warranty of
// MERCHANTABILITY or FITNESS FOR A PARTICULAR PURPOSE. See the
// GNU Affero General Public License for more details.
//
// You should have received a copy of the GNU Affero General Public License
// along with this program. If not, see <https://www.gnu.org/licenses/>.

//! Age-based trace compression
//!
//! Old traces keep their full record but gain a fixed-size
//! [`CompressedTrace`] projection for long-term storage. A projection is
//! attached at most once.

use crate::summary::tool_chain;
use crate::trace::{CompressedTrace, Trace};

const MS_PER_HOUR: f64 = 3_600_000.0;

/// Age of a trace in hours, measured from its first tool call.
pub fn age_hours(trace: &Trace, now_ms: i64) -> f64 {
    now_ms.saturating_sub(trace.metadata.start_time) as f64 / MS_PER_HOUR
}

/// Lossy projection of a trace.
pub fn project(trace: &Trace) -> CompressedTrace {
    CompressedTrace {
        pattern: tool_chain(&trace.tools),
        summary: trace.summary.clone(),
        score: trace.score,
        tool_count: trace.tools.len(),
        duration: trace.metadata.duration_ms(),
        timestamp: trace.metadata.start_time,
    }
}

/// Attach the projection if the trace is older than `threshold_hours`.
/// Returns whether the trace was newly compressed. A NaN threshold
/// compresses nothing.
pub fn compress_if_older(trace: &mut Trace, threshold_hours: f64, now_ms: i64) -> bool {
    let older = age_hours(trace, now_ms) > threshold_hours;
    if trace.is_compressed() || !older {
        return false;
    }
    let compressed = project(trace);
    trace.attach_compressed(compressed)
}

/// Maintenance pass over stored traces. Returns the count newly compressed.
pub fn compress_old_traces(traces: &mut [Trace], max_age_hours: f64, now_ms: i64) -> usize {
    traces
        .iter_mut()
        .map(|trace| compress_if_older(trace, max_age_hours, now_ms))
        .filter(|newly_compressed| *newly_compressed)
        .count()
}
