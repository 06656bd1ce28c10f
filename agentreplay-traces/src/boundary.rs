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

//! Trace boundary detection
//!
//! The detector state is an explicit [`BoundaryState`]: the buffered calls of
//! the in-flight trace and the latest ingested timestamp. [`advance`] is the
//! only transition; it consumes one call and returns the segments it closed.
//!
//! Split rules, evaluated against the last buffered call:
//!
//! 1. **Temporal**: gap larger than `time_proximity_ms`.
//! 2. **Spatial** (`same_dir_threshold`): both calls touch files and their
//!    parent directories are disjoint.
//! 3. **Causal** (`causal_relationship`): the last call failed and the new
//!    one is not a fix attempt.
//!
//! After insertion, a buffer that reached `max_trace_size` is closed.
//!
//! Timestamps earlier than the latest one seen are clamped: the gap counts
//! as zero and the latest timestamp never moves backwards.

use crate::config::TraceBoundaryConfig;
use crate::tool_call::ToolCall;
use std::collections::BTreeSet;
use std::path::Path;

/// Why a trace was closed.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SplitReason {
    /// Gap to the previous call exceeded the proximity window
    TimeGap { gap_ms: i64 },
    /// Consecutive calls touched disjoint directories
    DirectoryChange,
    /// Previous call failed and was not followed by a fix attempt
    UnresolvedError,
    /// Buffer reached `max_trace_size`
    MaxSize,
    /// Caller flushed the buffer
    Flush,
}

impl SplitReason {
    pub fn as_str(&self) -> &'static str {
        match self {
            SplitReason::TimeGap { .. } => "time_gap",
            SplitReason::DirectoryChange => "directory_change",
            SplitReason::UnresolvedError => "unresolved_error",
            SplitReason::MaxSize => "max_size",
            SplitReason::Flush => "flush",
        }
    }

    /// Gap that caused a temporal split.
    pub fn gap_ms(&self) -> Option<i64> {
        match self {
            SplitReason::TimeGap { gap_ms } => Some(*gap_ms),
            _ => None,
        }
    }
}

/// Outcome of the split check for one incoming call.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum BoundaryDecision {
    Extend,
    Split(SplitReason),
}

/// Tool calls closed into one trace.
#[derive(Debug, Clone, PartialEq)]
pub struct ClosedSegment {
    pub tools: Vec<ToolCall>,
    pub reason: SplitReason,
}

/// In-flight detector state.
#[derive(Debug, Clone, Default)]
pub struct BoundaryState {
    active: Vec<ToolCall>,
    last_timestamp: Option<i64>,
}

impl BoundaryState {
    pub fn new() -> Self {
        Self::default()
    }

    /// Buffered calls of the active trace.
    pub fn active(&self) -> &[ToolCall] {
        &self.active
    }

    pub fn len(&self) -> usize {
        self.active.len()
    }

    pub fn is_empty(&self) -> bool {
        self.active.is_empty()
    }

    /// Latest timestamp ingested so far.
    pub fn last_timestamp(&self) -> Option<i64> {
        self.last_timestamp
    }

    /// Close the active buffer, if any.
    pub fn drain(&mut self) -> Option<Vec<ToolCall>> {
        if self.active.is_empty() {
            None
        } else {
            Some(std::mem::take(&mut self.active))
        }
    }

    fn push(&mut self, tool: ToolCall) {
        let ts = tool.timestamp;
        self.last_timestamp = Some(self.last_timestamp.map_or(ts, |last| last.max(ts)));
        self.active.push(tool);
    }
}

/// Consume one call. Returns the segments closed by it.
pub fn advance(
    state: &mut BoundaryState,
    config: &TraceBoundaryConfig,
    tool: ToolCall,
) -> Vec<ClosedSegment> {
    let mut closed = Vec::new();

    if let Some(last_tool) = state.active.last() {
        let decision = should_start_new_trace(config, &tool, last_tool, state.last_timestamp);
        if let BoundaryDecision::Split(reason) = decision {
            tracing::debug!(
                reason = reason.as_str(),
                gap_ms = ?reason.gap_ms(),
                tool = %tool.tool,
                buffered = state.active.len(),
                "Trace boundary detected"
            );
            if let Some(tools) = state.drain() {
                closed.push(ClosedSegment { tools, reason });
            }
        }
    }

    state.push(tool);

    if state.active.len() >= config.max_trace_size {
        tracing::debug!(
            max_trace_size = config.max_trace_size,
            "Trace reached maximum size"
        );
        if let Some(tools) = state.drain() {
            closed.push(ClosedSegment {
                tools,
                reason: SplitReason::MaxSize,
            });
        }
    }

    closed
}

/// Decide whether `tool` starts a new trace after `last_tool`.
///
/// `last_timestamp` is the latest timestamp ingested so far; the temporal gap
/// is measured from it and clamped at zero.
pub fn should_start_new_trace(
    config: &TraceBoundaryConfig,
    tool: &ToolCall,
    last_tool: &ToolCall,
    last_timestamp: Option<i64>,
) -> BoundaryDecision {
    let reference = last_timestamp.unwrap_or(last_tool.timestamp);
    let raw_gap = tool.timestamp.saturating_sub(reference);
    if raw_gap < 0 {
        tracing::warn!(
            tool = %tool.tool,
            timestamp = tool.timestamp,
            last_timestamp = reference,
            "Out-of-order tool call timestamp, clamping gap to zero"
        );
    }
    let gap_ms = raw_gap.max(0);
    let window = i64::try_from(config.time_proximity_ms).unwrap_or(i64::MAX);
    if gap_ms > window {
        return BoundaryDecision::Split(SplitReason::TimeGap { gap_ms });
    }

    if config.same_dir_threshold
        && !last_tool.files_affected.is_empty()
        && !tool.files_affected.is_empty()
    {
        let previous_dirs = parent_directories(&last_tool.files_affected);
        let current_dirs = parent_directories(&tool.files_affected);
        if previous_dirs.is_disjoint(&current_dirs) {
            return BoundaryDecision::Split(SplitReason::DirectoryChange);
        }
    }

    if config.causal_relationship && last_tool.is_failed() && !is_fix_attempt(tool, last_tool) {
        return BoundaryDecision::Split(SplitReason::UnresolvedError);
    }

    BoundaryDecision::Extend
}

/// An edit/write after a failure, or any test/shell execution.
pub fn is_fix_attempt(current: &ToolCall, previous: &ToolCall) -> bool {
    let kind = current.kind();
    (previous.is_failed() && kind.is_modification()) || kind.is_execution()
}

/// Parent directories of a set of file paths. A bare file name maps to `.`.
pub fn parent_directories(files: &[String]) -> BTreeSet<String> {
    files
        .iter()
        .map(|file| {
            Path::new(file)
                .parent()
                .map(|dir| dir.to_string_lossy().into_owned())
                .filter(|dir| !dir.is_empty())
                .unwrap_or_else(|| ".".to_string())
        })
        .collect()
}
