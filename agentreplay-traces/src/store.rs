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

//! In-memory trace store and query API
//!
//! Traces are kept in creation order. The store never evicts on its own;
//! long-running callers export and then [`TraceStore::take_all`].

use crate::compression;
use crate::error::TraceResult;
use crate::trace::{Trace, TraceId, TraceType};
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;

/// Score at or above which a trace counts as high importance in statistics.
pub const HIGH_IMPORTANCE_THRESHOLD: f64 = 0.7;

/// Export format version.
pub const EXPORT_VERSION: u32 = 1;

/// Filter for querying traces.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct TraceFilter {
    /// Filter by trace types (any match).
    pub types: Option<Vec<TraceType>>,
    /// Minimum score (inclusive).
    pub min_score: Option<f64>,
    /// Only compressed (`true`) or only uncompressed (`false`) traces.
    pub compressed: Option<bool>,
    /// Start time range start (inclusive, ms).
    pub time_start: Option<i64>,
    /// Start time range end (exclusive, ms).
    pub time_end: Option<i64>,
    /// Trace touched this file.
    pub file: Option<String>,
    /// Maximum number of results.
    pub limit: Option<usize>,
}

impl TraceFilter {
    pub fn new() -> Self {
        Self::default()
    }

    /// Filter by types.
    pub fn types(mut self, types: Vec<TraceType>) -> Self {
        self.types = Some(types);
        self
    }

    /// Filter by minimum score.
    pub fn min_score(mut self, score: f64) -> Self {
        self.min_score = Some(score);
        self
    }

    /// Filter by compression state.
    pub fn compressed(mut self, compressed: bool) -> Self {
        self.compressed = Some(compressed);
        self
    }

    /// Filter by start time range.
    pub fn time_range(mut self, start: i64, end: i64) -> Self {
        self.time_start = Some(start);
        self.time_end = Some(end);
        self
    }

    /// Filter by touched file.
    pub fn file(mut self, path: impl Into<String>) -> Self {
        self.file = Some(path.into());
        self
    }

    /// Set limit.
    pub fn limit(mut self, limit: usize) -> Self {
        self.limit = Some(limit);
        self
    }

    /// Check if a trace matches this filter (ignores `limit`).
    pub fn matches(&self, trace: &Trace) -> bool {
        if let Some(types) = &self.types {
            if !types.contains(&trace.trace_type) {
                return false;
            }
        }

        if let Some(min_score) = self.min_score {
            if trace.score < min_score {
                return false;
            }
        }

        if let Some(compressed) = self.compressed {
            if trace.is_compressed() != compressed {
                return false;
            }
        }

        if let Some(start) = self.time_start {
            if trace.metadata.start_time < start {
                return false;
            }
        }

        if let Some(end) = self.time_end {
            if trace.metadata.start_time >= end {
                return false;
            }
        }

        if let Some(file) = &self.file {
            if !trace.metadata.files_modified.contains(file) {
                return false;
            }
        }

        true
    }
}

/// Aggregate statistics over the store.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct TraceStatistics {
    pub total_traces: usize,
    pub traces_by_type: BTreeMap<TraceType, usize>,
    pub average_score: f64,
    pub average_tool_count: f64,
    pub compressed_count: usize,
    /// Traces scoring at least [`HIGH_IMPORTANCE_THRESHOLD`]
    pub high_importance_count: usize,
}

/// Serializable snapshot of the store.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TraceExport {
    pub version: u32,
    pub exported_at: DateTime<Utc>,
    /// Traces in creation order
    pub traces: Vec<Trace>,
}

impl TraceExport {
    pub fn to_json(&self) -> TraceResult<String> {
        Ok(serde_json::to_string(self)?)
    }

    pub fn to_json_pretty(&self) -> TraceResult<String> {
        Ok(serde_json::to_string_pretty(self)?)
    }
}

/// Ordered collection of finalized traces.
#[derive(Debug, Clone, Default)]
pub struct TraceStore {
    traces: Vec<Trace>,
}

impl TraceStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Append a finalized trace.
    pub fn push(&mut self, trace: Trace) {
        self.traces.push(trace);
    }

    pub fn len(&self) -> usize {
        self.traces.len()
    }

    pub fn is_empty(&self) -> bool {
        self.traces.is_empty()
    }

    /// All traces in creation order.
    pub fn get_traces(&self) -> &[Trace] {
        &self.traces
    }

    pub fn get(&self, id: &TraceId) -> Option<&Trace> {
        self.traces.iter().find(|t| &t.id == id)
    }

    pub fn get_traces_by_type(&self, trace_type: TraceType) -> Vec<&Trace> {
        self.traces
            .iter()
            .filter(|t| t.trace_type == trace_type)
            .collect()
    }

    /// Traces with `score >= threshold`.
    pub fn get_high_importance_traces(&self, threshold: f64) -> Vec<&Trace> {
        self.traces.iter().filter(|t| t.score >= threshold).collect()
    }

    /// Traces matching a filter, in creation order.
    pub fn query(&self, filter: &TraceFilter) -> Vec<&Trace> {
        let matching = self.traces.iter().filter(|t| filter.matches(t));
        match filter.limit {
            Some(limit) => matching.take(limit).collect(),
            None => matching.collect(),
        }
    }

    pub fn get_statistics(&self) -> TraceStatistics {
        let total = self.traces.len();
        if total == 0 {
            return TraceStatistics::default();
        }

        let mut stats = TraceStatistics {
            total_traces: total,
            ..Default::default()
        };
        let mut score_sum = 0.0;
        let mut tool_sum = 0usize;

        for trace in &self.traces {
            *stats.traces_by_type.entry(trace.trace_type).or_insert(0) += 1;
            score_sum += trace.score;
            tool_sum += trace.tools.len();
            if trace.is_compressed() {
                stats.compressed_count += 1;
            }
            if trace.score >= HIGH_IMPORTANCE_THRESHOLD {
                stats.high_importance_count += 1;
            }
        }

        stats.average_score = score_sum / total as f64;
        stats.average_tool_count = tool_sum as f64 / total as f64;
        stats
    }

    pub fn export_traces(&self) -> TraceExport {
        TraceExport {
            version: EXPORT_VERSION,
            exported_at: Utc::now(),
            traces: self.traces.clone(),
        }
    }

    /// Compress every trace older than `age_hours`; returns the count newly
    /// compressed.
    pub fn compress_old_traces(&mut self, age_hours: f64, now_ms: i64) -> usize {
        compression::compress_old_traces(&mut self.traces, age_hours, now_ms)
    }

    /// Remove and return all traces.
    pub fn take_all(&mut self) -> Vec<Trace> {
        std::mem::take(&mut self.traces)
    }
}
