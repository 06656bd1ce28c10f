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

//! Trace detector
//!
//! Owns the boundary state and the trace store of one ingestion stream.
//! Closed segments go through metadata extraction, classification, scoring
//! and summarization before they are stored.
//!
//! A detector is not shared between sessions. Callers that trace several
//! sessions concurrently use one detector per session, see
//! [`crate::registry::TraceSessionRegistry`].

use crate::boundary::{self, BoundaryState, ClosedSegment, SplitReason};
use crate::classifier::TraceClassifier;
use crate::compression;
use crate::config::{TraceBoundaryConfig, TraceEngineConfig};
use crate::error::TraceResult;
use crate::metadata::extract_metadata;
use crate::scoring::{score_trace, ImportanceScorer, ToolWeightScorer};
use crate::store::{TraceExport, TraceFilter, TraceStatistics, TraceStore};
use crate::summary::summarize;
use crate::tool_call::ToolCall;
use crate::trace::{Trace, TraceType};
use std::sync::Arc;

fn now_ms() -> i64 {
    chrono::Utc::now().timestamp_millis()
}

/// Streaming trace detector.
pub struct TraceDetector {
    config: TraceBoundaryConfig,
    classifier: TraceClassifier,
    scorer: Arc<dyn ImportanceScorer>,
    state: BoundaryState,
    store: TraceStore,
}

impl std::fmt::Debug for TraceDetector {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("TraceDetector")
            .field("config", &self.config)
            .field("active", &self.state.len())
            .field("traces", &self.store.len())
            .finish()
    }
}

impl TraceDetector {
    /// Create a detector. Fails if the configuration is invalid.
    pub fn new(
        config: TraceBoundaryConfig,
        scorer: Arc<dyn ImportanceScorer>,
    ) -> TraceResult<Self> {
        config.validate()?;
        Ok(Self::from_validated(config, scorer))
    }

    /// Create a detector scored by a [`ToolWeightScorer`] built from the
    /// engine configuration.
    pub fn from_engine_config(config: TraceEngineConfig) -> TraceResult<Self> {
        config.validate()?;
        let scorer = Arc::new(ToolWeightScorer::new(config.scoring));
        Ok(Self::from_validated(config.boundary, scorer))
    }

    pub(crate) fn from_validated(
        config: TraceBoundaryConfig,
        scorer: Arc<dyn ImportanceScorer>,
    ) -> Self {
        Self {
            config,
            classifier: TraceClassifier::default(),
            scorer,
            state: BoundaryState::new(),
            store: TraceStore::new(),
        }
    }

    /// Replace the default pattern table.
    pub fn with_classifier(mut self, classifier: TraceClassifier) -> Self {
        self.classifier = classifier;
        self
    }

    pub fn config(&self) -> &TraceBoundaryConfig {
        &self.config
    }

    /// Ingest one tool call. Returns the number of traces it finalized.
    pub fn add_tool_call(&mut self, call: ToolCall) -> usize {
        self.add_tool_call_at(call, now_ms())
    }

    /// [`Self::add_tool_call`] with an explicit wall clock, used for the
    /// compression-at-creation age check.
    pub fn add_tool_call_at(&mut self, call: ToolCall, now_ms: i64) -> usize {
        let closed = boundary::advance(&mut self.state, &self.config, call);
        let count = closed.len();
        for segment in closed {
            self.finalize(segment, now_ms);
        }
        count
    }

    /// Finalize the active buffer, if any. Returns whether a trace was produced.
    pub fn flush(&mut self) -> bool {
        self.flush_at(now_ms())
    }

    pub fn flush_at(&mut self, now_ms: i64) -> bool {
        match self.state.drain() {
            Some(tools) => {
                self.finalize(
                    ClosedSegment {
                        tools,
                        reason: SplitReason::Flush,
                    },
                    now_ms,
                );
                true
            }
            None => false,
        }
    }

    /// Number of calls in the in-flight trace.
    pub fn active_len(&self) -> usize {
        self.state.len()
    }

    /// Calls of the in-flight trace.
    pub fn active_tools(&self) -> &[ToolCall] {
        self.state.active()
    }

    fn finalize(&mut self, segment: ClosedSegment, now_ms: i64) {
        let mut trace = self.build_trace(segment.tools);
        let compressed = compression::compress_if_older(
            &mut trace,
            self.config.compression_threshold_hours,
            now_ms,
        );

        tracing::info!(
            trace_id = %trace.id,
            trace_type = %trace.trace_type,
            tool_count = trace.tools.len(),
            score = trace.score,
            reason = segment.reason.as_str(),
            compressed,
            "Trace finalized"
        );

        self.store.push(trace);
    }

    fn build_trace(&self, tools: Vec<ToolCall>) -> Trace {
        let metadata = extract_metadata(&tools);
        let trace_type = self.classifier.classify(&tools);
        let score = score_trace(self.scorer.as_ref(), &tools, &metadata);
        let summary = summarize(trace_type, &tools, &metadata);
        Trace::new(trace_type, tools, score, summary, metadata)
    }

    // ------------------------------------------------------------------------
    // Store access
    // ------------------------------------------------------------------------

    pub fn store(&self) -> &TraceStore {
        &self.store
    }

    /// All finalized traces in creation order.
    pub fn get_traces(&self) -> &[Trace] {
        self.store.get_traces()
    }

    pub fn get_traces_by_type(&self, trace_type: TraceType) -> Vec<&Trace> {
        self.store.get_traces_by_type(trace_type)
    }

    pub fn get_high_importance_traces(&self, threshold: f64) -> Vec<&Trace> {
        self.store.get_high_importance_traces(threshold)
    }

    pub fn query(&self, filter: &TraceFilter) -> Vec<&Trace> {
        self.store.query(filter)
    }

    pub fn get_statistics(&self) -> TraceStatistics {
        self.store.get_statistics()
    }

    pub fn export_traces(&self) -> TraceExport {
        self.store.export_traces()
    }

    /// Compress stored traces older than `age_hours`. Returns the number
    /// newly compressed.
    pub fn compress_old_traces(&mut self, age_hours: f64) -> usize {
        self.compress_old_traces_at(age_hours, now_ms())
    }

    pub fn compress_old_traces_at(&mut self, age_hours: f64, now_ms: i64) -> usize {
        let compressed = self.store.compress_old_traces(age_hours, now_ms);
        tracing::info!(
            age_hours,
            compressed,
            total = self.store.len(),
            "Compression pass complete"
        );
        compressed
    }

    /// Remove and return all finalized traces. The active buffer is kept.
    pub fn take_traces(&mut self) -> Vec<Trace> {
        self.store.take_all()
    }
}
