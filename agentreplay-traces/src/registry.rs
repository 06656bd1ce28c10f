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

//! Per-session detectors.
//!
//! Each session owns one [`TraceDetector`] behind its own mutex, so calls for
//! different sessions never contend on detector state. Detectors are created
//! lazily on the first call recorded for a session.

use crate::config::TraceBoundaryConfig;
use crate::detector::TraceDetector;
use crate::error::TraceResult;
use crate::scoring::ImportanceScorer;
use crate::tool_call::ToolCall;
use crate::trace::Trace;
use parking_lot::{Mutex, RwLock};
use std::collections::HashMap;
use std::sync::Arc;

/// Registry of trace detectors keyed by session ID.
pub struct TraceSessionRegistry {
    config: TraceBoundaryConfig,
    scorer: Arc<dyn ImportanceScorer>,
    sessions: RwLock<HashMap<String, Arc<Mutex<TraceDetector>>>>,
}

impl TraceSessionRegistry {
    /// Create a registry. The configuration is validated once, here.
    pub fn new(
        config: TraceBoundaryConfig,
        scorer: Arc<dyn ImportanceScorer>,
    ) -> TraceResult<Self> {
        config.validate()?;
        Ok(Self {
            config,
            scorer,
            sessions: RwLock::new(HashMap::new()),
        })
    }

    fn detector(&self, session_id: &str) -> Arc<Mutex<TraceDetector>> {
        if let Some(detector) = self.sessions.read().get(session_id) {
            return detector.clone();
        }

        let mut sessions = self.sessions.write();
        sessions
            .entry(session_id.to_string())
            .or_insert_with(|| {
                tracing::debug!(session_id = %session_id, "Creating trace detector");
                Arc::new(Mutex::new(TraceDetector::from_validated(
                    self.config.clone(),
                    self.scorer.clone(),
                )))
            })
            .clone()
    }

    /// Record a tool call for a session. Returns the number of traces finalized.
    pub fn record(&self, session_id: &str, call: ToolCall) -> usize {
        self.detector(session_id).lock().add_tool_call(call)
    }

    pub fn record_at(&self, session_id: &str, call: ToolCall, now_ms: i64) -> usize {
        self.detector(session_id).lock().add_tool_call_at(call, now_ms)
    }

    /// Flush one session. Returns `false` for unknown sessions or empty buffers.
    pub fn flush(&self, session_id: &str) -> bool {
        let detector = self.sessions.read().get(session_id).cloned();
        detector.map_or(false, |d| d.lock().flush())
    }

    /// Flush every session. Returns the number of traces produced.
    pub fn flush_all(&self) -> usize {
        let detectors: Vec<_> = self.sessions.read().values().cloned().collect();
        detectors.iter().filter(|d| d.lock().flush()).count()
    }

    /// Run `f` against a session's detector, if the session exists.
    pub fn with_detector<R>(
        &self,
        session_id: &str,
        f: impl FnOnce(&mut TraceDetector) -> R,
    ) -> Option<R> {
        let detector = self.sessions.read().get(session_id).cloned()?;
        let mut guard = detector.lock();
        Some(f(&mut guard))
    }

    /// Remove a session, flushing it first. Returns its traces.
    pub fn remove(&self, session_id: &str) -> Option<Vec<Trace>> {
        let detector = self.sessions.write().remove(session_id)?;
        let mut guard = detector.lock();
        guard.flush();
        tracing::debug!(
            session_id = %session_id,
            traces = guard.get_traces().len(),
            "Removed trace session"
        );
        Some(guard.take_traces())
    }

    /// Known session IDs, sorted.
    pub fn sessions(&self) -> Vec<String> {
        let mut ids: Vec<String> = self.sessions.read().keys().cloned().collect();
        ids.sort();
        ids
    }

    pub fn len(&self) -> usize {
        self.sessions.read().len()
    }

    pub fn is_empty(&self) -> bool {
        self.sessions.read().is_empty()
    }
}
