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

//! Agentreplay Trace Engine
//!
//! Groups the tool calls of a coding agent into traces: bounded, causally
//! related sequences that represent one unit of work. Each trace is:
//! - **Bounded** by temporal, directory and causal locality rules
//! - **Classified** by intent from its tool-name sequence
//! - **Scored** for importance in `[0, 1]`
//! - **Compressed** into a compact record once it is old
//!
//! # Architecture
//!
//! ```text
//! ┌──────────────────────────────────────────────────────────────┐
//! │                       TraceDetector                          │
//! │                                                              │
//! │  ToolCall ──▶ BoundaryState ──▶ closed segment               │
//! │               (advance)              │                       │
//! │                                      ▼                       │
//! │       extract_metadata ─▶ classify ─▶ score ─▶ summarize     │
//! │                                                  │           │
//! │                                                  ▼           │
//! │                         compress_if_older ─▶ TraceStore      │
//! └──────────────────────────────────────────────────────────────┘
//! ```
//!
//! The engine is synchronous and in-memory. One detector serves one
//! ingestion stream; [`TraceSessionRegistry`] keeps one per session.
//!
//! # Example
//!
//! ```rust,ignore
//! use agentreplay_traces::{ToolCall, ToolWeightScorer, TraceBoundaryConfig, TraceDetector};
//! use std::sync::Arc;
//!
//! let mut detector = TraceDetector::new(
//!     TraceBoundaryConfig::default(),
//!     Arc::new(ToolWeightScorer::default()),
//! )?;
//!
//! detector.add_tool_call(ToolCall::new("grep", 1_000).with_file("src/lib.rs"));
//! detector.add_tool_call(ToolCall::new("edit", 2_000).with_file("src/lib.rs"));
//! detector.flush();
//!
//! for trace in detector.get_high_importance_traces(0.3) {
//!     println!("{} {:.2} {}", trace.trace_type, trace.score, trace.summary);
//! }
//! ```

pub mod boundary;
pub mod classifier;
pub mod compression;
pub mod config;
pub mod detector;
pub mod error;
pub mod metadata;
pub mod registry;
pub mod scoring;
pub mod store;
pub mod summary;
pub mod tool_call;
pub mod trace;

// Re-exports
pub use boundary::{BoundaryDecision, BoundaryState, SplitReason};
pub use classifier::{PatternStep, TraceClassifier, TracePattern};
pub use config::{TraceBoundaryConfig, TraceEngineConfig};
pub use detector::TraceDetector;
pub use error::{TraceError, TraceResult};
pub use registry::TraceSessionRegistry;
pub use scoring::{
    ImportanceScorer, ScoringError, ScoringFactors, ScoringWeights, ToolWeightScorer,
};
pub use store::{TraceExport, TraceFilter, TraceStatistics, TraceStore};
pub use tool_call::{ToolCall, ToolCallId, ToolKind};
pub use trace::{CompressedTrace, Trace, TraceId, TraceMetadata, TraceType};
