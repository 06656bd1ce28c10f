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

//! End-to-end tests for the trace detector

use agentreplay_traces::{
    ImportanceScorer, ScoringError, ScoringFactors, ToolCall, ToolWeightScorer,
    TraceBoundaryConfig, TraceDetector, TraceExport, TraceFilter, TraceType,
};
use std::sync::Arc;

const HOUR: i64 = 3_600_000;
const NOW: i64 = 1_730_800_800_000; // Nov 2024

/// Returns the same score for every tool.
struct FixedScorer(f64);

impl ImportanceScorer for FixedScorer {
    fn calculate_score(&self, _: &str, _: &ScoringFactors) -> Result<f64, ScoringError> {
        Ok(self.0)
    }
}

/// Looks scores up by tool name.
struct NamedScorer(Vec<(&'static str, f64)>);

impl ImportanceScorer for NamedScorer {
    fn calculate_score(&self, tool: &str, _: &ScoringFactors) -> Result<f64, ScoringError> {
        self.0
            .iter()
            .find(|(name, _)| *name == tool)
            .map(|(_, score)| *score)
            .ok_or_else(|| ScoringError::Failed(format!("no score for {tool}")))
    }
}

struct UnavailableScorer;

impl ImportanceScorer for UnavailableScorer {
    fn calculate_score(&self, _: &str, _: &ScoringFactors) -> Result<f64, ScoringError> {
        Err(ScoringError::Unavailable("connection refused".to_string()))
    }
}

struct NanScorer;

impl ImportanceScorer for NanScorer {
    fn calculate_score(&self, _: &str, _: &ScoringFactors) -> Result<f64, ScoringError> {
        Ok(f64::NAN)
    }
}

fn detector(config: TraceBoundaryConfig, scorer: impl ImportanceScorer + 'static) -> TraceDetector {
    TraceDetector::new(config, Arc::new(scorer)).unwrap()
}

fn ingest(detector: &mut TraceDetector, calls: Vec<ToolCall>) {
    for call in calls {
        detector.add_tool_call_at(call, NOW);
    }
    detector.flush_at(NOW);
}

#[test]
fn test_temporal_split() {
    let mut detector = detector(TraceBoundaryConfig::temporal_only(), FixedScorer(0.3));
    ingest(
        &mut detector,
        vec![
            ToolCall::new("read", NOW),
            ToolCall::new("edit", NOW + 30_000),
            ToolCall::new("bash", NOW + 60_001),
        ],
    );

    let traces = detector.get_traces();
    assert_eq!(traces.len(), 2);
    assert_eq!(traces[0].tool_names(), vec!["read", "edit"]);
    assert_eq!(traces[1].tool_names(), vec!["bash"]);
}

#[test]
fn test_max_size_split() {
    let mut detector = detector(TraceBoundaryConfig::default(), FixedScorer(0.3));
    let calls = (0..51).map(|i| ToolCall::new("read", NOW + i * 100)).collect();
    ingest(&mut detector, calls);

    let counts: Vec<usize> = detector
        .get_traces()
        .iter()
        .map(|t| t.tool_count())
        .collect();
    assert_eq!(counts, vec![50, 1]);
}

#[test]
fn test_causal_bonus_ordering() {
    let mut with_error = detector(TraceBoundaryConfig::default(), FixedScorer(0.5));
    ingest(
        &mut with_error,
        vec![
            ToolCall::new("bash", NOW).with_error("exit status 1"),
            ToolCall::new("edit", NOW + 1_000),
        ],
    );

    let mut edit_only = detector(TraceBoundaryConfig::default(), FixedScorer(0.5));
    ingest(&mut edit_only, vec![ToolCall::new("edit", NOW + 1_000)]);

    let recovered = &with_error.get_traces()[0];
    let plain = &edit_only.get_traces()[0];
    assert_eq!(recovered.tool_count(), 2);
    assert!(recovered.metadata.causal_chain);
    assert!(recovered.score > plain.score);
    assert!((recovered.score - 0.6).abs() < 1e-9);
    assert!((plain.score - 0.5).abs() < 1e-9);
}

#[test]
fn test_unresolved_error_penalty() {
    let config = TraceBoundaryConfig::default().with_causal_relationship(false);
    let mut detector = detector(config, FixedScorer(0.5));
    ingest(
        &mut detector,
        vec![
            ToolCall::new("bash", NOW).with_error("boom"),
            ToolCall::new("read", NOW + 10),
        ],
    );

    let trace = &detector.get_traces()[0];
    assert!(!trace.metadata.causal_chain);
    assert!((trace.score - 0.4).abs() < 1e-9);
}

#[test]
fn test_compression_at_creation() {
    let mut detector = detector(TraceBoundaryConfig::temporal_only(), FixedScorer(0.3));
    ingest(
        &mut detector,
        vec![
            ToolCall::new("read", NOW - 25 * HOUR),
            ToolCall::new("edit", NOW - 25 * HOUR + 500),
            ToolCall::new("read", NOW),
        ],
    );

    let traces = detector.get_traces();
    assert_eq!(traces.len(), 2);

    let old = traces[0].compressed().expect("old trace compressed on creation");
    assert_eq!(old.pattern, "read → edit");
    assert_eq!(old.tool_count, 2);
    assert_eq!(old.duration, 500);
    assert_eq!(old.timestamp, NOW - 25 * HOUR);
    assert_eq!(old.summary, traces[0].summary);

    assert!(!traces[1].is_compressed());
}

#[test]
fn test_compress_old_traces_is_idempotent() {
    let config =
        TraceBoundaryConfig::temporal_only().with_compression_threshold_hours(1_000.0);
    let mut detector = detector(config, FixedScorer(0.3));
    ingest(
        &mut detector,
        vec![
            ToolCall::new("read", NOW - 48 * HOUR),
            ToolCall::new("read", NOW - 30 * HOUR),
            ToolCall::new("read", NOW - HOUR),
        ],
    );
    assert_eq!(detector.get_statistics().compressed_count, 0);

    assert_eq!(detector.compress_old_traces_at(24.0, NOW), 2);
    assert_eq!(detector.compress_old_traces_at(24.0, NOW), 0);
    assert_eq!(detector.get_statistics().compressed_count, 2);

    let uncompressed = detector.query(&TraceFilter::new().compressed(false));
    assert_eq!(uncompressed.len(), 1);
    assert_eq!(uncompressed[0].metadata.start_time, NOW - HOUR);
}

#[test]
fn test_directory_split() {
    let mut same_dir = detector(TraceBoundaryConfig::default(), FixedScorer(0.3));
    ingest(
        &mut same_dir,
        vec![
            ToolCall::new("edit", NOW).with_file("/src/core/a.ts"),
            ToolCall::new("edit", NOW + 1_000).with_file("/src/core/b.ts"),
        ],
    );
    assert_eq!(same_dir.get_traces().len(), 1);

    let mut other_dir = detector(TraceBoundaryConfig::default(), FixedScorer(0.3));
    ingest(
        &mut other_dir,
        vec![
            ToolCall::new("edit", NOW).with_file("/src/core/a.ts"),
            ToolCall::new("edit", NOW + 1_000).with_file("/src/utils/c.ts"),
        ],
    );
    assert_eq!(other_dir.get_traces().len(), 2);
}

#[test]
fn test_classification_scenarios() {
    let mut search = detector(TraceBoundaryConfig::default(), FixedScorer(0.3));
    ingest(
        &mut search,
        ["search", "grep", "read", "edit"]
            .iter()
            .enumerate()
            .map(|(i, name)| ToolCall::new(*name, NOW + i as i64 * 100))
            .collect(),
    );
    assert_eq!(search.get_traces().len(), 1);
    assert_eq!(search.get_traces()[0].trace_type, TraceType::SearchDriven);

    let mut recovery = detector(TraceBoundaryConfig::default(), FixedScorer(0.3));
    ingest(
        &mut recovery,
        vec![
            ToolCall::new("bash", NOW).with_error("cargo test failed"),
            ToolCall::new("edit", NOW + 100),
            ToolCall::new("bash", NOW + 200),
        ],
    );
    let traces = recovery.get_traces();
    assert_eq!(traces.len(), 1);
    assert_eq!(traces[0].trace_type, TraceType::ErrorRecovery);
    assert!(traces[0].metadata.causal_chain);
    assert_eq!(
        traces[0].summary,
        "Recovered from error \"cargo test failed\": bash → edit → bash"
    );
    assert_eq!(recovery.get_traces_by_type(TraceType::ErrorRecovery).len(), 1);
    assert!(recovery.get_traces_by_type(TraceType::Testing).is_empty());
}

#[test]
fn test_high_importance_filter() {
    let scorer = NamedScorer(vec![("alpha", 0.38), ("beta", 0.26)]);
    let mut detector = detector(TraceBoundaryConfig::temporal_only(), scorer);
    ingest(
        &mut detector,
        vec![ToolCall::new("alpha", NOW), ToolCall::new("beta", NOW + HOUR)],
    );

    let important = detector.get_high_importance_traces(0.3);
    assert_eq!(important.len(), 1);
    assert_eq!(important[0].tool_names(), vec!["alpha"]);
    assert!((important[0].score - 0.38).abs() < 1e-9);
}

#[test]
fn test_scorer_failure_does_not_break_segmentation() {
    let mut detector = detector(TraceBoundaryConfig::temporal_only(), UnavailableScorer);
    ingest(
        &mut detector,
        vec![
            ToolCall::new("read", NOW),
            ToolCall::new("edit", NOW + 100),
            ToolCall::new("read", NOW + HOUR),
        ],
    );

    let traces = detector.get_traces();
    assert_eq!(traces.len(), 2);
    assert!(traces.iter().all(|t| t.score == 0.0));

    let mut nan = self::detector(TraceBoundaryConfig::default(), NanScorer);
    ingest(&mut nan, vec![ToolCall::new("read", NOW)]);
    assert_eq!(nan.get_traces()[0].score, 0.0);
}

#[test]
fn test_flush_is_idempotent() {
    let mut detector = detector(TraceBoundaryConfig::default(), FixedScorer(0.3));
    assert!(!detector.flush_at(NOW));

    detector.add_tool_call_at(ToolCall::new("read", NOW), NOW);
    assert!(detector.flush_at(NOW));
    assert!(!detector.flush_at(NOW));
    assert_eq!(detector.get_traces().len(), 1);
}

#[test]
fn test_out_of_order_timestamps_are_clamped() {
    let config = TraceBoundaryConfig::temporal_only().with_time_proximity_ms(1_000);
    let mut detector = detector(config, FixedScorer(0.3));
    ingest(
        &mut detector,
        vec![
            ToolCall::new("read", NOW + 5_000),
            ToolCall::new("edit", NOW),
            ToolCall::new("bash", NOW + 5_500),
        ],
    );

    let traces = detector.get_traces();
    assert_eq!(traces.len(), 1);
    assert_eq!(traces[0].tool_names(), vec!["read", "edit", "bash"]);
}

#[test]
fn test_empty_statistics() {
    let detector = detector(TraceBoundaryConfig::default(), FixedScorer(0.3));
    let stats = detector.get_statistics();
    assert_eq!(stats.total_traces, 0);
    assert_eq!(stats.average_score, 0.0);
    assert_eq!(stats.average_tool_count, 0.0);
    assert_eq!(stats.compressed_count, 0);
    assert_eq!(stats.high_importance_count, 0);
}

#[test]
fn test_export_round_trip_preserves_order() {
    let mut detector = detector(TraceBoundaryConfig::default(), ToolWeightScorer::default());
    ingest(
        &mut detector,
        vec![
            ToolCall::new("grep", NOW).with_file("src/lib.rs"),
            ToolCall::new("edit", NOW + 100).with_file("src/lib.rs"),
            ToolCall::new("write", NOW + HOUR).with_file("docs/guide.md"),
        ],
    );

    let json = detector.export_traces().to_json_pretty().unwrap();
    let export: TraceExport = serde_json::from_str(&json).unwrap();
    assert_eq!(export.traces.len(), 2);
    assert_eq!(export.traces[0].id, detector.get_traces()[0].id);
    assert_eq!(export.traces[1].id, detector.get_traces()[1].id);
    assert_eq!(export.traces[0].tools, detector.get_traces()[0].tools);
}

#[test]
fn test_default_scorer_ranks_modifications_higher() {
    let mut detector = detector(
        TraceBoundaryConfig::temporal_only(),
        ToolWeightScorer::default(),
    );
    ingest(
        &mut detector,
        vec![
            ToolCall::new("read", NOW).with_file("src/lib.rs"),
            ToolCall::new("edit", NOW + HOUR).with_file("src/lib.rs"),
        ],
    );

    let traces = detector.get_traces();
    assert!(traces[1].score > traces[0].score);
    assert!(traces.iter().all(|t| (0.0..=1.0).contains(&t.score)));
}
