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

//! Trace importance scoring
//!
//! Per-call base scores come from an injected [`ImportanceScorer`]. The trace
//! score is the maximum base score, adjusted by structural bonuses and
//! penalties:
//!
//! | Adjustment                                  | Delta            |
//! |---------------------------------------------|------------------|
//! | causal chain present                        | +0.10            |
//! | each recorded decision                      | +0.05            |
//! | errors without a causal chain               | -0.10            |
//!
//! A failing scorer never breaks segmentation: the affected call scores
//! [`DEFAULT_FAILED_SCORE`] and a warning is logged.

use crate::error::{TraceError, TraceResult};
use crate::tool_call::{ToolCall, ToolKind};
use crate::trace::TraceMetadata;
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use thiserror::Error;

/// Bonus applied when an error was followed by a fix attempt.
pub const CAUSAL_CHAIN_BONUS: f64 = 0.1;
/// Bonus per recorded decision.
pub const DECISION_BONUS: f64 = 0.05;
/// Penalty for errors with no recovery evidence.
pub const UNRESOLVED_ERROR_PENALTY: f64 = 0.1;
/// Score substituted when the scorer fails.
pub const DEFAULT_FAILED_SCORE: f64 = 0.0;

/// Failure reported by an importance scorer.
#[derive(Debug, Error)]
pub enum ScoringError {
    #[error("Scoring service unavailable: {0}")]
    Unavailable(String),

    #[error("Scoring failed: {0}")]
    Failed(String),
}

/// Context passed to the scorer for one tool call.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct ScoringFactors {
    pub files_affected: Option<usize>,
    pub is_permanent: Option<bool>,
    pub reference_count: Option<u32>,
}

impl ScoringFactors {
    /// Factors for a tool call. References are not tracked by the engine.
    pub fn for_call(call: &ToolCall) -> Self {
        Self {
            files_affected: Some(call.files_affected.len()),
            is_permanent: Some(call.kind().is_permanent()),
            reference_count: Some(0),
        }
    }
}

/// Converts a tool name plus context into a base importance score.
///
/// Implementations must return values in `[0, 1]` and be deterministic for
/// identical inputs.
pub trait ImportanceScorer: Send + Sync {
    fn calculate_score(&self, tool_name: &str, factors: &ScoringFactors)
        -> Result<f64, ScoringError>;
}

/// Base score of one call, with scorer failures and out-of-range values absorbed.
pub fn tool_score(scorer: &dyn ImportanceScorer, call: &ToolCall) -> f64 {
    let factors = ScoringFactors::for_call(call);
    match scorer.calculate_score(&call.tool, &factors) {
        Ok(score) if score.is_finite() => score.clamp(0.0, 1.0),
        Ok(score) => {
            tracing::warn!(
                tool = %call.tool,
                call_id = %call.id,
                score,
                "Scorer returned a non-finite score, using default"
            );
            DEFAULT_FAILED_SCORE
        }
        Err(e) => {
            tracing::warn!(
                tool = %call.tool,
                call_id = %call.id,
                error = %e,
                "Scorer failed, using default score"
            );
            DEFAULT_FAILED_SCORE
        }
    }
}

/// Trace-level score in `[0, 1]`.
pub fn score_trace(
    scorer: &dyn ImportanceScorer,
    tools: &[ToolCall],
    metadata: &TraceMetadata,
) -> f64 {
    let mut score = tools
        .iter()
        .map(|call| tool_score(scorer, call))
        .fold(0.0_f64, f64::max);

    if metadata.causal_chain {
        score = (score + CAUSAL_CHAIN_BONUS).min(1.0);
    }

    let decisions = metadata.decisions_recorded.len() as f64;
    score = (score + DECISION_BONUS * decisions).min(1.0);

    if !metadata.errors_encountered.is_empty() && !metadata.causal_chain {
        score = (score - UNRESOLVED_ERROR_PENALTY).max(0.0);
    }

    score.clamp(0.0, 1.0)
}

// ============================================================================
// Default scorer
// ============================================================================

/// Weight table for [`ToolWeightScorer`].
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ScoringWeights {
    /// Base weight per tool kind (keyed by [`ToolKind::as_str`])
    #[serde(default = "default_kind_weights")]
    pub kind_weights: BTreeMap<String, f64>,

    /// Base weight per exact (lowercased) tool name, checked first
    #[serde(default)]
    pub tool_overrides: BTreeMap<String, f64>,

    /// Base weight when neither table knows the tool
    #[serde(default = "default_weight")]
    pub default_weight: f64,

    #[serde(default = "default_per_file_bonus")]
    pub per_file_bonus: f64,

    #[serde(default = "default_max_file_bonus")]
    pub max_file_bonus: f64,

    #[serde(default = "default_permanent_bonus")]
    pub permanent_bonus: f64,

    #[serde(default = "default_per_reference_bonus")]
    pub per_reference_bonus: f64,

    #[serde(default = "default_max_reference_bonus")]
    pub max_reference_bonus: f64,
}

fn default_kind_weights() -> BTreeMap<String, f64> {
    [
        (ToolKind::Edit, 0.5),
        (ToolKind::Write, 0.5),
        (ToolKind::Decision, 0.6),
        (ToolKind::Test, 0.4),
        (ToolKind::Build, 0.45),
        (ToolKind::Deploy, 0.45),
        (ToolKind::Shell, 0.3),
        (ToolKind::Documentation, 0.3),
        (ToolKind::Search, 0.2),
        (ToolKind::Read, 0.15),
        (ToolKind::Other, 0.1),
    ]
    .into_iter()
    .map(|(kind, weight)| (kind.as_str().to_string(), weight))
    .collect()
}

fn default_weight() -> f64 {
    0.1
}

fn default_per_file_bonus() -> f64 {
    0.05
}

fn default_max_file_bonus() -> f64 {
    0.2
}

fn default_permanent_bonus() -> f64 {
    0.15
}

fn default_per_reference_bonus() -> f64 {
    0.02
}

fn default_max_reference_bonus() -> f64 {
    0.1
}

impl Default for ScoringWeights {
    fn default() -> Self {
        Self {
            kind_weights: default_kind_weights(),
            tool_overrides: BTreeMap::new(),
            default_weight: default_weight(),
            per_file_bonus: default_per_file_bonus(),
            max_file_bonus: default_max_file_bonus(),
            permanent_bonus: default_permanent_bonus(),
            per_reference_bonus: default_per_reference_bonus(),
            max_reference_bonus: default_max_reference_bonus(),
        }
    }
}

impl ScoringWeights {
    /// Override the base weight of one tool name.
    pub fn with_override(mut self, tool: impl Into<String>, weight: f64) -> Self {
        self.tool_overrides
            .insert(tool.into().trim().to_lowercase(), weight);
        self
    }

    /// All weights and bonuses must be finite and non-negative.
    pub fn validate(&self) -> TraceResult<()> {
        let named: [(&str, f64); 6] = [
            ("default_weight", self.default_weight),
            ("per_file_bonus", self.per_file_bonus),
            ("max_file_bonus", self.max_file_bonus),
            ("permanent_bonus", self.permanent_bonus),
            ("per_reference_bonus", self.per_reference_bonus),
            ("max_reference_bonus", self.max_reference_bonus),
        ];
        let tables = self
            .kind_weights
            .iter()
            .chain(self.tool_overrides.iter())
            .map(|(name, weight)| (name.as_str(), *weight));

        for (name, value) in named.into_iter().chain(tables) {
            if !value.is_finite() || value < 0.0 {
                return Err(TraceError::Config(format!(
                    "scoring weight '{name}' must be a non-negative number, got {value}"
                )));
            }
        }
        Ok(())
    }

    fn base_weight(&self, tool_name: &str) -> f64 {
        let normalized = tool_name.trim().to_lowercase();
        if let Some(weight) = self.tool_overrides.get(&normalized) {
            return *weight;
        }
        self.kind_weights
            .get(ToolKind::classify(&normalized).as_str())
            .copied()
            .unwrap_or(self.default_weight)
    }
}

/// Deterministic weight-table scorer.
#[derive(Debug, Clone, Default)]
pub struct ToolWeightScorer {
    weights: ScoringWeights,
}

impl ToolWeightScorer {
    pub fn new(weights: ScoringWeights) -> Self {
        Self { weights }
    }

    pub fn weights(&self) -> &ScoringWeights {
        &self.weights
    }
}

impl ImportanceScorer for ToolWeightScorer {
    fn calculate_score(
        &self,
        tool_name: &str,
        factors: &ScoringFactors,
    ) -> Result<f64, ScoringError> {
        let w = &self.weights;
        let files = factors.files_affected.unwrap_or(0) as f64;
        let references = f64::from(factors.reference_count.unwrap_or(0));

        let mut score = w.base_weight(tool_name);
        score += (files * w.per_file_bonus).min(w.max_file_bonus);
        if factors.is_permanent.unwrap_or(false) {
            score += w.permanent_bonus;
        }
        score += (references * w.per_reference_bonus).min(w.max_reference_bonus);

        Ok(score.clamp(0.0, 1.0))
    }
}
