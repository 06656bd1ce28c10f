// Copyright 2025 Sushanth (https://github.com/sushanthpy)
//
// This program is free software: you can redistribute it and/or modify
// it under the terms of the GNU Affero General Public License as published by
// the Free Software Foundation, either version 3 of the License, or
// (at your option) any later version.
//
// This program is distributed in the hope that it will be useful,
// but WITHOUT ANY WARRANTY; without even the implied warranty of
// MERCHANTABILITY or FITNESS FOR A PARTICULAR PURPOSE.  See the
// GNU Affero General Public License for more details.
//
// You should have received a copy of the GNU Affero General Public License
// along with this program.  If not, see <https://www.gnu.org/licenses/>.

//! JSONL tool-call log reader.

use agentreplay_traces::ToolCall;
use anyhow::{Context, Result};
use serde::Deserialize;
use std::io::BufRead;
use std::path::Path;

/// Session used for records without a `session_id`.
pub const DEFAULT_SESSION: &str = "default";

/// One line of a tool-call log.
#[derive(Debug, Deserialize)]
pub struct ToolCallRecord {
    #[serde(default)]
    pub session_id: Option<String>,

    #[serde(flatten)]
    pub call: ToolCall,
}

impl ToolCallRecord {
    pub fn session(&self) -> &str {
        self.session_id.as_deref().unwrap_or(DEFAULT_SESSION)
    }
}

/// Parse records from a reader. Blank lines are skipped.
pub fn parse_records(reader: impl BufRead) -> Result<Vec<ToolCallRecord>> {
    let mut records = Vec::new();
    for (index, line) in reader.lines().enumerate() {
        let line = line.with_context(|| format!("Failed to read line {}", index + 1))?;
        let line = line.trim();
        if line.is_empty() {
            continue;
        }
        let record: ToolCallRecord = serde_json::from_str(line)
            .with_context(|| format!("Invalid tool call on line {}", index + 1))?;
        records.push(record);
    }
    Ok(records)
}

pub fn read_records(path: &Path) -> Result<Vec<ToolCallRecord>> {
    let file = std::fs::File::open(path)
        .with_context(|| format!("Failed to open {}", path.display()))?;
    parse_records(std::io::BufReader::new(file))
}
