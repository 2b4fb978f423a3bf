//! Turning raw user input into a phase selection or a free-text instruction.

use serde::{Deserialize, Serialize};
use std::num::IntErrorKind;

use crate::errors::SelectionError;
use crate::roadmap::RoadmapPhase;

/// How raw input is interpreted.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum SelectionMode {
    /// A comma-separated integer list selects phases; anything else is an instruction.
    #[default]
    Auto,
    /// Input must be a comma-separated list of 1-based phase numbers.
    Phases,
    /// Input is always literal instruction text.
    Instruction,
}

impl std::fmt::Display for SelectionMode {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            SelectionMode::Auto => write!(f, "auto"),
            SelectionMode::Phases => write!(f, "phases"),
            SelectionMode::Instruction => write!(f, "instruction"),
        }
    }
}

/// A run request as submitted by a user.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RunRequest {
    pub input: String,
    #[serde(default)]
    pub mode: SelectionMode,
}

impl RunRequest {
    pub fn new(input: impl Into<String>, mode: SelectionMode) -> Self {
        Self {
            input: input.into(),
            mode,
        }
    }
}

/// What the user asked for.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Selection {
    Phases(Vec<RoadmapPhase>),
    Instruction(String),
}

impl Selection {
    /// The instruction handed to the planning agent.
    pub fn planning_brief(&self) -> String {
        match self {
            Selection::Phases(phases) => {
                let names: Vec<&str> = phases.iter().map(|p| p.name.as_str()).collect();
                format!(
                    "Develop the system, focusing on the following roadmap phases: {}.",
                    names.join(", ")
                )
            }
            Selection::Instruction(text) => text.clone(),
        }
    }

    pub fn phases(&self) -> &[RoadmapPhase] {
        match self {
            Selection::Phases(phases) => phases,
            Selection::Instruction(_) => &[],
        }
    }
}

/// Parse one index token. Integers too large for `i64` saturate, which keeps
/// them out of range of any roadmap.
fn parse_index(token: &str) -> Option<i64> {
    match token.parse::<i64>() {
        Ok(idx) => Some(idx),
        Err(err) => match err.kind() {
            IntErrorKind::PosOverflow => Some(i64::MAX),
            IntErrorKind::NegOverflow => Some(i64::MIN),
            _ => None,
        },
    }
}

/// Parse `raw` as a comma-separated list of integers.
///
/// Returns `None` unless every non-empty token parses. Empty tokens (`"1,,3"`)
/// are skipped; an input with no tokens at all is not an index list.
pub fn parse_indices(raw: &str) -> Option<Vec<i64>> {
    let tokens: Vec<&str> = raw
        .split(',')
        .map(str::trim)
        .filter(|t| !t.is_empty())
        .collect();
    if tokens.is_empty() {
        return None;
    }
    tokens.iter().map(|t| parse_index(t)).collect()
}

/// Map 1-based indices to phases, dropping out-of-range indices.
pub fn phases_at(indices: &[i64], phases: &[RoadmapPhase]) -> Vec<RoadmapPhase> {
    indices
        .iter()
        .filter_map(|&idx| {
            let position = usize::try_from(idx).ok()?.checked_sub(1)?;
            phases.get(position).cloned()
        })
        .collect()
}

/// Interpret raw input against the roadmap phases.
pub fn select(
    raw: &str,
    mode: SelectionMode,
    phases: &[RoadmapPhase],
) -> Result<Selection, SelectionError> {
    let trimmed = raw.trim();
    if trimmed.is_empty() {
        return Err(SelectionError::EmptyInput);
    }

    match mode {
        SelectionMode::Instruction => Ok(Selection::Instruction(trimmed.to_string())),
        SelectionMode::Auto => Ok(match parse_indices(trimmed) {
            Some(indices) => Selection::Phases(phases_at(&indices, phases)),
            None => Selection::Instruction(trimmed.to_string()),
        }),
        SelectionMode::Phases => {
            let mut indices = Vec::new();
            for token in trimmed.split(',').map(str::trim).filter(|t| !t.is_empty()) {
                let idx = parse_index(token)
                    .ok_or_else(|| SelectionError::InvalidIndex(token.to_string()))?;
                indices.push(idx);
            }
            Ok(Selection::Phases(phases_at(&indices, phases)))
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn roadmap(count: u32) -> Vec<RoadmapPhase> {
        (1..=count)
            .map(|n| RoadmapPhase {
                number: n,
                title: format!("Step {}", n),
                name: format!("Phase {}: Step {}", n, n),
            })
            .collect()
    }

    fn numbers(selection: &Selection) -> Vec<u32> {
        selection.phases().iter().map(|p| p.number).collect()
    }

    #[test]
    fn test_out_of_range_indices_are_dropped() {
        let selection = select("1,3,99", SelectionMode::Auto, &roadmap(3)).unwrap();
        assert_eq!(numbers(&selection), vec![1, 3]);
    }

    #[test]
    fn test_order_is_preserved() {
        let selection = select(" 3 , 1 ", SelectionMode::Auto, &roadmap(3)).unwrap();
        assert_eq!(numbers(&selection), vec![3, 1]);
    }

    #[test]
    fn test_zero_and_negative_indices_are_dropped() {
        let selection = select("0,-1,2", SelectionMode::Auto, &roadmap(3)).unwrap();
        assert_eq!(numbers(&selection), vec![2]);
    }

    #[test]
    fn test_empty_tokens_are_skipped() {
        let selection = select("1,,2,", SelectionMode::Auto, &roadmap(3)).unwrap();
        assert_eq!(numbers(&selection), vec![1, 2]);
    }

    #[test]
    fn test_all_out_of_range_is_an_empty_phase_selection() {
        let selection = select("7,8", SelectionMode::Auto, &roadmap(3)).unwrap();
        assert_eq!(selection, Selection::Phases(vec![]));
    }

    #[test]
    fn test_oversized_integers_are_out_of_range() {
        let input = "1,99999999999999999999,-99999999999999999999";
        for mode in [SelectionMode::Auto, SelectionMode::Phases] {
            let selection = select(input, mode, &roadmap(3)).unwrap();
            assert_eq!(numbers(&selection), vec![1], "mode {}", mode);
        }
    }

    #[test]
    fn test_parse_indices_accepts_oversized_tokens() {
        assert_eq!(
            parse_indices("2, 18446744073709551616"),
            Some(vec![2, i64::MAX])
        );
        assert_eq!(parse_indices("2, 1e3"), None);
    }

    #[test]
    fn test_auto_mode_falls_back_to_instruction() {
        let selection =
            select("Build the login page", SelectionMode::Auto, &roadmap(3)).unwrap();
        assert_eq!(
            selection,
            Selection::Instruction("Build the login page".to_string())
        );
    }

    #[test]
    fn test_auto_mode_mixed_tokens_is_instruction() {
        let selection = select("1, login", SelectionMode::Auto, &roadmap(3)).unwrap();
        assert!(matches!(selection, Selection::Instruction(_)));
    }

    #[test]
    fn test_instruction_mode_keeps_numeric_text() {
        let selection = select("2024", SelectionMode::Instruction, &roadmap(3)).unwrap();
        assert_eq!(selection, Selection::Instruction("2024".to_string()));
    }

    #[test]
    fn test_phases_mode_rejects_text() {
        let err = select("1,two", SelectionMode::Phases, &roadmap(3)).unwrap_err();
        assert_eq!(err, SelectionError::InvalidIndex("two".to_string()));
    }

    #[test]
    fn test_empty_input_is_rejected() {
        assert_eq!(
            select("   ", SelectionMode::Auto, &roadmap(3)).unwrap_err(),
            SelectionError::EmptyInput
        );
    }

    #[test]
    fn test_planning_brief_lists_phase_names() {
        let selection = select("2", SelectionMode::Phases, &roadmap(3)).unwrap();
        assert_eq!(
            selection.planning_brief(),
            "Develop the system, focusing on the following roadmap phases: Phase 2: Step 2."
        );
    }

    #[test]
    fn test_parse_indices() {
        assert_eq!(parse_indices("1, 2"), Some(vec![1, 2]));
        assert_eq!(parse_indices(""), None);
        assert_eq!(parse_indices("1.5"), None);
    }

    #[test]
    fn test_mode_deserializes_lowercase() {
        let request: RunRequest =
            serde_json::from_str(r#"{"input": "1", "mode": "phases"}"#).unwrap();
        assert_eq!(request.mode, SelectionMode::Phases);
        let request: RunRequest = serde_json::from_str(r#"{"input": "1"}"#).unwrap();
        assert_eq!(request.mode, SelectionMode::Auto);
    }
}
