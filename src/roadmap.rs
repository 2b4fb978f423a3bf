//! Roadmap phase extraction from the technologies-and-roadmap Markdown document.
//!
//! A phase is any line whose text (after Markdown heading, list or emphasis
//! markers) reads `<heading word> <N>: <title>`, e.g. `## Phase 2: Bootstrap`.
//! Phases keep document order; selection uses 1-based positions in that order.

use regex::Regex;
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};

use crate::errors::RoadmapError;

/// A single roadmap phase.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RoadmapPhase {
    /// Number written in the heading (not necessarily the position)
    pub number: u32,
    /// Text after the colon
    pub title: String,
    /// Full heading text, e.g. "Phase 1: Discovery and Design"
    pub name: String,
}

/// Build the line-anchored phase heading pattern for a heading word.
///
/// Group 1 holds emphasis markers directly before the heading word; group 2
/// the heading text up to the end of the line.
pub fn phase_pattern(heading_word: &str) -> Result<Regex, RoadmapError> {
    let pattern = format!(
        r"(?m)^[ \t>#*_-]*?([*_]*)({word}[ \t]+\d+[ \t]*:[ \t]*\S.*?)[ \t]*\r?$",
        word = regex::escape(heading_word.trim())
    );
    Ok(Regex::new(&pattern)?)
}

/// Drop a closing ATX sequence (`## Title ##`) and emphasis that pairs with `opening`.
fn strip_closing_markers<'a>(text: &'a str, opening: &str) -> &'a str {
    let mut text = text.trim_end();
    let without_hashes = text.trim_end_matches('#');
    if without_hashes.len() < text.len() && without_hashes.ends_with([' ', '\t']) {
        text = without_hashes.trim_end();
    }
    if !opening.is_empty()
        && let Some(inner) = text.strip_suffix(opening)
    {
        text = inner.trim_end();
    }
    text
}

/// Extract phases from roadmap Markdown.
pub fn parse_phases(content: &str, pattern: &Regex) -> Vec<RoadmapPhase> {
    pattern
        .captures_iter(content)
        .filter_map(|caps| {
            let opening = caps.get(1).map_or("", |m| m.as_str());
            let name = strip_closing_markers(caps.get(2)?.as_str(), opening);
            let (head, title) = name.split_once(':')?;
            let title = title.trim();
            if title.is_empty() {
                return None;
            }
            let number = head.split_whitespace().last()?.parse().ok()?;
            Some(RoadmapPhase {
                number,
                title: title.to_string(),
                name: name.to_string(),
            })
        })
        .collect()
}

/// Reads roadmap phases from a file on disk.
#[derive(Debug, Clone)]
pub struct RoadmapReader {
    path: PathBuf,
    pattern: Regex,
}

impl RoadmapReader {
    pub fn new(path: PathBuf, heading_word: &str) -> Result<Self, RoadmapError> {
        Ok(Self {
            path,
            pattern: phase_pattern(heading_word)?,
        })
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Read the raw roadmap document.
    pub fn read_document(&self) -> Result<String, RoadmapError> {
        if !self.path.exists() {
            return Err(RoadmapError::NotFound {
                path: self.path.clone(),
            });
        }
        std::fs::read_to_string(&self.path).map_err(|source| RoadmapError::ReadFailed {
            path: self.path.clone(),
            source,
        })
    }

    /// Parse phases from an already-read roadmap document.
    pub fn phases_in(&self, content: &str) -> Vec<RoadmapPhase> {
        parse_phases(content, &self.pattern)
    }

    /// Async counterpart of [`RoadmapReader::read_document`].
    pub async fn read_document_async(&self) -> Result<String, RoadmapError> {
        tokio::fs::read_to_string(&self.path)
            .await
            .map_err(|source| match source.kind() {
                std::io::ErrorKind::NotFound => RoadmapError::NotFound {
                    path: self.path.clone(),
                },
                _ => RoadmapError::ReadFailed {
                    path: self.path.clone(),
                    source,
                },
            })
    }

    /// Async counterpart of [`RoadmapReader::read_phases`].
    pub async fn read_phases_async(&self) -> Result<Vec<RoadmapPhase>, RoadmapError> {
        let content = self.read_document_async().await?;
        Ok(self.phases_in(&content))
    }

    /// Read and parse the roadmap phases.
    pub fn read_phases(&self) -> Result<Vec<RoadmapPhase>, RoadmapError> {
        let content = self.read_document()?;
        let phases = self.phases_in(&content);
        tracing::debug!(
            path = %self.path.display(),
            count = phases.len(),
            "parsed roadmap phases"
        );
        Ok(phases)
    }
}
