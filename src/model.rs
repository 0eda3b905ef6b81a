use serde::{Deserialize, Serialize};

use crate::error::ResultError;

/// Highlight tag the scanning service attaches to a matched sentence
#[derive(Serialize, Deserialize, Debug, Clone, Copy, PartialEq, Eq)]
#[serde(rename_all = "snake_case")]
pub enum MatchClassification {
    Green,
    Yellow,
    Red,
    Blue,
    CommonPhrase,
    QuotedCorrectly,
    NeedsCitation,
    CloseParaphrase,
}

/// Severity band consumers use to colour a match
#[derive(Serialize, Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord)]
#[serde(rename_all = "snake_case")]
pub enum MatchSeverity {
    Low,
    Moderate,
    High,
}

/// One sentence of the scanned content that resembles an external source
#[derive(Serialize, Deserialize, Debug, Clone, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct Match {
    pub id: String,
    pub sentence_text: String,
    /// UTF-16 code unit offset into the scanned content (inclusive)
    pub position_start: usize,
    /// UTF-16 code unit offset into the scanned content (exclusive)
    pub position_end: usize,
    /// Similarity to the source, `0..=100`
    pub similarity_score: f64,
    pub classification: MatchClassification,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub matched_source: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub source_url: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub view_url: Option<String>,
}

impl Match {
    pub fn severity(&self) -> MatchSeverity {
        if self.similarity_score >= 80.0 {
            MatchSeverity::High
        } else if self.similarity_score >= 60.0 {
            MatchSeverity::Moderate
        } else {
            MatchSeverity::Low
        }
    }

    /// Copied word for word rather than paraphrased
    pub fn is_verbatim(&self) -> bool {
        self.similarity_score > 90.0
    }
}

/// Count of matches per severity band
#[derive(Serialize, Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct SeverityCounts {
    pub high: usize,
    pub moderate: usize,
    pub low: usize,
}

/// Outcome of one completed remote scan. Immutable once produced.
#[derive(Serialize, Deserialize, Debug, Clone, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct ScanResult {
    /// Originality score, `0..=100`
    pub overall_score: f64,
    #[serde(default)]
    pub matches: Vec<Match>,
    #[serde(default)]
    pub words_scanned: u64,
}

impl ScanResult {
    pub fn severity_counts(&self) -> SeverityCounts {
        self.matches
            .iter()
            .fold(SeverityCounts::default(), |mut counts, m| {
                match m.severity() {
                    MatchSeverity::High => counts.high += 1,
                    MatchSeverity::Moderate => counts.moderate += 1,
                    MatchSeverity::Low => counts.low += 1,
                }
                counts
            })
    }

    /// Check the result is consistent with the content it was produced for.
    ///
    /// Scores must lie in `0..=100` and every match must satisfy
    /// `0 <= start <= end <= len`, where `len` counts UTF-16 code units
    /// (the unit the service and editors index text by).
    pub fn validate_against(&self, content: &str) -> Result<(), ResultError> {
        if !in_percent_range(self.overall_score) {
            return Err(ResultError::ScoreOutOfRange {
                score: self.overall_score,
            });
        }

        let len = content.encode_utf16().count();
        for m in &self.matches {
            if m.position_start > m.position_end || m.position_end > len {
                return Err(ResultError::MatchOutOfBounds {
                    id: m.id.clone(),
                    start: m.position_start,
                    end: m.position_end,
                    len,
                });
            }
            if !in_percent_range(m.similarity_score) {
                return Err(ResultError::MatchScoreOutOfRange {
                    id: m.id.clone(),
                    score: m.similarity_score,
                });
            }
        }
        Ok(())
    }
}

fn in_percent_range(value: f64) -> bool {
    (0.0..=100.0).contains(&value)
}
