//! Fingerprint matching port and the policy applied on top of it.
//!
//! A [`FingerprintScorer`] compares one scan with one enrolled template.
//! [`MatchPolicy`] runs it over every candidate, picks the best and turns it
//! into a [`MatchVerdict`]. The policy is deterministic for a deterministic
//! scorer, whatever order the candidates arrive in.

use std::cmp::Ordering;

use serde::{Deserialize, Serialize};
use thiserror::Error;
use utoipa::ToSchema;

use crate::model::fingerprint::{FingerprintTemplate, MatchResult};

pub const DEFAULT_MIN_MATCH_SCORE: u8 = 80;
pub const DEFAULT_MIN_SCAN_QUALITY: u8 = 60;

/// What the terminal captured.
#[derive(Debug, Clone, Serialize, Deserialize, ToSchema)]
pub struct ScanInput {
    /// Encoded minutiae as produced by the sensor
    pub template_data: String,

    /// Sensor-reported capture quality, 0-100
    #[schema(example = 85)]
    pub quality: u8,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct TemplateScore {
    pub match_score: u8,
    pub scan_quality: u8,
}

#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum ScorerError {
    #[error("sensor error: {0}")]
    Device(String),
}

pub trait FingerprintScorer: Send + Sync {
    fn score(
        &self,
        scan: &ScanInput,
        template: &FingerprintTemplate,
    ) -> Result<TemplateScore, ScorerError>;
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct MatchVerdict {
    pub template_id: Option<u64>,
    pub match_score: u8,
    pub scan_quality: u8,
    pub match_result: MatchResult,
    pub error_message: Option<String>,
}

#[derive(Debug, Clone, Copy)]
pub struct MatchPolicy {
    pub min_match_score: u8,
    pub min_scan_quality: u8,
}

impl Default for MatchPolicy {
    fn default() -> Self {
        Self {
            min_match_score: DEFAULT_MIN_MATCH_SCORE,
            min_scan_quality: DEFAULT_MIN_SCAN_QUALITY,
        }
    }
}

/// Higher score first; then earliest enrolled, better enrollment quality,
/// lower id.
fn rank(a: &(&FingerprintTemplate, TemplateScore), b: &(&FingerprintTemplate, TemplateScore)) -> Ordering {
    b.1.match_score
        .cmp(&a.1.match_score)
        .then(a.0.created_at.cmp(&b.0.created_at))
        .then(b.0.quality_score.cmp(&a.0.quality_score))
        .then(a.0.id.cmp(&b.0.id))
}

impl MatchPolicy {
    pub fn evaluate(
        &self,
        scorer: &dyn FingerprintScorer,
        scan: &ScanInput,
        candidates: &[FingerprintTemplate],
    ) -> MatchVerdict {
        if candidates.is_empty() {
            return MatchVerdict {
                template_id: None,
                match_score: 0,
                scan_quality: scan.quality,
                match_result: MatchResult::NoMatch,
                error_message: Some("no fingerprint templates to match against".into()),
            };
        }

        let mut scored = Vec::with_capacity(candidates.len());
        for template in candidates {
            match scorer.score(scan, template) {
                Ok(score) => scored.push((template, score)),
                Err(e) => {
                    return MatchVerdict {
                        template_id: None,
                        match_score: 0,
                        scan_quality: scan.quality,
                        match_result: MatchResult::DeviceError,
                        error_message: Some(e.to_string()),
                    };
                }
            }
        }

        scored.sort_by(rank);
        let (best, score) = scored[0];

        let (match_result, error_message) = if score.scan_quality < self.min_scan_quality {
            (
                MatchResult::PoorQuality,
                Some(format!(
                    "scan quality {} below minimum {}",
                    score.scan_quality, self.min_scan_quality
                )),
            )
        } else if score.match_score >= self.min_match_score {
            (MatchResult::Success, None)
        } else {
            (
                MatchResult::NoMatch,
                Some(format!(
                    "best match score {} below minimum {}",
                    score.match_score, self.min_match_score
                )),
            )
        };

        MatchVerdict {
            template_id: Some(best.id),
            match_score: score.match_score,
            scan_quality: score.scan_quality,
            match_result,
            error_message,
        }
    }
}

/// Deterministic scorer: share of positions where the scan's encoded
/// minutiae agree with the template's, over the longer of the two.
#[derive(Debug, Default, Clone, Copy)]
pub struct ByteSimilarityScorer;

impl FingerprintScorer for ByteSimilarityScorer {
    fn score(
        &self,
        scan: &ScanInput,
        template: &FingerprintTemplate,
    ) -> Result<TemplateScore, ScorerError> {
        if scan.template_data.is_empty() {
            return Err(ScorerError::Device("empty scan payload".into()));
        }
        if scan.quality > 100 {
            return Err(ScorerError::Device(format!(
                "scan quality {} out of range",
                scan.quality
            )));
        }

        let a = scan.template_data.as_bytes();
        let b = template.template_data.as_bytes();
        let longest = a.len().max(b.len());
        let same = a.iter().zip(b).filter(|(x, y)| x == y).count();
        let match_score = (same * 100 / longest) as u8;

        Ok(TemplateScore {
            match_score,
            scan_quality: scan.quality,
        })
    }
}
