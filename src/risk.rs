use rand::rngs::StdRng;
use rand::{Rng, SeedableRng};
use tracing::debug;

use crate::models::{RiskAssessment, RiskTier, StudentRecord, Table};

/// Delinquency-bucketed risk scorer over a caller-injected RNG. The base
/// score is intentionally non-deterministic; pass a seeded RNG for
/// reproducible runs.
pub struct RiskScorer<R: Rng> {
    rng: R,
}

impl RiskScorer<StdRng> {
    pub fn seeded(seed: u64) -> Self {
        RiskScorer {
            rng: StdRng::seed_from_u64(seed),
        }
    }

    pub fn from_entropy() -> Self {
        RiskScorer {
            rng: StdRng::from_entropy(),
        }
    }
}

impl<R: Rng> RiskScorer<R> {
    pub fn new(rng: R) -> Self {
        RiskScorer { rng }
    }

    /// Draw uniformly from the range selected by the delinquency bucket.
    /// Negative or non-finite input lands in the lowest bucket.
    pub fn base_score(&mut self, days_delinquent: f64) -> f64 {
        let (low, high) = score_range(days_delinquent);
        self.rng.gen_range(low..high)
    }

    pub fn assess(&mut self, record: &StudentRecord) -> RiskAssessment {
        let risk_score = self.base_score(record.days_delinquent);
        let predictive_score = predictive_score(
            risk_score,
            record.gpa,
            record.enrollment_status.as_deref(),
            record.academic_standing.as_deref(),
        );

        RiskAssessment {
            risk_score,
            risk_tier: risk_tier(risk_score),
            predictive_score,
            predictive_tier: risk_tier(predictive_score),
        }
    }

    pub fn score_table(&mut self, table: &mut Table) {
        for record in &mut table.records {
            record.risk = Some(self.assess(record));
        }
        debug!(rows = table.len(), "scored table");
    }
}

pub fn score_range(days_delinquent: f64) -> (f64, f64) {
    let days = if days_delinquent.is_finite() {
        days_delinquent.max(0.0)
    } else {
        0.0
    };

    if days < 30.0 {
        (0.0, 0.3)
    } else if days < 90.0 {
        (0.3, 0.6)
    } else if days < 180.0 {
        (0.6, 0.8)
    } else {
        (0.8, 1.0)
    }
}

pub fn risk_tier(score: f64) -> RiskTier {
    if score >= 0.7 {
        RiskTier::High
    } else if score >= 0.4 {
        RiskTier::Medium
    } else {
        RiskTier::Low
    }
}

/// Deterministic additive refinement over the random base score, capped at 1.
pub fn predictive_score(
    base_score: f64,
    gpa: Option<f64>,
    enrollment_status: Option<&str>,
    academic_standing: Option<&str>,
) -> f64 {
    let total = base_score
        + gpa_penalty(gpa)
        + enrollment_penalty(enrollment_status)
        + standing_penalty(academic_standing);
    total.min(1.0)
}

pub fn gpa_penalty(gpa: Option<f64>) -> f64 {
    match gpa {
        Some(value) if value < 2.0 => 0.3,
        Some(value) if value < 2.5 => 0.2,
        Some(value) if value < 3.0 => 0.1,
        _ => 0.0,
    }
}

pub fn enrollment_penalty(status: Option<&str>) -> f64 {
    let status = match status {
        Some(value) => value.to_ascii_lowercase(),
        None => return 0.0,
    };

    if status.contains("leave") {
        0.25
    } else if status.contains("part") {
        0.15
    } else {
        0.0
    }
}

pub fn standing_penalty(standing: Option<&str>) -> f64 {
    let standing = match standing {
        Some(value) => value.to_ascii_lowercase(),
        None => return 0.0,
    };

    if standing.contains("probation") {
        0.3
    } else if standing.contains("warning") {
        0.2
    } else {
        0.0
    }
}
