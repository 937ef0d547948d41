use std::collections::HashMap;

use tracing::debug;

use crate::error::{PipelineError, Result};
use crate::models::{CdrProjection, ProgramAggregate, RiskTier, Table};
use crate::risk;

// Conservative expected default rates per tier, used for CDR projection.
const HIGH_RISK_DEFAULT_RATE: f64 = 0.45;
const MEDIUM_RISK_DEFAULT_RATE: f64 = 0.20;
const LOW_RISK_DEFAULT_RATE: f64 = 0.05;
const INTERVENTION_SUCCESS_RATE: f64 = 0.3;

struct GroupAccumulator {
    count: usize,
    risk_sum: f64,
    balance_sum: f64,
    delinquent_sum: f64,
}

/// Group the merged table by academic program and compute descriptive
/// statistics, ordered by descending mean risk (stable for ties).
pub fn program_analysis(table: &Table) -> Result<Vec<ProgramAggregate>> {
    let use_major = table.records.iter().any(|r| r.major.is_some());
    let use_program = table.records.iter().any(|r| r.program.is_some());
    if !use_major && !use_program {
        return Err(PipelineError::MissingAttribute("major"));
    }

    // Discovery order is kept so equal means keep their first-seen order.
    let mut order: Vec<String> = Vec::new();
    let mut groups: HashMap<String, GroupAccumulator> = HashMap::new();

    for record in &table.records {
        let attribute = if use_major {
            record.major.as_deref()
        } else {
            record.program.as_deref()
        };
        let (Some(name), Some(assessment)) = (attribute, record.risk) else {
            continue;
        };

        let entry = groups.entry(name.to_string()).or_insert_with(|| {
            order.push(name.to_string());
            GroupAccumulator {
                count: 0,
                risk_sum: 0.0,
                balance_sum: 0.0,
                delinquent_sum: 0.0,
            }
        });
        entry.count += 1;
        entry.risk_sum += assessment.risk_score;
        entry.balance_sum += record.outstanding_balance;
        entry.delinquent_sum += record.days_delinquent;
    }

    let mut aggregates: Vec<ProgramAggregate> = order
        .into_iter()
        .map(|name| {
            let group = &groups[&name];
            let count = group.count as f64;
            let avg_risk = round2(group.risk_sum / count);
            ProgramAggregate {
                program: name,
                avg_risk,
                student_count: group.count,
                avg_balance: round2(group.balance_sum / count),
                total_balance: round2(group.balance_sum),
                avg_delinquent_days: round2(group.delinquent_sum / count),
                risk_tier: risk::risk_tier(avg_risk),
            }
        })
        .collect();

    aggregates.sort_by(|a, b| {
        b.avg_risk
            .partial_cmp(&a.avg_risk)
            .unwrap_or(std::cmp::Ordering::Equal)
    });

    debug!(groups = aggregates.len(), "program analysis complete");
    Ok(aggregates)
}

/// Projected cohort default rate from the current tier mix, with the
/// improvement expected from intervening on high-risk borrowers.
pub fn cdr_projection(table: &Table) -> CdrProjection {
    let total = table.len();
    if total == 0 {
        return CdrProjection {
            projected_cdr: 0.0,
            improved_cdr: 0.0,
            improvement: 0.0,
        };
    }

    let high = table
        .records
        .iter()
        .filter(|r| r.risk_tier() == Some(RiskTier::High))
        .count();
    let medium = table
        .records
        .iter()
        .filter(|r| r.risk_tier() == Some(RiskTier::Medium))
        .count();
    let low = total - high - medium;

    let projected_defaults = high as f64 * HIGH_RISK_DEFAULT_RATE
        + medium as f64 * MEDIUM_RISK_DEFAULT_RATE
        + low as f64 * LOW_RISK_DEFAULT_RATE;
    let improved_defaults = projected_defaults
        - high as f64 * HIGH_RISK_DEFAULT_RATE * INTERVENTION_SUCCESS_RATE;

    let projected_cdr = projected_defaults / total as f64 * 100.0;
    let improved_cdr = improved_defaults / total as f64 * 100.0;

    CdrProjection {
        projected_cdr,
        improved_cdr,
        improvement: projected_cdr - improved_cdr,
    }
}

fn round2(value: f64) -> f64 {
    (value * 100.0).round() / 100.0
}
