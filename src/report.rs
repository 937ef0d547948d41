use std::fmt::Write;

use chrono::NaiveDate;

use crate::models::{CdrProjection, ProgramAggregate, RiskTier, Table};

pub struct Intervention {
    pub action: &'static str,
    pub timeline: &'static str,
}

/// Outreach actions keyed on the risk score, most urgent first.
pub fn recommend_interventions(risk_score: f64) -> Vec<Intervention> {
    if risk_score >= 0.8 {
        vec![
            Intervention {
                action: "Emergency Financial Counseling",
                timeline: "Within 24 hours",
            },
            Intervention {
                action: "Loan Rehabilitation Discussion",
                timeline: "Within 48 hours",
            },
        ]
    } else if risk_score >= 0.6 {
        vec![
            Intervention {
                action: "Financial Planning Session",
                timeline: "Within 1 week",
            },
            Intervention {
                action: "Payment Plan Review",
                timeline: "Within 2 weeks",
            },
        ]
    } else if risk_score >= 0.4 {
        vec![
            Intervention {
                action: "Financial Wellness Workshop",
                timeline: "Within 2 weeks",
            },
            Intervention {
                action: "Career Services Referral",
                timeline: "Within 3 weeks",
            },
        ]
    } else {
        vec![Intervention {
            action: "Preventive Check-in",
            timeline: "Within 1 month",
        }]
    }
}

pub fn build_report(
    merged: &Table,
    analysis: Option<&[ProgramAggregate]>,
    cdr: &CdrProjection,
    generated: NaiveDate,
) -> String {
    let mut output = String::new();

    let total = merged.len();
    let high_risk: Vec<_> = merged
        .records
        .iter()
        .filter(|r| r.risk_tier() == Some(RiskTier::High))
        .collect();
    let medium_count = merged
        .records
        .iter()
        .filter(|r| r.risk_tier() == Some(RiskTier::Medium))
        .count();
    let total_balance: f64 = merged.records.iter().map(|r| r.outstanding_balance).sum();

    let _ = writeln!(output, "# Student Loan Risk Report");
    let _ = writeln!(output, "Generated {generated}");
    let _ = writeln!(output);
    let _ = writeln!(output, "## Portfolio");

    if total == 0 {
        let _ = writeln!(output, "No merged student records available.");
    } else {
        let _ = writeln!(output, "- Students: {total}");
        let _ = writeln!(output, "- High risk: {}", high_risk.len());
        let _ = writeln!(output, "- Outstanding balance: ${total_balance:.2}");
    }

    let _ = writeln!(output);
    let _ = writeln!(output, "## Risk Mix");

    if total == 0 {
        let _ = writeln!(output, "No students to classify.");
    } else {
        let low_count = total - high_risk.len() - medium_count;
        let _ = writeln!(output, "- HIGH: {}", high_risk.len());
        let _ = writeln!(output, "- MEDIUM: {medium_count}");
        let _ = writeln!(output, "- LOW: {low_count}");
    }

    let _ = writeln!(output);
    let _ = writeln!(output, "## Cohort Default Rate Projection");
    let _ = writeln!(output, "- Projected CDR: {:.1}%", cdr.projected_cdr);
    let _ = writeln!(
        output,
        "- With intervention: {:.1}% (-{:.1})",
        cdr.improved_cdr, cdr.improvement
    );

    let _ = writeln!(output);
    let _ = writeln!(output, "## Program Risk Rankings");

    match analysis {
        Some(aggregates) if !aggregates.is_empty() => {
            for aggregate in aggregates {
                let _ = writeln!(
                    output,
                    "- {}: avg risk {:.2} ({}) across {} students, ${:.2} outstanding",
                    aggregate.program,
                    aggregate.avg_risk,
                    aggregate.risk_tier,
                    aggregate.student_count,
                    aggregate.total_balance
                );
            }
        }
        _ => {
            let _ = writeln!(output, "No program data available.");
        }
    }

    let _ = writeln!(output);
    let _ = writeln!(output, "## Highest Risk Students");

    if high_risk.is_empty() {
        let _ = writeln!(output, "No students in the HIGH tier.");
    } else {
        let mut ranked = high_risk.clone();
        ranked.sort_by(|a, b| {
            let a_score = a.risk.map(|r| r.risk_score).unwrap_or_default();
            let b_score = b.risk.map(|r| r.risk_score).unwrap_or_default();
            b_score
                .partial_cmp(&a_score)
                .unwrap_or(std::cmp::Ordering::Equal)
        });

        for record in ranked.iter().take(10) {
            let score = record.risk.map(|r| r.risk_score).unwrap_or_default();
            let _ = writeln!(
                output,
                "- {} ({}) risk {:.2}, {} days delinquent, ${:.2} outstanding",
                record.display_name(),
                record.student_id.as_deref().unwrap_or("no id"),
                score,
                record.days_delinquent,
                record.outstanding_balance
            );
            for intervention in recommend_interventions(score) {
                let _ = writeln!(
                    output,
                    "  - {} ({})",
                    intervention.action,
                    intervention.timeline.to_lowercase()
                );
            }
        }
    }

    output
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::{RiskAssessment, SourceKind, StudentRecord};

    fn scored_record(name: &str, score: f64, days: f64, balance: f64) -> StudentRecord {
        let tier = crate::risk::risk_tier(score);
        StudentRecord {
            first_name: Some(name.to_string()),
            last_name: Some("Smith".to_string()),
            student_id: Some("STU001000".to_string()),
            days_delinquent: days,
            outstanding_balance: balance,
            major: Some("Business".to_string()),
            risk: Some(RiskAssessment {
                risk_score: score,
                risk_tier: tier,
                predictive_score: score,
                predictive_tier: tier,
            }),
            ..StudentRecord::default()
        }
    }

    fn sample_date() -> NaiveDate {
        NaiveDate::from_ymd_opt(2026, 2, 2).unwrap()
    }

    #[test]
    fn urgent_interventions_for_critical_scores() {
        let recommendations = recommend_interventions(0.85);
        assert_eq!(recommendations.len(), 2);
        assert_eq!(recommendations[0].action, "Emergency Financial Counseling");
    }

    #[test]
    fn low_scores_get_a_preventive_checkin() {
        let recommendations = recommend_interventions(0.1);
        assert_eq!(recommendations.len(), 1);
        assert_eq!(recommendations[0].action, "Preventive Check-in");
    }

    #[test]
    fn report_contains_all_sections() {
        let mut table = Table::new(SourceKind::Merged);
        table.records.push(scored_record("James", 0.9, 240.0, 52000.0));
        table.records.push(scored_record("Mary", 0.2, 10.0, 9500.0));

        let analysis = crate::aggregate::program_analysis(&table).unwrap();
        let cdr = crate::aggregate::cdr_projection(&table);
        let report = build_report(&table, Some(&analysis), &cdr, sample_date());

        assert!(report.contains("# Student Loan Risk Report"));
        assert!(report.contains("Generated 2026-02-02"));
        assert!(report.contains("## Portfolio"));
        assert!(report.contains("- Students: 2"));
        assert!(report.contains("## Risk Mix"));
        assert!(report.contains("## Cohort Default Rate Projection"));
        assert!(report.contains("## Program Risk Rankings"));
        assert!(report.contains("## Highest Risk Students"));
        assert!(report.contains("James Smith"));
        assert!(report.contains("Emergency Financial Counseling"));
    }

    #[test]
    fn missing_program_analysis_degrades_gracefully() {
        let mut table = Table::new(SourceKind::Merged);
        let mut record = scored_record("James", 0.9, 240.0, 52000.0);
        record.major = None;
        table.records.push(record);

        let cdr = crate::aggregate::cdr_projection(&table);
        let report = build_report(&table, None, &cdr, sample_date());
        assert!(report.contains("No program data available."));
    }

    #[test]
    fn empty_table_still_renders_a_report() {
        let table = Table::new(SourceKind::Merged);
        let cdr = crate::aggregate::cdr_projection(&table);
        let report = build_report(&table, None, &cdr, sample_date());
        assert!(report.contains("No merged student records available."));
        assert!(report.contains("Projected CDR: 0.0%"));
    }
}
