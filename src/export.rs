use std::path::Path;

use tracing::info;

use crate::error::Result;
use crate::models::{ProgramAggregate, StudentRecord, Table};

const CANONICAL_COLUMNS: &[&str] = &[
    "student_id",
    "ssn",
    "first_name",
    "last_name",
    "email",
    "days_delinquent",
    "outstanding_balance",
    "loan_type",
    "major",
    "program",
    "gpa",
    "academic_standing",
    "enrollment_status",
    "risk_score",
    "risk_tier",
    "predictive_score",
    "predictive_tier",
];

/// Plain CSV serialization of a table: canonical columns first, then any
/// pass-through columns in discovery order.
pub fn write_table_csv(table: &Table, path: &Path) -> Result<()> {
    let mut writer = csv::Writer::from_path(path)?;

    let mut header: Vec<&str> = CANONICAL_COLUMNS.to_vec();
    for column in &table.extra_columns {
        header.push(column.as_str());
    }
    writer.write_record(&header)?;

    for record in &table.records {
        let mut row = canonical_values(record);
        for column in &table.extra_columns {
            row.push(record.extra.get(column).cloned().unwrap_or_default());
        }
        writer.write_record(&row)?;
    }

    writer.flush()?;
    info!(path = %path.display(), rows = table.len(), "wrote CSV export");
    Ok(())
}

pub fn write_program_csv(aggregates: &[ProgramAggregate], path: &Path) -> Result<()> {
    let mut writer = csv::Writer::from_path(path)?;
    for aggregate in aggregates {
        writer.serialize(aggregate)?;
    }
    writer.flush()?;
    info!(path = %path.display(), rows = aggregates.len(), "wrote program analysis");
    Ok(())
}

fn canonical_values(record: &StudentRecord) -> Vec<String> {
    let opt = |value: &Option<String>| value.clone().unwrap_or_default();
    let num = |value: f64| format!("{value}");

    let mut row = vec![
        opt(&record.student_id),
        opt(&record.ssn),
        opt(&record.first_name),
        opt(&record.last_name),
        opt(&record.email),
        num(record.days_delinquent),
        format!("{:.2}", record.outstanding_balance),
        opt(&record.loan_type),
        opt(&record.major),
        opt(&record.program),
        record.gpa.map(|g| format!("{g}")).unwrap_or_default(),
        opt(&record.academic_standing),
        opt(&record.enrollment_status),
    ];

    match record.risk {
        Some(risk) => {
            row.push(format!("{:.4}", risk.risk_score));
            row.push(risk.risk_tier.to_string());
            row.push(format!("{:.4}", risk.predictive_score));
            row.push(risk.predictive_tier.to_string());
        }
        None => row.extend(std::iter::repeat(String::new()).take(4)),
    }

    row
}
