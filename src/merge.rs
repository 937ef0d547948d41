use std::collections::HashMap;

use tracing::{debug, info};

use crate::error::{PipelineError, Result};
use crate::models::{SourceKind, StudentRecord, Table};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum JoinKey {
    Ssn,
    StudentId,
}

/// SSN is preferred when both tables carry it; student ID is the fallback.
pub fn select_join_key(primary: &Table, secondary: &Table) -> Result<JoinKey> {
    if primary.has_ssn() && secondary.has_ssn() {
        Ok(JoinKey::Ssn)
    } else if primary.has_student_id() && secondary.has_student_id() {
        Ok(JoinKey::StudentId)
    } else {
        Err(PipelineError::NoCommonKey)
    }
}

fn key_of<'a>(record: &'a StudentRecord, key: JoinKey) -> Option<&'a str> {
    match key {
        JoinKey::Ssn => record.ssn.as_deref(),
        JoinKey::StudentId => record.student_id.as_deref(),
    }
}

/// Inner join: only keys present on both sides survive. Rows on either side
/// without a counterpart are dropped, not errored.
pub fn merge_tables(primary: &Table, secondary: &Table) -> Result<Table> {
    let key = select_join_key(primary, secondary)?;
    info!(key = ?key, "merging tables");

    let mut by_key: HashMap<&str, &StudentRecord> = HashMap::new();
    for record in &secondary.records {
        if let Some(value) = key_of(record, key) {
            // First occurrence wins for duplicate keys.
            by_key.entry(value).or_insert(record);
        }
    }

    let mut merged = Table::new(SourceKind::Merged);
    merged.extra_columns = primary.extra_columns.clone();
    for column in &secondary.extra_columns {
        if !merged.extra_columns.contains(column) {
            merged.extra_columns.push(column.clone());
        }
    }

    for record in &primary.records {
        let Some(value) = key_of(record, key) else {
            continue;
        };
        if let Some(counterpart) = by_key.get(value) {
            merged.records.push(reconcile(record, counterpart));
        }
    }

    debug!(
        primary = primary.len(),
        secondary = secondary.len(),
        merged = merged.len(),
        "inner join complete"
    );
    Ok(merged)
}

/// Field-level reconciliation: a value present on the primary side is never
/// overwritten; the secondary only fills gaps.
fn reconcile(primary: &StudentRecord, secondary: &StudentRecord) -> StudentRecord {
    let mut merged = primary.clone();

    let fill = |target: &mut Option<String>, source: &Option<String>| {
        if target.is_none() {
            *target = source.clone();
        }
    };

    fill(&mut merged.student_id, &secondary.student_id);
    fill(&mut merged.ssn, &secondary.ssn);
    fill(&mut merged.first_name, &secondary.first_name);
    fill(&mut merged.last_name, &secondary.last_name);
    fill(&mut merged.email, &secondary.email);
    fill(&mut merged.loan_type, &secondary.loan_type);
    fill(&mut merged.major, &secondary.major);
    fill(&mut merged.program, &secondary.program);
    fill(&mut merged.academic_standing, &secondary.academic_standing);
    fill(&mut merged.enrollment_status, &secondary.enrollment_status);

    if merged.gpa.is_none() {
        merged.gpa = secondary.gpa;
    }
    if merged.days_delinquent == 0.0 && secondary.days_delinquent != 0.0 {
        merged.days_delinquent = secondary.days_delinquent;
    }
    if merged.outstanding_balance == 0.0 && secondary.outstanding_balance != 0.0 {
        merged.outstanding_balance = secondary.outstanding_balance;
    }
    if merged.risk.is_none() {
        merged.risk = secondary.risk;
    }

    for (column, value) in &secondary.extra {
        merged
            .extra
            .entry(column.clone())
            .or_insert_with(|| value.clone());
    }

    merged
}
