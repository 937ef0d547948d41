use std::collections::HashMap;
use std::fmt;

use serde::Serialize;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, clap::ValueEnum)]
#[serde(rename_all = "lowercase")]
pub enum SourceKind {
    /// Delinquent borrower report from the loan servicer
    Nslds,
    /// Student information system extract
    Sis,
    #[value(skip)]
    Merged,
}

impl fmt::Display for SourceKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            SourceKind::Nslds => write!(f, "NSLDS"),
            SourceKind::Sis => write!(f, "SIS"),
            SourceKind::Merged => write!(f, "merged"),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Serialize)]
#[serde(rename_all = "UPPERCASE")]
pub enum RiskTier {
    Low,
    Medium,
    High,
}

impl fmt::Display for RiskTier {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            RiskTier::Low => write!(f, "LOW"),
            RiskTier::Medium => write!(f, "MEDIUM"),
            RiskTier::High => write!(f, "HIGH"),
        }
    }
}

#[derive(Debug, Clone, Copy, Serialize)]
pub struct RiskAssessment {
    pub risk_score: f64,
    pub risk_tier: RiskTier,
    pub predictive_score: f64,
    pub predictive_tier: RiskTier,
}

/// Canonical per-student record. Recognized source columns land in named
/// fields; everything else passes through in `extra`.
#[derive(Debug, Clone, Default, Serialize)]
pub struct StudentRecord {
    pub student_id: Option<String>,
    pub ssn: Option<String>,
    pub first_name: Option<String>,
    pub last_name: Option<String>,
    pub email: Option<String>,
    pub days_delinquent: f64,
    pub outstanding_balance: f64,
    pub loan_type: Option<String>,
    pub major: Option<String>,
    pub program: Option<String>,
    pub gpa: Option<f64>,
    pub academic_standing: Option<String>,
    pub enrollment_status: Option<String>,
    pub risk: Option<RiskAssessment>,
    pub extra: HashMap<String, String>,
}

impl StudentRecord {
    pub fn display_name(&self) -> String {
        match (self.first_name.as_deref(), self.last_name.as_deref()) {
            (Some(first), Some(last)) => format!("{first} {last}"),
            (Some(first), None) => first.to_string(),
            (None, Some(last)) => last.to_string(),
            (None, None) => "Unknown".to_string(),
        }
    }

    pub fn risk_tier(&self) -> Option<RiskTier> {
        self.risk.map(|r| r.risk_tier)
    }
}

#[derive(Debug, Clone, Serialize)]
pub struct Table {
    pub source: SourceKind,
    pub records: Vec<StudentRecord>,
    /// Pass-through column names in source discovery order.
    pub extra_columns: Vec<String>,
}

impl Table {
    pub fn new(source: SourceKind) -> Self {
        Table {
            source,
            records: Vec::new(),
            extra_columns: Vec::new(),
        }
    }

    pub fn len(&self) -> usize {
        self.records.len()
    }

    pub fn is_empty(&self) -> bool {
        self.records.is_empty()
    }

    pub fn has_ssn(&self) -> bool {
        self.records.iter().any(|r| r.ssn.is_some())
    }

    pub fn has_student_id(&self) -> bool {
        self.records.iter().any(|r| r.student_id.is_some())
    }

    pub fn filter_tier(&self, tier: RiskTier) -> Table {
        Table {
            source: self.source,
            records: self
                .records
                .iter()
                .filter(|r| r.risk_tier() == Some(tier))
                .cloned()
                .collect(),
            extra_columns: self.extra_columns.clone(),
        }
    }

    /// Canonical columns that carry at least one value, for summaries.
    pub fn present_columns(&self) -> Vec<&'static str> {
        let mut columns = Vec::new();
        let mut check = |name: &'static str, present: bool| {
            if present {
                columns.push(name);
            }
        };

        check("student_id", self.records.iter().any(|r| r.student_id.is_some()));
        check("ssn", self.records.iter().any(|r| r.ssn.is_some()));
        check("first_name", self.records.iter().any(|r| r.first_name.is_some()));
        check("last_name", self.records.iter().any(|r| r.last_name.is_some()));
        check("email", self.records.iter().any(|r| r.email.is_some()));
        check(
            "days_delinquent",
            self.records.iter().any(|r| r.days_delinquent != 0.0),
        );
        check(
            "outstanding_balance",
            self.records.iter().any(|r| r.outstanding_balance != 0.0),
        );
        check("loan_type", self.records.iter().any(|r| r.loan_type.is_some()));
        check("major", self.records.iter().any(|r| r.major.is_some()));
        check("program", self.records.iter().any(|r| r.program.is_some()));
        check("gpa", self.records.iter().any(|r| r.gpa.is_some()));
        check(
            "academic_standing",
            self.records.iter().any(|r| r.academic_standing.is_some()),
        );
        check(
            "enrollment_status",
            self.records.iter().any(|r| r.enrollment_status.is_some()),
        );
        columns
    }
}

#[derive(Debug, Clone, Serialize)]
pub struct ProgramAggregate {
    pub program: String,
    pub avg_risk: f64,
    pub student_count: usize,
    pub avg_balance: f64,
    pub total_balance: f64,
    pub avg_delinquent_days: f64,
    pub risk_tier: RiskTier,
}

#[derive(Debug, Clone, Copy, Serialize)]
pub struct CdrProjection {
    pub projected_cdr: f64,
    pub improved_cdr: f64,
    pub improvement: f64,
}
