use std::collections::HashSet;
use std::io::Cursor;
use std::path::Path;

use calamine::{open_workbook_auto_from_rs, Data, Reader};
use tracing::info;

use crate::error::{PipelineError, Result};
use crate::models::{SourceKind, StudentRecord, Table};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FileFormat {
    Csv,
    Tsv,
    Spreadsheet,
}

impl FileFormat {
    pub fn from_path(path: &Path) -> Result<FileFormat> {
        let extension = path
            .extension()
            .and_then(|e| e.to_str())
            .unwrap_or_default()
            .to_ascii_lowercase();

        match extension.as_str() {
            "csv" => Ok(FileFormat::Csv),
            "tsv" | "tab" => Ok(FileFormat::Tsv),
            "xlsx" | "xls" | "xlsb" | "ods" => Ok(FileFormat::Spreadsheet),
            _ => Err(PipelineError::UnsupportedFormat { extension }),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
enum Field {
    StudentId,
    Ssn,
    FirstName,
    LastName,
    Email,
    DaysDelinquent,
    OutstandingBalance,
    LoanType,
    Major,
    Program,
    Gpa,
    AcademicStanding,
    EnrollmentStatus,
}

const NSLDS_HEADERS: &[(&str, Field)] = &[
    ("Borrower SSN", Field::Ssn),
    ("Borrower First Name", Field::FirstName),
    ("Borrower Last Name", Field::LastName),
    ("E-mail", Field::Email),
    ("Days Delinquent", Field::DaysDelinquent),
    ("OPB", Field::OutstandingBalance),
    ("Loan Type", Field::LoanType),
];

const SIS_HEADERS: &[(&str, Field)] = &[
    ("Student ID", Field::StudentId),
    ("SSN", Field::Ssn),
    ("First Name", Field::FirstName),
    ("Last Name", Field::LastName),
    ("Email", Field::Email),
    ("Major", Field::Major),
    ("Program", Field::Program),
    ("GPA", Field::Gpa),
    ("Academic Standing", Field::AcademicStanding),
    ("Enrollment Status", Field::EnrollmentStatus),
];

// Already-canonical names are accepted for any source so a previous export
// can be re-ingested without losing columns.
const CANONICAL_HEADERS: &[(&str, Field)] = &[
    ("student_id", Field::StudentId),
    ("ssn", Field::Ssn),
    ("first_name", Field::FirstName),
    ("last_name", Field::LastName),
    ("email", Field::Email),
    ("days_delinquent", Field::DaysDelinquent),
    ("outstanding_balance", Field::OutstandingBalance),
    ("loan_type", Field::LoanType),
    ("major", Field::Major),
    ("program", Field::Program),
    ("gpa", Field::Gpa),
    ("academic_standing", Field::AcademicStanding),
    ("enrollment_status", Field::EnrollmentStatus),
];

enum Role {
    Field(Field),
    Extra(String),
}

pub fn ingest_path(path: &Path, source: SourceKind) -> Result<Table> {
    let format = FileFormat::from_path(path)?;
    let bytes = std::fs::read(path)?;
    ingest_bytes(&bytes, format, source)
}

pub fn ingest_bytes(bytes: &[u8], format: FileFormat, source: SourceKind) -> Result<Table> {
    let (headers, rows) = match format {
        FileFormat::Csv => read_delimited(bytes, b',')?,
        FileFormat::Tsv => read_delimited(bytes, b'\t')?,
        FileFormat::Spreadsheet => read_spreadsheet(bytes)?,
    };
    canonicalize(headers, rows, source)
}

fn read_delimited(bytes: &[u8], delimiter: u8) -> Result<(Vec<String>, Vec<Vec<String>>)> {
    let mut reader = csv::ReaderBuilder::new()
        .delimiter(delimiter)
        .from_reader(bytes);

    let headers: Vec<String> = reader
        .headers()?
        .iter()
        .map(|h| h.trim().to_string())
        .collect();

    if headers.iter().all(|h| h.is_empty()) {
        return Err(PipelineError::Parse {
            format: "delimited",
            message: "missing header row".to_string(),
        });
    }

    let mut rows = Vec::new();
    for record in reader.records() {
        let record = record?;
        rows.push(record.iter().map(|v| v.trim().to_string()).collect());
    }

    Ok((headers, rows))
}

fn read_spreadsheet(bytes: &[u8]) -> Result<(Vec<String>, Vec<Vec<String>>)> {
    let spreadsheet_error = |message: String| PipelineError::Parse {
        format: "spreadsheet",
        message,
    };

    let mut workbook = open_workbook_auto_from_rs(Cursor::new(bytes.to_vec()))
        .map_err(|e| spreadsheet_error(e.to_string()))?;

    let range = workbook
        .worksheet_range_at(0)
        .ok_or_else(|| spreadsheet_error("workbook has no worksheets".to_string()))?
        .map_err(|e| spreadsheet_error(e.to_string()))?;

    let mut row_iter = range.rows();
    let headers: Vec<String> = match row_iter.next() {
        Some(row) => row.iter().map(cell_to_string).collect(),
        None => return Err(spreadsheet_error("missing header row".to_string())),
    };

    if headers.iter().all(|h| h.is_empty()) {
        return Err(spreadsheet_error("missing header row".to_string()));
    }

    let rows = row_iter
        .map(|row| row.iter().map(cell_to_string).collect())
        .collect();

    Ok((headers, rows))
}

fn cell_to_string(cell: &Data) -> String {
    match cell {
        Data::Empty => String::new(),
        other => other.to_string().trim().to_string(),
    }
}

fn canonicalize(headers: Vec<String>, rows: Vec<Vec<String>>, source: SourceKind) -> Result<Table> {
    let roles = resolve_columns(&headers, source);
    let has_id_column = roles
        .iter()
        .any(|role| matches!(role, Role::Field(Field::StudentId)));

    let mut table = Table::new(source);
    table.extra_columns = roles
        .iter()
        .filter_map(|role| match role {
            Role::Extra(name) if !name.is_empty() => Some(name.clone()),
            _ => None,
        })
        .collect();

    for (index, row) in rows.into_iter().enumerate() {
        let mut record = StudentRecord::default();

        for (role, value) in roles.iter().zip(row.into_iter()) {
            match role {
                Role::Field(field) => set_field(&mut record, *field, &value),
                Role::Extra(name) => {
                    if !name.is_empty() && !value.is_empty() {
                        record.extra.insert(name.clone(), value);
                    }
                }
            }
        }

        // The loan report is the primary table: rows without an ID column
        // get sequential synthetic identifiers so a join stays possible.
        // SIS extracts are left as-is.
        if !has_id_column && source == SourceKind::Nslds {
            record.student_id = Some(format!("STU{:06}", index + 1000));
        }

        table.records.push(record);
    }

    info!(
        source = %source,
        rows = table.len(),
        extra_columns = table.extra_columns.len(),
        "ingested table"
    );
    Ok(table)
}

fn resolve_columns(headers: &[String], source: SourceKind) -> Vec<Role> {
    let mut claimed: HashSet<Field> = HashSet::new();
    headers
        .iter()
        .map(|header| match lookup(header, source) {
            // First column wins a canonical field; duplicates pass through.
            Some(field) if claimed.insert(field) => Role::Field(field),
            _ => Role::Extra(header.clone()),
        })
        .collect()
}

fn lookup(header: &str, source: SourceKind) -> Option<Field> {
    let renames: &[(&str, Field)] = match source {
        SourceKind::Nslds => NSLDS_HEADERS,
        SourceKind::Sis => SIS_HEADERS,
        SourceKind::Merged => &[],
    };

    renames
        .iter()
        .chain(CANONICAL_HEADERS.iter())
        .find(|(name, _)| *name == header)
        .map(|(_, field)| *field)
}

fn set_field(record: &mut StudentRecord, field: Field, value: &str) {
    let text = |v: &str| {
        if v.is_empty() {
            None
        } else {
            Some(v.to_string())
        }
    };

    match field {
        Field::StudentId => record.student_id = text(value),
        Field::Ssn => record.ssn = text(value),
        Field::FirstName => record.first_name = text(value),
        Field::LastName => record.last_name = text(value),
        Field::Email => record.email = text(value),
        Field::LoanType => record.loan_type = text(value),
        Field::Major => record.major = text(value),
        Field::Program => record.program = text(value),
        Field::AcademicStanding => record.academic_standing = text(value),
        Field::EnrollmentStatus => record.enrollment_status = text(value),
        // Unparsable delinquency/balance silently defaults to zero and is
        // clamped non-negative.
        Field::DaysDelinquent => {
            record.days_delinquent = parse_number(value).unwrap_or(0.0).max(0.0)
        }
        Field::OutstandingBalance => {
            record.outstanding_balance = parse_number(value).unwrap_or(0.0).max(0.0)
        }
        Field::Gpa => record.gpa = parse_number(value),
    }
}

fn parse_number(raw: &str) -> Option<f64> {
    let cleaned = raw.trim().trim_start_matches('$').replace(',', "");
    if cleaned.is_empty() {
        return None;
    }
    cleaned.parse::<f64>().ok().filter(|n| n.is_finite())
}

#[cfg(test)]
mod tests {
    use super::*;

    const NSLDS_SAMPLE: &str = "\
Borrower SSN,Borrower First Name,Borrower Last Name,E-mail,Days Delinquent,OPB,Loan Type
102341234,James,Smith,james.smith@email.com,45,15234,Subsidized
987652345,Mary,Johnson,mary.johnson@email.com,120,28750,Unsubsidized
";

    fn ingest_csv(data: &str, source: SourceKind) -> Table {
        ingest_bytes(data.as_bytes(), FileFormat::Csv, source).unwrap()
    }

    #[test]
    fn nslds_headers_are_canonicalized() {
        let table = ingest_csv(NSLDS_SAMPLE, SourceKind::Nslds);
        assert_eq!(table.len(), 2);

        let first = &table.records[0];
        assert_eq!(first.ssn.as_deref(), Some("102341234"));
        assert_eq!(first.first_name.as_deref(), Some("James"));
        assert_eq!(first.last_name.as_deref(), Some("Smith"));
        assert_eq!(first.email.as_deref(), Some("james.smith@email.com"));
        assert_eq!(first.days_delinquent, 45.0);
        assert_eq!(first.outstanding_balance, 15234.0);
        assert_eq!(first.loan_type.as_deref(), Some("Subsidized"));
        assert!(table.extra_columns.is_empty());
    }

    #[test]
    fn missing_id_column_synthesizes_sequential_ids() {
        let table = ingest_csv(NSLDS_SAMPLE, SourceKind::Nslds);
        assert_eq!(table.records[0].student_id.as_deref(), Some("STU001000"));
        assert_eq!(table.records[1].student_id.as_deref(), Some("STU001001"));
    }

    #[test]
    fn existing_id_column_is_not_overwritten() {
        let data = "Student ID,First Name\nSTU555000,Linda\n";
        let table = ingest_csv(data, SourceKind::Sis);
        assert_eq!(table.records[0].student_id.as_deref(), Some("STU555000"));
    }

    #[test]
    fn sis_files_never_get_synthetic_ids() {
        let data = "First Name,Major\nLinda,Biology\n";
        let table = ingest_csv(data, SourceKind::Sis);
        assert_eq!(table.records[0].student_id, None);
        assert!(!table.has_student_id());
    }

    #[test]
    fn non_numeric_delinquency_defaults_to_zero() {
        let data = "Borrower SSN,Days Delinquent\n111,not-a-number\n222,\n";
        let table = ingest_csv(data, SourceKind::Nslds);
        assert_eq!(table.records[0].days_delinquent, 0.0);
        assert_eq!(table.records[1].days_delinquent, 0.0);
    }

    #[test]
    fn negative_balances_are_clamped() {
        let data = "Borrower SSN,OPB\n111,-500\n";
        let table = ingest_csv(data, SourceKind::Nslds);
        assert_eq!(table.records[0].outstanding_balance, 0.0);
    }

    #[test]
    fn currency_formatting_is_stripped() {
        let data = "Borrower SSN,OPB\n111,\"$15,234.50\"\n";
        let table = ingest_csv(data, SourceKind::Nslds);
        assert_eq!(table.records[0].outstanding_balance, 15234.5);
    }

    #[test]
    fn unparsable_gpa_is_absent_rather_than_zero() {
        let data = "Student ID,GPA\nSTU1,incomplete\nSTU2,3.25\n";
        let table = ingest_csv(data, SourceKind::Sis);
        assert_eq!(table.records[0].gpa, None);
        assert_eq!(table.records[1].gpa, Some(3.25));
    }

    #[test]
    fn unknown_headers_pass_through() {
        let data = "Student ID,Credit Hours\nSTU1,60\n";
        let table = ingest_csv(data, SourceKind::Sis);
        assert_eq!(table.extra_columns, vec!["Credit Hours".to_string()]);
        assert_eq!(
            table.records[0].extra.get("Credit Hours").map(String::as_str),
            Some("60")
        );
    }

    #[test]
    fn canonical_names_are_accepted_on_reingest() {
        let data = "student_id,ssn,days_delinquent\nSTU1,111,90\n";
        let table = ingest_csv(data, SourceKind::Nslds);
        assert_eq!(table.records[0].student_id.as_deref(), Some("STU1"));
        assert_eq!(table.records[0].ssn.as_deref(), Some("111"));
        assert_eq!(table.records[0].days_delinquent, 90.0);
    }

    #[test]
    fn ragged_rows_are_a_parse_error() {
        let data = "Borrower SSN,Days Delinquent,OPB\n111,45\n";
        let result = ingest_bytes(data.as_bytes(), FileFormat::Csv, SourceKind::Nslds);
        assert!(matches!(result, Err(PipelineError::Csv(_))));
    }

    #[test]
    fn empty_input_is_a_parse_error() {
        let result = ingest_bytes(b"", FileFormat::Csv, SourceKind::Nslds);
        assert!(matches!(result, Err(PipelineError::Parse { .. })));
    }

    #[test]
    fn garbage_spreadsheet_bytes_are_a_parse_error() {
        let result = ingest_bytes(
            b"definitely not a workbook",
            FileFormat::Spreadsheet,
            SourceKind::Sis,
        );
        assert!(matches!(result, Err(PipelineError::Parse { .. })));
    }

    #[test]
    fn unsupported_extension_is_rejected() {
        let result = FileFormat::from_path(Path::new("report.pdf"));
        assert!(matches!(
            result,
            Err(PipelineError::UnsupportedFormat { .. })
        ));
    }

    #[test]
    fn reingesting_is_structurally_identical() {
        let first = ingest_csv(NSLDS_SAMPLE, SourceKind::Nslds);
        let second = ingest_csv(NSLDS_SAMPLE, SourceKind::Nslds);
        assert_eq!(first.len(), second.len());
        assert_eq!(first.extra_columns, second.extra_columns);
        assert_eq!(first.present_columns(), second.present_columns());
    }
}
