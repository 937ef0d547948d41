use std::path::Path;

use rand::Rng;
use tracing::debug;
use uuid::Uuid;

use crate::aggregate;
use crate::error::{PipelineError, Result};
use crate::ingest;
use crate::merge;
use crate::models::{CdrProjection, ProgramAggregate, RiskTier, SourceKind, Table};
use crate::risk::RiskScorer;

/// Caller-owned context holding the in-flight tables for one interactive
/// session. A failed load or merge leaves previously held tables untouched;
/// a successful re-load replaces them and invalidates the merge.
pub struct Session {
    id: Uuid,
    nslds: Option<Table>,
    sis: Option<Table>,
    merged: Option<Table>,
}

impl Session {
    pub fn new() -> Self {
        let id = Uuid::new_v4();
        debug!(session = %id, "session opened");
        Session {
            id,
            nslds: None,
            sis: None,
            merged: None,
        }
    }

    pub fn id(&self) -> Uuid {
        self.id
    }

    pub fn nslds(&self) -> Option<&Table> {
        self.nslds.as_ref()
    }

    pub fn sis(&self) -> Option<&Table> {
        self.sis.as_ref()
    }

    pub fn merged(&self) -> Option<&Table> {
        self.merged.as_ref()
    }

    /// Ingest and score the delinquent-borrower report.
    pub fn load_nslds<R: Rng>(
        &mut self,
        path: &Path,
        scorer: &mut RiskScorer<R>,
    ) -> Result<&Table> {
        let mut table = ingest::ingest_path(path, SourceKind::Nslds)?;
        scorer.score_table(&mut table);
        self.merged = None;
        Ok(self.nslds.insert(table))
    }

    pub fn load_sis(&mut self, path: &Path) -> Result<&Table> {
        let table = ingest::ingest_path(path, SourceKind::Sis)?;
        self.merged = None;
        Ok(self.sis.insert(table))
    }

    /// Join the loan side (primary) with the student-information side.
    pub fn merge(&mut self) -> Result<&Table> {
        let nslds = self
            .nslds
            .as_ref()
            .ok_or(PipelineError::TableNotLoaded("NSLDS"))?;
        let sis = self.sis.as_ref().ok_or(PipelineError::TableNotLoaded("SIS"))?;

        let merged = merge::merge_tables(nslds, sis)?;
        Ok(self.merged.insert(merged))
    }

    pub fn program_analysis(&self) -> Result<Vec<ProgramAggregate>> {
        let merged = self
            .merged
            .as_ref()
            .ok_or(PipelineError::TableNotLoaded("merged"))?;
        aggregate::program_analysis(merged)
    }

    pub fn cdr_projection(&self) -> Result<CdrProjection> {
        let merged = self
            .merged
            .as_ref()
            .ok_or(PipelineError::TableNotLoaded("merged"))?;
        Ok(aggregate::cdr_projection(merged))
    }

    pub fn high_risk(&self) -> Result<Table> {
        let merged = self
            .merged
            .as_ref()
            .ok_or(PipelineError::TableNotLoaded("merged"))?;
        Ok(merged.filter_tier(RiskTier::High))
    }
}

impl Default for Session {
    fn default() -> Self {
        Session::new()
    }
}
