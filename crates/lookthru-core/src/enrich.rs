//! Metadata enrichment for resolved identifiers.

use std::collections::{BTreeMap, BTreeSet};
use std::sync::Arc;

use tracing::{debug, warn};

use crate::domain::{FundDecomposition, Identifier, LoadedPosition};
use crate::external::{MetadataService, SecurityMetadata};
use crate::issue::{FailureKind, Phase, PipelineIssue};

/// Enriched metadata keyed by identifier, plus any service failure.
#[derive(Debug, Default)]
pub struct EnrichmentOutcome {
    pub metadata: BTreeMap<Identifier, SecurityMetadata>,
    pub issues: Vec<PipelineIssue>,
}

pub struct Enricher {
    service: Option<Arc<dyn MetadataService>>,
}

impl Enricher {
    pub fn new(service: Option<Arc<dyn MetadataService>>) -> Self {
        Self { service }
    }

    /// Batch-fetch metadata for every distinct resolved identifier in
    /// the run. Identifiers the service does not know stay absent and
    /// fall back to "Unknown" during aggregation. A service failure
    /// degrades the whole stage the same way.
    pub async fn enrich(
        &self,
        positions: &[LoadedPosition],
        decompositions: &[FundDecomposition],
    ) -> EnrichmentOutcome {
        let identifiers = distinct_identifiers(positions, decompositions);
        let mut outcome = EnrichmentOutcome::default();
        if identifiers.is_empty() {
            return outcome;
        }

        let Some(service) = self.service.as_ref() else {
            debug!("no metadata service configured; exposures stay unclassified");
            return outcome;
        };

        match service.get_metadata_batch(&identifiers).await {
            Ok(metadata) => {
                debug!(
                    requested = identifiers.len(),
                    returned = metadata.len(),
                    "metadata batch complete"
                );
                outcome.metadata = metadata;
            }
            Err(error) => {
                warn!(%error, "metadata batch failed");
                outcome.issues.push(
                    PipelineIssue::new(
                        Phase::Enrichment,
                        FailureKind::ApiFailure,
                        "metadata_batch",
                        error.to_string(),
                    )
                    .with_fix_hint("exposures are reported without sector/geography classification"),
                );
            }
        }
        outcome
    }
}

fn distinct_identifiers(
    positions: &[LoadedPosition],
    decompositions: &[FundDecomposition],
) -> Vec<Identifier> {
    let mut set = BTreeSet::new();
    for position in positions {
        set.insert(position.identifier.clone());
    }
    for decomposition in decompositions {
        for holding in &decomposition.holdings {
            if let Some(identifier) = &holding.identifier {
                set.insert(identifier.clone());
            }
        }
    }
    set.into_iter().collect()
}
