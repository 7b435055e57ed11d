//! Reporting hook for assets left behind by a failed cleanup step.
//!
//! Cleanup after a successful entity write never fails the request; the
//! leftovers are handed to an [`OrphanReporter`] so they can be found and
//! swept later.

use std::fmt;
use tracing::warn;
use uuid::Uuid;

/// Which workflow step left the assets behind.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CleanupPhase {
    /// Old images of a product after its image set was replaced.
    ReplaceOldSet,
    /// Images of a product that was deleted.
    EntityDelete,
    /// Freshly uploaded images whose entity write failed.
    RollbackNewSet,
}

impl fmt::Display for CleanupPhase {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            CleanupPhase::ReplaceOldSet => "replace-old-set",
            CleanupPhase::EntityDelete => "entity-delete",
            CleanupPhase::RollbackNewSet => "rollback-new-set",
        };
        f.write_str(name)
    }
}

#[derive(Debug, Clone)]
pub struct OrphanedAssets {
    pub entity_id: Uuid,
    pub phase: CleanupPhase,
    pub references: Vec<String>,
    pub error: String,
}

pub trait OrphanReporter: Send + Sync + 'static {
    fn report(&self, orphans: &OrphanedAssets);
}

/// Default reporter: one structured warning per failed cleanup.
#[derive(Debug, Default, Clone, Copy)]
pub struct LogOrphanReporter;

impl OrphanReporter for LogOrphanReporter {
    fn report(&self, orphans: &OrphanedAssets) {
        warn!(
            entity_id = %orphans.entity_id,
            phase = %orphans.phase,
            count = orphans.references.len(),
            references = ?orphans.references,
            error = %orphans.error,
            "asset cleanup failed; assets orphaned"
        );
    }
}
