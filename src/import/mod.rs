//! Bulk contact import system.
//!
//! Merges a list of candidate contacts into a scope's existing contacts
//! without creating duplicates, reports real updates apart from unchanged
//! re-imports, and isolates per-record failures:
//!
//! 1. **Normalization** (`normalize`, `candidate`) - Lower-cases natural keys, trims fields
//! 2. **Resolution** (`resolver`) - One bulk lookup of existing ids per run
//! 3. **Change detection** (`change_detection`) - Field-level equality policy
//! 4. **Execution** (`executor`) - Chunked concurrent upserts with progress reporting
//! 5. **Aggregation** (`summary`) - Created / updated / skipped / failed classification
//! 6. **Coordination** (`coordinator`) - Runs the whole pipeline for a caller
//!
//! # Architecture
//!
//! Writes go through the [`ContactStore`] trait, implemented for Postgres
//! (`pg_store`) and in memory (`memory_store`). Within a chunk every upsert
//! is in flight at once; chunks run sequentially, so the chunk size bounds
//! the concurrent load on the store.
//!
//! # Example Usage
//!
//! ```rust,ignore
//! use crate::import::{ContactImporter, ImportConfig};
//!
//! let importer = ContactImporter::new(store, ImportConfig::from_env());
//! let summary = importer
//!     .import_candidates(scope, &candidates, None)
//!     .await?;
//!
//! println!("{} created, {} failed", summary.created, summary.failed);
//! ```

pub mod candidate;
pub mod change_detection;
pub mod config;
pub mod coordinator;
pub mod executor;
pub mod jobs;
pub mod memory_store;
pub mod normalize;
pub mod pg_store;
pub mod resolver;
pub mod store;
pub mod summary;

// Re-export main types
pub use candidate::CandidateRecord;
pub use config::ImportConfig;
pub use coordinator::{ContactImporter, ImportError};
pub use executor::{BatchOutcome, ImportProgress};
pub use jobs::{ImportJob, ImportJobRegistry, ImportJobStatus};
pub use memory_store::InMemoryContactStore;
pub use pg_store::PgContactStore;
pub use store::{ContactStore, KeyMap, StoreError};
pub use summary::{FailedRecord, ImportSummary};
