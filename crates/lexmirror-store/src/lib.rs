//! Mirror storage: archive cache, crash-safe install and patch, delivery ledger.

mod error;
pub use error::StoreError;

pub mod cache;
pub mod extract;
pub mod flag;
mod fs_util;
pub mod install;
pub mod ledger;
pub mod mirror;
pub mod orchestrator;
pub mod patch;
mod staging;
pub mod vcs;

#[cfg(test)]
mod test_support;

pub use cache::{ArchiveCache, Resolution};
pub use extract::{Extractor, TarGzExtractor};
pub use flag::FlagGuard;
pub use install::install_base;
pub use ledger::{Ledger, LedgerRecord, RecordId};
pub use mirror::{Mirror, MirrorState};
pub use orchestrator::{Orchestrator, Plan, StatusReport, SyncReport};
pub use patch::{PatchOutcome, apply_patch};
pub use vcs::{CommitIdentity, CommitRequest, GitCommitter, VersionControl};
