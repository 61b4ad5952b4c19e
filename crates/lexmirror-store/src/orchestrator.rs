//! Sync orchestrator: resolve the chain, then wipe, install and patch.
//!
//! Planning is read-only and happens in full before the first mutation, so a
//! missing archive or an incoherent mirror is reported without touching the
//! mirror. Execution is strictly sequential: base first, then patches in
//! ascending order, each under its own flag. The ledger is updated after every
//! step and forward-chained at the end.

use std::path::{Path, PathBuf};

use lexmirror_core::{
    Corpus, CorpusConfig, CorpusTable, Delivery, Target, Timestamp,
};
use tracing::{info, warn};

use crate::StoreError;
use crate::cache::{ArchiveCache, Resolution};
use crate::extract::{Extractor, TarGzExtractor};
use crate::install::install_base;
use crate::ledger::{Ledger, LedgerRecord};
use crate::mirror::{METADATA_FILES, Mirror, MirrorState};
use crate::patch::apply_patch;
use crate::vcs::{CommitIdentity, VersionControl};

/// Directory under the mirrors root holding one ledger per corpus.
pub const LEDGER_DIR: &str = ".ledger";

/// What a sync will do, computed before anything is touched.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Plan {
    pub resolution: Resolution,
    /// Delivery the mirror is at when planning.
    pub installed: Option<Timestamp>,
    /// The mirror must be emptied before the base is installed.
    pub wipe: bool,
    pub base: Option<Delivery>,
    /// Patches to apply after the base, ascending.
    pub patches: Vec<Delivery>,
}

impl Plan {
    /// Every delivery the plan applies, in order.
    pub fn steps(&self) -> Vec<Delivery> {
        self.base.iter().chain(&self.patches).copied().collect()
    }

    pub fn is_noop(&self) -> bool {
        !self.wipe && self.base.is_none() && self.patches.is_empty()
    }
}

/// Outcome of one [`Orchestrator::sync`] run.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SyncReport {
    pub corpus: Corpus,
    pub target: Target,
    pub wiped: bool,
    pub base: Option<Delivery>,
    pub applied: Vec<Delivery>,
    pub current: Option<Timestamp>,
    /// Ledger links set by the chaining pass.
    pub links: usize,
}

impl SyncReport {
    pub fn is_noop(&self) -> bool {
        !self.wiped && self.base.is_none() && self.applied.is_empty()
    }
}

/// Read-only view of a corpus: mirror metadata, cache window, pending work.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct StatusReport {
    pub corpus: Corpus,
    pub state: MirrorState,
    pub resolution: Resolution,
    /// Deliveries a sync to the same target would apply.
    pub pending: Vec<Delivery>,
    pub wipe_pending: bool,
    /// Why no sync is possible right now, if so.
    pub blocker: Option<String>,
}

/// Drives cache, mirror and ledger for every corpus of a table.
pub struct Orchestrator {
    table: CorpusTable,
    cache_dir: PathBuf,
    mirrors_dir: PathBuf,
    extractor: Box<dyn Extractor>,
}

impl Orchestrator {
    pub fn new(
        table: CorpusTable,
        cache_dir: impl Into<PathBuf>,
        mirrors_dir: impl Into<PathBuf>,
    ) -> Self {
        Self {
            table,
            cache_dir: cache_dir.into(),
            mirrors_dir: mirrors_dir.into(),
            extractor: Box::new(TarGzExtractor),
        }
    }

    pub fn with_extractor(mut self, extractor: Box<dyn Extractor>) -> Self {
        self.extractor = extractor;
        self
    }

    pub fn table(&self) -> &CorpusTable {
        &self.table
    }

    pub fn cache_dir(&self) -> &Path {
        &self.cache_dir
    }

    pub fn mirrors_dir(&self) -> &Path {
        &self.mirrors_dir
    }

    pub fn ledger_dir(&self) -> PathBuf {
        self.mirrors_dir.join(LEDGER_DIR)
    }

    pub fn config(&self, corpus: Corpus) -> &CorpusConfig {
        self.table.get(corpus)
    }

    pub fn mirror(&self, corpus: Corpus) -> Mirror {
        Mirror::new(&self.mirrors_dir, corpus)
    }

    pub fn cache(&self, corpus: Corpus) -> ArchiveCache {
        ArchiveCache::new(&self.cache_dir, corpus, self.config(corpus).clone())
    }

    pub fn ledger(&self, corpus: Corpus) -> Result<Ledger, StoreError> {
        Ledger::open(&self.ledger_dir(), corpus)
    }

    /// Work out what syncing `corpus` to `target` requires.
    ///
    /// Fails with `IncoherentMirror` if the flag is present and with
    /// `MissingDelivery` if neither the cache nor the mirror can reach the
    /// target.
    pub fn plan(&self, corpus: Corpus, target: Target) -> Result<Plan, StoreError> {
        let mirror = self.mirror(corpus);
        mirror.ensure_coherent()?;
        let resolution = self.cache(corpus).resolve(target)?;
        schedule(&mirror, target, resolution)
    }

    /// Bring the mirror of `corpus` to `target`.
    pub fn sync(&self, corpus: Corpus, target: Target) -> Result<SyncReport, StoreError> {
        let plan = self.plan(corpus, target)?;
        let mirror = self.mirror(corpus);
        let cache = self.cache(corpus);
        let mut ledger = self.ledger(corpus)?;

        if plan.wipe {
            mirror.wipe()?;
        }
        let installed = if plan.wipe { None } else { plan.installed };

        // Deliveries applied by earlier runs that the ledger may not know yet.
        if installed.is_some() {
            for delivery in applied_deliveries(&mirror, &cache.scan()?)? {
                if ledger.accepts(&delivery) {
                    ledger.record(&delivery)?;
                }
            }
        }

        if let Some(base) = &plan.base {
            install_base(&mirror, &cache, self.extractor.as_ref(), base)?;
            ledger.record(base)?;
        }

        let config = self.config(corpus);
        for patch in &plan.patches {
            apply_patch(&mirror, &cache, config, self.extractor.as_ref(), patch)?;
            if ledger.accepts(patch) {
                ledger.record(patch)?;
            } else {
                warn!(corpus = %corpus, delivery = %patch, "no base dump in the ledger; patch not recorded");
            }
        }

        let current = mirror.current()?;
        let tail = lineage(&mirror.history()?, &ledger);
        let links = ledger.chain_forward(&tail)?;

        let report = SyncReport {
            corpus,
            target,
            wiped: plan.wipe,
            base: plan.base,
            applied: plan.patches,
            current,
            links,
        };
        if report.is_noop() {
            info!(corpus = %corpus, %target, "mirror already up to date");
        } else {
            info!(
                corpus = %corpus,
                %target,
                wiped = report.wiped,
                applied = report.applied.len(),
                links,
                "sync complete"
            );
        }
        Ok(report)
    }

    /// Sync one delivery at a time, committing the mirror after each.
    ///
    /// Returns one report per commit.
    pub fn sync_with_history(
        &self,
        corpus: Corpus,
        target: Target,
        vcs: &dyn VersionControl,
        identity: &CommitIdentity,
    ) -> Result<Vec<SyncReport>, StoreError> {
        let plan = self.plan(corpus, target)?;
        let mirror = self.mirror(corpus);
        let manifest = self.config(corpus).deletion_list_name(corpus);
        let mut excluded: Vec<&str> = METADATA_FILES.to_vec();
        excluded.push(&manifest);

        let mut reports = Vec::new();
        for step in plan.steps() {
            let report = self.sync(corpus, Target::Until(step.timestamp))?;
            vcs.prepare(mirror.root(), &excluded)?;
            vcs.commit(mirror.root(), &identity.request(corpus, &step.timestamp)?)?;
            info!(corpus = %corpus, delivery = %step, "delivery committed");
            reports.push(report);
        }
        Ok(reports)
    }

    /// Describe `corpus` without mutating anything, even if flagged.
    pub fn status(&self, corpus: Corpus, target: Target) -> Result<StatusReport, StoreError> {
        let mirror = self.mirror(corpus);
        let state = mirror.state()?;
        let resolution = self.cache(corpus).resolve(target)?;
        let mut report = StatusReport {
            corpus,
            state,
            resolution: resolution.clone(),
            pending: Vec::new(),
            wipe_pending: false,
            blocker: None,
        };
        if let Some(operation) = &report.state.flag {
            report.blocker = Some(format!("interrupted while {operation}"));
            return Ok(report);
        }
        match schedule(&mirror, target, resolution) {
            Ok(plan) => {
                report.pending = plan.steps();
                report.wipe_pending = plan.wipe;
            }
            Err(e @ StoreError::MissingDelivery { .. }) => report.blocker = Some(e.to_string()),
            Err(e) => return Err(e),
        }
        Ok(report)
    }
}

/// Decide wipe, base and patches for `mirror` given a resolved window.
fn schedule(mirror: &Mirror, target: Target, resolution: Resolution) -> Result<Plan, StoreError> {
    let corpus = mirror.corpus();
    let installed = mirror.current()?;
    let missing = |resolution: &Resolution| StoreError::MissingDelivery {
        corpus,
        target,
        oldest_known: resolution.oldest_known(),
        installed,
    };

    let Some(base) = resolution.base().copied() else {
        // No base in the window: the mirror may still bridge to the patches.
        return match (installed, resolution.oldest_known()) {
            (Some(at), Some(oldest)) if at >= oldest => {
                let patches = patches_after(&resolution.known, at);
                Ok(Plan {
                    resolution,
                    installed,
                    wipe: false,
                    base: None,
                    patches,
                })
            }
            _ => Err(missing(&resolution)),
        };
    };

    for orphan in resolution.orphans() {
        warn!(corpus = %corpus, delivery = %orphan, "patch predates the cached base dump; ignored");
    }

    let wipe = match installed {
        Some(at) => at < base.timestamp,
        None => mirror.has_content()?,
    };
    let plan = match installed {
        Some(at) if !wipe => {
            if resolution.newest_known().is_some_and(|newest| newest < at) {
                warn!(corpus = %corpus, %target, "mirror is ahead of the target; nothing to apply");
            }
            Plan {
                patches: patches_after(&resolution.chain, at),
                resolution,
                installed,
                wipe,
                base: None,
            }
        }
        _ => Plan {
            patches: resolution.chain[1..].to_vec(),
            resolution,
            installed,
            wipe,
            base: Some(base),
        },
    };
    Ok(plan)
}

fn patches_after(deliveries: &[Delivery], at: Timestamp) -> Vec<Delivery> {
    deliveries
        .iter()
        .filter(|d| !d.is_base() && d.timestamp > at)
        .copied()
        .collect()
}

/// Deliveries of the mirror's history the cache still holds, oldest first.
fn applied_deliveries(mirror: &Mirror, cached: &[Delivery]) -> Result<Vec<Delivery>, StoreError> {
    Ok(mirror
        .history()?
        .iter()
        .filter_map(|ts| cached.iter().find(|d| d.timestamp == *ts))
        .copied()
        .collect())
}

/// The recorded tail of the mirror's history, ending at its current delivery.
fn lineage(history: &[Timestamp], ledger: &Ledger) -> Vec<Delivery> {
    let mut tail: Vec<Delivery> = history
        .iter()
        .rev()
        .map_while(|ts| ledger.find(ts).and_then(|id| ledger.get(id)))
        .map(LedgerRecord::delivery)
        .collect();
    tail.reverse();
    tail
}

#[cfg(test)]
mod tests {
    use std::cell::RefCell;

    use super::*;
    use crate::mirror::{DELIVERY_FILE, HISTORY_FILE};
    use crate::test_support::{Fixture, ts};
    use crate::vcs::CommitRequest;

    fn three_deliveries(fx: &Fixture) -> (Delivery, Delivery, Delivery) {
        let t0 = fx.base(
            "20140101-000000",
            &[("global/a.xml", "a0"), ("global/b.xml", "b0"), ("global/keep.xml", "k0")],
        );
        let t1 = fx.patch("20140102-000000", &[("global/a.xml", "a1")], &["global/b.xml"]);
        let t2 = fx.patch("20140103-000000", &[("global/c.xml", "c2")], &[]);
        (t0, t1, t2)
    }

    fn history(fx: &Fixture) -> Vec<Timestamp> {
        fx.mirror().history().unwrap()
    }

    fn metadata_bytes(fx: &Fixture) -> (Vec<u8>, Vec<u8>) {
        let root = fx.mirror().root().to_path_buf();
        (
            std::fs::read(root.join(DELIVERY_FILE)).unwrap(),
            std::fs::read(root.join(HISTORY_FILE)).unwrap(),
        )
    }

    #[test]
    fn installs_base_then_patches_up_to_target() {
        let fx = Fixture::new();
        let (t0, t1, _t2) = three_deliveries(&fx);
        let orch = fx.orchestrator();

        let report = orch.sync(Fixture::CORPUS, Target::Until(t1.timestamp)).unwrap();

        assert!(!report.wiped);
        assert_eq!(report.base, Some(t0));
        assert_eq!(report.applied, vec![t1]);
        assert_eq!(report.current, Some(t1.timestamp));
        assert_eq!(history(&fx), vec![t0.timestamp, t1.timestamp]);
        assert_eq!(fx.read("global/a.xml").as_deref(), Some("a1"));
        assert_eq!(fx.read("global/b.xml"), None);
        assert_eq!(fx.read("global/c.xml"), None);

        let ledger = orch.ledger(Fixture::CORPUS).unwrap();
        assert_eq!(ledger.records().len(), 2);
        assert_eq!(report.links, 1);
        assert_eq!(ledger.records()[0].next, ledger.find(&t1.timestamp));
    }

    #[test]
    fn later_run_applies_only_new_patches() {
        let fx = Fixture::new();
        let (t0, t1, t2) = three_deliveries(&fx);
        let orch = fx.orchestrator();
        orch.sync(Fixture::CORPUS, Target::Until(t1.timestamp)).unwrap();

        let report = orch.sync(Fixture::CORPUS, Target::Until(t2.timestamp)).unwrap();

        assert_eq!(report.base, None);
        assert!(!report.wiped);
        assert_eq!(report.applied, vec![t2]);
        assert_eq!(history(&fx), vec![t0.timestamp, t1.timestamp, t2.timestamp]);
        assert_eq!(fx.read("global/keep.xml").as_deref(), Some("k0"));
        assert_eq!(fx.read("global/c.xml").as_deref(), Some("c2"));

        let ledger = orch.ledger(Fixture::CORPUS).unwrap();
        let walked: Vec<Timestamp> = ledger
            .walk(ledger.find(&t0.timestamp).unwrap())
            .map(|r| r.timestamp)
            .collect();
        assert_eq!(walked, vec![t0.timestamp, t1.timestamp, t2.timestamp]);
    }

    #[test]
    fn resync_is_a_noop() {
        let fx = Fixture::new();
        three_deliveries(&fx);
        let orch = fx.orchestrator();
        orch.sync(Fixture::CORPUS, Target::All).unwrap();
        let before = metadata_bytes(&fx);
        let ledger_before = std::fs::read(orch.ledger(Fixture::CORPUS).unwrap().path()).unwrap();

        let report = orch.sync(Fixture::CORPUS, Target::All).unwrap();

        assert!(report.is_noop());
        assert_eq!(report.links, 0);
        assert_eq!(metadata_bytes(&fx), before);
        assert_eq!(
            std::fs::read(orch.ledger(Fixture::CORPUS).unwrap().path()).unwrap(),
            ledger_before
        );
        assert_eq!(fx.mirror().state().unwrap().flag, None);
    }

    #[test]
    fn flagged_mirror_fails_without_touching_metadata() {
        let fx = Fixture::new();
        let (_t0, t1, _t2) = three_deliveries(&fx);
        let orch = fx.orchestrator();
        orch.sync(Fixture::CORPUS, Target::Until(t1.timestamp)).unwrap();
        let before = metadata_bytes(&fx);
        // Simulate a run killed mid-operation: the guard is never released.
        let _interrupted = fx.mirror().lock("applying patch 20140103-000000").unwrap();

        let err = orch.sync(Fixture::CORPUS, Target::All).unwrap_err();

        match err {
            StoreError::IncoherentMirror { operation, .. } => {
                assert_eq!(operation, "applying patch 20140103-000000");
            }
            other => panic!("unexpected error: {other}"),
        }
        assert_eq!(metadata_bytes(&fx), before);
        assert_eq!(fx.read("global/c.xml"), None);
    }

    #[test]
    fn newer_base_wipes_and_reinstalls() {
        let fx = Fixture::new();
        let (t0, t1, _t2) = three_deliveries(&fx);
        let orch = fx.orchestrator();
        orch.sync(Fixture::CORPUS, Target::Until(t1.timestamp)).unwrap();

        let t5 = fx.base("20140105-000000", &[("global/z.xml", "z5")]);
        let t6 = fx.patch("20140106-000000", &[("global/y.xml", "y6")], &[]);
        let report = orch.sync(Fixture::CORPUS, Target::All).unwrap();

        assert!(report.wiped);
        assert_eq!(report.base, Some(t5));
        assert_eq!(report.applied, vec![t6]);
        assert_eq!(fx.read("global/a.xml"), None);
        assert_eq!(fx.read("global/keep.xml"), None);
        assert_eq!(fx.read("global/z.xml").as_deref(), Some("z5"));
        assert_eq!(history(&fx), vec![t5.timestamp, t6.timestamp]);

        let ledger = orch.ledger(Fixture::CORPUS).unwrap();
        let rebase = ledger.find(&t5.timestamp).unwrap();
        assert_eq!(ledger.get(rebase).unwrap().base, rebase);
        // The old lineage is kept.
        assert!(ledger.find(&t0.timestamp).is_some());
    }

    #[test]
    fn patches_without_base_are_missing_delivery() {
        let fx = Fixture::new();
        fx.patch("20140105-000000", &[("global/a.xml", "a5")], &[]);

        let err = fx.orchestrator().sync(Fixture::CORPUS, Target::All).unwrap_err();

        match err {
            StoreError::MissingDelivery {
                oldest_known,
                installed,
                ..
            } => {
                assert_eq!(oldest_known, Some(ts("20140105-000000")));
                assert_eq!(installed, None);
            }
            other => panic!("unexpected error: {other}"),
        }
        assert!(!fx.mirror().exists());
    }

    #[test]
    fn empty_cache_is_missing_delivery() {
        let fx = Fixture::new();
        let err = fx.orchestrator().sync(Fixture::CORPUS, Target::All).unwrap_err();
        assert!(matches!(err, StoreError::MissingDelivery { .. }));
    }

    #[test]
    fn installed_mirror_bridges_a_pruned_cache() {
        let fx = Fixture::new();
        let (t0, t1, t2) = three_deliveries(&fx);
        let orch = fx.orchestrator();
        orch.sync(Fixture::CORPUS, Target::Until(t1.timestamp)).unwrap();
        std::fs::remove_file(fx.cache().path_of(&t0)).unwrap();

        let report = orch.sync(Fixture::CORPUS, Target::All).unwrap();

        assert_eq!(report.applied, vec![t2]);
        assert_eq!(report.current, Some(t2.timestamp));
        let ledger = orch.ledger(Fixture::CORPUS).unwrap();
        let rec = ledger.get(ledger.find(&t1.timestamp).unwrap()).unwrap();
        assert_eq!(rec.next, ledger.find(&t2.timestamp));
    }

    #[test]
    fn republished_base_older_than_mirror_is_not_recorded() {
        let fx = Fixture::new();
        let (t0, t1, t2) = three_deliveries(&fx);
        let orch = fx.orchestrator();
        orch.sync(Fixture::CORPUS, Target::All).unwrap();
        std::fs::remove_file(fx.cache().path_of(&t0)).unwrap();
        std::fs::remove_file(fx.cache().path_of(&t1)).unwrap();
        let rebase = fx.base("20140102-120000", &[("global/r.xml", "r")]);
        let t3 = fx.patch("20140104-000000", &[("global/d.xml", "d3")], &[]);

        let report = orch.sync(Fixture::CORPUS, Target::All).unwrap();

        assert!(!report.wiped);
        assert_eq!(report.base, None);
        assert_eq!(report.applied, vec![t3]);
        assert_eq!(fx.read("global/r.xml"), None);

        let ledger = orch.ledger(Fixture::CORPUS).unwrap();
        assert_eq!(ledger.find(&rebase.timestamp), None);
        let applied = history(&fx);
        assert!(ledger.records().iter().all(|r| applied.contains(&r.timestamp)));
        for r in ledger.records() {
            if let Some(next) = r.next {
                assert_eq!(ledger.get(next).unwrap().previous, Some(r.id));
            }
        }
        let t3_rec = ledger.get(ledger.find(&t3.timestamp).unwrap()).unwrap();
        assert_eq!(Some(t3_rec.base), ledger.find(&t0.timestamp));
        let walked: Vec<Timestamp> = ledger
            .walk(ledger.find(&t0.timestamp).unwrap())
            .map(|r| r.timestamp)
            .collect();
        assert_eq!(
            walked,
            vec![t0.timestamp, t1.timestamp, t2.timestamp, t3.timestamp]
        );
    }

    #[test]
    fn gap_before_cached_patches_is_missing_delivery() {
        let fx = Fixture::new();
        let (t0, t1, _t2) = three_deliveries(&fx);
        let orch = fx.orchestrator();
        orch.sync(Fixture::CORPUS, Target::Until(t0.timestamp)).unwrap();
        std::fs::remove_file(fx.cache().path_of(&t0)).unwrap();
        std::fs::remove_file(fx.cache().path_of(&t1)).unwrap();

        let err = orch.sync(Fixture::CORPUS, Target::All).unwrap_err();

        assert!(matches!(err, StoreError::MissingDelivery { .. }));
        assert_eq!(fx.mirror().current().unwrap(), Some(t0.timestamp));
    }

    #[test]
    fn unrecorded_content_is_wiped_before_install() {
        let fx = Fixture::new();
        let (t0, _t1, _t2) = three_deliveries(&fx);
        std::fs::create_dir_all(fx.mirror().root()).unwrap();
        std::fs::write(fx.mirror().root().join("stray.xml"), "?").unwrap();

        let report = fx
            .orchestrator()
            .sync(Fixture::CORPUS, Target::BaseOnly)
            .unwrap();

        assert!(report.wiped);
        assert_eq!(report.base, Some(t0));
        assert!(report.applied.is_empty());
        assert_eq!(fx.read("stray.xml"), None);
    }

    #[test]
    fn count_target_keeps_a_prefix() {
        let fx = Fixture::new();
        let (_t0, t1, _t2) = three_deliveries(&fx);
        let report = fx
            .orchestrator()
            .sync(Fixture::CORPUS, Target::Count(1))
            .unwrap();
        assert_eq!(report.current, Some(t1.timestamp));
    }

    #[test]
    fn mirror_ahead_of_target_is_left_alone() {
        let fx = Fixture::new();
        let (_t0, t1, t2) = three_deliveries(&fx);
        let orch = fx.orchestrator();
        orch.sync(Fixture::CORPUS, Target::All).unwrap();

        let report = orch.sync(Fixture::CORPUS, Target::Until(t1.timestamp)).unwrap();

        assert!(report.is_noop());
        assert_eq!(report.current, Some(t2.timestamp));
    }

    #[test]
    fn corrupt_patch_stops_the_run_and_flags_the_mirror() {
        let fx = Fixture::new();
        let (t0, t1, _t2) = three_deliveries(&fx);
        std::fs::write(fx.cache().path_of(&t1), b"garbage").unwrap();
        let orch = fx.orchestrator();

        let err = orch.sync(Fixture::CORPUS, Target::All).unwrap_err();

        assert!(matches!(err, StoreError::ArchiveUnreadable { .. }));
        let state = fx.mirror().state().unwrap();
        assert_eq!(state.current, Some(t0.timestamp));
        assert!(state.flag.is_some());
        assert!(matches!(
            orch.sync(Fixture::CORPUS, Target::All).unwrap_err(),
            StoreError::IncoherentMirror { .. }
        ));
    }

    #[derive(Default)]
    struct RecordingVcs {
        prepared: RefCell<Vec<Vec<String>>>,
        commits: RefCell<Vec<(CommitRequest, Option<String>)>>,
    }

    impl VersionControl for RecordingVcs {
        fn prepare(&self, _mirror_dir: &Path, excluded: &[&str]) -> Result<(), StoreError> {
            self.prepared
                .borrow_mut()
                .push(excluded.iter().map(|s| s.to_string()).collect());
            Ok(())
        }

        fn commit(&self, mirror_dir: &Path, request: &CommitRequest) -> Result<(), StoreError> {
            let current = std::fs::read_to_string(mirror_dir.join(DELIVERY_FILE)).ok();
            self.commits.borrow_mut().push((request.clone(), current));
            Ok(())
        }
    }

    #[test]
    fn history_mode_commits_each_delivery() {
        let fx = Fixture::new();
        let (t0, t1, t2) = three_deliveries(&fx);
        let vcs = RecordingVcs::default();

        let reports = fx
            .orchestrator()
            .sync_with_history(Fixture::CORPUS, Target::All, &vcs, &CommitIdentity::default())
            .unwrap();

        assert_eq!(reports.len(), 3);
        assert_eq!(reports[0].base, Some(t0));
        assert_eq!(reports[1].applied, vec![t1]);
        assert_eq!(reports[2].applied, vec![t2]);

        let commits = vcs.commits.borrow();
        let states: Vec<Option<&str>> = commits.iter().map(|(_, s)| s.as_deref()).collect();
        assert_eq!(
            states,
            vec![
                Some("20140101-000000"),
                Some("20140102-000000"),
                Some("20140103-000000")
            ]
        );
        assert_eq!(
            commits[0].0.message,
            "Livraison de la base LEGI du 2014-01-01 00:00:00"
        );
        assert_eq!(commits[0].0.timestamp.to_rfc3339(), "2014-01-01T00:00:00+01:00");

        let prepared = vcs.prepared.borrow();
        assert!(prepared[0].iter().any(|f| f == DELIVERY_FILE));
        assert!(prepared[0].iter().any(|f| f == "liste_suppression_legi.dat"));
    }

    #[test]
    fn status_is_read_only() {
        let fx = Fixture::new();
        let (t0, t1, t2) = three_deliveries(&fx);
        let orch = fx.orchestrator();

        let status = orch.status(Fixture::CORPUS, Target::All).unwrap();

        assert_eq!(status.state, MirrorState::default());
        assert_eq!(status.pending, vec![t0, t1, t2]);
        assert!(!status.wipe_pending);
        assert_eq!(status.blocker, None);
        assert!(!fx.mirror().exists());
    }

    #[test]
    fn status_reports_flag_instead_of_failing() {
        let fx = Fixture::new();
        let (_t0, t1, _t2) = three_deliveries(&fx);
        let orch = fx.orchestrator();
        orch.sync(Fixture::CORPUS, Target::Until(t1.timestamp)).unwrap();
        let _interrupted = fx.mirror().lock("wiping mirror").unwrap();

        let status = orch.status(Fixture::CORPUS, Target::All).unwrap();

        assert_eq!(status.state.flag.as_deref(), Some("wiping mirror"));
        assert!(status.pending.is_empty());
        assert!(status.blocker.is_some());
    }
}
