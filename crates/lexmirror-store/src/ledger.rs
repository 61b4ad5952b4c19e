//! Delivery ledger: a persisted, doubly-linked record of applied deliveries.
//!
//! Records live in an arena (`Vec<LedgerRecord>`) and refer to each other by
//! [`RecordId`], so the structure serialises as plain JSON and survives across
//! runs. One document per corpus, at `<ledger dir>/<corpus dir>.json`.
//!
//! `previous` and `base` are set when a record is created. `next` is filled
//! later by [`Ledger::chain_forward`], which only ever fills empty links.

use std::path::{Path, PathBuf};

use lexmirror_core::{Corpus, Delivery, DeliveryKind, Timestamp, format_timestamp};
use serde::{Deserialize, Serialize};
use tracing::{debug, info};

use crate::StoreError;
use crate::fs_util::{atomic_write, read_optional};

/// Handle of a record inside its ledger.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct RecordId(pub usize);

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct LedgerRecord {
    pub id: RecordId,
    pub corpus: Corpus,
    pub timestamp: Timestamp,
    pub kind: DeliveryKind,
    pub previous: Option<RecordId>,
    pub next: Option<RecordId>,
    /// The base dump this delivery descends from (itself for a base).
    pub base: RecordId,
}

impl LedgerRecord {
    pub fn delivery(&self) -> Delivery {
        Delivery {
            timestamp: self.timestamp,
            kind: self.kind,
        }
    }
}

#[derive(Debug, Serialize, Deserialize)]
struct LedgerDocument {
    corpus: Corpus,
    records: Vec<LedgerRecord>,
}

#[derive(Debug)]
pub struct Ledger {
    path: PathBuf,
    corpus: Corpus,
    records: Vec<LedgerRecord>,
}

impl Ledger {
    /// Open the ledger of `corpus` under `dir`; a missing file is an empty ledger.
    pub fn open(dir: &Path, corpus: Corpus) -> Result<Self, StoreError> {
        let path = dir.join(format!("{}.json", corpus.dir_name()));
        let records = match read_optional(&path)? {
            None => Vec::new(),
            Some(raw) => {
                let doc: LedgerDocument = serde_json::from_str(&raw)?;
                if doc.corpus != corpus {
                    return Err(StoreError::Ledger(format!(
                        "{} holds the ledger of {}, expected {corpus}",
                        path.display(),
                        doc.corpus
                    )));
                }
                validate(&doc.records)?;
                doc.records
            }
        };
        debug!(corpus = %corpus, records = records.len(), "ledger opened");
        Ok(Self {
            path,
            corpus,
            records,
        })
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    pub fn records(&self) -> &[LedgerRecord] {
        &self.records
    }

    pub fn find(&self, ts: &Timestamp) -> Option<RecordId> {
        self.records
            .iter()
            .find(|r| r.timestamp == *ts)
            .map(|r| r.id)
    }

    pub fn get(&self, id: RecordId) -> Option<&LedgerRecord> {
        self.records.get(id.0)
    }

    /// Latest recorded base dump strictly before `ts`.
    fn base_before(&self, ts: &Timestamp) -> Option<RecordId> {
        self.records
            .iter()
            .filter(|r| r.kind == DeliveryKind::Base && r.timestamp < *ts)
            .max_by_key(|r| r.timestamp)
            .map(|r| r.id)
    }

    /// Whether [`Ledger::record`] can place `delivery` without failing.
    pub fn accepts(&self, delivery: &Delivery) -> bool {
        delivery.is_base()
            || self.find(&delivery.timestamp).is_some()
            || self.base_before(&delivery.timestamp).is_some()
    }

    /// Look up the record of `delivery`, creating and persisting it if absent.
    pub fn record(&mut self, delivery: &Delivery) -> Result<RecordId, StoreError> {
        if let Some(id) = self.find(&delivery.timestamp) {
            return Ok(id);
        }
        let id = RecordId(self.records.len());
        let previous = self
            .records
            .iter()
            .filter(|r| r.timestamp < delivery.timestamp)
            .max_by_key(|r| r.timestamp)
            .map(|r| r.id);
        let base = match delivery.kind {
            DeliveryKind::Base => id,
            DeliveryKind::Patch => self.base_before(&delivery.timestamp).ok_or_else(|| {
                StoreError::Ledger(format!(
                    "{} {delivery} has no recorded base dump",
                    self.corpus
                ))
            })?,
        };
        self.records.push(LedgerRecord {
            id,
            corpus: self.corpus,
            timestamp: delivery.timestamp,
            kind: delivery.kind,
            previous,
            next: None,
            base,
        });
        self.save()?;
        debug!(corpus = %self.corpus, %delivery, id = id.0, "ledger record created");
        Ok(id)
    }

    /// Fill forward links along `chain` (ascending, starting at its base).
    ///
    /// An empty `next` is pointed at the following delivery. A `next` that
    /// already points there is kept and the walk continues; one that points
    /// elsewhere ends the walk, as does a delivery without a record. Returns
    /// the number of links set; the ledger is only written when that is
    /// non-zero, so re-running on the same state changes nothing.
    pub fn chain_forward(&mut self, chain: &[Delivery]) -> Result<usize, StoreError> {
        let mut linked = 0;
        for pair in chain.windows(2) {
            let (Some(from), Some(to)) = (self.find(&pair[0].timestamp), self.find(&pair[1].timestamp))
            else {
                debug!(corpus = %self.corpus, at = %pair[0], "chain walk stopped at unrecorded delivery");
                break;
            };
            let record = &mut self.records[from.0];
            match record.next {
                None => {
                    record.next = Some(to);
                    linked += 1;
                }
                Some(existing) if existing == to => {}
                Some(_) => {
                    debug!(corpus = %self.corpus, at = %pair[0], "chain walk stopped at existing branch");
                    break;
                }
            }
        }
        if linked > 0 {
            self.save()?;
            info!(corpus = %self.corpus, linked, "ledger chained forward");
        }
        Ok(linked)
    }

    /// Records from `start` following `next` links.
    pub fn walk(&self, start: RecordId) -> impl Iterator<Item = &LedgerRecord> {
        std::iter::successors(self.get(start), move |r| r.next.and_then(|n| self.get(n)))
            .take(self.records.len())
    }

    fn save(&self) -> Result<(), StoreError> {
        let doc = LedgerDocument {
            corpus: self.corpus,
            records: self.records.clone(),
        };
        let body = serde_json::to_vec_pretty(&doc)?;
        atomic_write(&self.path, &body)
    }
}

/// Reject documents whose handles do not point inside the arena.
fn validate(records: &[LedgerRecord]) -> Result<(), StoreError> {
    let in_range = |id: RecordId| id.0 < records.len();
    for (i, r) in records.iter().enumerate() {
        let links_ok = r.id.0 == i
            && in_range(r.base)
            && r.previous.is_none_or(in_range)
            && r.next.is_none_or(in_range);
        if !links_ok {
            return Err(StoreError::Ledger(format!(
                "record {i} ({}) has dangling links",
                format_timestamp(&r.timestamp)
            )));
        }
    }
    Ok(())
}
