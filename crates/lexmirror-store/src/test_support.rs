//! Fixtures shared by the unit tests: a temp cache, a temp mirrors directory,
//! and builders for archives laid out the way the publisher ships them.

use std::fs;
use std::path::{Path, PathBuf};

use flate2::Compression;
use flate2::write::GzEncoder;
use lexmirror_core::{Corpus, CorpusConfig, CorpusTable, Delivery, Timestamp, parse_timestamp};
use tempfile::TempDir;

use crate::cache::ArchiveCache;
use crate::mirror::Mirror;
use crate::orchestrator::Orchestrator;

pub(crate) fn ts(s: &str) -> Timestamp {
    parse_timestamp(s).unwrap()
}

/// Write a `.tar.gz` holding `entries` as `(path, content)` pairs.
pub(crate) fn write_tar_gz(path: &Path, entries: &[(&str, &str)]) {
    let file = fs::File::create(path).unwrap();
    let mut builder = tar::Builder::new(GzEncoder::new(file, Compression::fast()));
    for (name, content) in entries {
        let mut header = tar::Header::new_gnu();
        header.set_size(content.len() as u64);
        header.set_mode(0o644);
        header.set_mtime(0);
        header.set_entry_type(tar::EntryType::Regular);
        builder
            .append_data(&mut header, name, content.as_bytes())
            .unwrap();
    }
    builder.into_inner().unwrap().finish().unwrap();
}

pub(crate) struct Fixture {
    tmp: TempDir,
}

impl Fixture {
    pub(crate) const CORPUS: Corpus = Corpus::Legi;

    pub(crate) fn new() -> Self {
        let tmp = TempDir::new().unwrap();
        fs::create_dir_all(tmp.path().join("cache")).unwrap();
        fs::create_dir_all(tmp.path().join("mirrors")).unwrap();
        Self { tmp }
    }

    pub(crate) fn cache_dir(&self) -> PathBuf {
        self.tmp.path().join("cache")
    }

    pub(crate) fn mirrors_dir(&self) -> PathBuf {
        self.tmp.path().join("mirrors")
    }

    pub(crate) fn config(&self) -> CorpusConfig {
        CorpusTable::builtin().get(Self::CORPUS).clone()
    }

    pub(crate) fn cache(&self) -> ArchiveCache {
        ArchiveCache::new(self.cache_dir(), Self::CORPUS, self.config())
    }

    pub(crate) fn mirror(&self) -> Mirror {
        Mirror::new(&self.mirrors_dir(), Self::CORPUS)
    }

    pub(crate) fn orchestrator(&self) -> Orchestrator {
        Orchestrator::new(CorpusTable::builtin(), self.cache_dir(), self.mirrors_dir())
    }

    /// Cache a base dump: files land under `legi/`.
    pub(crate) fn base(&self, stamp: &str, files: &[(&str, &str)]) -> Delivery {
        let delivery = Delivery::base(ts(stamp));
        let entries: Vec<(String, &str)> = files
            .iter()
            .map(|(p, c)| (format!("legi/{p}"), *c))
            .collect();
        self.write_archive(&delivery, &entries);
        delivery
    }

    /// Cache a patch: files land under `<stamp>/legi/`, with an optional
    /// deletion list at `<stamp>/liste_suppression_legi.dat`.
    pub(crate) fn patch(&self, stamp: &str, files: &[(&str, &str)], deletions: &[&str]) -> Delivery {
        let delivery = Delivery::patch(ts(stamp));
        let list: String = deletions.iter().map(|d| format!("legi/{d}\n")).collect();
        let mut entries: Vec<(String, &str)> = files
            .iter()
            .map(|(p, c)| (format!("{stamp}/legi/{p}"), *c))
            .collect();
        if !deletions.is_empty() {
            entries.push((format!("{stamp}/liste_suppression_legi.dat"), list.as_str()));
        }
        self.write_archive(&delivery, &entries);
        delivery
    }

    fn write_archive(&self, delivery: &Delivery, entries: &[(String, &str)]) {
        let borrowed: Vec<(&str, &str)> = entries.iter().map(|(p, c)| (p.as_str(), *c)).collect();
        write_tar_gz(&self.cache().path_of(delivery), &borrowed);
    }

    /// Content of a mirror file, `None` if absent.
    pub(crate) fn read(&self, rel: &str) -> Option<String> {
        fs::read_to_string(self.mirror().root().join(rel)).ok()
    }
}
