//! Per-corpus naming configuration.
//!
//! Every corpus has a remote endpoint, remote filename templates for its base
//! dump and its incremental deliveries, local cache templates, and the name of
//! the deletion-list manifest bundled inside patch archives. The whole table is
//! immutable once built and is passed explicitly to whoever needs it.
//!
//! Templates are `strftime` patterns with exactly one embedded timestamp and
//! two placeholders: `{corpus}` (upper-case code) and `{dir}` (lower-case
//! mirror directory name).

use std::collections::BTreeMap;
use std::path::Path;

use chrono::NaiveDateTime;
use serde::{Deserialize, Serialize};
use tracing::debug;

use crate::CoreError;
use crate::corpus::Corpus;
use crate::delivery::{Delivery, DeliveryKind, Timestamp};

const DEFAULT_SERVER: &str = "https://echanges.dila.gouv.fr/OPENDATA";
const DEFAULT_LOCAL_BASE: &str = "{corpus}-base-%Y%m%d-%H%M%S.tar.gz";
const DEFAULT_LOCAL_PATCH: &str = "{corpus}-majo-%Y%m%d-%H%M%S.tar.gz";
const DEFAULT_DELETION_LIST: &str = "liste_suppression_{dir}.dat";

/// Directives a filename template must carry to pin an instant.
const REQUIRED_DIRECTIVES: &[&str] = &["%Y", "%m", "%d", "%H", "%M"];

/// A filename pattern with one embedded timestamp.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(try_from = "String", into = "String")]
pub struct NamingTemplate(String);

impl NamingTemplate {
    pub fn new(pattern: impl Into<String>) -> Result<Self, CoreError> {
        let pattern = pattern.into();
        if let Some(missing) = REQUIRED_DIRECTIVES.iter().find(|d| !pattern.contains(**d)) {
            return Err(CoreError::InvalidTemplate {
                template: pattern.clone(),
                reason: format!("missing {missing}"),
            });
        }
        if pattern.contains('/') {
            return Err(CoreError::InvalidTemplate {
                template: pattern,
                reason: "must be a bare file name".into(),
            });
        }
        Ok(Self(pattern))
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }

    fn pattern_for(&self, corpus: Corpus) -> String {
        expand(&self.0, corpus)
    }

    /// File name of the archive published at `ts`.
    pub fn render(&self, corpus: Corpus, ts: &Timestamp) -> String {
        ts.format(&self.pattern_for(corpus)).to_string()
    }

    /// Timestamp embedded in `file_name`, if it matches this template.
    pub fn parse(&self, corpus: Corpus, file_name: &str) -> Option<Timestamp> {
        NaiveDateTime::parse_from_str(file_name, &self.pattern_for(corpus)).ok()
    }
}

impl TryFrom<String> for NamingTemplate {
    type Error = CoreError;

    fn try_from(value: String) -> Result<Self, Self::Error> {
        Self::new(value)
    }
}

impl From<NamingTemplate> for String {
    fn from(t: NamingTemplate) -> Self {
        t.0
    }
}

fn expand(pattern: &str, corpus: Corpus) -> String {
    pattern
        .replace("{corpus}", corpus.code())
        .replace("{dir}", &corpus.dir_name())
}

/// Naming and endpoint configuration of one corpus.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CorpusConfig {
    /// Directory URL listing the published archives.
    pub endpoint: String,
    pub remote_base: NamingTemplate,
    pub remote_patch: NamingTemplate,
    pub local_base: NamingTemplate,
    pub local_patch: NamingTemplate,
    /// Deletion-list manifest name, with the same placeholders as templates.
    pub deletion_list: String,
}

impl CorpusConfig {
    fn builtin(corpus: Corpus) -> Self {
        let (remote_base, remote_patch) = match corpus {
            Corpus::Jorf => ("Freemium_jorf_global_%Y%m%d-%H%M%S.tar.gz", "jorf_%Y%m%d-%H%M%S.tar.gz"),
            Corpus::JorfSimple => (
                "Freemium_jorfsimple_jorf_simple_%Y%m%d-%H%M%S.tar.gz",
                "jorfsimple_%Y%m%d-%H%M%S.tar.gz",
            ),
            Corpus::Legi => ("Freemium_legi_global_%Y%m%d-%H%M%S.tar.gz", "legi_%Y%m%d-%H%M%S.tar.gz"),
            Corpus::Kali => ("Freemium_kali_global_%Y%m%d-%H%M%S.tar.gz", "kali_%Y%m%d-%H%M%S.tar.gz"),
            Corpus::Cnil => ("Freemium_cnil_global_%Y%m%d-%H%M%S.tar.gz", "cnil_%Y%m%d-%H%M%S.tar.gz"),
            Corpus::Constit => (
                "Freemium_constit_global_%Y%m%d-%H%M%S.tar.gz",
                "constit_%Y%m%d-%H%M%S.tar.gz",
            ),
        };
        Self {
            endpoint: format!("{DEFAULT_SERVER}/{}/", corpus.code()),
            remote_base: NamingTemplate(remote_base.into()),
            remote_patch: NamingTemplate(remote_patch.into()),
            local_base: NamingTemplate(DEFAULT_LOCAL_BASE.into()),
            local_patch: NamingTemplate(DEFAULT_LOCAL_PATCH.into()),
            deletion_list: DEFAULT_DELETION_LIST.into(),
        }
    }

    /// Local cache template for the given kind.
    pub fn local(&self, kind: DeliveryKind) -> &NamingTemplate {
        match kind {
            DeliveryKind::Base => &self.local_base,
            DeliveryKind::Patch => &self.local_patch,
        }
    }

    /// Remote template for the given kind.
    pub fn remote(&self, kind: DeliveryKind) -> &NamingTemplate {
        match kind {
            DeliveryKind::Base => &self.remote_base,
            DeliveryKind::Patch => &self.remote_patch,
        }
    }

    /// Cache file name of a delivery.
    pub fn local_name(&self, corpus: Corpus, delivery: &Delivery) -> String {
        self.local(delivery.kind).render(corpus, &delivery.timestamp)
    }

    /// Remote file name of a delivery.
    pub fn remote_name(&self, corpus: Corpus, delivery: &Delivery) -> String {
        self.remote(delivery.kind).render(corpus, &delivery.timestamp)
    }

    /// Parse a local cache file name into a delivery.
    pub fn parse_local(&self, corpus: Corpus, file_name: &str) -> Option<Delivery> {
        parse_with(&self.local_base, &self.local_patch, corpus, file_name)
    }

    /// Parse a remote file name into a delivery.
    pub fn parse_remote(&self, corpus: Corpus, file_name: &str) -> Option<Delivery> {
        parse_with(&self.remote_base, &self.remote_patch, corpus, file_name)
    }

    pub fn deletion_list_name(&self, corpus: Corpus) -> String {
        expand(&self.deletion_list, corpus)
    }
}

fn parse_with(
    base: &NamingTemplate,
    patch: &NamingTemplate,
    corpus: Corpus,
    file_name: &str,
) -> Option<Delivery> {
    if let Some(ts) = base.parse(corpus, file_name) {
        return Some(Delivery::base(ts));
    }
    patch.parse(corpus, file_name).map(Delivery::patch)
}

/// Partial per-corpus override read from a JSON config file.
#[derive(Debug, Default, Deserialize)]
#[serde(deny_unknown_fields)]
struct CorpusOverride {
    endpoint: Option<String>,
    remote_base: Option<NamingTemplate>,
    remote_patch: Option<NamingTemplate>,
    local_base: Option<NamingTemplate>,
    local_patch: Option<NamingTemplate>,
    deletion_list: Option<String>,
}

/// Immutable configuration of every corpus.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CorpusTable {
    corpora: BTreeMap<Corpus, CorpusConfig>,
}

impl Default for CorpusTable {
    fn default() -> Self {
        Self::builtin()
    }
}

impl CorpusTable {
    /// The publisher's naming conventions for every corpus.
    pub fn builtin() -> Self {
        let corpora = Corpus::ALL
            .into_iter()
            .map(|c| (c, CorpusConfig::builtin(c)))
            .collect();
        Self { corpora }
    }

    /// Built-in table with overrides from a JSON document keyed by corpus
    /// code, e.g. `{"LEGI": {"endpoint": "http://mirror.local/legi/"}}`.
    pub fn from_json(json: &str) -> Result<Self, CoreError> {
        let overrides: BTreeMap<String, CorpusOverride> =
            serde_json::from_str(json).map_err(|e| CoreError::Config {
                path: "<inline>".into(),
                source: Box::new(e),
            })?;
        let mut table = Self::builtin();
        for (code, o) in overrides {
            let corpus: Corpus = code.parse()?;
            let entry = table
                .corpora
                .entry(corpus)
                .or_insert_with(|| CorpusConfig::builtin(corpus));
            if let Some(v) = o.endpoint {
                entry.endpoint = v;
            }
            if let Some(v) = o.remote_base {
                entry.remote_base = v;
            }
            if let Some(v) = o.remote_patch {
                entry.remote_patch = v;
            }
            if let Some(v) = o.local_base {
                entry.local_base = v;
            }
            if let Some(v) = o.local_patch {
                entry.local_patch = v;
            }
            if let Some(v) = o.deletion_list {
                entry.deletion_list = v;
            }
            debug!(corpus = %corpus, "applied config override");
        }
        Ok(table)
    }

    /// Load overrides from a JSON file on disk.
    pub fn from_json_file(path: &Path) -> Result<Self, CoreError> {
        let raw = std::fs::read_to_string(path).map_err(|e| CoreError::Config {
            path: path.to_path_buf(),
            source: Box::new(e),
        })?;
        Self::from_json(&raw).map_err(|e| match e {
            CoreError::Config { source, .. } => CoreError::Config {
                path: path.to_path_buf(),
                source,
            },
            other => other,
        })
    }

    pub fn get(&self, corpus: Corpus) -> &CorpusConfig {
        // Every corpus is populated by `builtin`.
        &self.corpora[&corpus]
    }
}
