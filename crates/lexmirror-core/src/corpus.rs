//! The fixed set of mirrored legal databases.

use std::fmt;
use std::str::FromStr;

use serde::{Deserialize, Serialize};

use crate::CoreError;

/// One legal database published by the DILA as a base dump plus deliveries.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "UPPERCASE")]
pub enum Corpus {
    Jorf,
    JorfSimple,
    Legi,
    Kali,
    Cnil,
    Constit,
}

impl Corpus {
    pub const ALL: [Corpus; 6] = [
        Corpus::Jorf,
        Corpus::JorfSimple,
        Corpus::Legi,
        Corpus::Kali,
        Corpus::Cnil,
        Corpus::Constit,
    ];

    /// Upper-case publisher code, e.g. `LEGI`.
    pub fn code(self) -> &'static str {
        match self {
            Corpus::Jorf => "JORF",
            Corpus::JorfSimple => "JORFSIMPLE",
            Corpus::Legi => "LEGI",
            Corpus::Kali => "KALI",
            Corpus::Cnil => "CNIL",
            Corpus::Constit => "CONSTIT",
        }
    }

    /// Name of the mirror subdirectory, also the top-level directory inside
    /// published archives.
    pub fn dir_name(self) -> String {
        self.code().to_ascii_lowercase()
    }
}

impl fmt::Display for Corpus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.code())
    }
}

impl FromStr for Corpus {
    type Err = CoreError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let wanted = s.trim();
        Corpus::ALL
            .into_iter()
            .find(|c| c.code().eq_ignore_ascii_case(wanted))
            .ok_or_else(|| CoreError::UnknownCorpus(s.to_string()))
    }
}
