//! Deliveries: the published version units of a corpus.
//!
//! A delivery is either a full snapshot (`Base`) or an incremental patch
//! (`Patch`), identified by its publication instant to the second. Within a
//! corpus deliveries are totally ordered by timestamp; at equal timestamps a
//! base sorts before a patch.

use std::fmt;

use chrono::NaiveDateTime;
use serde::{Deserialize, Serialize};

use crate::CoreError;

/// Publication instant of a delivery, in publisher civil time.
pub type Timestamp = NaiveDateTime;

/// Fixed on-disk and command-line timestamp format.
pub const TIMESTAMP_FORMAT: &str = "%Y%m%d-%H%M%S";

/// Parse a timestamp written as `YYYYMMDD-HHMMSS`.
pub fn parse_timestamp(s: &str) -> Result<Timestamp, CoreError> {
    NaiveDateTime::parse_from_str(s.trim(), TIMESTAMP_FORMAT)
        .map_err(|_| CoreError::InvalidTimestamp(s.to_string()))
}

/// Format a timestamp as `YYYYMMDD-HHMMSS`.
pub fn format_timestamp(ts: &Timestamp) -> String {
    ts.format(TIMESTAMP_FORMAT).to_string()
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum DeliveryKind {
    Base,
    Patch,
}

impl fmt::Display for DeliveryKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            DeliveryKind::Base => f.write_str("base"),
            DeliveryKind::Patch => f.write_str("patch"),
        }
    }
}

/// A single published unit for a corpus.
///
/// Field order matters: the derived `Ord` sorts by timestamp, then kind.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub struct Delivery {
    pub timestamp: Timestamp,
    pub kind: DeliveryKind,
}

impl Delivery {
    pub fn base(timestamp: Timestamp) -> Self {
        Self {
            timestamp,
            kind: DeliveryKind::Base,
        }
    }

    pub fn patch(timestamp: Timestamp) -> Self {
        Self {
            timestamp,
            kind: DeliveryKind::Patch,
        }
    }

    pub fn is_base(&self) -> bool {
        self.kind == DeliveryKind::Base
    }
}

impl fmt::Display for Delivery {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}@{}", self.kind, format_timestamp(&self.timestamp))
    }
}
