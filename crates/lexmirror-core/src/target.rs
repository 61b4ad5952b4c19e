//! Target selectors: how far along the delivery sequence a sync should go.

use std::fmt;
use std::str::FromStr;

use crate::CoreError;
use crate::delivery::{Delivery, Timestamp, format_timestamp, parse_timestamp};

/// Upper bound of a sync, applied to the ascending list of known deliveries.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Target {
    /// Every known delivery.
    All,
    /// Everything up to and including the most recent base dump.
    BaseOnly,
    /// Deliveries published at or before the given instant.
    Until(Timestamp),
    /// The first `1 + n mod len` deliveries (Euclidean modulo, so `-1`
    /// selects everything and `0` selects the first delivery only).
    Count(i64),
}

impl Target {
    /// Select the window of `sorted` (ascending) that this target covers.
    ///
    /// Never fails: an out-of-range count wraps around instead.
    pub fn window(&self, sorted: &[Delivery]) -> Vec<Delivery> {
        if sorted.is_empty() {
            return Vec::new();
        }
        match *self {
            Target::All => sorted.to_vec(),
            Target::BaseOnly => match sorted.iter().rposition(Delivery::is_base) {
                Some(i) => sorted[..=i].to_vec(),
                None => Vec::new(),
            },
            Target::Until(limit) => sorted
                .iter()
                .filter(|d| d.timestamp <= limit)
                .copied()
                .collect(),
            Target::Count(n) => {
                let len = sorted.len() as i64;
                let end = 1 + n.rem_euclid(len) as usize;
                sorted[..end].to_vec()
            }
        }
    }
}

impl fmt::Display for Target {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Target::All => f.write_str("all"),
            Target::BaseOnly => f.write_str("base"),
            Target::Until(ts) => f.write_str(&format_timestamp(ts)),
            Target::Count(n) => write!(f, "{n}"),
        }
    }
}

impl FromStr for Target {
    type Err = CoreError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let s = s.trim();
        match s.to_ascii_lowercase().as_str() {
            "all" | "latest" => return Ok(Target::All),
            "base" => return Ok(Target::BaseOnly),
            _ => {}
        }
        if let Ok(n) = s.parse::<i64>() {
            return Ok(Target::Count(n));
        }
        parse_timestamp(s)
            .map(Target::Until)
            .map_err(|_| CoreError::InvalidTarget(s.to_string()))
    }
}
