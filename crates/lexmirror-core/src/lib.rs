//! Core types for lexmirror: corpora, deliveries, targets, and naming configuration.

pub mod config;
pub mod corpus;
pub mod delivery;
mod error;
pub mod freshness;
pub mod target;

pub use config::{CorpusConfig, CorpusTable, NamingTemplate};
pub use corpus::Corpus;
pub use delivery::{
    Delivery, DeliveryKind, TIMESTAMP_FORMAT, Timestamp, format_timestamp, parse_timestamp,
};
pub use error::CoreError;
pub use freshness::Freshness;
pub use target::Target;
