use thiserror::Error;

#[derive(Debug, Error)]
pub enum CoreError {
    #[error("unknown corpus: {0}")]
    UnknownCorpus(String),

    #[error("invalid timestamp {0:?} (expected YYYYMMDD-HHMMSS)")]
    InvalidTimestamp(String),

    #[error("invalid target {0:?} (expected all, base, YYYYMMDD-HHMMSS or an integer)")]
    InvalidTarget(String),

    #[error("invalid freshness policy {0:?} (expected always, never or seconds)")]
    InvalidFreshness(String),

    #[error("invalid filename template {template:?}: {reason}")]
    InvalidTemplate { template: String, reason: String },

    #[error("config file {}: {source}", path.display())]
    Config {
        path: std::path::PathBuf,
        #[source]
        source: Box<dyn std::error::Error + Send + Sync>,
    },
}
