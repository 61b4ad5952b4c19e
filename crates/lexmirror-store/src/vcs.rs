//! Version-control collaborator for history mode.
//!
//! In history mode every applied delivery becomes one commit in a repository
//! rooted at the mirror directory, dated at the delivery's publication
//! instant so that `git log` reads like the publisher's history.

use std::path::Path;
use std::process::Command;

use chrono::{DateTime, Datelike, Duration, FixedOffset, NaiveDate, TimeZone};
use lexmirror_core::{Corpus, Timestamp, format_timestamp};
use tracing::debug;

use crate::StoreError;
use crate::error::io_at;

/// One commit to record.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CommitRequest {
    pub author: String,
    pub email: String,
    pub timestamp: DateTime<FixedOffset>,
    pub message: String,
}

/// Who signs the commits and how messages read.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CommitIdentity {
    pub author: String,
    pub email: String,
    /// `{corpus}` is replaced by the corpus code, then strftime fields are
    /// expanded against the delivery instant.
    pub message: String,
}

impl Default for CommitIdentity {
    fn default() -> Self {
        Self {
            author: "Législateur".into(),
            email: String::new(),
            message: "Livraison de la base {corpus} du %Y-%m-%d %H:%M:%S".into(),
        }
    }
}

impl CommitIdentity {
    pub fn request(&self, corpus: Corpus, ts: &Timestamp) -> Result<CommitRequest, StoreError> {
        let template = self.message.replace("{corpus}", corpus.code());
        let timestamp = paris_time(ts).ok_or_else(|| {
            StoreError::VersionControl(format!("no Paris time for {}", format_timestamp(ts)))
        })?;
        Ok(CommitRequest {
            author: self.author.clone(),
            email: self.email.clone(),
            timestamp,
            message: ts.format(&template).to_string(),
        })
    }
}

/// Records mirror snapshots in a version-control system.
pub trait VersionControl {
    /// Make `mirror_dir` a repository if it is not one yet, ignoring `excluded`.
    fn prepare(&self, mirror_dir: &Path, excluded: &[&str]) -> Result<(), StoreError>;

    /// Record the current state of `mirror_dir`.
    fn commit(&self, mirror_dir: &Path, request: &CommitRequest) -> Result<(), StoreError>;
}

/// Commits through the `git` command-line tool.
#[derive(Debug, Clone)]
pub struct GitCommitter {
    program: String,
}

impl Default for GitCommitter {
    fn default() -> Self {
        Self {
            program: "git".into(),
        }
    }
}

impl GitCommitter {
    pub fn new(program: impl Into<String>) -> Self {
        Self {
            program: program.into(),
        }
    }

    fn run(&self, dir: &Path, cmd: &mut Command) -> Result<(), StoreError> {
        let output = cmd.current_dir(dir).output().map_err(io_at(dir))?;
        if output.status.success() {
            Ok(())
        } else {
            Err(StoreError::VersionControl(format!(
                "{:?} exited with {}: {}",
                cmd.get_args().collect::<Vec<_>>(),
                output.status,
                String::from_utf8_lossy(&output.stderr).trim()
            )))
        }
    }
}

impl VersionControl for GitCommitter {
    fn prepare(&self, mirror_dir: &Path, excluded: &[&str]) -> Result<(), StoreError> {
        if mirror_dir.join(".git").is_dir() {
            return Ok(());
        }
        self.run(mirror_dir, Command::new(&self.program).args(["init", "-q"]))?;
        let exclude = mirror_dir.join(".git").join("info").join("exclude");
        if let Some(parent) = exclude.parent() {
            std::fs::create_dir_all(parent).map_err(io_at(parent))?;
        }
        let mut body = std::fs::read_to_string(&exclude).unwrap_or_default();
        for name in excluded {
            body.push_str(name);
            body.push('\n');
        }
        std::fs::write(&exclude, body).map_err(io_at(&exclude))?;
        debug!(dir = %mirror_dir.display(), "git repository initialised");
        Ok(())
    }

    fn commit(&self, mirror_dir: &Path, request: &CommitRequest) -> Result<(), StoreError> {
        let date = request.timestamp.to_rfc3339();
        self.run(
            mirror_dir,
            Command::new(&self.program).args(["add", "--all", "."]),
        )?;
        self.run(
            mirror_dir,
            Command::new(&self.program)
                .arg("commit")
                .arg(format!("--author={} <{}>", request.author, request.email))
                .arg(format!("--date={date}"))
                .args(["-m", &request.message])
                .args(["-q", "--no-status", "--allow-empty"])
                .env("GIT_COMMITTER_NAME", &request.author)
                .env("GIT_COMMITTER_EMAIL", &request.email)
                .env("GIT_COMMITTER_DATE", &date),
        )?;
        debug!(dir = %mirror_dir.display(), %date, "git commit recorded");
        Ok(())
    }
}

/// Attach the Paris civil-time offset (CET/CEST) to a publication instant.
///
/// Summer time runs from the last Sunday of March, 02:00 local, to the last
/// Sunday of October, 03:00 local.
pub fn paris_time(ts: &Timestamp) -> Option<DateTime<FixedOffset>> {
    let year = ts.year();
    let dst_on = last_sunday(year, 3)?.and_hms_opt(2, 0, 0)?;
    let dst_off = last_sunday(year, 10)?.and_hms_opt(3, 0, 0)?;
    let hours = if *ts >= dst_on && *ts < dst_off { 2 } else { 1 };
    FixedOffset::east_opt(hours * 3600)?
        .from_local_datetime(ts)
        .single()
}

fn last_sunday(year: i32, month: u32) -> Option<NaiveDate> {
    let first_next = if month == 12 {
        NaiveDate::from_ymd_opt(year + 1, 1, 1)?
    } else {
        NaiveDate::from_ymd_opt(year, month + 1, 1)?
    };
    let last = first_next - Duration::days(1);
    Some(last - Duration::days(last.weekday().num_days_from_sunday() as i64))
}
