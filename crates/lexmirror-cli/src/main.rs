mod display;

use std::path::PathBuf;

use anyhow::{Context, bail};
use clap::{Args, Parser, Subcommand, ValueEnum};
use lexmirror_core::{Corpus, CorpusTable, Freshness, Target};
use lexmirror_store::{CommitIdentity, GitCommitter, Ledger, Orchestrator};
use lexmirror_sync::{FetchMode, HttpFetcher, download_target, refresh_cache};
use tracing::{Level, error, info};

#[derive(Parser)]
#[command(
    name = "lexmirror",
    version,
    about = "Keep local mirrors of published legal-text corpora"
)]
struct Cli {
    /// Log debug detail.
    #[arg(short, long, global = true, conflicts_with = "quiet")]
    verbose: bool,

    /// Only log warnings and errors.
    #[arg(short, long, global = true)]
    quiet: bool,

    /// JSON file overriding endpoints and file-name templates.
    #[arg(long, global = true, env = "LEXMIRROR_CONFIG")]
    config: Option<PathBuf>,

    /// Directory holding downloaded archives.
    #[arg(long, global = true, env = "LEXMIRROR_CACHE", default_value = "cache")]
    cache: PathBuf,

    /// Directory holding one mirror per corpus.
    #[arg(long, global = true, env = "LEXMIRROR_MIRRORS", default_value = ".")]
    mirrors: PathBuf,

    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand)]
enum Command {
    /// Fetch archives, then bring each mirror to the target delivery.
    Sync(SyncArgs),
    /// Show mirror metadata, the cached window and pending deliveries.
    Status {
        /// Corpora to inspect (all by default).
        corpora: Vec<Corpus>,
        #[arg(long, default_value = "all")]
        target: Target,
    },
    /// Download archives into the cache without touching mirrors.
    Cache {
        #[arg(required = true)]
        corpora: Vec<Corpus>,
        #[arg(long, default_value = "all")]
        target: Target,
        #[arg(long, default_value = "never")]
        freshness: Freshness,
    },
    /// Print the delivery ledger of a corpus.
    Ledger { corpus: Corpus },
}

#[derive(Args)]
struct SyncArgs {
    #[arg(required = true)]
    corpora: Vec<Corpus>,

    /// `all`, `base`, a delivery timestamp (YYYYMMDD-HHMMSS) or a count.
    #[arg(long, default_value = "all")]
    target: Target,

    #[arg(long, value_enum, default_value_t = FetchArg::Optional)]
    fetch: FetchArg,

    /// `always`, `never`, or a maximum archive age in seconds.
    #[arg(long, default_value = "never")]
    freshness: Freshness,

    /// Commit every applied delivery with git.
    #[arg(long)]
    history: bool,

    /// git executable used in history mode.
    #[arg(long, default_value = "git")]
    git: String,

    #[arg(long)]
    author: Option<String>,

    #[arg(long)]
    email: Option<String>,

    /// Commit message; `{corpus}` and strftime fields are expanded.
    #[arg(long)]
    message: Option<String>,
}

#[derive(Clone, Copy, ValueEnum)]
enum FetchArg {
    /// Fail the sync if fetching fails.
    Required,
    /// Fall back to the cache when the remote is unreachable.
    Optional,
    /// Do not contact the remote.
    Skip,
}

impl From<FetchArg> for FetchMode {
    fn from(arg: FetchArg) -> Self {
        match arg {
            FetchArg::Required => FetchMode::Required,
            FetchArg::Optional => FetchMode::Optional,
            FetchArg::Skip => FetchMode::Skip,
        }
    }
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let cli = Cli::parse();
    let level = if cli.verbose {
        Level::DEBUG
    } else if cli.quiet {
        Level::WARN
    } else {
        Level::INFO
    };
    tracing_subscriber::fmt()
        .with_max_level(level)
        .with_target(false)
        .with_writer(std::io::stderr)
        .init();

    let table = match &cli.config {
        Some(path) => CorpusTable::from_json_file(path)
            .with_context(|| format!("loading corpus configuration {}", path.display()))?,
        None => CorpusTable::builtin(),
    };
    let orchestrator = Orchestrator::new(table, cli.cache.clone(), cli.mirrors.clone());

    match cli.command {
        Command::Sync(args) => run_sync(&orchestrator, args).await,
        Command::Status { corpora, target } => {
            let corpora = if corpora.is_empty() {
                Corpus::ALL.to_vec()
            } else {
                corpora
            };
            for corpus in corpora {
                let report = orchestrator
                    .status(corpus, target)
                    .with_context(|| format!("reading status of {corpus}"))?;
                display::print_status(&report, orchestrator.mirror(corpus).root());
            }
            Ok(())
        }
        Command::Cache {
            corpora,
            target,
            freshness,
        } => {
            let fetcher = HttpFetcher::new(orchestrator.table().clone());
            for corpus in corpora {
                let report = download_target(
                    &fetcher,
                    orchestrator.table(),
                    orchestrator.cache_dir(),
                    corpus,
                    target,
                    freshness,
                )
                .await
                .with_context(|| format!("downloading {corpus} archives"))?;
                display::print_fetch(&report);
            }
            Ok(())
        }
        Command::Ledger { corpus } => {
            let ledger = Ledger::open(&orchestrator.ledger_dir(), corpus)
                .with_context(|| format!("opening ledger of {corpus}"))?;
            display::print_ledger(&ledger);
            Ok(())
        }
    }
}

/// Sync each corpus in turn; a failing corpus does not stop the others.
async fn run_sync(orchestrator: &Orchestrator, args: SyncArgs) -> anyhow::Result<()> {
    let fetcher = HttpFetcher::new(orchestrator.table().clone());
    let defaults = CommitIdentity::default();
    let identity = CommitIdentity {
        author: args.author.clone().unwrap_or(defaults.author),
        email: args.email.clone().unwrap_or(defaults.email),
        message: args.message.clone().unwrap_or(defaults.message),
    };
    let git = GitCommitter::new(args.git.clone());

    let mut failed = Vec::new();
    for &corpus in &args.corpora {
        if let Err(e) = sync_corpus(orchestrator, &fetcher, corpus, &args, &git, &identity).await {
            error!(corpus = %corpus, "{e:#}");
            failed.push(corpus.to_string());
        }
    }

    if !failed.is_empty() {
        bail!("sync failed for {}", failed.join(", "));
    }
    Ok(())
}

async fn sync_corpus(
    orchestrator: &Orchestrator,
    fetcher: &HttpFetcher,
    corpus: Corpus,
    args: &SyncArgs,
    git: &GitCommitter,
    identity: &CommitIdentity,
) -> anyhow::Result<()> {
    let fetched = refresh_cache(
        fetcher,
        orchestrator.table(),
        orchestrator.cache_dir(),
        corpus,
        args.target,
        args.freshness,
        FetchMode::from(args.fetch),
    )
    .await
    .with_context(|| format!("fetching {corpus} archives"))?;
    if let Some(report) = fetched {
        display::print_fetch(&report);
    }

    if args.history {
        let reports = orchestrator
            .sync_with_history(corpus, args.target, git, identity)
            .with_context(|| format!("syncing {corpus} with history"))?;
        info!(corpus = %corpus, commits = reports.len(), "history recorded");
        for report in &reports {
            display::print_sync(report);
        }
    } else {
        let report = orchestrator
            .sync(corpus, args.target)
            .with_context(|| format!("syncing {corpus}"))?;
        display::print_sync(&report);
    }
    Ok(())
}
