use clap::{ArgAction, Parser, Subcommand};
use miette::{Result, miette};
use shelf_config::Config;
use shelf_library::Library;
use shelf_model::Category;
use shelf_storage::backend::LocalBackend;
use std::path::PathBuf;
use std::sync::Arc;
use tracing_subscriber::EnvFilter;

mod commands;

#[derive(Parser)]
#[clap(author, version, about = "Local-first book library")]
#[clap(propagate_version = true)]
struct Cli {
    /// Configuration file (.toml, .yaml or .json)
    #[arg(long, global = true)]
    config: Option<PathBuf>,
    /// Log more (-v for debug, -vv for trace). RUST_LOG takes precedence.
    #[arg(short, long, action = ArgAction::Count, global = true)]
    verbose: u8,
    #[clap(subcommand)]
    command: Command,
}

#[derive(Subcommand)]
pub(crate) enum Command {
    /// List books, optionally filtered
    List {
        /// Case-insensitive match on title or author
        #[arg(long)]
        search: Option<String>,
        #[arg(long, value_parser = parse_category)]
        category: Option<Category>,
    },
    /// Show the most recently added books
    Recent {
        #[arg(short = 'n', long, default_value_t = 5)]
        limit: usize,
    },
    /// Count books per category
    Stats,
    /// Add a book from a file on disk
    Add {
        file: PathBuf,
        #[arg(long)]
        title: String,
        #[arg(long)]
        author: String,
        #[arg(long, value_parser = parse_category, default_value = "other")]
        category: Category,
        /// Cover image URL
        #[arg(long, default_value = "")]
        cover: String,
    },
    /// Show a book's metadata
    Show { id: String },
    /// Write a book's file to disk (or stdout)
    Content {
        id: String,
        #[arg(long)]
        out: Option<PathBuf>,
    },
    /// Record reading progress (percent)
    Progress { id: String, percent: u8 },
    /// Delete a book and its file
    Delete { id: String },
    /// Move legacy books out of the fallback slot
    Migrate,
    /// Export every book's metadata as JSON
    Export {
        #[arg(long)]
        out: Option<PathBuf>,
    },
    /// Import books from a JSON backup
    Import { file: PathBuf },
}

fn parse_category(s: &str) -> std::result::Result<Category, String> {
    s.parse().map_err(|_| {
        let known: Vec<&str> = Category::ALL.iter().map(Category::as_str).collect();
        format!("unknown category `{s}` (expected one of: {})", known.join(", "))
    })
}

/// Turn a library error (with its whole `exn` tree) into a report.
pub(crate) fn fail<E: std::fmt::Debug>(context: &'static str) -> impl FnOnce(E) -> miette::Report {
    move |e| miette!("{context}: {e:?}")
}

fn init_tracing(verbose: u8) {
    let level = match verbose {
        0 => "warn",
        1 => "debug",
        _ => "trace",
    };
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(level));
    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(std::io::stderr)
        .with_target(true)
        .init();
}

#[tokio::main(flavor = "current_thread")]
async fn main() -> Result<()> {
    let cli = Cli::parse();
    init_tracing(cli.verbose);

    let config = Config::load(cli.config.as_deref()).map_err(fail("loading configuration"))?;
    let slots = LocalBackend::new("local", &config.fallback.path).map_err(fail("opening fallback slot directory"))?;
    let library = Library::open(&config, Arc::new(slots)).await;
    tracing::debug!(backend = ?library.backend(), "Library open");

    if config.migrate_on_startup && !matches!(cli.command, Command::Migrate) {
        let report = library.migrate_from_fallback().await;
        if report.stored() > 0 {
            tracing::info!(stored = report.stored(), "Migrated legacy books on startup");
        }
    }

    let result = commands::run(&library, cli.command).await;
    library.close().await;
    result
}
