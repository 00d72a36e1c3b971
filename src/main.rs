//! Command line front end for the hymnbook stores. Each command opens the one
//! store it needs, runs a single library operation and prints the outcome's
//! message, so the binary doubles as a way to poke at a user's data directory.
use std::fs;
use std::path::{Path, PathBuf};

use anyhow::{bail, Context, Result};
use clap::{Parser, Subcommand, ValueEnum};
use tracing_subscriber::EnvFilter;

use hymnbook_store::db::{self, cascade, import, selection};
use hymnbook_store::{
    default_data_dir, Outcome, RemoteDocumentGroup, RemoteSongBundle, Store, StoreConfig,
};

#[derive(Parser)]
#[command(name = "hymnbook-store")]
#[command(about = "Inspect and maintain the local hymnbook databases", long_about = None)]
#[command(version)]
struct Cli {
    /// Directory holding the database files (defaults to ~/.hymnbook)
    #[arg(long, global = true, env = "HYMNBOOK_DATA_DIR")]
    data_dir: Option<PathBuf>,

    /// Log at debug level unless RUST_LOG says otherwise
    #[arg(short, long, global = true)]
    verbose: bool,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Import a document group from a JSON payload
    ImportDocuments { file: PathBuf },
    /// Replace a previously imported document group with a newer payload
    UpdateDocuments { file: PathBuf },
    /// Import a song bundle from a JSON payload
    ImportSongs { file: PathBuf },
    /// Replace a previously imported song bundle with a newer payload
    UpdateSongs { file: PathBuf },
    /// List stored document groups
    Documents,
    /// List stored song bundles
    Bundles,
    /// Delete a document group and everything below it
    DeleteGroup { id: i64 },
    /// Delete a song bundle with its songs
    DeleteBundle { id: i64 },
    /// Delete one database file entirely and recreate it empty
    Reset {
        #[arg(value_enum)]
        store: StoreKind,
    },
    /// Show or edit the song list
    Selection {
        #[command(subcommand)]
        action: SelectionAction,
    },
}

#[derive(Clone, Copy, ValueEnum)]
enum StoreKind {
    Documents,
    Songs,
}

#[derive(Subcommand)]
enum SelectionAction {
    /// Print the song list
    Show,
    /// Append a song by id
    Add { song_id: i64 },
    /// Remove the song at an index
    Remove { index: i64 },
    /// Drop entries whose song no longer exists
    Cleanup,
    /// Remove every entry
    Clear,
}

fn main() -> Result<()> {
    let cli = Cli::parse();
    init_logging(cli.verbose);

    let data_dir = match cli.data_dir {
        Some(dir) => dir,
        None => default_data_dir().context("Failed to resolve the data directory")?,
    };

    match cli.command {
        Commands::ImportDocuments { file } => {
            let remote: RemoteDocumentGroup = read_payload(&file)?;
            let store = open(StoreConfig::documents(&data_dir))?;
            report(import::import_document_group(&store, &remote))
        }
        Commands::UpdateDocuments { file } => {
            let remote: RemoteDocumentGroup = read_payload(&file)?;
            let store = open(StoreConfig::documents(&data_dir))?;
            report(import::update_document_group(&store, &remote))
        }
        Commands::ImportSongs { file } => {
            let remote: RemoteSongBundle = read_payload(&file)?;
            let store = open(StoreConfig::songs(&data_dir))?;
            report(import::import_song_bundle(&store, &remote))
        }
        Commands::UpdateSongs { file } => {
            let remote: RemoteSongBundle = read_payload(&file)?;
            let store = open(StoreConfig::songs(&data_dir))?;
            report(import::update_song_bundle(&store, &remote))
        }
        Commands::Documents => cmd_documents(&data_dir),
        Commands::Bundles => cmd_bundles(&data_dir),
        Commands::DeleteGroup { id } => {
            let store = open(StoreConfig::documents(&data_dir))?;
            let group = db::find_group(&store, id)?
                .with_context(|| format!("No document group with id {id}"))?;
            report(cascade::delete_document_group(&store, &group))
        }
        Commands::DeleteBundle { id } => {
            let store = open(StoreConfig::songs(&data_dir))?;
            let bundle = db::find_bundle(&store, id)?
                .with_context(|| format!("No song bundle with id {id}"))?;
            report(cascade::delete_song_bundle(&store, &bundle))
        }
        Commands::Reset { store } => {
            let config = match store {
                StoreKind::Documents => StoreConfig::documents(&data_dir),
                StoreKind::Songs => StoreConfig::songs(&data_dir),
            };
            let mut store = open(config)?;
            report(cascade::delete_all(&mut store))
        }
        Commands::Selection { action } => cmd_selection(&data_dir, action),
    }
}

/// `RUST_LOG` wins; otherwise `info`, or `debug` with `--verbose`.
fn init_logging(verbose: bool) {
    let default_level = if verbose { "debug" } else { "info" };
    let filter =
        EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(default_level));

    let _ = tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(std::io::stderr)
        .try_init();
}

fn open(config: StoreConfig) -> Result<Store> {
    let path = config.path.clone();
    let mut store = Store::new(config);
    store
        .connect()
        .with_context(|| format!("Failed to open {}", path.display()))?;
    Ok(store)
}

fn read_payload<T: serde::de::DeserializeOwned>(file: &Path) -> Result<T> {
    let json = fs::read_to_string(file)
        .with_context(|| format!("Failed to read {}", file.display()))?;
    serde_json::from_str(&json).with_context(|| format!("Failed to parse {}", file.display()))
}

/// Print the outcome's message; a failed outcome becomes the process error.
fn report<T>(outcome: Outcome<T>) -> Result<()> {
    if outcome.success {
        println!("{}", outcome.message());
        return Ok(());
    }

    let message = outcome.message().to_string();
    match outcome.error {
        Some(err) => Err(anyhow::Error::new(err).context(message)),
        None => bail!(message),
    }
}

fn cmd_documents(data_dir: &Path) -> Result<()> {
    let store = open(StoreConfig::documents(data_dir))?;
    let groups = db::load_root_groups(&store)?;

    if groups.is_empty() {
        println!("No document groups stored.");
        return Ok(());
    }

    for group in groups {
        println!("{:>4}  {}", group.id, group);
        for child in db::child_groups(&store, &group)? {
            println!("{:>4}    {}", child.id, child);
        }
    }
    Ok(())
}

fn cmd_bundles(data_dir: &Path) -> Result<()> {
    let store = open(StoreConfig::songs(data_dir))?;
    let bundles = db::load_song_bundles(&store)?;

    if bundles.is_empty() {
        println!("No song bundles stored.");
        return Ok(());
    }

    for bundle in bundles {
        println!("{:>4}  {}", bundle.id, bundle);
    }
    Ok(())
}

fn cmd_selection(data_dir: &Path, action: SelectionAction) -> Result<()> {
    let store = open(StoreConfig::songs(data_dir))?;

    match action {
        SelectionAction::Show => {
            let entries = selection::entries(&store)?;
            if entries.is_empty() {
                println!("The song list is empty.");
            }
            for entry in entries {
                let Some(song_id) = entry.song_id else {
                    continue;
                };
                match db::find_song(&store, song_id)? {
                    Some(song) => println!("{:>3}  {}", entry.index, song.display_title()),
                    None => println!("{:>3}  (song {song_id} unavailable)", entry.index),
                }
            }
            Ok(())
        }
        SelectionAction::Add { song_id } => {
            let song = db::find_song(&store, song_id)?
                .with_context(|| format!("No song with id {song_id}"))?;
            report(selection::append(&store, &song))
        }
        SelectionAction::Remove { index } => report(selection::remove_at(&store, index)),
        SelectionAction::Cleanup => report(selection::cleanup_orphans(&store)),
        SelectionAction::Clear => report(selection::clear(&store)),
    }
}
