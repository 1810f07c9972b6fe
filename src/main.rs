//! Keystroke Auth - command line entry point
//!
//! Works on JSONL capture files: captures are loaded into an in-memory
//! store, bundles are written to the model directory.

use std::fs::{self, File};
use std::io::{BufReader, Write};
use std::path::{Path, PathBuf};
use std::sync::Arc;

use clap::{Parser, Subcommand};
use serde::Serialize;

use keystroke_auth::logic::dataset::dsl::read_dsl_csv;
use keystroke_auth::logic::dataset::writer::{read_captures, CaptureWriter};
use keystroke_auth::logic::dataset::{
    get_dataset_dir, partition_user, split_counts, NewCapture, RawKeystrokeCapture,
};
use keystroke_auth::logic::store::{FileModelStore, MemoryStore};
use keystroke_auth::logic::training::TrainingConfig;
use keystroke_auth::{BioAuthEngine, EngineConfig, EngineStores, Result};

#[derive(Parser)]
#[command(author, version, about, long_about = None)]
struct Cli {
    /// Model bundle directory (default: BIOAUTH_DATA_DIR/models)
    #[arg(long, global = true)]
    model_dir: Option<PathBuf>,

    /// Smaller ensembles for quick experiments
    #[arg(long, global = true)]
    fast: bool,

    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand)]
enum Command {
    /// Train and activate a model for one user
    Train {
        #[arg(long)]
        captures: PathBuf,
        #[arg(long)]
        user: String,
    },

    /// Train every user in the capture file
    TrainAll {
        #[arg(long)]
        captures: PathBuf,
    },

    /// Score one capture (JSON file) against the user's active model
    Score {
        #[arg(long)]
        captures: PathBuf,
        #[arg(long)]
        user: String,
        #[arg(long)]
        sample: PathBuf,
    },

    /// Collection, lockout and engine status for a user
    Status {
        #[arg(long)]
        captures: PathBuf,
        #[arg(long)]
        user: String,
    },

    /// Append a live capture (JSON file) to the capture directory
    Collect {
        #[arg(long)]
        user: String,
        #[arg(long)]
        sample: PathBuf,
        #[arg(long, default_value = "cli")]
        session: String,
        /// Default: BIOAUTH_DATA_DIR/captures
        #[arg(long)]
        dir: Option<PathBuf>,
    },

    /// Label each user's captures 70/15/15 in file order
    Partition {
        #[arg(long)]
        input: PathBuf,
        #[arg(long)]
        output: PathBuf,
    },

    /// Convert a DSL benchmark CSV into a labeled capture file
    ImportDsl {
        #[arg(long)]
        input: PathBuf,
        #[arg(long)]
        output: PathBuf,
    },
}

fn main() -> Result<()> {
    env_logger::Builder::from_env(env_logger::Env::default().default_filter_or("info")).init();

    let cli = Cli::parse();
    log::info!(
        "Starting {} v{}",
        keystroke_auth::constants::APP_NAME,
        keystroke_auth::constants::APP_VERSION
    );

    match cli.command {
        Command::Train { ref captures, ref user } => {
            let engine = open_engine(&cli, captures)?;
            let bundle = engine.train_user_model(user)?;
            print_json(&bundle.metadata)?;
        }
        Command::TrainAll { ref captures } => {
            let engine = open_engine(&cli, captures)?;
            print_json(&engine.train_all()?)?;
        }
        Command::Score {
            ref captures,
            ref user,
            ref sample,
        } => {
            let engine = open_engine(&cli, captures)?;
            let capture = read_sample(sample)?;
            print_json(&engine.score_authentication(user, &capture)?)?;
        }
        Command::Status {
            ref captures,
            ref user,
        } => {
            let engine = open_engine(&cli, captures)?;
            print_json(&engine.user_status(user)?)?;
            print_json(&engine.status()?)?;
        }
        Command::Collect {
            ref user,
            ref sample,
            ref session,
            ref dir,
        } => {
            let capture = read_sample(sample)?;
            let writer = CaptureWriter::from_path(dir.clone().unwrap_or_else(get_dataset_dir))?;
            writer.append(&NewCapture::live(user, session, capture))?;
            log::info!("Stored capture for {}", user);
        }
        Command::Partition {
            ref input,
            ref output,
        } => {
            let labeled = partition_by_user(read_captures(input)?);
            write_captures(output, &labeled)?;
            log::info!("Wrote {} labeled captures to {}", labeled.len(), output.display());
        }
        Command::ImportDsl {
            ref input,
            ref output,
        } => {
            let captures = read_dsl_csv(BufReader::new(File::open(input)?))?;
            write_captures(output, &captures)?;
            log::info!("Imported {} DSL captures into {}", captures.len(), output.display());
        }
    }

    Ok(())
}

fn open_engine(cli: &Cli, captures: &Path) -> Result<BioAuthEngine> {
    let mut config = EngineConfig::from_env();
    if let Some(dir) = &cli.model_dir {
        config.model_dir = dir.clone();
    }
    if cli.fast {
        config.training = TrainingConfig::fast();
    }

    let store = Arc::new(MemoryStore::from_captures(read_captures(captures)?)?);
    let models = Arc::new(FileModelStore::new(config.model_dir.clone())?);
    log::info!(
        "Loaded {}; bundles in {}",
        captures.display(),
        models.root().display()
    );
    Ok(BioAuthEngine::new(EngineStores::with_models(store, models), config))
}

/// Group by user in first-seen order, then label each group.
fn partition_by_user(captures: Vec<NewCapture>) -> Vec<NewCapture> {
    let mut groups: Vec<(String, Vec<NewCapture>)> = Vec::new();
    for capture in captures {
        match groups.iter_mut().find(|(user, _)| *user == capture.user_id) {
            Some((_, group)) => group.push(capture),
            None => groups.push((capture.user_id.clone(), vec![capture])),
        }
    }
    groups
        .into_iter()
        .flat_map(|(user, group)| {
            let (train, validation, test) = split_counts(group.len());
            log::info!(
                "{}: {} train / {} validation / {} test",
                user,
                train,
                validation,
                test
            );
            partition_user(group)
        })
        .collect()
}

fn write_captures(path: &Path, captures: &[NewCapture]) -> Result<()> {
    if let Some(parent) = path.parent() {
        fs::create_dir_all(parent)?;
    }
    let mut file = File::create(path)?;
    for capture in captures {
        writeln!(file, "{}", serde_json::to_string(capture)?)?;
    }
    Ok(())
}

fn read_sample(path: &Path) -> Result<RawKeystrokeCapture> {
    Ok(serde_json::from_reader(BufReader::new(File::open(path)?))?)
}

fn print_json<T: Serialize>(value: &T) -> Result<()> {
    println!("{}", serde_json::to_string_pretty(value)?);
    Ok(())
}
