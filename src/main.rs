use std::fs::File;
use std::io::BufWriter;
use std::path::PathBuf;
use std::sync::Arc;

use anyhow::{Context, Result};
use arrow::array::{ArrayRef, StringArray};
use arrow::record_batch::RecordBatch;
use arrow::util::pretty::pretty_format_batches;
use clap::{Parser, Subcommand};

use calibration_store::config::Settings;
use calibration_store::data::export::write_csv;
use calibration_store::logging::{self, LogConfig};
use calibration_store::store::{
    numbered_folders, DatasetLoader, LoadedRun, DEFAULT_TARGET, INITIAL_PARAMETERS,
};
use calibration_store::Dataset;

/// Locate and inspect stored calibration runs
#[derive(Parser)]
#[command(name = "calibration-store")]
#[command(author, version, about, long_about = None)]
struct Cli {
    /// Storage root (defaults to the location in the qualibrate settings)
    #[arg(long, env = "CALIBRATION_STORAGE_ROOT", global = true)]
    root: Option<PathBuf>,

    /// Increase verbosity (-v, -vv)
    #[arg(short, long, action = clap::ArgAction::Count, global = true)]
    verbose: u8,

    /// Plain log output without colour
    #[arg(long, global = true)]
    no_color: bool,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Print the folder of a run
    Locate {
        /// Run number (the N of `#N_name`)
        serial: u64,
    },

    /// List every numbered run folder
    List,

    /// Summarise the dataset, qubits and metadata of a run
    Show {
        serial: u64,

        /// Stem of the dataset file
        #[arg(short, long, default_value = DEFAULT_TARGET)]
        target: String,
    },

    /// Write a run's dataset as long-format CSV
    Export {
        serial: u64,

        #[arg(short, long, default_value = DEFAULT_TARGET)]
        target: String,

        /// Output CSV file
        #[arg(short, long)]
        output: PathBuf,
    },
}

fn main() -> Result<()> {
    let cli = Cli::parse();

    let log_config = LogConfig {
        colored: !cli.no_color,
        ..LogConfig::from_verbosity(cli.verbose)
    };
    logging::init(&log_config).context("installing logger")?;

    let root = match cli.root {
        Some(root) => root,
        None => Settings::resolve()
            .context("resolving storage location (pass --root to skip settings)")?
            .storage_location(),
    };
    let loader = DatasetLoader::new(root);

    match cli.command {
        Commands::Locate { serial } => {
            let folder = loader.locate(serial)?;
            println!("{}", folder.display());
        }
        Commands::List => {
            for folder in numbered_folders(loader.root()) {
                println!("#{:<6} {:<32} {}", folder.id, folder.suffix, folder.path.display());
            }
        }
        Commands::Show { serial, target } => {
            if let Some(run) = loader.load(serial, &target)? {
                print_summary(&run)?;
            }
        }
        Commands::Export {
            serial,
            target,
            output,
        } => {
            if let Some(run) = loader.load(serial, &target)? {
                let file = File::create(&output)
                    .with_context(|| format!("creating {}", output.display()))?;
                write_csv(&run.dataset, BufWriter::new(file))?;
                println!("Wrote {} to {}", target, output.display());
            }
        }
    }
    Ok(())
}

fn print_summary(run: &LoadedRun) -> Result<()> {
    println!("Run folder: {}", run.folder.display());
    println!("{}", pretty_format_batches(&[variables_batch(&run.dataset)?])?);

    let qubits: Vec<&str> = run.qubits.iter().map(|q| q.name.as_str()).collect();
    println!("Qubits: {}", qubits.join(", "));

    if let Some(params) = run.metadata.get(INITIAL_PARAMETERS).and_then(|p| p.as_object()) {
        println!("Initial parameters:");
        for (name, value) in params {
            println!("  {name} = {value}");
        }
    }
    Ok(())
}

/// One row per data variable: name, dims and shape.
fn variables_batch(dataset: &Dataset) -> Result<RecordBatch> {
    let mut names = Vec::new();
    let mut dims = Vec::new();
    let mut shapes = Vec::new();
    for (name, var) in dataset.variables() {
        names.push(name.to_string());
        dims.push(var.dims.join(", "));
        shapes.push(format!("{:?}", var.shape()));
    }
    let columns: Vec<(&str, ArrayRef)> = vec![
        ("variable", Arc::new(StringArray::from(names)) as ArrayRef),
        ("dims", Arc::new(StringArray::from(dims)) as ArrayRef),
        ("shape", Arc::new(StringArray::from(shapes)) as ArrayRef),
    ];
    Ok(RecordBatch::try_from_iter(columns)?)
}
