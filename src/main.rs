use anyhow::{bail, Result};
use clap::{CommandFactory, Parser, Subcommand, ValueHint};
use clap_complete::{generate, Shell};
use console::style;
use indicatif::{ProgressBar, ProgressStyle};
use std::io;
use std::path::PathBuf;
use tracing::{info, warn};

use heredity::{
    Execution, FileParser, InferenceEngine, ProbabilityTables, ReportFormat, ReportGenerator,
};

/// Pedigrees wider than this get a warning before enumeration starts
const LARGE_PEDIGREE: usize = 12;

/// Gene and trait posteriors for every member of a family pedigree
#[derive(Parser, Debug)]
#[command(
    name = "heredity",
    version,
    about = "Exact inference of inherited gene and trait probabilities",
    long_about = r#"
Computes, for every person in a pedigree, the probability of carrying 0, 1 or 2
copies of a trait-linked gene and the probability of showing the trait.

The pedigree is a CSV (or TSV) file with columns name, mother, father, trait.
Parents are both blank or both set; trait is 1, 0 or blank for unknown.
"#
)]
#[command(arg_required_else_help = true, args_conflicts_with_subcommands = true)]
struct Cli {
    /// Pedigree data file
    #[arg(value_name = "FILE", value_hint = ValueHint::FilePath)]
    pedigree: Option<PathBuf>,

    /// TOML file with probability tables (defaults to the built-in tables)
    #[arg(short = 'p', long, value_name = "FILE", value_hint = ValueHint::FilePath, env = "HEREDITY_TABLES")]
    tables: Option<PathBuf>,

    /// Override the mutation rate from the tables
    #[arg(short, long, value_name = "RATE")]
    mutation_rate: Option<f64>,

    /// Output format
    #[arg(short, long, value_enum, default_value = "text")]
    format: OutputFormat,

    /// Write the report to a file instead of stdout
    #[arg(short, long, value_name = "FILE", value_hint = ValueHint::FilePath)]
    output: Option<PathBuf>,

    /// Number of threads (0 = auto-detect)
    #[arg(short, long, default_value = "0")]
    threads: usize,

    /// Accumulate on a single thread in a fixed order
    #[arg(short, long)]
    sequential: bool,

    /// Hide the progress bar
    #[arg(long)]
    no_progress: bool,

    /// Enable verbose logging
    #[arg(short, long, action = clap::ArgAction::Count)]
    verbose: u8,

    #[command(subcommand)]
    command: Option<Commands>,
}

#[derive(Subcommand, Debug)]
enum Commands {
    /// Generate shell completions
    Completions { shell: Shell },
    /// Print the active probability tables as TOML
    Tables {
        /// TOML file to validate and print instead of the built-in tables
        #[arg(value_name = "FILE", value_hint = ValueHint::FilePath)]
        file: Option<PathBuf>,
    },
}

#[derive(Debug, Clone, Copy, Default, clap::ValueEnum)]
enum OutputFormat {
    #[default]
    Text,
    Json,
    Csv,
    Tsv,
}

impl From<OutputFormat> for ReportFormat {
    fn from(format: OutputFormat) -> ReportFormat {
        match format {
            OutputFormat::Text => ReportFormat::Text,
            OutputFormat::Json => ReportFormat::Json,
            OutputFormat::Csv => ReportFormat::Csv,
            OutputFormat::Tsv => ReportFormat::Tsv,
        }
    }
}

fn main() -> Result<()> {
    let cli = Cli::parse();

    init_logging(cli.verbose);

    match &cli.command {
        Some(Commands::Completions { shell }) => {
            generate_completions(*shell);
            return Ok(());
        }
        Some(Commands::Tables { file }) => {
            let tables = load_tables(file.as_ref(), None)?;
            print!("{}", tables.to_toml_string()?);
            return Ok(());
        }
        None => {}
    }

    let config = AppConfig::from_cli(&cli)?;

    init_thread_pool(config.threads)?;

    run_inference(config)
}

fn generate_completions(shell: Shell) {
    let mut cmd = Cli::command();
    let name = cmd.get_name().to_string();
    generate(shell, &mut cmd, name, &mut io::stdout());
}

fn init_logging(verbose: u8) {
    let level = match verbose {
        0 => "warn",
        1 => "info",
        2 => "debug",
        _ => "trace",
    };

    tracing_subscriber::fmt()
        .with_env_filter(format!("heredity={}", level))
        .with_writer(io::stderr)
        .init();
}

fn init_thread_pool(threads: usize) -> Result<()> {
    let num_threads = if threads == 0 {
        num_cpus::get()
    } else {
        threads
    };

    rayon::ThreadPoolBuilder::new()
        .num_threads(num_threads)
        .build_global()
        .map_err(|e| anyhow::anyhow!("Failed to initialize thread pool: {}", e))?;

    Ok(())
}

fn load_tables(path: Option<&PathBuf>, mutation_rate: Option<f64>) -> Result<ProbabilityTables> {
    let mut tables = match path {
        Some(path) => {
            info!("Loading probability tables from {}", path.display());
            ProbabilityTables::from_path(path)?
        }
        None => ProbabilityTables::default(),
    };

    if let Some(rate) = mutation_rate {
        tables = tables.with_mutation_rate(rate);
    }
    tables.validate()?;

    Ok(tables)
}

fn run_inference(config: AppConfig) -> Result<()> {
    let pedigree = FileParser::new().parse(&config.pedigree)?;
    info!(
        "Loaded {} individuals from {}",
        pedigree.len(),
        config.pedigree.display()
    );
    if pedigree.len() > LARGE_PEDIGREE {
        warn!(
            "{} individuals: exact enumeration grows as 3^n and may take a long time",
            pedigree.len()
        );
    }

    let engine = InferenceEngine::new(&pedigree, config.tables)?;
    let space = engine.search_space();
    info!(
        "Search space: {} enumeration steps, using {} threads",
        space.steps(),
        if config.execution == Execution::Parallel {
            rayon::current_num_threads()
        } else {
            1
        }
    );

    let pb = if config.progress {
        let pb = ProgressBar::new(space.work_units);
        pb.set_style(
            ProgressStyle::default_bar()
                .template("{spinner:.green} [{elapsed_precise}] [{bar:40.cyan/blue}] {pos}/{len} {msg}")?
                .progress_chars("#>-"),
        );
        pb.set_message("Enumerating assignments...");
        pb
    } else {
        ProgressBar::hidden()
    };

    let posteriors = engine.run_with_progress(config.execution, || pb.inc(1))?;
    pb.finish_and_clear();

    let source = config.pedigree.to_string_lossy();
    let generator = ReportGenerator::new(&source, engine.tables());
    generator.generate(&posteriors, config.format, config.output.as_deref())?;

    if let Some(output) = &config.output {
        eprintln!(
            "{} Report saved to: {}",
            style("✓").green().bold(),
            style(output.display()).cyan()
        );
    }

    Ok(())
}

#[derive(Debug)]
struct AppConfig {
    pedigree: PathBuf,
    tables: ProbabilityTables,
    format: ReportFormat,
    output: Option<PathBuf>,
    threads: usize,
    execution: Execution,
    progress: bool,
}

impl AppConfig {
    fn from_cli(cli: &Cli) -> Result<Self> {
        let Some(pedigree) = cli.pedigree.clone() else {
            bail!("A pedigree file is required");
        };

        Ok(Self {
            pedigree,
            tables: load_tables(cli.tables.as_ref(), cli.mutation_rate)?,
            format: cli.format.into(),
            output: cli.output.clone(),
            threads: cli.threads,
            execution: if cli.sequential {
                Execution::Sequential
            } else {
                Execution::Parallel
            },
            progress: !cli.no_progress && console::Term::stderr().is_term(),
        })
    }
}
