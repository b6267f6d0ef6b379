use ancestry_hmm::file::{writer_or_stdout, InputFile};
use ancestry_hmm::matrices::{
    read_calls, read_positions, read_success_rates, write_calls, write_posteriors,
};
use ancestry_hmm::{AncestryError, CallFilter, FilterConfig, GeneticMap, HmmFilter, Position};
use clap::{Parser, Subcommand};
use log::info;
use std::io::{self, BufRead, Write};

const PROGRAM_NAME: &str = "ancestry-hmm";

const INFO: &str = "\
ancestry-hmm: smooth local ancestry window calls with a genetic-map-aware HMM
usage: ancestry-hmm [--help] <subcommand>

Subcommands:

  smooth: forward-backward smoothing of a raw window call matrix.
  lookup: genetic map positions (cM) of physical positions.

";

#[derive(Parser)]
#[clap(name = "ancestry-hmm")]
#[clap(about = INFO)]
struct Cli {
    #[arg(short, long, action = clap::ArgAction::Count)]
    debug: u8,

    #[command(subcommand)]
    command: Option<Commands>,
}

#[derive(Subcommand)]
enum Commands {
    /// Smooth the raw ancestry calls of every sample.
    ///
    /// The raw call matrix is tab-delimited with one row per window and one
    /// column per sample; the smoothed matrix is written in the same layout.
    ///
    /// Example:
    ///
    ///  $ ancestry-hmm smooth --genetic-map genetic_map_chr22_b36.txt \
    ///      --positions chr22_snps.txt --success-rate chr22_success.txt \
    ///      --calls chr22_raw.tsv --generations 10 --classes 3 \
    ///      --output chr22_smoothed.tsv
    Smooth {
        /// physical-to-genetic map (header line, then bp and cM in columns 1 and 3)
        #[arg(long, required = true)]
        genetic_map: String,
        /// SNP physical positions, one per line
        #[arg(long, required = true)]
        positions: String,
        /// per-window classifier success rates, one per line
        #[arg(long, required = true)]
        success_rate: String,
        /// raw calls, tab-delimited, windows by samples
        #[arg(long, required = true)]
        calls: String,
        /// JSON filter config; command-line values take precedence
        #[arg(long)]
        config: Option<String>,
        /// generations since admixture
        #[arg(long)]
        generations: Option<f64>,
        /// number of ancestral populations
        #[arg(long)]
        classes: Option<usize>,
        /// the output file path for smoothed calls (if not set, uses standard out)
        #[arg(long)]
        output: Option<String>,
        /// also write per-window posterior probabilities here
        #[arg(long)]
        posteriors: Option<String>,
        /// include a header in the posteriors output
        #[arg(long, default_value_t = false)]
        header: bool,
        /// number of worker threads (default: all cores)
        #[arg(long)]
        threads: Option<usize>,
    },
    /// Print the genetic map position of each physical position.
    ///
    /// Output is a TSV of physical position and genetic position (cM).
    Lookup {
        /// physical-to-genetic map (header line, then bp and cM in columns 1 and 3)
        #[arg(long, required = true)]
        genetic_map: String,
        /// file of physical positions, one per line (if not set, reads standard in)
        positions: Option<String>,
    },
}

fn setup_logger(debug: bool) -> Result<(), fern::InitError> {
    let level = if debug {
        log::LevelFilter::Debug
    } else {
        log::LevelFilter::Info
    };
    fern::Dispatch::new()
        .format(|out, message, record| {
            out.finish(format_args!(
                "{}[{}][{}] {}",
                chrono::Local::now().format("[%Y-%m-%d][%H:%M:%S]"),
                PROGRAM_NAME,
                record.level(),
                message
            ))
        })
        .level(level)
        .chain(io::stderr())
        .apply()?;
    Ok(())
}

#[allow(clippy::too_many_arguments)]
fn smooth(
    genetic_map: &str,
    positions: &str,
    success_rate: &str,
    calls: &str,
    config: Option<&str>,
    generations: Option<f64>,
    classes: Option<usize>,
    output: Option<&str>,
    posteriors: Option<&str>,
    header: bool,
    threads: Option<usize>,
) -> Result<(), AncestryError> {
    if let Some(n) = threads {
        rayon::ThreadPoolBuilder::new()
            .num_threads(n)
            .build_global()
            .map_err(|e| AncestryError::Configuration(e.to_string()))?;
    }

    let mut filter_config = match config {
        Some(path) => FilterConfig::from_json_file(path)?,
        None => FilterConfig::default(),
    };
    if let Some(n_gens) = generations {
        filter_config.n_gens = n_gens;
    }
    if let Some(n_classes) = classes {
        filter_config.n_classes = n_classes;
    }
    info!(
        "filter parameters: {} generations, {} classes",
        filter_config.n_gens, filter_config.n_classes
    );

    let filter = HmmFilter::from_genetic_map_file(genetic_map, filter_config)?
        .with_posteriors(posteriors.is_some());
    let snps = read_positions(positions)?;
    let success = read_success_rates(success_rate)?;
    let raw = read_calls(calls)?;
    info!(
        "read {} SNPs and {} windows x {} samples of calls",
        snps.len(),
        raw.nrows(),
        raw.ncols()
    );

    let smoothed = filter.filter(&snps, &success, raw.view())?;
    write_calls(&smoothed.calls, output)?;
    if let (Some(path), Some(table)) = (posteriors, smoothed.posteriors.as_ref()) {
        write_posteriors(table, Some(path), header)?;
    }
    Ok(())
}

fn lookup(genetic_map: &str, positions: Option<&str>) -> Result<(), AncestryError> {
    let gm = GeneticMap::from_file(genetic_map)?;

    let lines: Vec<(usize, String)> = match positions {
        Some(path) => InputFile::new(path).data_lines(false)?,
        None => io::stdin()
            .lock()
            .lines()
            .enumerate()
            .map(|(i, line)| line.map(|l| (i + 1, l)))
            .collect::<Result<Vec<_>, _>>()?,
    };

    let mut writer = writer_or_stdout(None, None)?;
    for (line_num, line) in lines {
        let field = match line.split_whitespace().next() {
            Some(field) => field,
            None => continue,
        };
        let position: Position = field.parse().map_err(|_| {
            AncestryError::parse(line_num, format!("failed to parse position '{}'", field))
        })?;
        writeln!(writer, "{}\t{}", position, gm.lookup(position))?;
    }
    writer.flush()?;
    Ok(())
}

fn run() -> Result<(), AncestryError> {
    let cli = Cli::parse();
    if let Err(e) = setup_logger(cli.debug > 0) {
        eprintln!("Error: could not set up logging: {}", e);
    }
    match &cli.command {
        Some(Commands::Smooth {
            genetic_map,
            positions,
            success_rate,
            calls,
            config,
            generations,
            classes,
            output,
            posteriors,
            header,
            threads,
        }) => smooth(
            genetic_map,
            positions,
            success_rate,
            calls,
            config.as_deref(),
            *generations,
            *classes,
            output.as_deref(),
            posteriors.as_deref(),
            *header,
            *threads,
        ),
        Some(Commands::Lookup {
            genetic_map,
            positions,
        }) => lookup(genetic_map, positions.as_deref()),
        None => {
            println!("{}\n", INFO);
            std::process::exit(1);
        }
    }
}

fn main() {
    match run() {
        Ok(_) => {}
        Err(e) => {
            eprintln!("Error: {}", e);
            std::process::exit(1);
        }
    }
}
