use clap::{Args, Parser, Subcommand};
use log::LevelFilter;
use log4rs::append::console::ConsoleAppender;
use log4rs::append::file::FileAppender;
use log4rs::config::{Appender, Config, Root};
use log4rs::encode::pattern::PatternEncoder;
use rand::SeedableRng;
use rand_chacha::ChaCha8Rng;
use serde::Serialize;
use sha2::{Digest, Sha256};
use std::fs::{self, File};
use std::io::{BufWriter, Write};
use std::path::{Path, PathBuf};

use rusty_brunel::config::{self, FigureConfig, SimulationConfig};
use rusty_brunel::error::SNNError;
use rusty_brunel::figure::{self, FigureData};
use rusty_brunel::network::Network;
use rusty_brunel::neuron::Neuron;
use rusty_brunel::recorder::{GdfRecorder, SPIKES_FILE};
use rusty_brunel::spike_log::SpikeLog;

const CONFIG_FILE: &str = "config.json";
const LOG_FILE: &str = "run.log";
const FIGURE_FILE: &str = "figure.png";

#[derive(Parser, Debug)]
#[command(version, about)]
struct Cli {
    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand, Debug)]
enum Command {
    /// Simulate a network and record its spikes
    Simulate(SimulateArgs),
    /// Draw the raster and rate histogram of a spike log
    Plot(PlotArgs),
}

#[derive(Args, Debug)]
struct SimulateArgs {
    /// The JSON configuration, overridden by the options below
    #[arg(long)]
    config: Option<PathBuf>,
    /// The number of neurons
    #[arg(short = 'N', long)]
    num_neurons: Option<usize>,
    /// The simulated time [ms]
    #[arg(short = 'T', long)]
    stop_time: Option<f64>,
    /// The seed used for network sampling and external input
    #[arg(long)]
    seed: Option<u64>,
    /// The relative strength of inhibition
    #[arg(long)]
    g: Option<f64>,
    /// The relative strength of the external drive
    #[arg(long)]
    eta: Option<f64>,
    /// The external current injected in every neuron
    #[arg(long)]
    iext: Option<f64>,
    /// The directory where run directories are created
    #[arg(long, default_value = "runs")]
    out_dir: PathBuf,
    /// Do not draw the figure
    #[arg(long)]
    no_plot: bool,
}

#[derive(Args, Debug)]
struct PlotArgs {
    /// The spike log to read
    input: PathBuf,
    /// The PNG file to write
    #[arg(short, long)]
    output: PathBuf,
    /// The JSON figure configuration, overridden by the options below
    #[arg(long)]
    config: Option<PathBuf>,
    /// Start of the time window [ms]
    #[arg(long)]
    start: Option<f64>,
    /// End of the time window [ms]
    #[arg(long)]
    end: Option<f64>,
    /// Only the neurons with a smaller index are drawn
    #[arg(long)]
    max_neuron: Option<usize>,
    /// The number of neurons in the logged network
    #[arg(long)]
    network_size: Option<usize>,
    /// The number of histogram bins
    #[arg(long)]
    bins: Option<usize>,
    /// Factor converting the logged times to ms
    #[arg(long)]
    time_scale: Option<f64>,
    /// Upper limit of the histogram axis
    #[arg(long)]
    rate_ylim: Option<f64>,
    /// Where to write the histogram as JSON
    #[arg(long)]
    histogram_out: Option<PathBuf>,
}

#[derive(Serialize)]
struct HistogramReport<'a> {
    edges: &'a [f64],
    counts: &'a [usize],
    /// Population rate per bin [Hz]
    rates: Vec<f64>,
}

fn init_logging(log_path: Option<&Path>) -> Result<(), SNNError> {
    let pattern = "{l} - {m}\n";
    let stdout = ConsoleAppender::builder()
        .encoder(Box::new(PatternEncoder::new(pattern)))
        .build();

    let mut builder =
        Config::builder().appender(Appender::builder().build("stdout", Box::new(stdout)));
    let mut root = Root::builder().appender("stdout");

    if let Some(log_path) = log_path {
        let logfile = FileAppender::builder()
            .encoder(Box::new(PatternEncoder::new(pattern)))
            .build(log_path)
            .map_err(|e| SNNError::IOError(e.to_string()))?;
        builder = builder.appender(Appender::builder().build("logfile", Box::new(logfile)));
        root = root.appender("logfile");
    }

    let config = builder
        .build(root.build(LevelFilter::Info))
        .map_err(|e| SNNError::IOError(e.to_string()))?;
    log4rs::init_config(config).map_err(|e| SNNError::IOError(e.to_string()))?;
    Ok(())
}

impl SimulateArgs {
    /// Override the configuration with the options given on the command line.
    fn apply(&self, config: &mut SimulationConfig) {
        if let Some(num_neurons) = self.num_neurons {
            config.num_neurons = num_neurons;
        }
        if let Some(stop_time) = self.stop_time {
            config.stop_time = stop_time;
        }
        if let Some(seed) = self.seed {
            config.seed = seed;
        }
        if let Some(g) = self.g {
            config.params.g = g;
        }
        if let Some(eta) = self.eta {
            config.params.eta = eta;
        }
        if let Some(iext) = self.iext {
            config.iext = iext;
        }
        if self.no_plot {
            config.plot = false;
        }
    }
}

impl PlotArgs {
    /// Override the configuration with the options given on the command line.
    fn apply(&self, config: &mut FigureConfig) {
        if let Some(start) = self.start {
            config.window_start = start;
        }
        if let Some(end) = self.end {
            config.window_end = end;
        }
        if let Some(max_neuron) = self.max_neuron {
            config.max_neuron = max_neuron;
        }
        if let Some(network_size) = self.network_size {
            config.network_size = Some(network_size);
        }
        if let Some(bins) = self.bins {
            config.bins = bins;
        }
        if let Some(time_scale) = self.time_scale {
            config.time_scale = time_scale;
        }
        if let Some(rate_ylim) = self.rate_ylim {
            config.rate_ylim = rate_ylim;
        }
    }
}

/// The directory of a run, named after the hash of its configuration.
fn run_dir(out_dir: &Path, config: &SimulationConfig) -> PathBuf {
    let mut hasher = Sha256::new();
    hasher.update(format!("{:?}", config));
    out_dir.join(format!("{:x}", hasher.finalize()))
}

/// Draw the figure of a spike log and save it as PNG.
fn draw(log: &SpikeLog, config: &FigureConfig, output: &Path) -> Result<FigureData, SNNError> {
    let data = FigureData::prepare(log, config)?;
    let image = figure::render(&data, config)?;
    figure::save_png(&image, output)?;
    Ok(data)
}

fn write_histogram_report(data: &FigureData, path: &Path) -> Result<(), SNNError> {
    let histogram = data.histogram();
    let report = HistogramReport {
        edges: histogram.edges(),
        counts: histogram.counts(),
        rates: data.rates()?,
    };
    let mut writer = BufWriter::new(File::create(path)?);
    serde_json::to_writer_pretty(&mut writer, &report)
        .map_err(|e| SNNError::IOError(e.to_string()))?;
    writer.flush()?;
    log::info!("Histogram saved to {}", path.display());
    Ok(())
}

fn simulate(args: SimulateArgs) -> Result<(), SNNError> {
    let mut config: SimulationConfig = match &args.config {
        Some(path) => config::load(path)?,
        None => SimulationConfig::default(),
    };
    args.apply(&mut config);
    config.validate()?;

    // Runs with the same configuration share their directory
    let run_dir = run_dir(&args.out_dir, &config);
    fs::create_dir_all(&run_dir)
        .map_err(|e| SNNError::IOError(format!("{}: {}", run_dir.display(), e)))?;

    init_logging(Some(&run_dir.join(LOG_FILE)))?;
    log::info!("{:?}", config);
    log::info!("Writing to {}", run_dir.display());

    config::save_to(&config, run_dir.join(CONFIG_FILE))?;

    let mut rng = ChaCha8Rng::seed_from_u64(config.seed);
    let neurons = vec![Neuron::new(config.iext, 0.0); config.num_neurons];
    let mut network = Network::new(neurons, config.topology(), config.params.clone(), &mut rng)?;
    log::info!("Network sampling: done!");

    let mut recorder = GdfRecorder::create(&run_dir)?;
    network.run_until(config.stop_time, &mut rng, &mut recorder)?;
    recorder.finish()?;
    log::info!("Simulation: done! {} spikes recorded", network.total_spikes());

    if config.plot {
        let log = SpikeLog::load(run_dir.join(SPIKES_FILE))?;
        draw(&log, &config.figure_config(), &run_dir.join(FIGURE_FILE))?;
    }
    Ok(())
}

fn plot(args: PlotArgs) -> Result<(), SNNError> {
    init_logging(None)?;

    let mut config: FigureConfig = match &args.config {
        Some(path) => config::load(path)?,
        None => FigureConfig::default(),
    };
    args.apply(&mut config);
    log::info!("{:?}", config);

    let log = SpikeLog::load(&args.input)?;
    let data = draw(&log, &config, &args.output)?;
    if let Some(path) = &args.histogram_out {
        write_histogram_report(&data, path)?;
    }
    Ok(())
}

fn main() -> Result<(), SNNError> {
    let cli = Cli::parse();
    match cli.command {
        Command::Simulate(args) => simulate(args),
        Command::Plot(args) => plot(args),
    }
}

#[cfg(test)]
mod tests {
    use approx::assert_relative_eq;
    use rusty_brunel::config::HistogramRange;
    use rusty_brunel::spike_log::SpikeRecord;

    use super::*;

    fn parse(args: &[&str]) -> Command {
        Cli::try_parse_from(args).unwrap().command
    }

    #[test]
    fn test_simulate_overrides() {
        let Command::Simulate(args) = parse(&[
            "rusty_brunel", "simulate", "-N", "200", "--stop-time", "50", "--seed", "7", "--g",
            "4.5", "--iext", "1.01", "--no-plot",
        ]) else {
            panic!("expected the simulate command");
        };
        let mut config = SimulationConfig::default();
        args.apply(&mut config);

        assert_eq!(config.num_neurons, 200);
        assert_eq!(config.stop_time, 50.0);
        assert_eq!(config.seed, 7);
        assert_eq!(config.params.g, 4.5);
        assert_eq!(config.params.eta, 2.0);
        assert_eq!(config.iext, 1.01);
        assert!(!config.plot);
        assert_eq!(args.out_dir, PathBuf::from("runs"));
    }

    #[test]
    fn test_run_dir() {
        let out_dir = Path::new("runs");
        let config = SimulationConfig::default();
        let dir = run_dir(out_dir, &config);
        assert_eq!(dir, run_dir(out_dir, &config.clone()));
        assert_eq!(dir.parent(), Some(out_dir));
        assert_eq!(dir.file_name().unwrap().len(), 64);

        let other = SimulationConfig { seed: 43, ..Default::default() };
        assert_ne!(dir, run_dir(out_dir, &other));
    }

    #[test]
    fn test_plot_overrides() {
        let Command::Plot(args) = parse(&[
            "rusty_brunel", "plot", "spikes.gdf", "-o", "figure.png", "--start", "0", "--end",
            "4", "--bins", "1", "--network-size", "20",
        ]) else {
            panic!("expected the plot command");
        };
        let mut config = FigureConfig::default();
        args.apply(&mut config);

        assert_eq!(args.input, PathBuf::from("spikes.gdf"));
        assert_eq!((config.window_start, config.window_end), (0.0, 4.0));
        assert_eq!(config.bins, 1);
        assert_eq!(config.max_neuron, 50);
        assert_eq!(config.num_neurons(), 20);
        assert!(args.histogram_out.is_none());
    }

    #[test]
    fn test_histogram_report() {
        // Neurons 1 to 50 fire once at step 0; ids 1 to 49 are kept
        let log = SpikeLog::from_records((1..=50).map(|id| SpikeRecord::new(0.0, id)).collect());
        let config = FigureConfig {
            window_start: 0.0,
            window_end: 4.0,
            bins: 1,
            histogram_range: HistogramRange::Window,
            width: 300,
            height: 240,
            ..Default::default()
        };

        let dir = tempfile::tempdir().unwrap();
        let data = draw(&log, &config, &dir.path().join("figure.png")).unwrap();
        let path = dir.path().join("histogram.json");
        write_histogram_report(&data, &path).unwrap();

        let report: serde_json::Value =
            serde_json::from_str(&fs::read_to_string(&path).unwrap()).unwrap();
        assert_eq!(report["edges"], serde_json::json!([0.0, 4.0]));
        assert_eq!(report["counts"], serde_json::json!([49]));
        assert_relative_eq!(report["rates"][0].as_f64().unwrap(), 250.0);
    }
}
