//! Breakthrough simulator command line
//!
//! Reads a plaintext input file, runs the breakthrough simulation, writes
//! the component and column data files and, unless disabled, a breakthrough
//! chart. Exits 0 on success; any error prints to stderr and exits
//! non-zero.

use std::io;
use std::path::PathBuf;
use std::process::ExitCode;
use std::str::FromStr;
use std::sync::{Arc, Mutex};
use std::time::Instant;

use clap::Parser;

use adsorb_rs::config::SimulationInput;
use adsorb_rs::output::{
    plot_breakthrough, BreakthroughRecorder, BreakthroughWriter, ColumnObserver, Frame,
};
use adsorb_rs::solver::SimulationError;

#[derive(Parser)]
#[command(name = "adsorb-rs")]
#[command(version)]
#[command(about = "Fixed-bed adsorption breakthrough simulator", long_about = None)]
struct Cli {
    /// Input file (key/value format)
    #[arg(default_value = "simulation.input")]
    input: PathBuf,

    /// Directory for the output data files
    #[arg(short, long, default_value = ".")]
    output: PathBuf,

    /// Log level (trace, debug, info, warn, error)
    #[arg(short, long, default_value = "info")]
    log_level: String,

    /// Skip the breakthrough chart
    #[arg(long)]
    no_plot: bool,
}

fn main() -> ExitCode {
    let cli = Cli::parse();

    let level = log::LevelFilter::from_str(&cli.log_level).unwrap_or(log::LevelFilter::Info);
    env_logger::Builder::new().filter_level(level).init();

    match run(&cli) {
        Ok(()) => ExitCode::SUCCESS,
        Err(e) => {
            eprintln!("{e}");
            ExitCode::FAILURE
        }
    }
}

fn run(cli: &Cli) -> Result<(), SimulationError> {
    let input = SimulationInput::from_file(&cli.input)?;
    let display_name = input.display_name.clone();
    let components = input.components.clone();

    let mut simulation = input.build()?;
    print!("{}", simulation.summary());

    simulation.add_observer(Box::new(BreakthroughWriter::create(&cli.output, &components)?));
    let recorder = Arc::new(Mutex::new(BreakthroughRecorder::new()));
    simulation.add_observer(Box::new(SharedRecorder(Arc::clone(&recorder))));

    let before = Instant::now();
    let report = simulation.run()?;
    let elapsed = before.elapsed();

    log::info!(
        "simulated {} steps ({:.3} s of column time) in {:.3} s wall time",
        report.steps,
        report.simulated_time,
        elapsed.as_secs_f64()
    );
    log::info!("average mixture-prediction steps per call: {:.3}", report.iast.average());

    if !cli.no_plot {
        let recorder = recorder.lock().map_err(|_| poisoned())?;
        let path = cli.output.join("breakthrough.png");
        let title =
            if display_name.is_empty() { "Breakthrough".to_string() } else { display_name };
        if let Err(e) = plot_breakthrough(&recorder, &components, &title, &path.to_string_lossy())
        {
            log::warn!("breakthrough chart failed: {e}");
        }
    }

    Ok(())
}

fn poisoned() -> SimulationError {
    SimulationError::Io(io::Error::new(io::ErrorKind::Other, "recorder mutex poisoned"))
}

/// Observer adapter: the driver owns its observers, so the recorder sits
/// behind a shared handle the chart writer reads after the run
struct SharedRecorder(Arc<Mutex<BreakthroughRecorder>>);

impl ColumnObserver for SharedRecorder {
    fn on_frame(&mut self, frame: &Frame<'_>) -> io::Result<()> {
        let mut recorder = self
            .0
            .lock()
            .map_err(|_| io::Error::new(io::ErrorKind::Other, "recorder mutex poisoned"))?;
        recorder.on_frame(frame)
    }
}
