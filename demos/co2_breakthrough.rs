//! Single-component CO2 breakthrough on a helium carrier
//!
//! Runs the classic clean-bed experiment, prints the half-breakthrough
//! time and writes the outlet data files plus a chart.
//!
//! ```bash
//! cargo run --example co2_breakthrough
//! ```

use std::error::Error;
use std::io;
use std::sync::{Arc, Mutex};

use adsorb_rs::column::{ColumnParameters, GasComponent};
use adsorb_rs::equilibrium::{IdealAdsorbedSolution, Isotherm};
use adsorb_rs::output::{
    plot_breakthrough, BreakthroughRecorder, BreakthroughWriter, ColumnObserver, Frame,
};
use adsorb_rs::solver::{Simulation, SimulationSettings};
use adsorb_rs::transport::MomentumClosure;

struct SharedRecorder(Arc<Mutex<BreakthroughRecorder>>);

impl ColumnObserver for SharedRecorder {
    fn on_frame(&mut self, frame: &Frame<'_>) -> io::Result<()> {
        self.0
            .lock()
            .map_err(|_| io::Error::new(io::ErrorKind::Other, "recorder poisoned"))?
            .on_frame(frame)
    }
}

fn main() -> Result<(), Box<dyn Error>> {
    env_logger::init();

    // He carrier at 90%, CO2 at 10%, a moderately strong Langmuir sorbent
    let components = vec![
        GasComponent::carrier("He", 0.9),
        GasComponent::new("CO2", 0.1, 0.5, Isotherm::langmuir(3.0, 2e-5)),
    ];

    let params = ColumnParameters {
        length: 0.3,
        n_grid: 100,
        temperature: 300.0,
        total_pressure: 1e5,
        particle_density: 16.0,
        entrance_velocity: 0.1,
        ..ColumnParameters::default()
    };

    let settings = SimulationSettings {
        dt: 0.01,
        n_steps: 0,
        auto_steps: true,
        print_every: 500,
        write_every: 5,
        ..SimulationSettings::default()
    };

    let oracle = Box::new(IdealAdsorbedSolution::from_components(&components));
    let mut simulation = Simulation::new(
        params,
        components.clone(),
        oracle,
        MomentumClosure::Continuity,
        settings,
    )?;
    println!("{}", simulation.summary());

    simulation.add_observer(Box::new(BreakthroughWriter::create(".", &components)?));
    let recorder = Arc::new(Mutex::new(BreakthroughRecorder::new()));
    simulation.add_observer(Box::new(SharedRecorder(Arc::clone(&recorder))));

    let report = simulation.run()?;
    println!(
        "finished after {} steps ({:.1} s of column time), {:.2} IAST iterations/call",
        report.steps,
        report.simulated_time,
        report.iast.average()
    );

    let recorder = recorder.lock().expect("recorder poisoned");
    if let Some(tau) = recorder.half_breakthrough_tau(1) {
        println!("CO2 half breakthrough at tau = {tau:.3}");
    }
    if let Err(e) =
        plot_breakthrough(&recorder, &components, "CO2 / He breakthrough", "breakthrough.png")
    {
        eprintln!("chart skipped: {e}");
    }

    Ok(())
}
