//! Breakthrough-curve chart
//!
//! Renders the recorded outlet curves — normalized partial pressure against
//! dimensionless time — to a PNG. One line per component, carrier included:
//! its roll-up hump above 1 is part of the physics and worth seeing.

use std::error::Error;

use plotters::prelude::*;

use crate::column::GasComponent;
use crate::output::BreakthroughRecorder;

/// Plot every recorded component curve to `path`
pub fn plot_breakthrough(
    recorder: &BreakthroughRecorder,
    components: &[GasComponent],
    title: &str,
    path: &str,
) -> Result<(), Box<dyn Error>> {
    if recorder.is_empty() {
        return Err("no frames recorded: nothing to plot".into());
    }

    let tau_max = recorder.taus.last().copied().unwrap_or(1.0).max(1e-12);
    let y_max = recorder
        .outlet
        .iter()
        .flat_map(|series| series.iter().copied())
        .fold(1.0_f64, f64::max)
        * 1.05;

    let root = BitMapBackend::new(path, (1024, 768)).into_drawing_area();
    root.fill(&WHITE)?;

    let mut chart = ChartBuilder::on(&root)
        .caption(title, ("sans-serif", 28))
        .margin(20)
        .x_label_area_size(50)
        .y_label_area_size(60)
        .build_cartesian_2d(0.0..tau_max, 0.0..y_max)?;

    chart
        .configure_mesh()
        .x_desc("Dimensionless time, tau = t v / L")
        .y_desc("Normalized outlet partial pressure, p_i / (p_out y_i0)")
        .draw()?;

    for (j, component) in components.iter().enumerate() {
        let color = Palette99::pick(j).to_rgba();
        chart
            .draw_series(LineSeries::new(
                recorder.taus.iter().copied().zip(recorder.series(j).iter().copied()),
                color.stroke_width(2),
            ))?
            .label(format!("{} (y0={})", component.name, component.y_in))
            .legend(move |(x, y)| {
                PathElement::new(vec![(x, y), (x + 18, y)], color.stroke_width(2))
            });
    }

    chart
        .configure_series_labels()
        .border_style(BLACK)
        .background_style(WHITE.mix(0.85))
        .draw()?;

    root.present()?;
    log::info!("breakthrough chart written to {path}");
    Ok(())
}
