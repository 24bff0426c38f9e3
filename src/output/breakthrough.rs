//! Breakthrough data files
//!
//! Two plaintext streams, mirrored on the classic breakthrough tooling
//! format so existing plotting pipelines keep working:
//!
//! - `component_<k>_<name>.data` — one file per component, one line per
//!   frame: dimensionless time, time in minutes, normalized outlet partial
//!   pressure.
//! - `column.data` — a commented header naming every column, then one
//!   blank-line-separated block per frame with a line per node:
//!   `z V Pt {Q Qeq P Pnorm dPdt dQdt}` per component.
//!
//! Writers are buffered; a frame's rows hit the OS in one flush burst.

use std::fs::File;
use std::io::{self, BufWriter, Write};
use std::path::{Path, PathBuf};

use crate::column::GasComponent;
use crate::output::{ColumnObserver, Frame};

/// File-writing observer for the two breakthrough streams
pub struct BreakthroughWriter {
    component_files: Vec<BufWriter<File>>,
    column_file: BufWriter<File>,
}

impl BreakthroughWriter {
    /// Create the output files under `directory` and write the column-data
    /// header
    pub fn create(directory: impl AsRef<Path>, components: &[GasComponent]) -> io::Result<Self> {
        let directory = directory.as_ref();

        let mut component_files = Vec::with_capacity(components.len());
        for (k, component) in components.iter().enumerate() {
            let path: PathBuf =
                directory.join(format!("component_{}_{}.data", k, component.name));
            component_files.push(BufWriter::new(File::create(path)?));
        }

        let mut column_file = BufWriter::new(File::create(directory.join("column.data"))?);
        let mut column_nr = 1;
        writeln!(column_file, "# column {column_nr}: z  (column position)")?;
        column_nr += 1;
        writeln!(column_file, "# column {column_nr}: V  (velocity)")?;
        column_nr += 1;
        writeln!(column_file, "# column {column_nr}: Pt (total pressure)")?;
        column_nr += 1;
        for (j, component) in components.iter().enumerate() {
            for quantity in [
                "Q     (loading)",
                "Qeq   (equilibrium loading)",
                "P     (partial pressure)",
                "Pnorm (normalized partial pressure)",
                "Dpdt  (derivative P with t)",
                "Dqdt  (derivative Q with t)",
            ] {
                writeln!(
                    column_file,
                    "# column {column_nr}: component {j} ({}) {quantity}",
                    component.name
                )?;
                column_nr += 1;
            }
        }

        Ok(Self { component_files, column_file })
    }
}

impl ColumnObserver for BreakthroughWriter {
    fn on_frame(&mut self, frame: &Frame<'_>) -> io::Result<()> {
        for (j, file) in self.component_files.iter_mut().enumerate() {
            writeln!(
                file,
                "{:.6e} {:.6e} {:.6e}",
                frame.tau,
                frame.time_minutes(),
                frame.outlet_normalized(j)
            )?;
        }

        let matrix = frame.to_matrix();
        for row in matrix.rows() {
            let mut first = true;
            for value in row {
                if !first {
                    write!(self.column_file, " ")?;
                }
                write!(self.column_file, "{value:.6e}")?;
                first = false;
            }
            writeln!(self.column_file)?;
        }
        writeln!(self.column_file)?;
        writeln!(self.column_file)?;

        for file in &mut self.component_files {
            file.flush()?;
        }
        self.column_file.flush()
    }
}
