//! Plaintext key/value input files
//!
//! The classic breakthrough input format: one `Key value...` pair per line,
//! `#` comments, and per-component blocks opened by a `Component <name>`
//! line whose keys apply to the most recent component:
//!
//! ```text
//! SimulationType         Breakthrough
//! DisplayName            CO2/N2 on zeolite
//! Temperature            300.0
//! TotalPressure          1.0e5
//! ColumnLength           0.3
//! ColumnVoidFraction     0.4
//! ParticleDensity        1000.0
//! ColumnEntranceVelocity 0.1
//! NumberOfGridPoints     100
//! NumberOfTimeSteps      5000
//! TimeStep               0.01
//!
//! Component He
//!   CarrierGas yes
//!   Yi0        0.9
//!
//! Component CO2
//!   Yi0                     0.1
//!   MassTransferCoefficient 0.5
//!   Isotherm                Langmuir 3.0 2e-5
//! ```
//!
//! Repeating an `Isotherm` line adds a site (dual-site Langmuir and
//! friends). Unknown keys are logged and skipped; malformed values are
//! [`SimulationError::ConfigInvalid`] with the line number.

use std::fs;
use std::path::Path;

use crate::column::{ColumnParameters, GasComponent};
use crate::equilibrium::{IdealAdsorbedSolution, Isotherm, IsothermSite};
use crate::solver::{
    ImplicitSettings, IntegrationScheme, PulseSettings, Simulation, SimulationError,
    SimulationSettings,
};
use crate::transport::{CarrierGas, MomentumClosure};

// =================================================================================================
// SimulationInput
// =================================================================================================

/// Everything an input file can specify, with the documented defaults
#[derive(Debug, Clone)]
pub struct SimulationInput {
    pub display_name: String,
    pub column: ColumnParameters,
    pub components: Vec<GasComponent>,
    pub dt: f64,
    pub n_steps: usize,
    pub auto_steps: bool,
    pub print_every: usize,
    pub write_every: usize,
    pub pulse: bool,
    pub pulse_time: f64,
    pub pulse_reset_mole_fractions: bool,
    pub scheme: IntegrationScheme,
    pub ergun: bool,
    pub carrier_gas: CarrierGas,
}

impl Default for SimulationInput {
    fn default() -> Self {
        Self {
            display_name: String::new(),
            column: ColumnParameters::default(),
            components: Vec::new(),
            dt: 0.01,
            n_steps: 1000,
            auto_steps: false,
            print_every: 100,
            write_every: 10,
            pulse: false,
            pulse_time: 0.0,
            pulse_reset_mole_fractions: true,
            scheme: IntegrationScheme::SspRk3,
            ergun: false,
            carrier_gas: CarrierGas::helium(),
        }
    }
}

impl SimulationInput {
    /// Read and parse an input file
    pub fn from_file(path: impl AsRef<Path>) -> Result<Self, SimulationError> {
        let text = fs::read_to_string(path)?;
        Self::parse(&text)
    }

    /// Parse input text
    pub fn parse(text: &str) -> Result<Self, SimulationError> {
        let mut input = Self::default();

        for (line_index, raw_line) in text.lines().enumerate() {
            let line_no = line_index + 1;
            let line = match raw_line.find('#') {
                Some(pos) => &raw_line[..pos],
                None => raw_line,
            };
            let mut tokens = line.split_whitespace();
            let Some(key) = tokens.next() else { continue };
            let values: Vec<&str> = tokens.collect();

            match key {
                "SimulationType" => {
                    let value = first(key, &values, line_no)?;
                    match value {
                        "Breakthrough" => {}
                        "MixturePrediction" | "Fitting" => {
                            return Err(invalid(line_no, format!(
                                "simulation type '{value}' is not supported"
                            )));
                        }
                        other => {
                            return Err(invalid(line_no, format!(
                                "unknown simulation type '{other}'"
                            )));
                        }
                    }
                }
                "DisplayName" => input.display_name = values.join(" "),

                "Temperature" => input.column.temperature = float(key, &values, line_no)?,
                "TotalPressure" => input.column.total_pressure = float(key, &values, line_no)?,
                "PressureGradient" => {
                    input.column.pressure_gradient = float(key, &values, line_no)?
                }
                "ColumnVoidFraction" => {
                    input.column.void_fraction = float(key, &values, line_no)?
                }
                "ParticleDensity" => input.column.particle_density = float(key, &values, line_no)?,
                "ColumnLength" => input.column.length = float(key, &values, line_no)?,
                "ColumnEntranceVelocity" => {
                    input.column.entrance_velocity = float(key, &values, line_no)?
                }
                "ParticleDiameter" => {
                    input.column.particle_diameter = float(key, &values, line_no)?
                }

                "NumberOfGridPoints" => input.column.n_grid = integer(key, &values, line_no)?,
                "NumberOfTimeSteps" => input.n_steps = integer(key, &values, line_no)?,
                "TimeStep" => input.dt = float(key, &values, line_no)?,
                "AutoNumberOfTimeSteps" => input.auto_steps = boolean(key, &values, line_no)?,
                "PrintEvery" => input.print_every = integer(key, &values, line_no)?,
                "WriteEvery" => input.write_every = integer(key, &values, line_no)?,

                "PulseBreakthrough" => input.pulse = boolean(key, &values, line_no)?,
                "PulseTime" => input.pulse_time = float(key, &values, line_no)?,
                "PulseResetMoleFractions" => {
                    input.pulse_reset_mole_fractions = boolean(key, &values, line_no)?
                }

                "IntegrationScheme" => {
                    input.scheme = match first(key, &values, line_no)? {
                        "SSP-RK" => IntegrationScheme::SspRk3,
                        "Iterative" => IntegrationScheme::Implicit(ImplicitSettings::default()),
                        other => {
                            return Err(invalid(line_no, format!(
                                "unknown integration scheme '{other}' (expected SSP-RK or Iterative)"
                            )));
                        }
                    }
                }
                "MomentumClosure" => {
                    input.ergun = match first(key, &values, line_no)? {
                        "Continuity" => false,
                        "Ergun" => true,
                        other => {
                            return Err(invalid(line_no, format!(
                                "unknown momentum closure '{other}' (expected Continuity or Ergun)"
                            )));
                        }
                    }
                }

                // carrier-gas transport properties (molar mass in g/mol)
                "CarrierMolarMass" => {
                    input.carrier_gas.molar_mass = float(key, &values, line_no)? * 1e-3
                }
                "CarrierViscosity" => input.carrier_gas.mu0 = float(key, &values, line_no)?,
                "CarrierViscosityTemperature" => {
                    input.carrier_gas.t_mu0 = float(key, &values, line_no)?
                }
                "SutherlandConstant" => {
                    input.carrier_gas.sutherland_s = float(key, &values, line_no)?
                }

                "Component" => {
                    let name = first(key, &values, line_no)?;
                    input.components.push(GasComponent {
                        name: name.to_string(),
                        y_in: 0.0,
                        mass_transfer: 0.0,
                        dispersion: 0.0,
                        isotherm: Isotherm::inert(),
                        carrier: false,
                    });
                }
                "CarrierGas" => {
                    let flag = boolean(key, &values, line_no)?;
                    current(&mut input.components, key, line_no)?.carrier = flag;
                }
                "Yi0" => {
                    let y = float(key, &values, line_no)?;
                    current(&mut input.components, key, line_no)?.y_in = y;
                }
                "MassTransferCoefficient" => {
                    let kl = float(key, &values, line_no)?;
                    current(&mut input.components, key, line_no)?.mass_transfer = kl;
                }
                "AxialDispersionCoefficient" => {
                    let d = float(key, &values, line_no)?;
                    current(&mut input.components, key, line_no)?.dispersion = d;
                }
                "Isotherm" => {
                    let site = parse_isotherm_site(&values, line_no)?;
                    current(&mut input.components, key, line_no)?.isotherm.add_site(site);
                }

                other => {
                    log::warn!("line {line_no}: unknown option '{other}' skipped");
                }
            }
        }

        Ok(input)
    }

    /// Construct the simulation: momentum closure, oracle, settings
    pub fn build(self) -> Result<Simulation, SimulationError> {
        let momentum = if self.ergun {
            MomentumClosure::Ergun(self.carrier_gas.clone())
        } else {
            MomentumClosure::Continuity
        };
        let oracle = Box::new(IdealAdsorbedSolution::from_components(&self.components));
        let settings = SimulationSettings {
            dt: self.dt,
            n_steps: self.n_steps,
            auto_steps: self.auto_steps,
            print_every: self.print_every,
            write_every: self.write_every,
            pulse: self.pulse.then(|| PulseSettings {
                time: self.pulse_time,
                reset_mole_fractions: self.pulse_reset_mole_fractions,
            }),
            scheme: self.scheme,
        };
        Simulation::new(self.column, self.components, oracle, momentum, settings)
    }
}

// =================================================================================================
// Parse helpers
// =================================================================================================

fn invalid(line_no: usize, message: String) -> SimulationError {
    SimulationError::ConfigInvalid(format!("line {line_no}: {message}"))
}

fn first<'a>(key: &str, values: &[&'a str], line_no: usize) -> Result<&'a str, SimulationError> {
    values
        .first()
        .copied()
        .ok_or_else(|| invalid(line_no, format!("option '{key}' needs a value")))
}

fn float(key: &str, values: &[&str], line_no: usize) -> Result<f64, SimulationError> {
    let value = first(key, values, line_no)?;
    value
        .parse()
        .map_err(|_| invalid(line_no, format!("option '{key}': '{value}' is not a number")))
}

fn integer(key: &str, values: &[&str], line_no: usize) -> Result<usize, SimulationError> {
    let value = first(key, values, line_no)?;
    value
        .parse()
        .map_err(|_| invalid(line_no, format!("option '{key}': '{value}' is not an integer")))
}

fn boolean(key: &str, values: &[&str], line_no: usize) -> Result<bool, SimulationError> {
    let value = first(key, values, line_no)?;
    match value.to_ascii_lowercase().as_str() {
        "yes" | "true" | "on" | "1" => Ok(true),
        "no" | "false" | "off" | "0" => Ok(false),
        _ => Err(invalid(line_no, format!("option '{key}': '{value}' is not a boolean"))),
    }
}

fn current<'a>(
    components: &'a mut [GasComponent],
    key: &str,
    line_no: usize,
) -> Result<&'a mut GasComponent, SimulationError> {
    components
        .last_mut()
        .ok_or_else(|| invalid(line_no, format!("option '{key}' must follow a Component line")))
}

fn parse_isotherm_site(values: &[&str], line_no: usize) -> Result<IsothermSite, SimulationError> {
    let model = values
        .first()
        .copied()
        .ok_or_else(|| invalid(line_no, "Isotherm needs a model name".to_string()))?;
    let params: Result<Vec<f64>, SimulationError> = values[1..]
        .iter()
        .map(|v| {
            v.parse().map_err(|_| {
                invalid(line_no, format!("isotherm parameter '{v}' is not a number"))
            })
        })
        .collect();
    let params = params?;

    match (model, params.as_slice()) {
        ("Langmuir", [q_sat, b]) => Ok(IsothermSite::Langmuir { q_sat: *q_sat, b: *b }),
        ("Langmuir", _) => Err(invalid(
            line_no,
            format!("Langmuir takes 2 parameters (q_sat, b), got {}", params.len()),
        )),
        ("Henry", [k]) => Ok(IsothermSite::Henry { k: *k }),
        ("Henry", _) => Err(invalid(
            line_no,
            format!("Henry takes 1 parameter (k), got {}", params.len()),
        )),
        (other, _) => Err(invalid(line_no, format!("unknown isotherm model '{other}'"))),
    }
}

// =================================================================================================
// Tests
// =================================================================================================
