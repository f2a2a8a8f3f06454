// Run configuration loaded from YAML. Every field is optional, missing ones fall back to the reference run
// (see scenarios/reference.yaml for the full layout)
use std::{fs, path::{Path, PathBuf}};

use serde::{Serialize, Deserialize};
use thiserror::Error;

use crate::{prelude::*, simulation::DEFAULT_PIVOT_HEIGHT};

#[derive(Debug, Error)]
pub enum ConfigError {
	#[error("failed to read config file {path}")]
	Io {
		path: PathBuf,
		#[source]
		source: std::io::Error
	},
	#[error("failed to parse config")]
	Parse(#[from] serde_yaml::Error),
	#[error(transparent)]
	Invalid(#[from] SimulationError)
}

#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct HorizonConfig {
	pub t_start: Float,
	pub t_end: Float,
	pub samples: usize
}

impl HorizonConfig {
	pub fn grid(&self) -> Result<TimeGrid, SimulationError> {
		TimeGrid::linspace(self.t_start, self.t_end, self.samples)
	}
}

impl Default for HorizonConfig {
	fn default() -> Self {
		Self {
			t_start: 0.0,
			t_end: 10.0,
			samples: 500
		}
	}
}

fn default_substeps() -> usize {
	Rk4::default().substeps
}

#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(tag = "method")]
pub enum IntegratorConfig {
	#[serde(rename = "rkts54", alias = "adaptive")]// Adaptive Tsitouras 5(4), steps land on every sample
	Adaptive(AdaptiveSettings),
	#[serde(rename = "rk4")]// Fixed-step RK4, `substeps` steps per sample interval
	Rk4 {
		#[serde(default = "default_substeps")]
		substeps: usize
	}
}

impl IntegratorConfig {
	pub fn name(&self) -> &'static str {
		match self {
			Self::Adaptive(_) => "rkts54",
			Self::Rk4{..} => "rk4"
		}
	}
	pub fn validate(&self) -> Result<(), SimulationError> {
		match self {
			Self::Adaptive(settings) => settings.validate(),
			Self::Rk4{substeps: 0} => Err(SimulationError::invalid("RK4 needs at least one sub-step per interval")),
			Self::Rk4{..} => Ok(())
		}
	}
}

impl Default for IntegratorConfig {
	fn default() -> Self {
		Self::Adaptive(AdaptiveSettings::default())
	}
}

impl Integrator for IntegratorConfig {
	fn integrate<D: StaticDifferentiator>(
		&self,
		system: &D,
		initial: &State,
		grid: &TimeGrid
	) -> Result<(Trajectory, IntegrationStats), SimulationError> {
		match self {
			Self::Adaptive(settings) => AdaptiveRk::new(*settings).integrate(system, initial, grid),
			Self::Rk4{substeps} => Rk4::new(*substeps).integrate(system, initial, grid)
		}
	}
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct SimulationConfig {
	pub parameters: PhysicalParameters,
	pub initial_state: State,
	pub horizon: HorizonConfig,
	pub integrator: IntegratorConfig,
	pub pivot_height: Float
}

impl Default for SimulationConfig {
	fn default() -> Self {
		Self {
			parameters: PhysicalParameters::default(),
			initial_state: State::new(0.0, std::f64::consts::FRAC_PI_6, 0.0, 0.0),
			horizon: HorizonConfig::default(),
			integrator: IntegratorConfig::default(),
			pivot_height: DEFAULT_PIVOT_HEIGHT
		}
	}
}

impl SimulationConfig {
	pub fn from_yaml_str(s: &str) -> Result<Self, ConfigError> {
		Ok(serde_yaml::from_str(s)?)
	}
	pub fn from_path(path: impl AsRef<Path>) -> Result<Self, ConfigError> {
		let path = path.as_ref();
		let text = fs::read_to_string(path).map_err(|source| ConfigError::Io{path: path.to_path_buf(), source})?;
		Self::from_yaml_str(&text)
	}
	/// Reads, parses and validates in one go
	pub fn load(path: impl AsRef<Path>) -> Result<Simulation, ConfigError> {
		Ok(Self::from_path(path)?.build()?)
	}
	pub fn to_yaml_string(&self) -> Result<String, ConfigError> {
		Ok(serde_yaml::to_string(self)?)
	}
	/// Checks everything and builds a ready-to-run simulation
	pub fn build(&self) -> Result<Simulation, SimulationError> {
		if !self.pivot_height.is_finite() {
			return Err(SimulationError::invalid(format!("pivot height is not finite ({})", self.pivot_height)));
		}
		let grid = self.horizon.grid()?;
		let simulation = Simulation::new(self.parameters, self.initial_state, grid, self.integrator)?;
		Ok(simulation.with_pivot_height(self.pivot_height))
	}
}
