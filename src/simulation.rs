// One complete run: validate, integrate, post-process. Either every series comes back or an error does
use std::fmt;

use serde::Serialize;
use tracing::{info, warn};

use crate::{prelude::*, physics::reactions::load_path};

// Only used to place the load for drawing
pub const DEFAULT_PIVOT_HEIGHT: Float = 1.4;

#[derive(Debug, Clone)]
pub struct Simulation {
	pub system: SpringPendulum,
	pub initial_state: State,
	pub grid: TimeGrid,
	pub integrator: IntegratorConfig,
	pub pivot_height: Float
}

impl Simulation {
	pub fn new(params: PhysicalParameters, initial_state: State, grid: TimeGrid, integrator: IntegratorConfig) -> Result<Self, SimulationError> {
		params.validate()?;
		if !initial_state.is_finite() {
			return Err(SimulationError::invalid(format!("initial state is not finite ({})", initial_state)));
		}
		let length = initial_state.spring_length(&params);
		if length <= 0.0 {
			return Err(SimulationError::invalid(format!("initial spring length {} must be > 0", length)));
		}
		integrator.validate()?;
		Ok(Self {
			system: SpringPendulum::new(params),
			initial_state,
			grid,
			integrator,
			pivot_height: DEFAULT_PIVOT_HEIGHT
		})
	}
	pub fn with_pivot_height(mut self, pivot_height: Float) -> Self {
		self.pivot_height = pivot_height;
		self
	}
	pub fn params(&self) -> &PhysicalParameters {
		&self.system.params
	}
	pub fn run(&self) -> Result<SimulationReport, SimulationError> {
		info!(
			samples = self.grid.len(),
			t_start = self.grid.start(),
			t_end = self.grid.end(),
			integrator = self.integrator.name(),
			"running spring pendulum simulation"
		);
		let (trajectory, stats) = self.integrator.integrate(&self.system, &self.initial_state, &self.grid)
			.map_err(|e| {
				warn!(error = %e, "integration failed");
				e
			})?;
		let params = self.params();
		let derived = derive_series(&trajectory, &self.grid, &self.system, params)?;
		let (load_x, load_y) = load_path(&trajectory, params, self.pivot_height);
		let energy = trajectory.iter().map(|s| self.system.mechanical_energy(s)).collect();
		info!(
			evaluations = stats.evaluations,
			accepted = stats.accepted,
			rejected = stats.rejected,
			"simulation finished"
		);
		// Done
		Ok(SimulationReport {
			grid: self.grid.clone(),
			trajectory,
			derived,
			load_x,
			load_y,
			energy,
			stats
		})
	}
}

// Everything the presentation side needs, index-aligned with `grid`
#[derive(Debug, Clone, PartialEq)]
pub struct SimulationReport {
	pub grid: TimeGrid,
	pub trajectory: Trajectory,
	pub derived: DerivedSeries,
	pub load_x: Vec<Float>,
	pub load_y: Vec<Float>,
	pub energy: Vec<Float>,
	pub stats: IntegrationStats
}

impl SimulationReport {
	pub fn series(&self) -> SeriesOutput {
		SeriesOutput {
			t: self.grid.times().to_vec(),
			x: self.trajectory.x(),
			phi: self.trajectory.phi(),
			x_dot: self.trajectory.x_dot(),
			phi_dot: self.trajectory.phi_dot(),
			x_ddot: self.derived.x_ddot.clone(),
			phi_ddot: self.derived.phi_ddot.clone(),
			spring_length: self.derived.spring_length.clone(),
			n_eps: self.derived.n_eps.clone(),
			n_eta: self.derived.n_eta.clone(),
			load_x: self.load_x.clone(),
			load_y: self.load_y.clone(),
			energy: self.energy.clone(),
			stats: self.stats
		}
	}
	/// Largest absolute deviation of the mechanical energy from its initial value
	pub fn energy_drift(&self) -> Float {
		let Some(&e0) = self.energy.first() else {
			return 0.0;
		};
		self.energy.iter().fold(0.0 as Float, |acc, e| acc.max((e - e0).abs()))
	}
	pub fn summary(&self) -> Summary {
		Summary {
			x: Extent::of(&self.trajectory.x()),
			phi: Extent::of(&self.trajectory.phi()),
			n_eps: Extent::of(&self.derived.n_eps),
			n_eta: Extent::of(&self.derived.n_eta),
			energy_drift: self.energy_drift()
		}
	}
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct SeriesOutput {
	pub t: Vec<Float>,
	pub x: Vec<Float>,
	pub phi: Vec<Float>,
	pub x_dot: Vec<Float>,
	pub phi_dot: Vec<Float>,
	pub x_ddot: Vec<Float>,
	pub phi_ddot: Vec<Float>,
	pub spring_length: Vec<Float>,
	pub n_eps: Vec<Float>,
	pub n_eta: Vec<Float>,
	pub load_x: Vec<Float>,
	pub load_y: Vec<Float>,
	pub energy: Vec<Float>,
	pub stats: IntegrationStats
}

#[derive(Debug, Clone, Copy, PartialEq, Serialize)]
pub struct Extent {
	pub min: Float,
	pub max: Float
}

impl Extent {
	fn of(values: &[Float]) -> Self {
		values.iter().fold(
			Self{min: Float::INFINITY, max: Float::NEG_INFINITY},
			|acc, &v| Self{min: acc.min.min(v), max: acc.max.max(v)}
		)
	}
}

#[derive(Debug, Clone, Copy, PartialEq, Serialize)]
pub struct Summary {
	pub x: Extent,
	pub phi: Extent,
	pub n_eps: Extent,
	pub n_eta: Extent,
	pub energy_drift: Float
}

impl fmt::Display for Summary {
	fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
		writeln!(f, "x      in [{:.6}, {:.6}]", self.x.min, self.x.max)?;
		writeln!(f, "phi    in [{:.6}, {:.6}]", self.phi.min, self.phi.max)?;
		writeln!(f, "N_eps  in [{:.6}, {:.6}]", self.n_eps.min, self.n_eps.max)?;
		writeln!(f, "N_eta  in [{:.6}, {:.6}]", self.n_eta.min, self.n_eta.max)?;
		write!(f, "energy drift {:.3e}", self.energy_drift)
	}
}
