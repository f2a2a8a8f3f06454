// Physical constants of one run, read-only once built from configuration
use serde::{Serialize, Deserialize};

use crate::prelude::*;

#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct PhysicalParameters {
	pub load_mass: Float,// m
	pub block_mass: Float,// M
	pub pulley_radius: Float,// R, only places the arm pivot
	pub natural_length: Float,// l0, unstretched
	pub stiffness: Float,// c
	pub gravity: Float// g
}

impl PhysicalParameters {
	pub fn total_mass(&self) -> Float {
		self.block_mass + self.load_mass
	}
	/// Extension at which a vertical arm is at rest, `-m*g/c`. `None` without a spring
	pub fn static_extension(&self) -> Option<Float> {
		if self.stiffness == 0.0 {
			return None;
		}
		Some(-self.load_mass * self.gravity / self.stiffness)
	}
	pub fn validate(&self) -> Result<(), SimulationError> {
		let fields = [
			("load_mass", self.load_mass),
			("block_mass", self.block_mass),
			("pulley_radius", self.pulley_radius),
			("natural_length", self.natural_length),
			("stiffness", self.stiffness),
			("gravity", self.gravity)
		];
		for (name, value) in fields {
			if !value.is_finite() {
				return Err(SimulationError::invalid(format!("parameter `{}` is not finite ({})", name, value)));
			}
		}
		if self.load_mass <= 0.0 {
			return Err(SimulationError::invalid(format!("load mass must be > 0, got {}", self.load_mass)));
		}
		if self.block_mass < 0.0 {
			return Err(SimulationError::invalid(format!("block mass must be >= 0, got {}", self.block_mass)));
		}
		if self.natural_length <= 0.0 {
			return Err(SimulationError::invalid(format!("natural spring length must be > 0, got {}", self.natural_length)));
		}
		if self.stiffness < 0.0 {
			return Err(SimulationError::invalid(format!("spring stiffness must be >= 0, got {}", self.stiffness)));
		}
		if self.pulley_radius < 0.0 {
			return Err(SimulationError::invalid(format!("pulley radius must be >= 0, got {}", self.pulley_radius)));
		}
		// Done
		Ok(())
	}
}

impl Default for PhysicalParameters {
	fn default() -> Self {
		Self {
			load_mass: 1.0,
			block_mass: 1.0,
			pulley_radius: 0.4,
			natural_length: 1.0,
			stiffness: 50.0,
			gravity: 9.81
		}
	}
}
