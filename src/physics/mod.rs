// Equations of motion for the load on the spring arm
use crate::prelude::*;

pub mod reactions;

// Spring arm pivoting about the pulley block
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct SpringPendulum {
	pub params: PhysicalParameters
}

impl SpringPendulum {
	pub fn new(params: PhysicalParameters) -> Self {
		Self {
			params
		}
	}
	pub fn radial_acceleration(&self, state: &State) -> Float {
		let p = &self.params;
		let length = state.spring_length(p);
		(-p.stiffness * state.x - p.load_mass * p.gravity * state.phi.cos() + p.load_mass * length * state.phi_dot.powi(2)) / p.total_mass()
	}
	// Caller guarantees `length > 0`
	pub fn angular_acceleration(&self, state: &State) -> Float {
		let p = &self.params;
		let length = state.spring_length(p);
		(-p.gravity * state.phi.sin() - 2.0 * state.x_dot * state.phi_dot) / length
	}
	// ½(M+m)x'² + ½mL²φ'² + ½cx² + mgL·cos φ, conserved when g = 0 or while the arm hangs still and vertical
	pub fn mechanical_energy(&self, state: &State) -> Float {
		let p = &self.params;
		let length = state.spring_length(p);
		let kinetic = 0.5 * p.total_mass() * state.x_dot.powi(2) + 0.5 * p.load_mass * (length * state.phi_dot).powi(2);
		let potential = 0.5 * p.stiffness * state.x.powi(2) + p.load_mass * p.gravity * length * state.phi.cos();
		kinetic + potential
	}
}

impl StaticDifferentiator for SpringPendulum {
	fn differentiate(&self, t: Float, state: &State) -> Result<StateDerivative, SimulationError> {
		let length = state.spring_length(&self.params);
		if !length.is_finite() {
			return Err(SimulationError::NonFiniteResult{t, state: *state});
		}
		if length <= 0.0 {
			return Err(SimulationError::SingularConfiguration{t, length, state: *state});
		}
		let derivative = StateDerivative::from_accelerations(
			state,
			self.radial_acceleration(state),
			self.angular_acceleration(state)
		);
		if !derivative.is_finite() {
			return Err(SimulationError::NonFiniteResult{t, state: *state});
		}
		// Done
		Ok(derivative)
	}
}
