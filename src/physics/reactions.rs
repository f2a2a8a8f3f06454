// Post-processing of a solved trajectory. Accelerations are recomputed through the differentiator at every sample
// so `x''` and `phi''` match the equations of motion the integrator used. Reaction force on the load, fixed (eps, eta) frame:
// N_eps = -m(L·phi'' + 2x'·phi')·cos(phi) - m(x'' - L·phi'²)·sin(phi)
// N_eta = -m(L·phi'' + 2x'·phi')·sin(phi) + m(x'' - L·phi'²)·cos(phi) - c·x - (M+m)·g
use tracing::debug;

use crate::prelude::*;

#[derive(Debug, Clone, Copy, PartialEq)]
pub struct ReactionForce {
	pub n_eps: Float,
	pub n_eta: Float
}

/// Reaction force at a single sample, `derivative` must be the differentiator's output for `state`
pub fn reaction_force(state: &State, derivative: &StateDerivative, params: &PhysicalParameters) -> ReactionForce {
	let m = params.load_mass;
	let length = state.spring_length(params);
	// Transverse (Coriolis coupled) and radial relative accelerations
	let transverse = length * derivative.phi_ddot + 2.0 * state.x_dot * state.phi_dot;
	let radial = derivative.x_ddot - length * state.phi_dot.powi(2);
	let (sin, cos) = state.phi.sin_cos();
	ReactionForce {
		n_eps: -m * transverse * cos - m * radial * sin,
		n_eta: -m * transverse * sin + m * radial * cos - params.stiffness * state.x - params.total_mass() * params.gravity
	}
}

/// Per-sample series derived from the trajectory, all index-aligned with the time grid
#[derive(Debug, Clone, PartialEq, Default)]
pub struct DerivedSeries {
	pub spring_length: Vec<Float>,// L = l0 + x
	pub x_ddot: Vec<Float>,
	pub phi_ddot: Vec<Float>,
	pub n_eps: Vec<Float>,
	pub n_eta: Vec<Float>
}

impl DerivedSeries {
	pub fn len(&self) -> usize {
		self.spring_length.len()
	}
	pub fn is_empty(&self) -> bool {
		self.spring_length.is_empty()
	}
	pub fn reaction_at(&self, i: usize) -> Option<ReactionForce> {
		Some(ReactionForce {
			n_eps: *self.n_eps.get(i)?,
			n_eta: *self.n_eta.get(i)?
		})
	}
}

pub fn derive_series<D: StaticDifferentiator>(
	trajectory: &Trajectory,
	grid: &TimeGrid,
	system: &D,
	params: &PhysicalParameters
) -> Result<DerivedSeries, SimulationError> {
	if trajectory.len() != grid.len() {
		return Err(SimulationError::invalid(format!(
			"trajectory has {} samples but the time grid has {}",
			trajectory.len(),
			grid.len()
		)));
	}
	let n = trajectory.len();
	let mut out = DerivedSeries {
		spring_length: Vec::with_capacity(n),
		x_ddot: Vec::with_capacity(n),
		phi_ddot: Vec::with_capacity(n),
		n_eps: Vec::with_capacity(n),
		n_eta: Vec::with_capacity(n)
	};
	for (state, &t) in trajectory.iter().zip(grid.times()) {
		let derivative = system.differentiate(t, state)?;
		let force = reaction_force(state, &derivative, params);
		out.spring_length.push(state.spring_length(params));
		out.x_ddot.push(derivative.x_ddot);
		out.phi_ddot.push(derivative.phi_ddot);
		out.n_eps.push(force.n_eps);
		out.n_eta.push(force.n_eta);
	}
	debug!(samples = n, "derived spring length and reaction forces");
	// Done
	Ok(out)
}

/// Cartesian position of the load for an arm pivoting at `(-R, pivot_height)`, as `(x, y)` series
pub fn load_path(trajectory: &Trajectory, params: &PhysicalParameters, pivot_height: Float) -> (Vec<Float>, Vec<Float>) {
	let pivot_x = -params.pulley_radius;
	trajectory.iter()
		.map(|s| {
			let length = s.spring_length(params);
			(pivot_x + length * s.phi.sin(), pivot_height - length * s.phi.cos())
		})
		.unzip()
}

#[cfg(test)]
mod tests {
	use super::*;
	use std::f64::consts::PI;
	use approx::{assert_relative_eq, assert_abs_diff_eq};
	fn trajectory(states: Vec<State>) -> Trajectory {
		Trajectory::from_states(states)
	}
	#[test]
	fn force_at_rest() {
		// Hanging straight down at rest: no relative acceleration terms except x''
		let params = PhysicalParameters::default();
		let state = State::new(0.0, 0.0, 0.0, 0.0);
		let d = SpringPendulum::new(params).differentiate(0.0, &state).unwrap();
		let force = reaction_force(&state, &d, &params);
		assert_eq!(force.n_eps, 0.0);
		// m*x'' - (M+m)*g with x'' = -m*g/(M+m)
		assert_relative_eq!(force.n_eta, -9.81 / 2.0 - 2.0 * 9.81, epsilon = 1e-12);
	}
	#[test]
	fn force_formula() {
		let params = PhysicalParameters{load_mass: 0.5, stiffness: 20.0, ..PhysicalParameters::default()};
		let state = State::new(0.3, 0.4, 1.0, -2.0);
		let d = StateDerivative::from_accelerations(&state, 3.0, -1.0);
		let force = reaction_force(&state, &d, &params);
		let length = 1.3;
		let transverse = length * -1.0 + 2.0 * 1.0 * -2.0;
		let radial = 3.0 - length * 4.0;
		assert_relative_eq!(force.n_eps, -0.5 * transverse * 0.4_f64.cos() - 0.5 * radial * 0.4_f64.sin(), epsilon = 1e-12);
		assert_relative_eq!(
			force.n_eta,
			-0.5 * transverse * 0.4_f64.sin() + 0.5 * radial * 0.4_f64.cos() - 20.0 * 0.3 - 1.5 * 9.81,
			epsilon = 1e-12
		);
	}
	#[test]
	fn series() {
		let params = PhysicalParameters::default();
		let system = SpringPendulum::new(params);
		let states = vec![
			State::new(0.0, PI / 6.0, 0.0, 0.0),
			State::new(-0.1, 0.2, 0.5, -0.3),
			State::new(0.05, -0.1, -0.2, 0.1)
		];
		let grid = TimeGrid::from_samples(vec![0.0, 0.5, 1.0]).unwrap();
		let series = derive_series(&trajectory(states.clone()), &grid, &system, &params).unwrap();
		assert_eq!(series.len(), 3);
		for (i, state) in states.iter().enumerate() {
			assert_eq!(series.spring_length[i], params.natural_length + state.x);
			let d = system.differentiate(grid[i], state).unwrap();
			assert_eq!(series.x_ddot[i], d.x_ddot);
			assert_eq!(series.phi_ddot[i], d.phi_ddot);
			assert_eq!(series.reaction_at(i), Some(reaction_force(state, &d, &params)));
		}
		assert_eq!(series.reaction_at(3), None);
	}
	#[test]
	fn length_mismatch() {
		let params = PhysicalParameters::default();
		let grid = TimeGrid::from_samples(vec![0.0, 1.0]).unwrap();
		let result = derive_series(&trajectory(vec![State::default()]), &grid, &SpringPendulum::new(params), &params);
		assert!(matches!(result, Err(SimulationError::InvalidConfiguration(_))));
	}
	#[test]
	fn collapsed_sample_fails() {
		let params = PhysicalParameters::default();
		let grid = TimeGrid::from_samples(vec![0.0, 1.0]).unwrap();
		let states = vec![State::default(), State::new(-2.0, 0.0, 0.0, 0.0)];
		let result = derive_series(&trajectory(states), &grid, &SpringPendulum::new(params), &params);
		assert!(matches!(result, Err(SimulationError::SingularConfiguration{t, ..}) if t == 1.0));
	}
	#[test]
	fn load_position() {
		let params = PhysicalParameters::default();
		let states = vec![State::new(0.0, 0.0, 0.0, 0.0), State::new(0.5, PI / 2.0, 0.0, 0.0)];
		let (xs, ys) = load_path(&trajectory(states), &params, 1.4);
		assert_abs_diff_eq!(xs[0], -0.4);
		assert_abs_diff_eq!(ys[0], 0.4, epsilon = 1e-12);
		assert_abs_diff_eq!(xs[1], -0.4 + 1.5, epsilon = 1e-12);
		assert_abs_diff_eq!(ys[1], 1.4, epsilon = 1e-12);
	}
}
