// Trajectory integrators: thin adapters that drive the numeris solvers across the time grid, one grid interval per solve
use numeris::{Vector, ode::{self, OdeError, RKAdaptive, RKTS54}};
use serde::{Serialize, Deserialize};
use tracing::{debug, warn};

use crate::prelude::*;

// Solver-side state: `(x, phi, x', phi')` plus a unit clock slot. The clock keeps the solver's start-step
// estimate away from 0/0 when the state or its derivative is exactly zero, it never feeds back into the physics
type Augmented = Vector<Float, 5>;

fn augment(state: &State) -> Augmented {
	Augmented::from_array([state.x, state.phi, state.x_dot, state.phi_dot, 1.0])
}

fn physical(y: &Augmented) -> State {
	State::new(y[0], y[1], y[2], y[3])
}

/// Evaluation counters of one integration run
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize)]
pub struct IntegrationStats {
	pub evaluations: usize,
	pub accepted: usize,
	pub rejected: usize
}

pub trait Integrator {
	/// Produces one state per grid sample, the first being `initial`
	fn integrate<D: StaticDifferentiator>(
		&self,
		system: &D,
		initial: &State,
		grid: &TimeGrid
	) -> Result<(Trajectory, IntegrationStats), SimulationError>;
}

fn check_initial(initial: &State) -> Result<(), SimulationError> {
	if !initial.is_finite() {
		return Err(SimulationError::invalid(format!("initial state is not finite ({})", initial)));
	}
	Ok(())
}

// The numeris solvers take an infallible closure. The first differentiator error is parked here and every later
// call answers NaN, which makes the adaptive solver bail out with `StepNotFinite` on the spot
struct Rhs<'a, D> {
	system: &'a D,
	failure: Option<SimulationError>
}

const POISONED: StateDerivative = StateDerivative {
	x_dot: Float::NAN,
	phi_dot: Float::NAN,
	x_ddot: Float::NAN,
	phi_ddot: Float::NAN
};

impl<'a, D: StaticDifferentiator> Rhs<'a, D> {
	fn new(system: &'a D) -> Self {
		Self {
			system,
			failure: None
		}
	}
	fn eval(&mut self, t: Float, state: &State) -> StateDerivative {
		if self.failure.is_some() {
			return POISONED;
		}
		match self.system.differentiate(t, state) {
			Ok(derivative) => derivative,
			Err(e) => {
				self.failure = Some(e);
				POISONED
			}
		}
	}
	fn eval_augmented(&mut self, t: Float, y: &Augmented) -> Augmented {
		let d = self.eval(t, &physical(y));
		Augmented::from_array([d.x_dot, d.phi_dot, d.x_ddot, d.phi_ddot, 1.0])
	}
	fn eval_v4(&mut self, t: Float, y: &V4) -> V4 {
		self.eval(t, &State::from(*y)).into()
	}
	fn take_failure(&mut self) -> Result<(), SimulationError> {
		match self.failure.take() {
			Some(e) => Err(e),
			None => Ok(())
		}
	}
}

// ------------------------------------------------------------------------------------------------
// Adaptive

#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct AdaptiveSettings {
	pub abs_tol: Float,
	pub rel_tol: Float,
	pub min_factor: Float,
	pub max_factor: Float,
	pub safety: Float,
	pub min_step: Float,
	/// Accepted plus rejected steps over the whole run, not per grid interval
	pub max_steps: usize
}

impl AdaptiveSettings {
	pub fn validate(&self) -> Result<(), SimulationError> {
		if !(self.abs_tol > 0.0 && self.rel_tol >= 0.0) {
			return Err(SimulationError::invalid(format!("tolerances must be abs > 0, rel >= 0 (got {}, {})", self.abs_tol, self.rel_tol)));
		}
		if !(self.min_factor > 0.0 && self.min_factor < 1.0 && self.max_factor > 1.0) {
			return Err(SimulationError::invalid(format!("step factors must satisfy 0 < min < 1 < max (got {}, {})", self.min_factor, self.max_factor)));
		}
		if !(self.safety > 0.0 && self.safety <= 1.0) {
			return Err(SimulationError::invalid(format!("safety factor must be in (0, 1], got {}", self.safety)));
		}
		if !(self.min_step > 0.0) {
			return Err(SimulationError::invalid(format!("minimum step must be > 0, got {}", self.min_step)));
		}
		if self.max_steps == 0 {
			return Err(SimulationError::invalid("max_steps must be > 0"));
		}
		Ok(())
	}
	// Step budget left for the next grid interval
	fn solver_settings(&self, remaining_steps: usize) -> ode::AdaptiveSettings<Float> {
		ode::AdaptiveSettings {
			abs_tol: self.abs_tol,
			rel_tol: self.rel_tol,
			min_factor: self.min_factor,
			max_factor: self.max_factor,
			safety: self.safety,
			min_step: self.min_step,
			max_steps: remaining_steps,
			dense_output: false,
			h_min: None,
			initial_step: None
		}
	}
}

impl Default for AdaptiveSettings {
	fn default() -> Self {
		Self {
			abs_tol: 1.49012e-8,
			rel_tol: 1.49012e-8,
			min_factor: 0.2,
			max_factor: 10.0,
			safety: 0.9,
			min_step: 1e-10,
			max_steps: 500_000
		}
	}
}

/// Adaptive Tsitouras 5(4) (numeris `RKTS54`), one solve per grid interval so every sample is hit exactly
#[derive(Debug, Clone, Copy, PartialEq, Default)]
pub struct AdaptiveRk {
	pub settings: AdaptiveSettings
}

impl AdaptiveRk {
	pub fn new(settings: AdaptiveSettings) -> Self {
		Self {
			settings
		}
	}
}

impl Integrator for AdaptiveRk {
	fn integrate<D: StaticDifferentiator>(
		&self,
		system: &D,
		initial: &State,
		grid: &TimeGrid
	) -> Result<(Trajectory, IntegrationStats), SimulationError> {
		self.settings.validate()?;
		check_initial(initial)?;
		let settings = &self.settings;
		let mut rhs = Rhs::new(system);
		let mut stats = IntegrationStats::default();
		let mut states = Vec::with_capacity(grid.len());
		states.push(*initial);
		let mut state = *initial;
		debug!(abs_tol = settings.abs_tol, rel_tol = settings.rel_tol, "starting adaptive integration");
		for (t0, t1) in grid.intervals() {
			let used = stats.accepted + stats.rejected;
			if used >= settings.max_steps {
				warn!(t = t0, steps = settings.max_steps, "adaptive step limit reached");
				return Err(SimulationError::StepLimitExceeded{t: t0, steps: settings.max_steps});
			}
			let solved = RKTS54::integrate(
				t0,
				t1,
				&augment(&state),
				|t, y: &Augmented| rhs.eval_augmented(t, y),
				&settings.solver_settings(settings.max_steps - used)
			);
			// A differentiator error outranks whatever the solver made of the NaNs that followed it
			rhs.take_failure()?;
			let solution = match solved {
				Ok(solution) => solution,
				Err(OdeError::MaxStepsExceeded) => {
					warn!(t = t0, steps = settings.max_steps, "adaptive step limit reached");
					return Err(SimulationError::StepLimitExceeded{t: t0, steps: settings.max_steps});
				},
				Err(e) => {
					warn!(t = t0, error = %e, "solver failed");
					return Err(SimulationError::NonFiniteResult{t: t0, state});
				}
			};
			stats.evaluations += solution.evals;
			stats.accepted += solution.accepted;
			stats.rejected += solution.rejected;
			state = physical(&solution.y);
			if !state.is_finite() {
				warn!(t = t1, "solver produced a non-finite state");
				return Err(SimulationError::NonFiniteResult{t: t1, state});
			}
			states.push(state);
		}
		debug!(evaluations = stats.evaluations, accepted = stats.accepted, rejected = stats.rejected, "adaptive integration finished");
		// Done
		Ok((Trajectory::from_states(states), stats))
	}
}

// ------------------------------------------------------------------------------------------------
// Fixed step

/// Classic RK4 (numeris `rk4_step`) with `substeps` equal steps between consecutive grid samples
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Rk4 {
	pub substeps: usize
}

impl Default for Rk4 {
	fn default() -> Self {
		Self {
			substeps: 10
		}
	}
}

impl Rk4 {
	pub fn new(substeps: usize) -> Self {
		Self {
			substeps
		}
	}
}

impl Integrator for Rk4 {
	fn integrate<D: StaticDifferentiator>(
		&self,
		system: &D,
		initial: &State,
		grid: &TimeGrid
	) -> Result<(Trajectory, IntegrationStats), SimulationError> {
		if self.substeps == 0 {
			return Err(SimulationError::invalid("RK4 needs at least one sub-step per interval"));
		}
		check_initial(initial)?;
		let mut rhs = Rhs::new(system);
		let mut stats = IntegrationStats::default();
		let mut states = Vec::with_capacity(grid.len());
		states.push(*initial);
		let mut y: V4 = (*initial).into();
		debug!(substeps = self.substeps, "starting RK4 integration");
		for (t0, t1) in grid.intervals() {
			let h = (t1 - t0) / (self.substeps as Float);
			for i in 0..self.substeps {
				y = ode::rk4_step(t0 + h * (i as Float), &y, h, |t, y: &V4| rhs.eval_v4(t, y));
				rhs.take_failure()?;
				stats.evaluations += 4;
				stats.accepted += 1;
			}
			let state = State::from(y);
			if !state.is_finite() {
				warn!(t = t1, "RK4 produced a non-finite state");
				return Err(SimulationError::NonFiniteResult{t: t1, state});
			}
			states.push(state);
		}
		debug!(evaluations = stats.evaluations, steps = stats.accepted, "RK4 integration finished");
		Ok((Trajectory::from_states(states), stats))
	}
}

#[cfg(test)]
mod tests {
	use super::*;
	use std::f64::consts::{PI, TAU};
	use approx::assert_abs_diff_eq;

	// Harmonic oscillator in the x slot (x'' = -x), angle held at zero
	struct Oscillator;

	impl StaticDifferentiator for Oscillator {
		fn differentiate(&self, _t: Float, state: &State) -> Result<StateDerivative, SimulationError> {
			Ok(StateDerivative::from_accelerations(state, -state.x, 0.0))
		}
	}

	// x' = 1 until x reaches 1, then fails like a collapsed spring
	struct Wall;

	impl StaticDifferentiator for Wall {
		fn differentiate(&self, t: Float, state: &State) -> Result<StateDerivative, SimulationError> {
			if state.x >= 1.0 {
				return Err(SimulationError::SingularConfiguration{t, length: 1.0 - state.x, state: *state});
			}
			Ok(StateDerivative{x_dot: 1.0, ..Default::default()})
		}
	}

	// Always finite acceleration, but x' runs past f64::MAX within a couple of seconds
	struct Runaway;

	impl StaticDifferentiator for Runaway {
		fn differentiate(&self, _t: Float, state: &State) -> Result<StateDerivative, SimulationError> {
			Ok(StateDerivative::from_accelerations(state, 1e308, 0.0))
		}
	}

	fn tight() -> AdaptiveSettings {
		AdaptiveSettings {
			abs_tol: 1e-12,
			rel_tol: 1e-12,
			..AdaptiveSettings::default()
		}
	}

	#[test]
	fn adaptive_harmonic() {
		let grid = TimeGrid::linspace(0.0, TAU, 101).unwrap();
		let (traj, stats) = AdaptiveRk::new(tight()).integrate(&Oscillator, &State::new(1.0, 0.0, 0.0, 0.0), &grid).unwrap();
		assert_eq!(traj.len(), 101);
		for (state, &t) in traj.iter().zip(grid.times()) {
			assert_abs_diff_eq!(state.x, t.cos(), epsilon = 1e-9);
			assert_abs_diff_eq!(state.x_dot, -t.sin(), epsilon = 1e-9);
		}
		assert!(stats.accepted >= 100);
		// FSAL: 6 new evaluations per accepted step, plus start-up evaluations for every interval
		assert!(stats.evaluations <= 7 * (stats.accepted + stats.rejected) + 3 * 100);
	}
	#[test]
	fn adaptive_non_uniform_grid() {
		let grid = TimeGrid::from_samples(vec![0.0, 1e-3, 0.5, PI, 3.5]).unwrap();
		let (traj, _) = AdaptiveRk::new(tight()).integrate(&Oscillator, &State::new(1.0, 0.0, 0.0, 0.0), &grid).unwrap();
		for (state, &t) in traj.iter().zip(grid.times()) {
			assert_abs_diff_eq!(state.x, t.cos(), epsilon = 1e-9);
		}
	}
	#[test]
	fn tighter_tolerance_improves_accuracy() {
		let grid = TimeGrid::linspace(0.0, TAU, 2).unwrap();
		let mut prev_err = Float::MAX;
		for tol in [1e-4, 1e-6, 1e-8, 1e-10] {
			let settings = AdaptiveSettings{abs_tol: tol, rel_tol: tol, ..AdaptiveSettings::default()};
			let (traj, _) = AdaptiveRk::new(settings).integrate(&Oscillator, &State::new(1.0, 0.0, 0.0, 0.0), &grid).unwrap();
			let last = traj.get(1).unwrap();
			let err = (last.x - 1.0).abs() + last.x_dot.abs();
			assert!(err < prev_err, "tol={}: error {} not smaller than previous {}", tol, err, prev_err);
			prev_err = err;
		}
	}
	#[test]
	fn deterministic() {
		let grid = TimeGrid::linspace(0.0, 5.0, 50).unwrap();
		let solver = AdaptiveRk::default();
		let a = solver.integrate(&Oscillator, &State::new(0.3, 0.0, 0.1, 0.0), &grid).unwrap();
		let b = solver.integrate(&Oscillator, &State::new(0.3, 0.0, 0.1, 0.0), &grid).unwrap();
		assert_eq!(a, b);
	}
	#[test]
	fn zero_state_stays_put() {
		struct Still;
		impl StaticDifferentiator for Still {
			fn differentiate(&self, _t: Float, state: &State) -> Result<StateDerivative, SimulationError> {
				Ok(StateDerivative::from_accelerations(state, 0.0, 0.0))
			}
		}
		let grid = TimeGrid::linspace(0.0, 1.0, 11).unwrap();
		let (traj, _) = AdaptiveRk::default().integrate(&Still, &State::default(), &grid).unwrap();
		assert!(traj.iter().all(|s| *s == State::default()));
	}
	#[test]
	fn single_sample_grid() {
		let grid = TimeGrid::from_samples(vec![0.0]).unwrap();
		let initial = State::new(0.5, 0.1, 0.0, 0.0);
		let (traj, stats) = AdaptiveRk::default().integrate(&Oscillator, &initial, &grid).unwrap();
		assert_eq!(traj.states(), &[initial]);
		assert_eq!(stats.evaluations, 0);
	}
	#[test]
	fn step_limit() {
		let grid = TimeGrid::linspace(0.0, TAU, 2).unwrap();
		let settings = AdaptiveSettings{max_steps: 5, ..tight()};
		let result = AdaptiveRk::new(settings).integrate(&Oscillator, &State::new(1.0, 0.0, 0.0, 0.0), &grid);
		assert!(matches!(result, Err(SimulationError::StepLimitExceeded{steps: 5, ..})));
		// The budget spans the whole grid, not each interval
		let grid = TimeGrid::linspace(0.0, TAU, 20).unwrap();
		let settings = AdaptiveSettings{max_steps: 10, ..AdaptiveSettings::default()};
		let result = AdaptiveRk::new(settings).integrate(&Oscillator, &State::new(1.0, 0.0, 0.0, 0.0), &grid);
		assert!(matches!(result, Err(SimulationError::StepLimitExceeded{steps: 10, ..})));
	}
	#[test]
	fn differentiator_error_aborts() {
		let grid = TimeGrid::linspace(0.0, 2.0, 21).unwrap();
		let result = AdaptiveRk::default().integrate(&Wall, &State::default(), &grid);
		match result {
			Err(SimulationError::SingularConfiguration{t, state, ..}) => {
				// Failing evaluation lies within one grid interval past the wall
				assert!(t >= 1.0 - 1e-9 && t <= 1.1 + 1e-9, "failed at t = {}", t);
				assert!(state.x >= 1.0);
			},
			other => panic!("expected a singular configuration, got {:?}", other)
		}
		let result = Rk4::default().integrate(&Wall, &State::default(), &grid);
		assert!(matches!(result, Err(SimulationError::SingularConfiguration{..})));
	}
	#[test]
	fn overflow_is_non_finite() {
		let grid = TimeGrid::linspace(0.0, 10.0, 11).unwrap();
		let result = AdaptiveRk::default().integrate(&Runaway, &State::default(), &grid);
		assert!(matches!(result, Err(SimulationError::NonFiniteResult{..})), "got {:?}", result);
		let result = Rk4::default().integrate(&Runaway, &State::default(), &grid);
		match result {
			Err(SimulationError::NonFiniteResult{t, state}) => {
				assert!(t > 0.0 && t <= 10.0);
				assert!(!state.is_finite());
			},
			other => panic!("expected a non-finite result, got {:?}", other)
		}
	}
	#[test]
	fn rejects_bad_input() {
		let grid = TimeGrid::linspace(0.0, 1.0, 3).unwrap();
		let nan = State::new(Float::NAN, 0.0, 0.0, 0.0);
		assert!(matches!(AdaptiveRk::default().integrate(&Oscillator, &nan, &grid), Err(SimulationError::InvalidConfiguration(_))));
		assert!(matches!(Rk4::default().integrate(&Oscillator, &nan, &grid), Err(SimulationError::InvalidConfiguration(_))));
		assert!(Rk4::new(0).integrate(&Oscillator, &State::default(), &grid).is_err());
		let settings = AdaptiveSettings{abs_tol: 0.0, ..AdaptiveSettings::default()};
		assert!(AdaptiveRk::new(settings).integrate(&Oscillator, &State::default(), &grid).is_err());
	}
	#[test]
	fn rk4_harmonic() {
		let grid = TimeGrid::linspace(0.0, TAU, 64).unwrap();
		let (traj, stats) = Rk4::new(20).integrate(&Oscillator, &State::new(1.0, 0.0, 0.0, 0.0), &grid).unwrap();
		assert_eq!(traj.len(), 64);
		assert_eq!(stats.accepted, 63 * 20);
		assert_eq!(stats.evaluations, 4 * 63 * 20);
		let last = traj.get(63).unwrap();
		assert_abs_diff_eq!(last.x, 1.0, epsilon = 1e-8);
		assert_abs_diff_eq!(last.x_dot, 0.0, epsilon = 1e-8);
	}
}
