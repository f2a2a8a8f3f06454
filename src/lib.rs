/* Spring pendulum on a pulley block: equations of motion, trajectory integration and reaction forces
A load hangs from a spring-loaded arm that pivots about a pulley. The arm length changes with the spring extension `x`,
the arm swings through angle `phi`. Everything here works on the solved trajectory; drawing it is somebody else's job.
*/

use numeris::Vector4;

pub mod error;
pub mod params;
pub mod state;
pub mod time_grid;
pub mod physics;
pub mod integrator;
pub mod simulation;
pub mod config;

pub type Float = f64;
pub type V4 = Vector4<Float>;

pub mod prelude {
	pub use crate::{
		Float,
		V4,
		StaticDifferentiator,
		error::SimulationError,
		params::PhysicalParameters,
		state::{State, StateDerivative, Trajectory},
		time_grid::TimeGrid,
		physics::{
			SpringPendulum,
			reactions::{DerivedSeries, ReactionForce, derive_series, reaction_force}
		},
		integrator::{Integrator, AdaptiveRk, Rk4, AdaptiveSettings, IntegrationStats},
		simulation::{Simulation, SimulationReport, Summary},
		config::{SimulationConfig, HorizonConfig, IntegratorConfig, ConfigError}
	};
}

use prelude::*;

// Must be pure, the post-processor re-evaluates every stored sample and expects what the integrator saw
pub trait StaticDifferentiator {
	fn differentiate(&self, t: Float, state: &State) -> Result<StateDerivative, SimulationError>;
}

impl<T: StaticDifferentiator> StaticDifferentiator for &T {
	fn differentiate(&self, t: Float, state: &State) -> Result<StateDerivative, SimulationError> {
		(**self).differentiate(t, state)
	}
}
