// State vector `(x, phi, x', phi')`, its derivative, and the solved trajectory
use std::fmt;

use serde::{Serialize, Deserialize};

use crate::prelude::*;

// Spring extension, arm angle from vertical and their rates. Converts to and from `V4` only through `From`
#[derive(Debug, Clone, Copy, PartialEq, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct State {
	pub x: Float,
	pub phi: Float,
	pub x_dot: Float,
	pub phi_dot: Float
}

impl State {
	pub fn new(x: Float, phi: Float, x_dot: Float, phi_dot: Float) -> Self {
		Self {
			x,
			phi,
			x_dot,
			phi_dot
		}
	}
	pub fn is_finite(&self) -> bool {
		self.x.is_finite() && self.phi.is_finite() && self.x_dot.is_finite() && self.phi_dot.is_finite()
	}
	pub fn spring_length(&self, params: &PhysicalParameters) -> Float {
		params.natural_length + self.x
	}
}

impl From<V4> for State {
	fn from(v: V4) -> Self {
		Self::new(v[0], v[1], v[2], v[3])
	}
}

impl From<State> for V4 {
	fn from(s: State) -> Self {
		V4::from_array([s.x, s.phi, s.x_dot, s.phi_dot])
	}
}

impl fmt::Display for State {
	fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
		write!(f, "x = {}, phi = {}, x' = {}, phi' = {}", self.x, self.phi, self.x_dot, self.phi_dot)
	}
}

/// `(x', phi', x'', phi'')`. The first two slots are the velocities of the state it was evaluated at
#[derive(Debug, Clone, Copy, PartialEq, Default)]
pub struct StateDerivative {
	pub x_dot: Float,
	pub phi_dot: Float,
	pub x_ddot: Float,
	pub phi_ddot: Float
}

impl StateDerivative {
	pub fn from_accelerations(state: &State, x_ddot: Float, phi_ddot: Float) -> Self {
		Self {
			x_dot: state.x_dot,
			phi_dot: state.phi_dot,
			x_ddot,
			phi_ddot
		}
	}
	pub fn is_finite(&self) -> bool {
		self.x_dot.is_finite() && self.phi_dot.is_finite() && self.x_ddot.is_finite() && self.phi_ddot.is_finite()
	}
}

impl From<StateDerivative> for V4 {
	fn from(d: StateDerivative) -> Self {
		V4::from_array([d.x_dot, d.phi_dot, d.x_ddot, d.phi_ddot])
	}
}

// One state per time grid sample, never modified after the integrator returns it
#[derive(Debug, Clone, PartialEq)]
pub struct Trajectory {
	states: Vec<State>
}

impl Trajectory {
	pub(crate) fn from_states(states: Vec<State>) -> Self {
		Self {
			states
		}
	}
	pub fn states(&self) -> &[State] {
		&self.states
	}
	pub fn len(&self) -> usize {
		self.states.len()
	}
	pub fn is_empty(&self) -> bool {
		self.states.is_empty()
	}
	pub fn get(&self, i: usize) -> Option<&State> {
		self.states.get(i)
	}
	pub fn iter(&self) -> std::slice::Iter<'_, State> {
		self.states.iter()
	}
	pub fn x(&self) -> Vec<Float> {
		self.column(|s| s.x)
	}
	pub fn phi(&self) -> Vec<Float> {
		self.column(|s| s.phi)
	}
	pub fn x_dot(&self) -> Vec<Float> {
		self.column(|s| s.x_dot)
	}
	pub fn phi_dot(&self) -> Vec<Float> {
		self.column(|s| s.phi_dot)
	}
	fn column(&self, f: impl Fn(&State) -> Float) -> Vec<Float> {
		self.states.iter().map(f).collect()
	}
}

impl<'a> IntoIterator for &'a Trajectory {
	type Item = &'a State;
	type IntoIter = std::slice::Iter<'a, State>;
	fn into_iter(self) -> Self::IntoIter {
		self.states.iter()
	}
}
