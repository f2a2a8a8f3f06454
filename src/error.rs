// Everything that can stop a run. None of these are retried, the run either completes or reports one of them
use thiserror::Error;

use crate::{Float, state::State};

#[derive(Debug, Clone, PartialEq, Error)]
pub enum SimulationError {
	/// Spring length `l0 + x` reached zero or went negative, the angular equation divides by it
	#[error("spring collapsed at t = {t}: length {length} <= 0 (state {state})")]
	SingularConfiguration {
		t: Float,
		length: Float,
		state: State
	},
	#[error("non-finite value at t = {t} (state {state})")]
	NonFiniteResult {
		t: Float,
		state: State
	},
	#[error("invalid configuration: {0}")]
	InvalidConfiguration(String),
	#[error("step limit of {steps} exceeded at t = {t}")]
	StepLimitExceeded {
		t: Float,
		steps: usize
	}
}

impl SimulationError {
	pub fn invalid(msg: impl Into<String>) -> Self {
		Self::InvalidConfiguration(msg.into())
	}
	/// Time at which integration failed, `None` for configuration errors
	pub fn failed_at(&self) -> Option<Float> {
		match self {
			Self::SingularConfiguration{t, ..} => Some(*t),
			Self::NonFiniteResult{t, ..} => Some(*t),
			Self::StepLimitExceeded{t, ..} => Some(*t),
			Self::InvalidConfiguration(_) => None
		}
	}
}
