// Output sample times. Strictly increasing and finite, checked on construction
use crate::prelude::*;

#[derive(Debug, Clone, PartialEq)]
pub struct TimeGrid(
	Vec<Float>
);

impl TimeGrid {
	/// `samples` evenly spaced points covering `[t_start, t_end]` inclusive
	pub fn linspace(t_start: Float, t_end: Float, samples: usize) -> Result<Self, SimulationError> {
		if samples == 0 {
			return Err(SimulationError::invalid("time grid needs at least one sample"));
		}
		if !t_start.is_finite() || !t_end.is_finite() {
			return Err(SimulationError::invalid(format!("time horizon [{}, {}] is not finite", t_start, t_end)));
		}
		if samples == 1 {
			return Ok(Self(vec![t_start]));
		}
		if t_end <= t_start {
			return Err(SimulationError::invalid(format!("time horizon end {} must be after start {}", t_end, t_start)));
		}
		let dt = (t_end - t_start) / ((samples - 1) as Float);
		let mut times: Vec<Float> = (0..samples).map(|i| t_start + dt * (i as Float)).collect();
		// Pin the end point, accumulated rounding would otherwise leave it a hair short
		times[samples - 1] = t_end;
		Self::from_samples(times)
	}
	pub fn from_samples(times: Vec<Float>) -> Result<Self, SimulationError> {
		if times.is_empty() {
			return Err(SimulationError::invalid("time grid is empty"));
		}
		for (i, t) in times.iter().enumerate() {
			if !t.is_finite() {
				return Err(SimulationError::invalid(format!("time grid sample {} is not finite ({})", i, t)));
			}
		}
		for (i, pair) in times.windows(2).enumerate() {
			if pair[1] <= pair[0] {
				return Err(SimulationError::invalid(format!("time grid is not strictly increasing at sample {} ({} -> {})", i + 1, pair[0], pair[1])));
			}
		}
		Ok(Self(times))
	}
	pub fn times(&self) -> &[Float] {
		&self.0
	}
	pub fn len(&self) -> usize {
		self.0.len()
	}
	pub fn is_empty(&self) -> bool {
		self.0.is_empty()
	}
	pub fn start(&self) -> Float {
		self.0[0]
	}
	pub fn end(&self) -> Float {
		self.0[self.0.len() - 1]
	}
	pub fn intervals(&self) -> impl Iterator<Item = (Float, Float)> + '_ {
		self.0.windows(2).map(|w| (w[0], w[1]))
	}
}

impl std::ops::Index<usize> for TimeGrid {
	type Output = Float;
	fn index(&self, i: usize) -> &Float {
		&self.0[i]
	}
}
