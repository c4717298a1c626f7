//! The pipeline life-cycle state machine: `Constructed -> Ready -> Streaming
//! -> Drained | Errored`. The encoder drives this as it pulls scanlines; once
//! `Errored`, every subsequent `get_line` call returns the same error instead
//! of re-attempting the failed stage.

use std::fmt;
use std::sync::Arc;

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum PipelineState {
	Constructed,
	Ready,
	Streaming { next_line: usize },
	Drained,
	Errored(Arc<str>),
}

impl fmt::Display for PipelineState {
	fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
		match self {
			PipelineState::Constructed => write!(f, "constructed"),
			PipelineState::Ready => write!(f, "ready"),
			PipelineState::Streaming { next_line } => write!(f, "streaming (line {next_line})"),
			PipelineState::Drained => write!(f, "drained"),
			PipelineState::Errored(message) => write!(f, "errored: {message}"),
		}
	}
}

/// Tracks a pipeline's life-cycle across repeated `get_line` calls from an
/// encoder, enforcing the `Errored` sink state and the output's total line count.
pub struct PipelineTracker {
	state: PipelineState,
	height: usize,
}

impl PipelineTracker {
	#[must_use]
	pub fn new(height: usize) -> Self {
		Self { state: PipelineState::Constructed, height }
	}

	#[must_use]
	pub fn state(&self) -> &PipelineState {
		&self.state
	}

    /// Call once the producer chain is fully constructed and the first read is imminent.
	pub fn ready(&mut self) {
		if self.state == PipelineState::Constructed {
			self.state = PipelineState::Ready;
		}
	}

	/// Records a line request. Returns an error immediately if the pipeline
	/// already failed or has been fully drained.
	///
	/// # Errors
	/// Returns an error if the pipeline is `Errored` or `Drained`.
	pub fn begin_line(&mut self, y: usize) -> anyhow::Result<()> {
		match &self.state {
			PipelineState::Errored(message) => anyhow::bail!("pipeline already failed: {message}"),
			PipelineState::Drained => anyhow::bail!("pipeline already drained"),
			_ => {}
		}
		self.state = PipelineState::Streaming { next_line: y + 1 };
		Ok(())
	}

	/// Records a successful line completion, transitioning to `Drained` once
	/// the last line has been delivered.
	pub fn complete_line(&mut self, y: usize) {
		if y + 1 >= self.height {
			self.state = PipelineState::Drained;
		}
	}

	/// Latches the pipeline into the terminal `Errored` state.
	pub fn fail(&mut self, message: impl fmt::Display) {
		self.state = PipelineState::Errored(message.to_string().into());
	}
}

#[cfg(test)]
mod tests {
	use super::*;

	#[test]
	fn starts_constructed_then_advances_on_ready() {
		let mut tracker = PipelineTracker::new(10);
		assert_eq!(*tracker.state(), PipelineState::Constructed);
		tracker.ready();
		assert_eq!(*tracker.state(), PipelineState::Ready);
	}

	#[test]
	fn reaches_drained_after_the_last_line() {
		let mut tracker = PipelineTracker::new(2);
		tracker.begin_line(0).unwrap();
		tracker.complete_line(0);
		assert_eq!(*tracker.state(), PipelineState::Streaming { next_line: 1 });
		tracker.begin_line(1).unwrap();
		tracker.complete_line(1);
		assert_eq!(*tracker.state(), PipelineState::Drained);
	}

	#[test]
	fn errored_is_a_sink_state() {
		let mut tracker = PipelineTracker::new(5);
		tracker.fail("upstream storage failure");
		assert!(tracker.begin_line(0).is_err());
		assert!(tracker.begin_line(1).is_err());
	}
}
