//! Defines `ProgressTrait`, the common interface for progress indicators.

/// A trait defining the interface for progress indicators.
pub trait ProgressTrait: Send + Sync {
	/// Creates a new instance of the progress indicator.
	fn new() -> Self
	where
		Self: Sized;

	/// Initializes the progress indicator.
	fn init(&mut self, message: &str, max_value: u64);

	/// Sets the absolute position of the progress.
	fn set_position(&mut self, value: u64);

	/// Increases the value of the progress by a given amount.
	fn inc(&mut self, value: u64);

	/// Finishes the progress.
	fn finish(&mut self);

	/// Removes the progress indicator from the terminal.
	fn remove(&mut self);
}
