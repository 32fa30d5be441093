/// Runs a block, emitting a debug event with the time it took.
#[macro_export]
macro_rules! timed {
	($label:expr, $code:block) => {{
		use std::time::Instant;
		let start = Instant::now();
		let result = { $code };
		let duration = start.elapsed();
		tracing::debug!(label = $label, ?duration, "timed");
		result
	}};
}
