use tracing_subscriber::{prelude::__tracing_subscriber_SubscriberExt, util::SubscriberInitExt, EnvFilter};

/// Initializes the global tracing subscriber.
///
/// Respects the `RUST_LOG` environment variable, defaulting to
/// `info` for dependencies and `debug` for this crate.
pub fn init_tracing() {
	let log_filter = EnvFilter::try_from_default_env()
		.or_else(|_| EnvFilter::try_new("info,crownduel=debug,serenity=warn"))
		.unwrap_or_else(|_| EnvFilter::new("info"));

	let result = tracing_subscriber::registry()
		.with(log_filter)
		.with(tracing_subscriber::fmt::layer().with_target(true))
		.try_init();

	if let Err(err) = result {
		eprintln!("Tracing was already initialized: {err}");
	}
}

/// Logs the error of a result instead of propagating it.
#[macro_export]
macro_rules! log_error {
	($e:expr) => {
		if let Err(err) = $e {
			tracing::error!(error.message = %err, "{:?}", err);
		}
	};
}
