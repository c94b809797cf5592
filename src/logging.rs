use tracing_subscriber::EnvFilter;

/// Filter used by [`init`]. With debug logging off the dashboard logs at
/// `info`; with it on the level is `debug` unless `RUST_LOG` says otherwise.
pub fn filter(debug: bool) -> EnvFilter {
    if debug {
        // `RUST_LOG` only takes effect once debug logging is switched on in
        // the settings file.
        EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("debug"))
    } else {
        // A stray `RUST_LOG` in the user's environment must not turn on
        // verbose layout and store tracing.
        EnvFilter::new("info")
    }
}

/// Install the global subscriber. Calling it again is a no-op.
pub fn init(debug: bool) {
    let _ = tracing_subscriber::fmt()
        .with_env_filter(filter(debug))
        .try_init();
}
