//! Opt-in log output.
//!
//! The library only emits `tracing` events. Applications either install
//! their own subscriber or call [`init_default_tracing`].

/// Installs a compact stderr subscriber filtered by `RUST_LOG`
/// (default `info`).
///
/// Returns `false` without the `telemetry` feature, or when the host
/// already installed a global subscriber.
#[must_use]
pub fn init_default_tracing() -> bool {
    #[cfg(feature = "telemetry")]
    {
        use tracing_subscriber::EnvFilter;

        let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info"));
        tracing_subscriber::fmt()
            .with_env_filter(filter)
            .with_writer(std::io::stderr)
            .with_target(false)
            .compact()
            .try_init()
            .is_ok()
    }

    #[cfg(not(feature = "telemetry"))]
    {
        false
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn second_init_is_refused() {
        let first = init_default_tracing();
        assert!(!init_default_tracing());
        assert_eq!(first, cfg!(feature = "telemetry"));
    }
}
