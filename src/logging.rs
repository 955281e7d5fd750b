use tracing_subscriber::EnvFilter;

/// Initialize diagnostics on stderr.
///
/// Stdout carries only JSON events, so every log line goes to stderr. The
/// crate logs through the `log` facade; the fmt subscriber picks those
/// records up. `RUST_LOG` overrides the level chosen from the flags.
pub fn init_logging(debug: bool) {
    let default_filter = if debug { "warn,rfextract=debug" } else { "warn" };
    let env_filter =
        EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(default_filter));

    // A second init (tests, embedding) keeps the first subscriber.
    let _ = tracing_subscriber::fmt()
        .with_env_filter(env_filter)
        .with_writer(std::io::stderr)
        .with_target(false)
        .without_time()
        .try_init();
}
