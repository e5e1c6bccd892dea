use tracing_subscriber::{EnvFilter, FmtSubscriber};

/// Installs the global fmt subscriber on stderr. `RUST_LOG` overrides the
/// default filter; `verbose` lowers it to `debug`.
pub fn init(verbose: bool) {
    let fallback = if verbose { "debug" } else { "info" };
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(fallback));

    let subscriber = FmtSubscriber::builder()
        .with_env_filter(filter)
        .with_writer(std::io::stderr)
        .with_target(false)
        .finish();

    if let Err(err) = tracing::subscriber::set_global_default(subscriber) {
        eprintln!("Failed to install log subscriber: {err}");
    }
}
