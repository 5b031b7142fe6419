//! Logging setup for the CLI.

use tracing_subscriber::EnvFilter;

/// Install a stderr `tracing` subscriber.
///
/// The default level is `warn` (`debug` with `--verbose`); `RUST_LOG`
/// overrides either.
pub fn init_cli_logging(verbose: bool) {
    let level = if verbose {
        tracing::Level::DEBUG
    } else {
        tracing::Level::WARN
    };

    let env_filter = EnvFilter::builder()
        .with_default_directive(level.into())
        .from_env_lossy();

    tracing_subscriber::fmt()
        .with_env_filter(env_filter)
        .with_writer(std::io::stderr)
        .with_target(false)
        .init();
}
