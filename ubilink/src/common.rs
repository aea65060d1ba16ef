//! Shared utilities for the ubilink binary.

use ubilink_client::MessageData;

/// Initialize tracing/logging: `debug` when verbose, the configured level otherwise.
pub fn init_logging(verbose: bool, level: &str) {
    use tracing_subscriber::{fmt, EnvFilter};

    let filter = if verbose {
        EnvFilter::new("debug")
    } else {
        EnvFilter::try_new(level).unwrap_or_else(|_| EnvFilter::new("info"))
    };

    fmt().with_env_filter(filter).init();
}

/// Handler for subscribed variables: print the update to stdout.
pub fn print_message(data: &MessageData<'_>) {
    println!(
        "{}: {}",
        data.topic_name,
        String::from_utf8_lossy(&data.message.payload)
    );
}
