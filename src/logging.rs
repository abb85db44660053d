use anyhow::{anyhow, Result};
use tracing_subscriber::{fmt, prelude::*, EnvFilter};

/// Directives applied on top of `RUST_LOG`; Chromium's protocol chatter is
/// switched off.
const DIRECTIVES: [&str; 3] = [
    "chromiumoxide::conn=off",
    "chromiumoxide::handler=off",
    "manual2book=info",
];

pub fn filter() -> Result<EnvFilter> {
    let mut filter = EnvFilter::from_default_env();
    for directive in DIRECTIVES {
        filter = filter.add_directive(
            directive
                .parse()
                .map_err(|e| anyhow!("invalid log directive {}: {}", directive, e))?,
        );
    }
    Ok(filter)
}

pub fn init() -> Result<()> {
    tracing_subscriber::registry()
        .with(fmt::layer())
        .with(filter()?)
        .try_init()
        .map_err(|e| anyhow!("Failed to initialize logging: {}", e))
}
