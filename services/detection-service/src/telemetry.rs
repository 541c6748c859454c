use anyhow::Result;
use tracing::info;
use tracing_subscriber::{fmt, layer::SubscriberExt, util::SubscriberInitExt, EnvFilter};

pub const JSON_LOG_ENV: &str = "FLOWGUARD_JSON_LOG";

/// Install the global subscriber. `RUST_LOG` takes precedence over
/// `default_level`. Output always goes to stderr so stdout stays a clean report.
pub fn init_tracing(service: &str, default_level: &str) -> Result<()> {
    let json = std::env::var(JSON_LOG_ENV).ok().map(|v| v == "1" || v.eq_ignore_ascii_case("true")).unwrap_or(false);
    let env_filter = EnvFilter::try_from_default_env().or_else(|_| EnvFilter::try_new(default_level))?;
    let registry = tracing_subscriber::registry().with(env_filter);
    if json {
        registry
            .with(fmt::layer().json().flatten_event(true).with_current_span(true).with_span_list(false).with_writer(std::io::stderr))
            .try_init()?;
    } else {
        registry
            .with(fmt::layer().with_target(true).with_thread_ids(false).with_line_number(true).with_writer(std::io::stderr))
            .try_init()?;
    }
    info!(service, json, "tracing initialized");
    Ok(())
}
