//! Tracing setup. `RUST_LOG` wins over the per-environment defaults.

use crate::config::Environment;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt, EnvFilter};

/// Default filter when `RUST_LOG` is unset.
///
/// The HTTP client stack is held at `warn` everywhere: at `debug` it logs
/// every pooled connection made to the completion API.
fn default_directives(env: &Environment) -> String {
    let (service, http) = match env {
        Environment::Dev => ("debug", "debug"),
        Environment::Staging => ("debug", "info"),
        Environment::Prod => ("info", "info"),
    };
    let fallback = if matches!(env, Environment::Prod) { "warn" } else { "info" };

    format!(
        "{crate}={service},tower_http={http},reqwest=warn,hyper=warn,hyper_util=warn,{fallback}",
        crate = env!("CARGO_CRATE_NAME"),
    )
}

pub fn init_logging(env: &Environment) {
    let filter = EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| EnvFilter::new(default_directives(env)));

    let fmt_layer = tracing_subscriber::fmt::layer()
        .with_target(true)
        .with_file(env.is_dev())
        .with_line_number(env.is_dev());

    // Log shippers read one JSON object per line
    if matches!(env, Environment::Prod) {
        tracing_subscriber::registry()
            .with(filter)
            .with(fmt_layer.json().flatten_event(true))
            .init();
    } else {
        tracing_subscriber::registry()
            .with(filter)
            .with(fmt_layer.compact())
            .init();
    }

    tracing::info!(env = ?env, "Logging initialized");
}
