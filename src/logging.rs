use crate::config::{Environment, LogFormat, Settings};
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt, EnvFilter};

/// Filter used when `RUST_LOG` is not set.
fn default_directives(env: &Environment) -> &'static str {
    match env {
        Environment::Dev => "tenderdesk_backend=debug,tower_http=debug,sqlx=warn,info",
        Environment::Staging => "tenderdesk_backend=debug,tower_http=info,sqlx=warn,info",
        Environment::Prod => "tenderdesk_backend=info,tower_http=info,sqlx=error,warn",
    }
}

pub fn init_logging(settings: &Settings) {
    let env = &settings.env;
    let filter = EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| EnvFilter::new(default_directives(env)));

    let fmt_layer = tracing_subscriber::fmt::layer()
        .with_target(true)
        .with_thread_ids(false)
        .with_file(env.is_dev())
        .with_line_number(env.is_dev());

    match settings.log_format {
        LogFormat::Json => tracing_subscriber::registry()
            .with(filter)
            .with(fmt_layer.json().flatten_event(true))
            .init(),
        LogFormat::Pretty => tracing_subscriber::registry()
            .with(filter)
            .with(fmt_layer.pretty())
            .init(),
    }

    tracing::info!(
        env = ?env,
        format = ?settings.log_format,
        "Logging initialized"
    );
}
