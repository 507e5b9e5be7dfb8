use crate::config::LogFormat;
use tracing_subscriber::{fmt, EnvFilter};

const DEFAULT_FILTER: &str = "info,actix_web=info,actix_server=warn,redis=warn";

pub fn init_tracing(format: LogFormat) {
    let env_filter =
        EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(DEFAULT_FILTER));

    match format {
        LogFormat::Json => fmt()
            .with_env_filter(env_filter)
            .with_target(false)
            .json()
            .init(),
        LogFormat::Text => fmt().with_env_filter(env_filter).with_target(false).init(),
    }
}
