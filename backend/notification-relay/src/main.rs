use notification_relay::config::{Config, LogFormat};
use notification_relay::{logging, relay, AppError};

#[actix_web::main]
async fn main() -> Result<(), AppError> {
    let config = match Config::from_env() {
        Ok(config) => config,
        Err(e) => {
            logging::init_tracing(LogFormat::Text);
            tracing::error!(error = %e, "Invalid configuration");
            return Err(e);
        }
    };

    logging::init_tracing(config.app.log_format);
    tracing::info!(
        addr = %config.bind_addr(),
        channel = %config.redis.channel,
        "Starting notification relay"
    );

    if let Err(e) = relay::run(config).await {
        tracing::error!(error = %e, "Notification relay exited with error");
        return Err(e);
    }

    tracing::info!("Notification relay stopped");
    Ok(())
}
