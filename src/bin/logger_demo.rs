use authgate::logger::*;
use authgate::settings::Log;

fn main() -> anyhow::Result<()> {
    let logger = Logger::new_bootstrap();
    debug!("bootstrap debug log (hidden)");
    info!(user_id = "demo-user", device_id = "default", "bootstrap info log");

    let log = Log {
        filter: "debug,authgate::infra_memory=trace".to_string(),
    };
    logger.reload_from_settings(&log)?;
    trace!(target: "authgate::infra_memory", "sweeper trace log");
    debug!(user_id = "demo-user", "application debug log");
    warn!(email = "demo@example.com", "failed login");

    // malformed directives leave the previous filter in place
    let bad = logger.reload_filter("info,[");
    info!(rejected = bad.is_err(), "reload with bad directives");

    Ok(())
}
