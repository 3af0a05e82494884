//! src/telemetry.rs
use tracing_subscriber::prelude::*;

pub fn init_tracing(service_name: &'static str) -> anyhow::Result<()> {
    tracing_subscriber::registry()
        .with(tracing_subscriber::EnvFilter::from_default_env())
        .with(
            tracing_subscriber::fmt::layer()
                .with_target(false)
                .with_thread_ids(true),
        )
        .try_init()?;
    tracing::info!("telemetry initialized for {service_name}");
    Ok(())
}
