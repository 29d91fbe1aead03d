//! Headless tracker binary.
//!
//! Connects every configured account, logs the combined status whenever it
//! is recomputed and stops all gateways on Ctrl+C.

use tracing_subscriber::EnvFilter;

use multi_account_notifier_lib::init_coordinator;

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::from_default_env())
        .init();

    tracing::info!("Starting multi-account notifier");

    let coordinator = init_coordinator()?;
    tracing::info!(accounts = ?coordinator.account_ids(), "Tracking accounts");
    let (mut statuses, handle) = coordinator.connect().await?;

    let mut last = None;
    loop {
        tokio::select! {
            status = statuses.recv() => {
                let Some(status) = status else {
                    tracing::warn!("Aggregate status stream ended");
                    break;
                };
                if last != Some(status) {
                    tracing::info!(%status, "Aggregate status changed");
                    last = Some(status);
                } else {
                    tracing::debug!(%status, "Aggregate status unchanged");
                }
            }
            result = tokio::signal::ctrl_c() => {
                result?;
                tracing::info!("Shutting down...");
                break;
            }
        }
    }

    handle.stop().await;
    // Let the gateways flush their close frames.
    tokio::time::sleep(std::time::Duration::from_millis(200)).await;
    Ok(())
}
