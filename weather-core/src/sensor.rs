//! Poll the weather API until it answers HTTP 200.

use tokio::time::{Instant, sleep};

use crate::{config::SensorConfig, error::EtlError, provider::WeatherProvider};

/// Block until `provider` reports ready, or fail once `config.timeout()` has elapsed.
///
/// Probe errors (connection refused, DNS, ...) count as "not ready yet". A probe that is
/// still in flight when the timeout runs out is abandoned.
pub async fn wait_until_ready(
    provider: &dyn WeatherProvider,
    config: &SensorConfig,
) -> Result<(), EtlError> {
    let started = Instant::now();
    let timeout = config.timeout();
    let mut pokes = 0u32;

    loop {
        pokes += 1;
        let remaining = timeout.saturating_sub(started.elapsed());

        match tokio::time::timeout(remaining, provider.probe()).await {
            Ok(Ok(true)) => {
                tracing::info!(pokes, "weather API is ready");
                return Ok(());
            }
            Ok(Ok(false)) => tracing::debug!(pokes, "weather API not ready yet"),
            Ok(Err(e)) => tracing::warn!(pokes, error = %e, "readiness probe failed"),
            Err(_) => tracing::warn!(pokes, "readiness probe did not answer in time"),
        }

        let waited = started.elapsed();
        if waited >= timeout {
            return Err(EtlError::UpstreamUnavailable { waited });
        }

        sleep(config.poke_interval().min(timeout - waited)).await;
    }
}
