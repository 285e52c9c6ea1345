// ============================================================================
// Redis Connection
// ============================================================================

use rebus_config::RedisConfig;
use rebus_error::{TransportError, TransportResult};
use rebus_store::RedisClient;
use std::time::Duration;

/// Open the connection manager, bounded by the configured timeout.
///
/// Failure here is fatal for the transport; there is no retry.
pub(crate) async fn connect(config: &RedisConfig) -> TransportResult<RedisClient> {
    let url = config.redacted_url();

    if config.is_tls() {
        tracing::info!("Redis TLS enabled (rediss://)");
    } else {
        tracing::info!("Redis TLS not enabled (redis://)");
    }

    tracing::debug!(url = %url, "Getting Redis connection manager...");
    let timeout = Duration::from_secs(config.connect_timeout_secs);
    match tokio::time::timeout(timeout, RedisClient::connect(&config.url)).await {
        Ok(Ok(client)) => {
            tracing::info!(url = %url, "Connected to Redis");
            Ok(client)
        }
        Ok(Err(e)) => Err(TransportError::connection(format!(
            "Failed to connect to Redis at {}: {}",
            url, e
        ))),
        Err(_) => Err(TransportError::connection(format!(
            "Timed out after {}s connecting to Redis at {}",
            config.connect_timeout_secs, url
        ))),
    }
}
