//! Operations tool for a rebus queue.
//!
//! ```text
//! rebus-inspect [stats] [queue]     queue depth and registered transactions
//! rebus-inspect peek [queue] [n]    next n message ids (default 10)
//! rebus-inspect sweep [queue]       return messages held by dead transactions
//! ```
//!
//! The queue defaults to `REBUS_INPUT_QUEUE`. Output is JSON on stdout.

use anyhow::Result;
use rebus_redis::{Config, RedisMessageQueue};
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

const DEFAULT_PEEK_COUNT: usize = 10;

#[tokio::main]
async fn main() -> Result<()> {
    let config = Config::from_env()?;

    tracing_subscriber::registry()
        .with(tracing_subscriber::EnvFilter::new(config.rust_log.clone()))
        .with(tracing_subscriber::fmt::layer().with_writer(std::io::stderr))
        .init();

    let args: Vec<String> = std::env::args().skip(1).collect();
    let command = args.first().map(String::as_str).unwrap_or("stats");
    let queue_name = args
        .get(1)
        .cloned()
        .unwrap_or_else(|| config.input_queue.clone());

    let mut queue = RedisMessageQueue::connect(&config).await.map_err(|e| {
        e.log();
        e
    })?;

    let output = match command {
        "stats" => {
            let stats = queue.inspector().stats(&queue_name).await?;
            serde_json::to_string_pretty(&stats)?
        }
        "peek" => {
            let count = match args.get(2) {
                Some(n) => n.parse()?,
                None => DEFAULT_PEEK_COUNT,
            };
            let ids = queue.inspector().peek(&queue_name, count).await?;
            serde_json::to_string_pretty(&ids)?
        }
        "sweep" => {
            let report = queue.sweep(&queue_name).await?;
            tracing::info!(
                queue = %queue_name,
                reclaimed = report.reclaimed,
                recovered = report.recovered_messages,
                "Sweep finished"
            );
            serde_json::to_string_pretty(&report)?
        }
        other => anyhow::bail!("Unknown command '{}' (expected stats, peek or sweep)", other),
    };

    println!("{}", output);
    Ok(())
}
