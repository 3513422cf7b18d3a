use std::sync::Arc;
use std::time::Instant;
use tokio::time::{sleep, Duration};

use log_shipper::{LogShipper, NoopTransport, ShipperConfig, TracingLog};

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    // Shipper diagnostics (evictions, flushes) go through `tracing`.
    tracing_subscriber::fmt()
        .with_env_filter("log_shipper=info")
        .init();

    let mut config = ShipperConfig::with_url("http://localhost:9000/receiver");
    config.max_queue_size_bytes = 5_000_000;
    config.messages_per_request = 1_000;
    config.max_flush_interval = Duration::from_millis(200);
    config.flushing_accuracy = Duration::from_millis(50);

    let shipper = LogShipper::start(config, Arc::new(NoopTransport), Arc::new(TracingLog))?;

    let n: u64 = 100_000;
    let start = Instant::now();

    for i in 0..n {
        shipper.add(format!("custom load test line {}\n", i));
    }

    let elapsed = start.elapsed();
    println!("custom config: buffered {} lines in {:?} (~{:.0} lines/s)",
        n,
        elapsed,
        n as f64 / elapsed.as_secs_f64()
    );

    // Let the scheduler drain the buffer in batches before shutting down.
    sleep(Duration::from_secs(1)).await;
    println!("left in buffer before shutdown: {}", shipper.buffered_count());

    shipper.shutdown().await;
    Ok(())
}
