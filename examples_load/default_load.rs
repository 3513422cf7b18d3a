use std::sync::Arc;
use std::time::Instant;

use log_shipper::{log, LogShipper, NoopTransport, ShipperConfig};

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    let config = ShipperConfig::with_url("http://localhost:9000/receiver");
    let shipper = LogShipper::start(config, Arc::new(NoopTransport), log::noop())?;

    let n: u64 = 100_000;
    let start = Instant::now();

    for i in 0..n {
        shipper.add(format!("default load test line {}\n", i));
    }

    let elapsed = start.elapsed();
    println!("default config: buffered {} lines in {:?} (~{:.0} lines/s), evicted {}",
        n,
        elapsed,
        n as f64 / elapsed.as_secs_f64(),
        shipper.buffer().evicted_count()
    );

    shipper.shutdown().await;
    Ok(())
}
