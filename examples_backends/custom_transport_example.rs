use std::sync::Arc;

use async_trait::async_trait;
use log_shipper::{
    ConsoleLog, HttpTransport, LogShipper, OutboundRequest, ShipperConfig, TransportError,
};
use tracing::Level;

/// Example of plugging in a completely custom transport by implementing
/// `HttpTransport` directly. Imagine this wraps an in-house HTTP client
/// with its own auth and proxy setup.
struct StdoutTransport;

#[async_trait]
impl HttpTransport for StdoutTransport {
    async fn post(&self, request: OutboundRequest) -> Result<u16, TransportError> {
        // Here you would call your own client library.
        // For the sake of example we just print the request.
        println!("[stdout-transport] POST {}", request.url);
        for (name, value) in &request.headers {
            println!("[stdout-transport]   {}: {}", name, value);
        }
        print!("{}", request.body);
        Ok(200)
    }
}

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    let mut config = ShipperConfig::with_url("http://collector.internal/receiver");
    config.source_category = Some("demo/custom-transport".to_string());

    let shipper = LogShipper::start(
        config,
        Arc::new(StdoutTransport),
        Arc::new(ConsoleLog::new(Level::DEBUG)),
    )?;

    shipper.add("custom transport example started\n");
    shipper.add("simulated error sent via custom transport\n");

    shipper.shutdown().await;
    Ok(())
}
