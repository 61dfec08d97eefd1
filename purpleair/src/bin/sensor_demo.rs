//! Demo of reading a PurpleAir sensor.
//!
//! Usage: `PURPLEAIR_API_KEY=... sensor_demo <sensor_index>`

use purpleair::{Client, ClientSettings, Error};
use std::time::Duration;

const PERIOD: Duration = Duration::from_secs(120);

#[tokio::main]
async fn main() {
    let key = std::env::var("PURPLEAIR_API_KEY").expect("PURPLEAIR_API_KEY not set");
    let sensor: u64 = std::env::args()
        .nth(1)
        .and_then(|s| s.parse().ok())
        .unwrap_or(133437);

    let client = Client::new(key, ClientSettings::default()).unwrap();

    let mut samples = 0;
    println!("polling sensor {sensor}...");
    while samples < 5 {
        match client.sensor(sensor).await {
            Ok(s) => println!("{}\n", s.sensor),
            Err(Error::Status { status, body }) => println!("HTTP {status}: {body}"),
            Err(e) => println!("error: {}", e),
        }
        samples += 1;

        tokio::time::sleep(PERIOD).await;
    }
}
