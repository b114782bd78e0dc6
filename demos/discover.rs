use std::time::Duration;

use hecp::discover;

#[tokio::main]
async fn main() -> hecp::Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "hecp=debug".into()),
        )
        .init();

    println!("Scanning for encoders (2s window)...");
    let devices = discover(Duration::from_secs(2)).await?;

    if devices.is_empty() {
        println!("No devices found.");
        return Ok(());
    }

    for device in &devices {
        println!("  {}", device);
    }
    println!("{} device(s) found", devices.len());

    Ok(())
}
