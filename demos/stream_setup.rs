use std::time::Duration;

use hecp::{discover, ClientConfig, DeviceHandle};

#[tokio::main]
async fn main() -> hecp::Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "hecp=info".into()),
        )
        .init();

    let url = std::env::args().nth(1).unwrap_or_else(|| {
        eprintln!("usage: stream_setup <rtmp-url> [stream-key]");
        std::process::exit(2);
    });
    let key = std::env::args().nth(2);

    println!("Scanning for encoders...");
    let devices = discover(Duration::from_secs(2)).await?;
    let Some(device) = devices.into_iter().next() else {
        eprintln!("No devices found.");
        std::process::exit(1);
    };
    println!("Using {}", device);

    let handle = DeviceHandle::new(device, ClientConfig::default());
    handle.connect().await?;

    println!("Firmware: {}", handle.get("firmware").await?);
    println!("Input:    {}", handle.get("source").await?);
    println!("Bitrate:  {} kbit/s", handle.get("bitrate").await?);

    handle.set("rtmp_url", url.as_str()).await?;
    if let Some(key) = key {
        handle.set("rtmp_key", key.as_str()).await?;
    }
    handle.set("bitrate", 6000).await?;

    handle.start_streaming().await?;
    println!("Streaming: {}", handle.get("streaming").await?);

    handle.disconnect().await;
    Ok(())
}
