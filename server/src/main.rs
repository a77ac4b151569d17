use clap::Parser;
use log::info;
use server::network::Server;
use std::time::Duration;

#[derive(Parser, Debug)]
#[command(author, version, about, long_about = None)]
struct Args {
    /// Port to listen on
    port: u16,
}

#[tokio::main(flavor = "current_thread")]
async fn main() -> Result<(), Box<dyn std::error::Error + Send + Sync>> {
    env_logger::init();

    if std::env::var("RUST_LOG").is_err() {
        eprintln!("Set RUST_LOG=info for detailed logging");
    }

    let args = Args::parse();

    info!("Starting server on port {}", args.port);
    info!("Tick rate: {} Hz", shared::TICK_RATE);

    let address = format!("0.0.0.0:{}", args.port);
    let mut server = Server::bind(&address, Duration::from_secs_f32(shared::TICK)).await?;

    server.run().await?;

    Ok(())
}
