use clap::Parser;
use client::network::{Client, ServerConnection};
use log::{error, info};
use macroquad::window::Conf;

#[derive(Parser, Debug)]
#[command(author, version, about, long_about = None)]
struct Args {
    /// Server host name or address
    host: String,

    /// Server port
    port: u16,

    /// Window width
    #[arg(short = 'w', long, default_value = "800")]
    width: usize,

    /// Window height (no short flag to avoid conflict with --help)
    #[arg(long, default_value = "600")]
    height: usize,
}

fn window_conf() -> Conf {
    let args = Args::parse();
    Conf {
        window_title: "Cipher Ops".to_owned(),
        window_width: args.width as i32,
        window_height: args.height as i32,
        ..Default::default()
    }
}

async fn run(args: Args) -> Result<(), Box<dyn std::error::Error>> {
    // Socket tasks live on their own runtime; macroquad drives the frames.
    let runtime = tokio::runtime::Builder::new_multi_thread()
        .worker_threads(1)
        .enable_all()
        .build()?;
    let _guard = runtime.enter();

    let address = format!("{}:{}", args.host, args.port);
    info!("Connecting to: {}", address);
    let connection = runtime.block_on(ServerConnection::connect(&address))?;

    info!("Controls: W/S or arrows to choose, Enter to log in or send");

    let mut client = Client::new(connection, args.width, args.height);
    client.run().await?;

    Ok(())
}

#[macroquad::main(window_conf)]
async fn main() {
    env_logger::init();

    if std::env::var("RUST_LOG").is_err() {
        eprintln!("Set RUST_LOG=info for detailed logging");
    }

    let args = Args::parse();

    if let Err(e) = run(args).await {
        error!("{}", e);
        eprintln!("{}", e);
        std::process::exit(1);
    }
}
