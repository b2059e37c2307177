//! CLI for sensorlink: run the device gateway or simulate sensor devices.

mod commands;

use std::path::PathBuf;

use clap::{Parser, Subcommand};

#[derive(Parser)]
#[command(name = "sensorlink")]
#[command(about = "sensorlink - simulated IoT sensors and their WebSocket gateway")]
#[command(version = sensorlink_core::VERSION)]
struct Cli {
    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Run the device gateway: authenticate devices, echo and forward telemetry
    Server {
        /// Server config file (TOML). Flags below override its values.
        #[arg(long)]
        config: Option<PathBuf>,

        /// Host to bind to
        #[arg(long)]
        host: Option<String>,

        /// Port to listen on
        #[arg(long)]
        port: Option<u16>,

        /// JSON file seeding the device registry
        #[arg(long)]
        devices: Option<PathBuf>,

        /// Downstream consumer URL that receives every reading as a JSON POST
        #[arg(long)]
        callback_url: Option<String>,

        /// Per-reading downstream delivery budget in milliseconds
        #[arg(long)]
        forward_timeout_ms: Option<u64>,
    },

    /// Connect one simulated device to a gateway and stream readings
    Simulate {
        /// Gateway device endpoint, e.g. ws://127.0.0.1:9000/devices/auth/ws
        url: String,

        /// Device serial number
        sn: String,

        /// Device shared secret
        passwd: String,

        /// Generator config file (TOML, `[config]` table)
        #[arg(long)]
        config: Option<PathBuf>,

        /// Stop after N readings (default: run until Ctrl+C)
        #[arg(long)]
        ticks: Option<u64>,
    },

    /// Print generator output as JSON lines without connecting anywhere
    Sample {
        /// Generator config file (TOML, `[config]` table)
        #[arg(long)]
        config: Option<PathBuf>,

        /// Number of readings (0 = until Ctrl+C)
        #[arg(long, default_value = "20")]
        count: u64,

        /// Wall-clock delay between lines in milliseconds
        #[arg(long, default_value = "0")]
        interval_ms: u64,

        /// Serial number stamped on each reading
        #[arg(long, default_value = "SIM0001")]
        sn: String,
    },
}

fn main() {
    env_logger::Builder::from_env(env_logger::Env::default().default_filter_or("info")).init();

    let cli = Cli::parse();

    match cli.command {
        Commands::Server {
            config,
            host,
            port,
            devices,
            callback_url,
            forward_timeout_ms,
        } => commands::server::run(commands::server::ServerOverrides {
            config_path: config.as_deref(),
            host,
            port,
            devices,
            callback_url,
            forward_timeout_ms,
        }),
        Commands::Simulate {
            url,
            sn,
            passwd,
            config,
            ticks,
        } => commands::simulate::run(&url, &sn, &passwd, config.as_deref(), ticks),
        Commands::Sample {
            config,
            count,
            interval_ms,
            sn,
        } => commands::sample::run(config.as_deref(), count, interval_ms, &sn),
    }
}
