//! `attraccess-reader`: bridges an NFC reader to an Attraccess server.

use std::path::PathBuf;

use anyhow::Context;
use attraccess_cli::config::{AppConfig, ReaderDriver};
use attraccess_cli::console::{ConsoleLed, run_simulator};
use attraccess_engine::{Devices, Gateway};
use attraccess_hardware::AnyCardReader;
use attraccess_hardware::mock::{MockButton, MockCardReader, MockCardReaderHandle};
use attraccess_network::{ReqwestTransport, TcpEventSocket};
use clap::Parser;
use tokio::io::BufReader;
use tracing::{error, info};
use tracing_subscriber::EnvFilter;

/// Attraccess NFC reader bridge
#[derive(Parser, Debug)]
#[command(name = "attraccess-reader", version, about)]
struct Args {
    /// Path to the TOML configuration file
    #[arg(short, long, env = "ATTRACCESS_CONFIG", default_value = "attraccess.toml")]
    config: PathBuf,

    /// Write logs as JSON lines
    #[arg(long)]
    log_json: bool,

    /// Log filter used when RUST_LOG is not set
    #[arg(long, default_value = "info")]
    log_level: String,
}

fn init_logging(args: &Args) {
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(&args.log_level));
    let builder = tracing_subscriber::fmt().with_env_filter(filter).with_target(false);
    if args.log_json {
        builder.json().init();
    } else {
        builder.init();
    }
}

fn build_reader(config: &AppConfig) -> anyhow::Result<(AnyCardReader, Option<MockCardReaderHandle>)> {
    match config.reader.driver {
        ReaderDriver::Mock => {
            let (reader, cards) = MockCardReader::new();
            Ok((AnyCardReader::Mock(reader), Some(cards)))
        }
        #[cfg(feature = "serial")]
        ReaderDriver::Pn532Serial => {
            use attraccess_hardware::pn532::{Pn532, SerialBus};

            let port = config.serial_port()?;
            let bus = SerialBus::open(port, config.reader.baud_rate)
                .with_context(|| format!("opening PN532 on {port}"))?;
            Ok((AnyCardReader::Pn532Serial(Pn532::new(bus)), None))
        }
        #[cfg(not(feature = "serial"))]
        ReaderDriver::Pn532Serial => {
            anyhow::bail!("driver pn532-serial needs the `serial` feature")
        }
    }
}

async fn shutdown_signal() {
    if let Err(e) = tokio::signal::ctrl_c().await {
        error!(error = %e, "Cannot listen for Ctrl-C, running until killed");
        std::future::pending::<()>().await;
    }
}

#[tokio::main(flavor = "current_thread")]
async fn main() -> anyhow::Result<()> {
    let args = Args::parse();
    init_logging(&args);
    info!(version = env!("CARGO_PKG_VERSION"), "attraccess-reader starting");

    let config = AppConfig::load(&args.config)
        .with_context(|| format!("loading {}", args.config.display()))?;
    let gateway_config = config.gateway_config()?;

    let (reader, cards) = build_reader(&config)?;
    let (button, button_handle) = MockButton::new();
    let transport = ReqwestTransport::new(gateway_config.request_timeout)?;

    let devices = Devices {
        reader,
        led: ConsoleLed::default(),
        button,
    };
    let mut gateway = Gateway::assemble(gateway_config, devices, transport, TcpEventSocket::new())?;

    let stream = gateway.stream_mut();
    stream.set_in_use_indicator(|in_use: &bool| info!(in_use, "Resource in use"));
    stream.set_status_text_indicator(|text: &str| info!(status = text, "Resource status"));
    stream.set_availability_indicator(|available: &bool| info!(available, "API availability"));

    let engine = gateway.engine_mut();
    engine.on_card_read(|uid| info!(uid, "Card read"));
    engine.on_authorized(|| info!("Access granted"));
    engine.on_denied(|| info!("Access denied"));
    engine
        .init_reader()
        .await
        .context("card reader initialisation failed")?;

    config.log_summary();
    gateway.dump_config();

    tokio::spawn(async move {
        run_simulator(BufReader::new(tokio::io::stdin()), button_handle, cards.clone()).await;
        // Dropping the handles would disconnect the mock reader.
        let _keep = cards;
        std::future::pending::<()>().await;
    });

    gateway.run(config.tick_interval(), shutdown_signal()).await;
    info!("attraccess-reader stopped");
    Ok(())
}
