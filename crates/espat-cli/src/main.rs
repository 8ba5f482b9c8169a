//! `espat`: drive an ESP8266 modem attached to a TCP serial bridge.
//!
//! ```text
//! espat --config lab.yaml probe
//! espat --config lab.yaml join
//! espat --config lab.yaml --host example.com get /index.html
//! espat --config lab.yaml post 21.5 40
//! espat --bridge 10.0.0.5:2000 status
//! ```

mod bridge;
mod config;

use std::error::Error;
use std::io;
use std::path::PathBuf;
use std::process::ExitCode;

use clap::{Parser, Subcommand};
use espat_driver::{Esp8266, IoSink, StdDelay};
use espat_protocol::{ConnectionMode, WifiMode};
use tracing::info;
use tracing_subscriber::EnvFilter;

use crate::bridge::TcpBridge;
use crate::config::Profile;

type Modem = Esp8266<TcpBridge, StdDelay>;

/// Talk to an ESP8266 AT modem through a TCP serial bridge.
#[derive(Parser, Debug)]
#[command(name = "espat", version)]
struct Cli {
    /// YAML profile (bridge, WiFi, target, driver and Ubidots settings).
    #[arg(short, long)]
    config: Option<PathBuf>,

    /// Bridge address, overrides the profile.
    #[arg(long)]
    bridge: Option<String>,

    /// WiFi network name, overrides the profile.
    #[arg(long)]
    ssid: Option<String>,

    /// WiFi password, overrides the profile.
    #[arg(long)]
    password: Option<String>,

    /// Target host, overrides the profile.
    #[arg(long)]
    host: Option<String>,

    /// Target port, overrides the profile.
    #[arg(long)]
    port: Option<u16>,

    /// Log at debug level (RUST_LOG takes precedence).
    #[arg(short, long)]
    verbose: bool,

    /// Mirror the modem traffic to stderr.
    #[arg(long)]
    mirror: bool,

    #[command(subcommand)]
    cmd: Cmd,
}

#[derive(Subcommand, Debug)]
enum Cmd {
    /// Soft reset, disable echo and print the firmware version.
    Probe,
    /// Join the access point and print the station IP.
    Join,
    /// Join, open a TCP session, send GET <url> and close.
    Get {
        /// Request path, e.g. `/index.html`.
        url: String,
    },
    /// Join, open a TCP session, POST values to Ubidots and close.
    Post {
        /// One value per configured Ubidots variable.
        values: Vec<String>,
    },
    /// Report whether the modem has a TCP session open.
    Status,
}

fn init_logging(verbose: bool) {
    let default = if verbose { "debug" } else { "info" };
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(default));
    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(io::stderr)
        .init();
}

/// Load the profile and apply command line overrides.
fn resolve_profile(cli: &Cli) -> Result<Profile, Box<dyn Error>> {
    let mut profile = match &cli.config {
        Some(path) => Profile::load(path)?,
        None => Profile::default(),
    };

    if let Some(bridge) = &cli.bridge {
        profile.bridge = bridge.clone();
    }
    if let Some(ssid) = &cli.ssid {
        profile.wifi.ssid = ssid.clone();
    }
    if let Some(password) = &cli.password {
        profile.wifi.password = password.clone();
    }
    if let Some(host) = &cli.host {
        profile.target.host = host.clone();
    }
    if let Some(port) = cli.port {
        profile.target.port = port;
    }
    Ok(profile)
}

fn open_modem(profile: &Profile, mirror: bool) -> Result<Modem, Box<dyn Error>> {
    info!("Connecting to bridge {}", profile.bridge);
    let bridge = TcpBridge::connect(profile.bridge.as_str())?;
    let mut modem = Esp8266::with_config(bridge, StdDelay, profile.driver.clone())?
        .with_ubidots(profile.ubidots.clone());
    if mirror {
        modem = modem.with_debug_sink(IoSink::new(io::stderr()));
    }
    Ok(modem)
}

fn join(modem: &mut Modem, profile: &Profile) -> Result<(), Box<dyn Error>> {
    if profile.wifi.ssid.is_empty() {
        return Err("no WiFi network configured (use --ssid or the profile)".into());
    }
    modem.set_wifi_mode(WifiMode::Station)?;
    modem.set_connection_mode(ConnectionMode::Single)?;
    modem.connect_to_ap(&profile.wifi.ssid, &profile.wifi.password)?;
    info!("Joined {}", profile.wifi.ssid);
    Ok(())
}

fn run(cli: Cli) -> Result<(), Box<dyn Error>> {
    let profile = resolve_profile(&cli)?;
    let mut modem = open_modem(&profile, cli.mirror)?;

    match cli.cmd {
        Cmd::Probe => {
            modem.soft_reset()?;
            modem.set_module_echo(false)?;
            let version = modem.get_version()?;
            println!("{}", version);
        }
        Cmd::Join => {
            join(&mut modem, &profile)?;
            match modem.get_ip()? {
                Some(ip) => println!("{}", ip),
                None => println!("joined, no station IP reported"),
            }
        }
        Cmd::Get { url } => {
            join(&mut modem, &profile)?;
            modem.connect_tcp(&profile.target.host, profile.target.port)?;
            modem.request_url(&url)?;
            modem.close_tcp()?;
            println!("GET {} ok", url);
        }
        Cmd::Post { values } => {
            join(&mut modem, &profile)?;
            modem.connect_tcp(&profile.target.host, profile.target.port)?;
            modem.ubidots_post_request(&values)?;
            modem.close_tcp()?;
            println!("POST {} value(s) ok", values.len());
        }
        Cmd::Status => {
            let connected = modem.tcp_connected()?;
            println!("{}", if connected { "connected" } else { "not connected" });
        }
    }

    info!("Done in state {:?}", modem.state());
    Ok(())
}

fn main() -> ExitCode {
    let cli = Cli::parse();
    init_logging(cli.verbose);

    match run(cli) {
        Ok(()) => ExitCode::SUCCESS,
        Err(e) => {
            eprintln!("error: {}", e);
            ExitCode::from(1)
        }
    }
}
