mod command;
mod config;

use crate::command::Reply;
use crate::config::Config;
use antenna_controller::{MemorySettings, Rotor};
use clap::Parser;
use log::{error, info, warn};
use std::{
    io::{self, BufRead, BufReader, Write},
    net::{TcpListener, TcpStream},
    path::{Path, PathBuf},
};

/// rotctl compatible rotor server
#[derive(Parser, Debug)]
#[command(version, about = "rotctl compatible rotor server", long_about = None)]
struct Args {
    /// TOML configuration file
    #[arg(short, long)]
    config: Option<PathBuf>,

    /// Address to listen on
    #[arg(short = 'T', long)]
    host: Option<String>,

    /// TCP port to listen on
    #[arg(short = 't', long)]
    port: Option<u16>,

    /// Rotor settings file (JSON)
    #[arg(short, long)]
    settings: Option<PathBuf>,
}

/// Builds the rotor from the settings file.
///
/// The file is rewritten with every key only when it parsed or did not exist
/// yet. A file that fails to parse is left untouched.
fn load_rotor(settings_file: &Path) -> Rotor {
    let mut rotor = Rotor::new();

    match MemorySettings::load(settings_file) {
        Ok(mut settings) => {
            rotor.read_settings(&mut settings);
            rotor.write_settings(&mut settings);
            if let Err(err) = settings.save(settings_file) {
                warn!("Cannot save settings to {:?}: {}", settings_file, err);
            }
        }
        Err(err) => {
            warn!(
                "Ignoring settings file {:?}, running with defaults and not saving: {}",
                settings_file, err
            );
            rotor.read_settings(&mut MemorySettings::new());
        }
    }

    rotor
}

fn serve_client(rotor: &mut Rotor, stream: TcpStream) -> io::Result<()> {
    let mut writer = stream.try_clone()?;
    let reader = BufReader::new(stream);

    for line in reader.lines() {
        let line = line?;
        if line.trim().is_empty() {
            continue;
        }

        match command::handle_line(rotor, &line) {
            Reply::Text(text) => writer.write_all(text.as_bytes())?,
            Reply::Close => break,
        }
    }

    Ok(())
}

fn main() {
    env_logger::init_from_env(env_logger::Env::new().default_filter_or("info"));

    let args = Args::parse();

    let mut config = Config::load(args.config.as_deref()).unwrap_or_else(|err| {
        error!("Failed to load configuration: {}", err);
        std::process::exit(1);
    });
    if let Some(host) = args.host {
        config.listen.host = host;
    }
    if let Some(port) = args.port {
        config.listen.port = port;
    }
    if let Some(settings) = args.settings {
        config.settings_file = settings;
    }

    let mut rotor = load_rotor(&config.settings_file);
    info!("Rotor: {} ({:?})", rotor.rotor_name(), rotor.config().comm_type);

    if let Err(err) = rotor.open_port() {
        warn!("Rotor port not open yet: {}", err);
    }

    let address = config.listen.address();
    let listener = TcpListener::bind(&address).unwrap_or_else(|err| {
        error!("Cannot listen on {}: {}", address, err);
        std::process::exit(1);
    });
    info!("Listening on {}", address);

    for stream in listener.incoming() {
        let stream = match stream {
            Ok(stream) => stream,
            Err(err) => {
                warn!("Accept failed: {}", err);
                continue;
            }
        };

        let peer = stream
            .peer_addr()
            .map(|addr| addr.to_string())
            .unwrap_or_else(|_| "unknown".into());
        info!("Client {} connected", peer);

        if let Err(err) = serve_client(&mut rotor, stream) {
            warn!("Client {}: {}", peer, err);
        }
        info!("Client {} disconnected", peer);
    }
}
