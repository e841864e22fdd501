use anyhow::Result;
use std::path::PathBuf;
use std::sync::Arc;

use bildarkiv::archive::Archive;
use bildarkiv::config::Config;
use bildarkiv::faces::UltraFaceDetector;
use bildarkiv::{logging, web};

#[derive(Default)]
struct Args {
    config_path: Option<PathBuf>,
    listen_address: Option<String>,
}

fn parse_args() -> Args {
    let args: Vec<String> = std::env::args().collect();
    let mut parsed = Args::default();

    let mut i = 1;
    while i < args.len() {
        match args[i].as_str() {
            "--help" | "-h" => {
                print_help();
                std::process::exit(0);
            }
            "--version" | "-V" => {
                println!("bildarkiv {}", env!("CARGO_PKG_VERSION"));
                std::process::exit(0);
            }
            "--config" | "-c" => {
                if i + 1 < args.len() {
                    parsed.config_path = Some(PathBuf::from(&args[i + 1]));
                    i += 1;
                } else {
                    eprintln!("Error: --config requires a path argument");
                    std::process::exit(1);
                }
            }
            "--listen" | "-l" => {
                if i + 1 < args.len() {
                    parsed.listen_address = Some(args[i + 1].clone());
                    i += 1;
                } else {
                    eprintln!("Error: --listen requires an address argument");
                    std::process::exit(1);
                }
            }
            _ => {
                eprintln!("Unknown argument: {}", args[i]);
                print_help();
                std::process::exit(1);
            }
        }
        i += 1;
    }

    parsed
}

fn print_help() {
    println!(
        r#"bildarkiv - photo archive with face tagging

USAGE:
    bildarkiv [OPTIONS]

OPTIONS:
    --config, -c PATH   Path to config file
    --listen, -l ADDR   Address to listen on (overrides config)
    --version, -V       Show version
    --help, -h          Show this help message

ENVIRONMENT:
    BILDARKIV_CONFIG    Path to config file (overrides default location)
    BILDARKIV_LOG       Log filter (trace, debug, info, warn, error)

Config file location: $XDG_CONFIG_HOME/bildarkiv/config.toml"#
    );
}

#[tokio::main]
async fn main() -> Result<()> {
    let args = parse_args();

    // journald on Linux, stderr plus rolling file otherwise
    if let Err(e) = logging::init(Some(Config::config_dir().join("logs"))) {
        eprintln!("Warning: logging unavailable: {}", e);
    }

    let mut config = match args.config_path {
        Some(path) => Config::load_from(&path)?,
        None => Config::load()?,
    };
    if let Some(address) = args.listen_address {
        config.server.listen_address = address;
    }

    let listen_address = config.server.listen_address.clone();
    let detector = Arc::new(UltraFaceDetector::new(config.detector.clone()));
    let archive = Arc::new(Archive::open(config, detector)?);

    web::serve(archive, &listen_address).await
}
