//! unifs command line entry point

use std::io::Write;
use std::path::PathBuf;

use tracing::{debug, info};
use tracing_subscriber::EnvFilter;

use unifs::config::Config;
use unifs::filesystem::ChecksumAlgorithm;
use unifs::manager::FileManager;
use unifs::Filesystem;

/// Print usage information
fn print_usage() {
    eprintln!("Usage: unifs <config.yaml> <command> [args]");
    eprintln!();
    eprintln!("unifs - one filesystem API over interchangeable storage backends");
    eprintln!();
    eprintln!("Commands:");
    eprintln!("  ls [target] [-r]          List a directory (recursively with -r)");
    eprintln!("  cat <target>              Print a file");
    eprintln!("  put <target> <file|->     Store a local file, or stdin with -");
    eprintln!("  mv <target> <path>        Move a file within its connection");
    eprintln!("  rm <target>               Delete a file");
    eprintln!("  stat <target>             Show metadata");
    eprintln!("  checksum <target> [--sha256]");
    eprintln!();
    eprintln!("A target is a path on the default connection or NAME:path.");
    eprintln!();
    eprintln!("Example:");
    eprintln!("  unifs /etc/unifs/config.yaml put archive:reports/today.txt today.txt");
}

/// Split `NAME:path` into its connection and path
fn split_target(target: &str) -> (Option<&str>, &str) {
    match target.split_once(':') {
        Some((name, path))
            if !name.is_empty()
                && name
                    .chars()
                    .all(|c| c.is_ascii_alphanumeric() || c == '-' || c == '_') =>
        {
            (Some(name), path)
        }
        _ => (None, target),
    }
}

async fn open(manager: &FileManager, target: &str) -> unifs::Result<(Filesystem, String)> {
    let (name, path) = split_target(target);
    let fs = match name {
        Some(name) => manager.make_connection(name).await?,
        None => manager.default_connection().await?,
    };
    Ok((fs, path.to_string()))
}

async fn run(manager: &FileManager, command: &str, args: &[String]) -> Result<(), Box<dyn std::error::Error>> {
    match (command, args) {
        ("ls", rest) => {
            let recursive = rest.iter().any(|a| a == "-r");
            let target = rest.iter().find(|a| *a != "-r").map(String::as_str).unwrap_or("");
            let (fs, dir) = open(manager, target).await?;
            for entry in fs.list_contents(&dir, recursive).await? {
                let kind = if entry.is_dir() { "d" } else { "-" };
                println!("{} {:>10} {}", kind, entry.size.unwrap_or(0), entry.path);
            }
        }
        ("cat", [target]) => {
            let (fs, path) = open(manager, target).await?;
            let data = fs.read(&path).await?;
            std::io::stdout().write_all(&data)?;
        }
        ("put", [target, source]) => {
            let (fs, path) = open(manager, target).await?;
            let data = if source == "-" {
                let mut buffer = Vec::new();
                std::io::Read::read_to_end(&mut std::io::stdin(), &mut buffer)?;
                buffer
            } else {
                tokio::fs::read(source).await?
            };
            debug!("Storing {} bytes at {}", data.len(), path);
            fs.put(&path, data).await?;
        }
        ("mv", [target, destination]) => {
            let (fs, path) = open(manager, target).await?;
            fs.move_file(&path, destination).await?;
        }
        ("rm", [target]) => {
            let (fs, path) = open(manager, target).await?;
            fs.delete(&path).await?;
        }
        ("stat", [target]) => {
            let (fs, path) = open(manager, target).await?;
            let meta = fs.get_metadata(&path).await?;
            println!("{}", serde_json::to_string_pretty(&meta)?);
            println!("permissions: {:o}", fs.get_permissions(&path).await?);
        }
        ("checksum", [target, rest @ ..]) => {
            let algorithm = if rest.iter().any(|a| a == "--sha256") {
                ChecksumAlgorithm::Sha256
            } else {
                ChecksumAlgorithm::Md5
            };
            let (fs, path) = open(manager, target).await?;
            println!("{}  {}", fs.checksum_with(&path, algorithm).await?, path);
        }
        _ => {
            print_usage();
            std::process::exit(1);
        }
    }
    Ok(())
}

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    // Parse arguments
    let args: Vec<String> = std::env::args().collect();
    if args.len() < 3 {
        print_usage();
        std::process::exit(1);
    }

    let config_path = PathBuf::from(&args[1]);

    // Load configuration
    let config = match Config::from_file(&config_path) {
        Ok(c) => c,
        Err(e) => {
            eprintln!("Failed to load config: {}", e);
            std::process::exit(1);
        }
    };

    // Initialize logging
    let filter = EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| EnvFilter::new(&config.logging.level));

    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(std::io::stderr)
        .init();

    info!("Loaded configuration from {:?}", config_path);

    let manager = FileManager::new(config);
    if let Err(e) = run(&manager, &args[2], &args[3..]).await {
        eprintln!("{}: {}", args[2], e);
        std::process::exit(1);
    }

    Ok(())
}
