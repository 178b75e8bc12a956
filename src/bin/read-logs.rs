//! Log reader for the DHT22 bridge
//!
//! Prints the current log file followed by its rotated backup.

use clap::Parser;
use dht22_bridge::observability::backup_path_for;
use std::fs;
use std::io::ErrorKind;
use std::path::{Path, PathBuf};

/// Print the bridge log file and its rotated backup
#[derive(Parser)]
#[command(name = "read-logs")]
#[command(about = "Print the bridge log file and its rotated backup")]
#[command(version)]
struct Args {
    /// Log file written by the bridge
    #[arg(short, long, default_value = "app.log")]
    file: PathBuf,
}

fn main() {
    let args = Args::parse();
    let banner = "=".repeat(50);

    println!("{banner}");
    print_log_file(&args.file);
    println!("{banner}");
    print_log_file(&backup_path_for(&args.file));
    println!("{banner}");
}

fn print_log_file(path: &Path) {
    println!("--- Reading: {} ---", path.display());
    match fs::read_to_string(path) {
        Ok(content) if content.is_empty() => println!("*** Log file is empty. ***"),
        Ok(content) => print!("{content}"),
        Err(e) if e.kind() == ErrorKind::NotFound => {
            println!("*** Log file not found. It may not have been created yet. ***")
        }
        Err(e) => println!("*** Could not read log file: {e} ***"),
    }
}
