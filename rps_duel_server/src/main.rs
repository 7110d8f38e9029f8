// CLI entry point for the duel server.
//
// Starts a standalone server that two participants connect to. The server
// owns the authoritative state and broadcasts every change; countdown
// presentation and choice selection stay on the clients. See `server.rs`
// for the networking architecture and `session.rs` for the session state.
//
// Usage:
//   rps-server [OPTIONS]
//     --host <ADDR>    Bind address (default: 0.0.0.0)
//     --port <PORT>    Listen port (default: 5555)

use std::thread;
use std::time::Duration;

use rps_duel_server::server::{ServerConfig, start_server};

fn main() {
    env_logger::init();
    let config = parse_args();

    let (handle, addr) = match start_server(&config) {
        Ok(result) => result,
        Err(e) => {
            eprintln!("Failed to start server: {e}");
            std::process::exit(1);
        }
    };

    println!("Duel server listening on {addr}");
    println!("Press Ctrl+C to stop.");

    // The server runs on background threads; park this one until the
    // process is killed. SIGINT/SIGTERM terminate the process directly,
    // which tears the listener and reader threads down with it.
    let _handle = handle;
    loop {
        thread::sleep(Duration::from_secs(1));
    }
}

/// Parse command-line arguments into a `ServerConfig`. Uses simple
/// `std::env::args()` matching — no clap dependency.
fn parse_args() -> ServerConfig {
    let mut config = ServerConfig::default();
    let args: Vec<String> = std::env::args().collect();
    let mut i = 1;

    while i < args.len() {
        match args[i].as_str() {
            "--host" => {
                i += 1;
                config.host = args.get(i).cloned().unwrap_or_else(|| {
                    eprintln!("--host requires a value");
                    std::process::exit(1);
                });
            }
            "--port" => {
                i += 1;
                config.port = args.get(i).and_then(|s| s.parse().ok()).unwrap_or_else(|| {
                    eprintln!("--port requires a valid port number");
                    std::process::exit(1);
                });
            }
            "--help" | "-h" => {
                print_usage();
                std::process::exit(0);
            }
            other => {
                eprintln!("Unknown argument: {other}");
                print_usage();
                std::process::exit(1);
            }
        }
        i += 1;
    }

    config
}

fn print_usage() {
    println!("Usage: rps-server [OPTIONS]");
    println!();
    println!("Options:");
    println!("  --host <ADDR>    Bind address (default: 0.0.0.0)");
    println!("  --port <PORT>    Listen port (default: 5555)");
    println!("  --help, -h       Show this help");
}
