//! Basic example: log in and run a couple of commands
//!
//! Connects to a host, waits for the shell prompt, then runs `echo hello`
//! and `hostname`, printing what the shell sent back.
//!
//! # Usage
//!
//! With password authentication:
//! ```bash
//! cargo run --example echo_hello -- --host localhost --user demo --password guy
//! ```
//!
//! With SSH key authentication, dumping all traffic to a file:
//! ```bash
//! cargo run --example echo_hello -- --user demo --key ~/.ssh/id_ed25519 --dump dump.log
//! ```

use std::env;
use std::path::PathBuf;
use std::time::Duration;

use ssh_expect::SessionBuilder;

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    // Initialize logging (set RUST_LOG=debug for verbose output)
    env_logger::Builder::from_env(env_logger::Env::default().default_filter_or("info")).init();

    let args = Args::parse();

    let mut builder = SessionBuilder::new(&args.host)
        .port(args.port)
        .username(&args.user)
        .timeout(Duration::from_secs(args.timeout))
        .on_progress(|message| print!("{}", message))
        .on_output(|chunk| {
            if let Some(chunk) = chunk {
                print!("{}", String::from_utf8_lossy(chunk));
            }
        });

    if let Some(password) = &args.password {
        builder = builder.password(password);
    } else if let Some(key_path) = &args.key {
        builder = builder.private_key(key_path);
    } else {
        eprintln!("Error: Must provide either --password or --key");
        std::process::exit(1);
    }

    if let Some(dump) = &args.dump {
        builder = builder.dump_log(dump);
    }

    let mut session = builder.connect().await?;
    println!("\nLogged in");

    for command in ["echo hello", "hostname"] {
        match session.cmd(command).await? {
            Some(output) => println!("{}", output),
            None => {
                eprintln!("Connection closed while running {:?}", command);
                break;
            }
        }
    }

    session.close().await?;
    Ok(())
}

/// Simple argument parser (avoiding external dependencies)
struct Args {
    host: String,
    port: u16,
    user: String,
    password: Option<String>,
    key: Option<PathBuf>,
    dump: Option<PathBuf>,
    timeout: u64,
}

impl Args {
    fn parse() -> Self {
        let args: Vec<String> = env::args().collect();
        let mut parsed = Self {
            host: "localhost".to_string(),
            port: 22,
            user: env::var("USER").unwrap_or_else(|_| "root".to_string()),
            password: None,
            key: None,
            dump: None,
            timeout: 10,
        };

        let mut i = 1;
        while i < args.len() {
            let value = args.get(i + 1).cloned();
            match args[i].as_str() {
                "--host" | "-h" => parsed.host = value.unwrap_or(parsed.host),
                "--port" | "-p" => parsed.port = value.and_then(|v| v.parse().ok()).unwrap_or(22),
                "--user" | "-u" => parsed.user = value.unwrap_or(parsed.user),
                "--password" | "-P" => parsed.password = value,
                "--key" | "-k" => parsed.key = value.map(PathBuf::from),
                "--dump" | "-d" => parsed.dump = value.map(PathBuf::from),
                "--timeout" | "-t" => {
                    parsed.timeout = value.and_then(|v| v.parse().ok()).unwrap_or(10)
                }
                "--help" => {
                    println!(
                        "usage: echo_hello [--host HOST] [--port PORT] [--user USER] \
                         (--password PASS | --key PATH) [--dump FILE] [--timeout SECS]"
                    );
                    std::process::exit(0);
                }
                other => {
                    eprintln!("Unknown argument: {}", other);
                    i += 1;
                    continue;
                }
            }
            i += 2;
        }

        parsed
    }
}
