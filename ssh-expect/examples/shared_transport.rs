//! Shared transport example: two shells over one SSH connection
//!
//! Opens one authenticated connection and runs a separate expect session
//! on each of two shell channels. Closing a session only closes its
//! channel; the connection is closed explicitly at the end.
//!
//! # Usage
//!
//! ```bash
//! cargo run --example shared_transport -- HOST USER PASSWORD
//! ```

use std::env;
use std::sync::Arc;
use std::time::Duration;

use ssh_expect::{AuthMethod, HostKeyVerification, SessionBuilder, SshConfig, SshTransport};

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    env_logger::Builder::from_env(env_logger::Env::default().default_filter_or("info")).init();

    let args: Vec<String> = env::args().skip(1).collect();
    let [host, user, password] = args.as_slice() else {
        eprintln!("usage: shared_transport HOST USER PASSWORD");
        std::process::exit(1);
    };

    let transport = Arc::new(
        SshTransport::connect(SshConfig {
            host: host.clone(),
            port: 22,
            username: user.clone(),
            auth: AuthMethod::Password(password.clone().into()),
            timeout: Some(Duration::from_secs(10)),
            terminal_width: 511,
            terminal_height: 24,
            host_key_verification: HostKeyVerification::AcceptNew,
            known_hosts_path: None,
        })
        .await?,
    );

    let mut first = SessionBuilder::new(host.as_str())
        .session(transport.clone())
        .output_log("first.log")
        .connect()
        .await?;
    let mut second = SessionBuilder::new(host.as_str())
        .session(transport.clone())
        .output_log("second.log")
        .connect()
        .await?;

    let (a, b) = tokio::try_join!(first.cmd("echo democommand1"), second.cmd("echo democommand2"))?;
    for output in [a, b].into_iter().flatten() {
        println!("{}", output);
    }

    first.close().await?;
    second.close().await?;
    transport.close().await?;
    Ok(())
}
