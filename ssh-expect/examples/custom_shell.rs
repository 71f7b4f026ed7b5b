//! Custom shell example: a device whose CLI is not a Unix shell
//!
//! Network appliances often present their own command shell over SSH, with
//! a prompt like `switch1> ` and a carriage return as the line terminator.
//! This example reads its settings from a JSON option bag, so the same
//! program can be pointed at different devices.
//!
//! # Usage
//!
//! ```bash
//! cargo run --example custom_shell -- options.json "show alerts"
//! ```
//!
//! where `options.json` looks like:
//!
//! ```json
//! {
//!     "Host": "192.168.1.1",
//!     "Username": "demo",
//!     "Password": "guy",
//!     "Prompt": "(?m)^\\S+>\\s.*$",
//!     "Terminator": "\r",
//!     "Output_log": "output.log"
//! }
//! ```

use std::env;
use std::fs;

use ssh_expect::Options;

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    env_logger::Builder::from_env(env_logger::Env::default().default_filter_or("info")).init();

    let mut args = env::args().skip(1);
    let (Some(path), Some(command)) = (args.next(), args.next()) else {
        eprintln!("usage: custom_shell <options.json> <command>");
        std::process::exit(1);
    };

    let options = Options::from_json(&fs::read_to_string(&path)?)?;
    log::info!("loaded options from {}: {:?}", path, options);

    let mut session = options
        .into_builder()?
        .on_progress(|message| eprint!("{}", message))
        .connect()
        .await?;

    if let Some(output) = session.cmd(command.as_str()).await? {
        println!("{}", output);
    }

    session.close().await?;
    Ok(())
}
