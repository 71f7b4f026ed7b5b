//! # ssh-expect
//!
//! Async send/expect automation over an SSH shell channel.
//!
//! ssh-expect opens an interactive shell on a remote host, sends lines to it
//! and waits for output matching a pattern, in the style of the classic
//! Telnet automation libraries.
//!
//! ## Features
//!
//! - Async SSH connections via russh, over TCP, a supplied stream, or an
//!   existing connection shared between sessions
//! - CRLF to LF translation that holds back a CR split across reads
//! - Idle-gap waiting for output that keeps arriving after a match
//! - Transcript and hex dump logs of the whole session
//! - An in-memory channel for scripting a remote shell in tests
//!
//! ## Quick Start
//!
//! ```rust,no_run
//! use ssh_expect::SessionBuilder;
//!
//! #[tokio::main]
//! async fn main() -> Result<(), ssh_expect::Error> {
//!     let mut session = SessionBuilder::new("192.168.1.1")
//!         .username("admin")
//!         .password("secret")
//!         .on_progress(|message| print!("{}", message))
//!         .connect()
//!         .await?;
//!
//!     if let Some(output) = session.cmd("uname -a").await? {
//!         println!("{}", output);
//!     }
//!
//!     session.close().await?;
//!     Ok(())
//! }
//! ```

pub mod channel;
pub mod driver;
pub mod error;
pub mod logging;
pub mod transport;

// Re-export main types for convenience
pub use channel::{ChannelAdapter, ChannelEvents, MemoryChannel, MemoryRemote, Pattern};
pub use driver::{
    CommandRequest, ExpectSession, MatchRequest, Options, Output, SessionBuilder, SessionConfig,
};
pub use error::Error;
pub use transport::{AuthMethod, HostKeyVerification, SshConfig, SshTransport};
