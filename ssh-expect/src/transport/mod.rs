//! SSH transport layer wrapping russh.
//!
//! This module provides the low-level SSH connection management:
//! connection setup (direct, over a supplied stream, or through a
//! connection factory), authentication, and shell channel creation.

mod channel;
pub mod config;
mod factory;
mod ssh;

pub use channel::RusshChannel;
pub use config::{AuthMethod, HostKeyVerification, SshConfig};
pub use factory::{AsyncStream, BoxedStream, ConnectionFactory, TcpFactory};
pub use ssh::SshTransport;
