//! High-level send/expect API.
//!
//! The driver layer opens sessions ([`SessionBuilder`], [`Options`]) and
//! runs the expect loop over a channel ([`ExpectSession`]).

mod builder;
mod config;
mod options;
mod output;
mod request;
mod session;

pub use builder::SessionBuilder;
pub use config::SessionConfig;
pub use options::{Options, TimeoutOption};
pub use output::Output;
pub use request::{CommandRequest, MatchRequest};
pub use session::ExpectSession;
