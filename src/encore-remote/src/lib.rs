//! Control channel to an external cmus process.
//!
//! [`CmusRemote`] discovers (or starts) a cmus session and drives it through
//! one-shot `cmus-remote` invocations. Everything above this crate talks to
//! the player through the [`PlayerControl`] trait.

mod client;
mod command;
mod control;
mod error;
mod session;
mod status;

pub use client::CmusRemote;
pub use command::RemoteCommand;
pub use control::PlayerControl;
pub use error::{RemoteError, RemoteResult};
pub use session::{default_socket_paths, discover};
pub use status::parse_status;
