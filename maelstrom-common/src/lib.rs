//! [Maelstrom](https://github.com/jepsen-io/maelstrom) is a workbench for testing toy implementations of distributed systems.
//!
//! This crate abstracts away the boilerplate of setting up the stdin/stdout for a node
//! in a distributed system, and provides a few useful utilities for writing handlers.
//!
//! This crate is inspired from and primarily written for the [Fly.io Distributed Systems challenges](https://fly.io/dist-sys/).
//!
//! # Usage
//!
//! Create a [Maelstrom] runtime, register one handler per message `type` your
//! node understands, and start it. The runtime answers `init` by itself and
//! refuses everything else until `init` has arrived.
//!
//! Every handler receives the [Node] handle and the inbound [Envelope], whose
//! body stays an opaque JSON value until the handler decodes it into a shape of
//! its own. Bodies embed a [Header] for the `type`, `msg_id` and `in_reply_to`
//! fields.
//!
//! Any error, whether it comes from decoding, a missing handler, or a handler
//! itself, stops the node.
//!
//! ## Example
//!
//! A node for the [Echo challenge](https://fly.io/dist-sys/1/):
//!
//! ```no_run
//! use maelstrom_common::{Envelope, Header, Maelstrom, Node};
//! use serde::{Deserialize, Serialize};
//!
//! #[derive(Debug, Serialize, Deserialize)]
//! struct Echo {
//!     #[serde(flatten)]
//!     header: Header,
//!     echo: String,
//! }
//!
//! fn main() -> Result<(), maelstrom_common::Error> {
//!     let mut maelstrom = Maelstrom::stdio();
//!     maelstrom.handle("echo", |node: &Node, msg: &Envelope| {
//!         let request: Echo = msg.decode_body()?;
//!         node.reply(msg, &Echo {
//!             header: Header::reply("echo_ok", request.header.msg_id),
//!             echo: request.echo,
//!         })
//!     })?;
//!     maelstrom.start()
//! }
//! ```

mod envelope;
mod error;
pub mod logging;
mod node;
mod runtime;

pub use envelope::*;
pub use error::*;
pub use node::*;
pub use runtime::*;
