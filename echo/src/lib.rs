use maelstrom_common::{Envelope, Header, Maelstrom, Node};
use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};
use std::io::BufRead;

#[derive(Debug, Serialize, Deserialize, Clone)]
pub struct EchoBody {
    #[serde(flatten)]
    pub header: Header,
    pub echo: Value,
    /// Anything else the client sent along, echoed back untouched.
    #[serde(flatten)]
    pub extra: Map<String, Value>,
}

pub fn register<R: BufRead>(maelstrom: &mut Maelstrom<R>) -> Result<(), maelstrom_common::Error> {
    maelstrom.handle("echo", echo)
}

/// Turn the request into its own reply.
pub fn echo(node: &Node, msg: &Envelope) -> Result<(), maelstrom_common::Error> {
    let mut body: EchoBody = msg.decode_body()?;
    body.header = Header::reply("echo_ok", body.header.msg_id);
    node.reply(msg, &body)
}
