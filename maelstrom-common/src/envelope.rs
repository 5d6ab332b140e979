use serde::{de::DeserializeOwned, Deserialize, Serialize};
use serde_json::Value;

use crate::Error;

/// A formal structure for any message sent between nodes
/// or clients in a maelstrom orchestrated distributed system.
///
/// Inbound envelopes keep their body as an opaque JSON value until
/// the runtime knows which handler will consume it.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Envelope<B = Value> {
    /// An identifier for the sender of the message.
    pub src: String,
    /// An identifier for the receiver of the message.
    pub dest: String,
    /// The message payload. Every payload carries a [Header].
    pub body: B,
}

impl<B> Envelope<B> {
    /// Create a new envelope with the given source, destination, and body.
    pub fn new(src: &str, dest: &str, body: B) -> Self {
        Envelope {
            src: src.to_owned(),
            dest: dest.to_owned(),
            body,
        }
    }
}

impl Envelope<Value> {
    /// Decode the opaque body into a concrete message shape.
    pub fn decode_body<T: DeserializeOwned>(&self) -> Result<T, Error> {
        T::deserialize(&self.body).map_err(Error::Decode)
    }

    /// Shortcut for decoding just the common [Header].
    pub fn header(&self) -> Result<Header, Error> {
        self.decode_body()
    }
}

/// The fields common to every message body.
///
/// Concrete bodies embed this with `#[serde(flatten)]` and add their own fields.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Header {
    /// Selects the handler for this message.
    #[serde(rename = "type")]
    pub kind: String,

    /// The id that the client gives us for any rpc it makes.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub msg_id: Option<u64>,

    /// The message our rpc response corresponds to.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub in_reply_to: Option<u64>,
}

impl Header {
    /// A header for a fire-and-forget message. We never allocate
    /// message ids of our own, so nothing can reply to it by id.
    pub fn new(kind: &str) -> Self {
        Header {
            kind: kind.to_owned(),
            msg_id: None,
            in_reply_to: None,
        }
    }

    /// A header for an acknowledgment of the request carrying `in_reply_to`.
    pub fn reply(kind: &str, in_reply_to: Option<u64>) -> Self {
        Header {
            kind: kind.to_owned(),
            msg_id: None,
            in_reply_to,
        }
    }
}

/// The reserved bootstrap message every node must see before anything else.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct InitBody {
    #[serde(flatten)]
    pub header: Header,
    pub node_id: String,
    #[serde(default)]
    pub node_ids: Vec<String>,
}
