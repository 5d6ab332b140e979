use maelstrom_common::{Envelope, Header, Maelstrom, Node};
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::io::BufRead;
use std::sync::{Arc, PoisonError, RwLock};
use tracing::{debug, info};


#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TopologyBody {
    #[serde(flatten)]
    pub header: Header,
    pub topology: HashMap<String, Vec<String>>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ReadOkBody {
    #[serde(flatten)]
    pub header: Header,
    pub messages: Vec<i64>,
}

/// Sent by clients with a `msg_id`, and between nodes without one.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct BroadcastBody {
    #[serde(flatten)]
    pub header: Header,
    pub message: i64,
}

#[derive(Debug, thiserror::Error)]
pub enum BroadcastError {
    #[error("node `{0}` is missing from the topology")]
    MissingFromTopology(String),

    #[error(transparent)]
    Maelstrom(#[from] maelstrom_common::Error),
}

/// Every value this node has learned, in the order it learned them.
///
/// Values are only ever appended, and each one at most once.
#[derive(Debug, Default)]
pub struct Broadcast {
    messages: RwLock<Vec<i64>>,
}

impl Broadcast {
    pub fn new() -> Arc<Self> {
        Arc::new(Self::default())
    }

    /// Install the broadcast handlers on `maelstrom`.
    pub fn register<R: BufRead>(
        self: Arc<Self>,
        maelstrom: &mut Maelstrom<R>,
    ) -> Result<(), maelstrom_common::Error> {
        let state = Arc::clone(&self);
        maelstrom.handle("topology", move |node: &Node, msg: &Envelope| {
            state.topology(node, msg)
        })?;

        let state = Arc::clone(&self);
        maelstrom.handle("read", move |node: &Node, msg: &Envelope| state.read(node, msg))?;

        let state = self;
        maelstrom.handle("broadcast", move |node: &Node, msg: &Envelope| {
            state.broadcast(node, msg)
        })?;

        // Neighbors may acknowledge our floods. Nothing waits on those acks.
        maelstrom.ignore("broadcast_ok")
    }

    /// A snapshot of every value learned so far.
    pub fn messages(&self) -> Vec<i64> {
        self.messages
            .read()
            .unwrap_or_else(PoisonError::into_inner)
            .clone()
    }

    /// Adopt our own entry of the topology map as our neighbors.
    pub fn topology(&self, node: &Node, msg: &Envelope) -> Result<(), BroadcastError> {
        let body: TopologyBody = msg.decode_body()?;
        let our_id = node.id().unwrap_or_default();
        let Some(neighbors) = body.topology.get(our_id) else {
            return Err(BroadcastError::MissingFromTopology(our_id.to_owned()));
        };

        info!(target: "maelstrom::compute", ?neighbors, "Adopted topology");
        node.set_topology(neighbors.clone());
        node.reply(msg, &Header::reply("topology_ok", body.header.msg_id))?;
        Ok(())
    }

    pub fn read(&self, node: &Node, msg: &Envelope) -> Result<(), BroadcastError> {
        let header = msg.header()?;
        let messages = self.messages.read().unwrap_or_else(PoisonError::into_inner);
        node.reply(
            msg,
            &ReadOkBody {
                header: Header::reply("read_ok", header.msg_id),
                messages: messages.clone(),
            },
        )?;
        Ok(())
    }

    /// Store a value and, the first time we see it, pass it on to every
    /// neighbor except the one we heard it from.
    pub fn broadcast(&self, node: &Node, msg: &Envelope) -> Result<(), BroadcastError> {
        let body: BroadcastBody = msg.decode_body()?;

        if self.learn(body.message) {
            let flood = BroadcastBody {
                header: Header::new("broadcast"),
                message: body.message,
            };
            for neighbor in node.topology().iter().filter(|&n| n != &msg.src) {
                debug!(target: "maelstrom::compute", value = body.message, %neighbor, "Flooding");
                node.send(neighbor, &flood)?;
            }
        } else {
            debug!(target: "maelstrom::compute", value = body.message, src = %msg.src, "Already known");
        }

        // Floods between nodes carry no msg_id and get no reply.
        if body.header.msg_id.is_some() {
            node.reply(msg, &Header::reply("broadcast_ok", body.header.msg_id))?;
        }
        Ok(())
    }

    /// Returns whether `value` was new to us.
    fn learn(&self, value: i64) -> bool {
        let mut messages = self.messages.write().unwrap_or_else(PoisonError::into_inner);
        if messages.contains(&value) {
            return false;
        }
        messages.push(value);
        true
    }
}
