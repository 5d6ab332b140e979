use serde::Serialize;
use std::io::Write;
use std::sync::{Mutex, OnceLock, PoisonError, RwLock};
use tracing::trace;

use crate::{Envelope, Error};

/// Who we are in the cluster. Learned from `init`, never changes afterwards.
#[derive(Debug)]
struct Identity {
    id: String,
    node_ids: Vec<String>,
}

/// The handle every handler gets: our identity, our neighbors,
/// and the only way to put messages on the wire.
pub struct Node {
    identity: OnceLock<Identity>,
    topology: RwLock<Vec<String>>,
    output: Mutex<Box<dyn Write + Send>>,
}

impl Node {
    pub fn new<W>(output: W) -> Self
    where
        W: Write + Send + 'static,
    {
        Node {
            identity: OnceLock::new(),
            topology: RwLock::new(Vec::new()),
            output: Mutex::new(Box::new(output)),
        }
    }

    /// Our node id, once `init` has told us what it is.
    pub fn id(&self) -> Option<&str> {
        self.identity.get().map(|identity| identity.id.as_str())
    }

    /// Every node in the cluster, ourselves included.
    pub fn node_ids(&self) -> &[String] {
        self.identity
            .get()
            .map(|identity| identity.node_ids.as_slice())
            .unwrap_or_default()
    }

    pub fn is_initialized(&self) -> bool {
        self.identity.get().is_some()
    }

    /// A snapshot of the neighbors we flood to.
    pub fn topology(&self) -> Vec<String> {
        self.topology
            .read()
            .unwrap_or_else(PoisonError::into_inner)
            .clone()
    }

    pub fn set_topology(&self, neighbors: Vec<String>) {
        *self.topology.write().unwrap_or_else(PoisonError::into_inner) = neighbors;
    }

    pub(crate) fn init(&self, id: String, node_ids: Vec<String>) -> Result<(), Error> {
        self.identity
            .set(Identity { id, node_ids })
            .map_err(|_| Error::AlreadyInitialized)
    }

    /// Wrap `body` in an envelope from us to `dest` and write it out
    /// as a single line. Concurrent sends never interleave.
    pub fn send<B: Serialize>(&self, dest: &str, body: &B) -> Result<(), Error> {
        let body = serde_json::to_value(body).map_err(Error::Encode)?;
        let envelope = Envelope::new(self.id().unwrap_or_default(), dest, body);
        let mut line = serde_json::to_string(&envelope).map_err(Error::Encode)?;
        trace!(target: "maelstrom::out", "Will write: {}", line);
        line.push('\n');

        let mut output = self.output.lock().unwrap_or_else(PoisonError::into_inner);
        output.write_all(line.as_bytes())?;
        output.flush()?;
        Ok(())
    }

    /// Send `body` back to whoever sent `request`.
    pub fn reply<T, B: Serialize>(&self, request: &Envelope<T>, body: &B) -> Result<(), Error> {
        self.send(&request.src, body)
    }
}
