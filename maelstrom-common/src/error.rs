use std::io;

/// Whatever a handler fails with. Protocol crates bring their own error
/// types and let `?` box them.
pub type HandlerError = Box<dyn std::error::Error + Send + Sync + 'static>;

/// Every way the runtime can stop processing messages.
///
/// There is no recovery: the first error ends the read loop.
#[derive(Debug, thiserror::Error)]
pub enum Error {
    #[error("failed to decode message")]
    Decode(#[source] serde_json::Error),

    #[error("failed to encode message")]
    Encode(#[source] serde_json::Error),

    #[error("i/o error on message stream")]
    Io(#[from] io::Error),

    #[error("received message of type `{msg_type}` before init")]
    Uninitialized { msg_type: String },

    #[error("node is already initialized")]
    AlreadyInitialized,

    #[error("no handler for message type `{msg_type}`")]
    Unhandled { msg_type: String },

    #[error("handler for message type `{msg_type}` is already registered")]
    DuplicateHandler { msg_type: String },

    #[error("handler for message type `{msg_type}` failed")]
    Handler {
        msg_type: String,
        #[source]
        source: HandlerError,
    },
}
