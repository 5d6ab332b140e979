use std::collections::HashMap;
use std::io::{self, BufRead, StdinLock, Write};
use std::sync::Arc;
use tracing::{debug, info, trace};

use crate::{Envelope, Error, HandlerError, Header, InitBody, Node};

/// The message type that bootstraps a node. The runtime answers it itself.
pub const INIT: &str = "init";

/// A type-erased message handler, as stored in the registry.
pub type Handler = Box<dyn Fn(&Node, &Envelope) -> Result<(), HandlerError> + Send + Sync>;

/// A thin wrapper around a node that reads rpcs from an input stream,
/// routes each one to the handler registered for its type, and lets
/// handlers write their replies to an output stream.
pub struct Maelstrom<R> {
    input: R,
    node: Arc<Node>,
    handlers: HashMap<String, Handler>,
}

impl Maelstrom<StdinLock<'static>> {
    /// A runtime wired to the process' stdin and stdout, which is how
    /// maelstrom talks to its nodes.
    pub fn stdio() -> Self {
        Maelstrom::new(io::stdin().lock(), io::stdout())
    }
}

impl<R: BufRead> Maelstrom<R> {
    pub fn new<W>(input: R, output: W) -> Self
    where
        W: Write + Send + 'static,
    {
        Maelstrom {
            input,
            node: Arc::new(Node::new(output)),
            handlers: HashMap::new(),
        }
    }

    /// The node handle handlers get called with.
    pub fn node(&self) -> Arc<Node> {
        Arc::clone(&self.node)
    }

    /// Register `handler` for messages of type `msg_type`.
    ///
    /// Each type gets at most one handler, and `init` belongs to the runtime.
    pub fn handle<F, E>(&mut self, msg_type: &str, handler: F) -> Result<(), Error>
    where
        F: Fn(&Node, &Envelope) -> Result<(), E> + Send + Sync + 'static,
        E: Into<HandlerError>,
    {
        if msg_type == INIT || self.handlers.contains_key(msg_type) {
            return Err(Error::DuplicateHandler {
                msg_type: msg_type.to_owned(),
            });
        }
        let handler: Handler =
            Box::new(move |node: &Node, msg: &Envelope| handler(node, msg).map_err(Into::into));
        self.handlers.insert(msg_type.to_owned(), handler);
        debug!(target: "maelstrom::compute", msg_type, "Registered handler");
        Ok(())
    }

    /// Accept messages of type `msg_type` and do nothing with them.
    pub fn ignore(&mut self, msg_type: &str) -> Result<(), Error> {
        self.handle(msg_type, |_: &Node, _: &Envelope| Ok::<_, HandlerError>(()))
    }

    /// Process a single, already decoded, message.
    pub fn dispatch(&self, msg: &Envelope) -> Result<(), Error> {
        dispatch(&self.node, &self.handlers, msg)
    }

    /// Read newline-delimited messages until the input is exhausted,
    /// dispatching each one in order. The first error of any kind ends
    /// the loop and is returned.
    pub fn start(self) -> Result<(), Error> {
        let Maelstrom {
            mut input,
            node,
            handlers,
        } = self;

        // Lines are raw bytes; anything that isn't JSON is a decode error.
        let mut line = Vec::new();
        while input.read_until(b'\n', &mut line)? > 0 {
            trace!(target: "maelstrom::in", "Just read: {}", String::from_utf8_lossy(&line).trim_end());
            let msg: Envelope = serde_json::from_slice(&line).map_err(Error::Decode)?;
            dispatch(&node, &handlers, &msg)?;
            line.clear();
        }

        info!(target: "maelstrom::in", "Input closed, shutting down");
        Ok(())
    }
}

fn dispatch(node: &Node, handlers: &HashMap<String, Handler>, msg: &Envelope) -> Result<(), Error> {
    let header = msg.header()?;

    if header.kind == INIT {
        return initialize(node, msg);
    }

    if !node.is_initialized() {
        return Err(Error::Uninitialized {
            msg_type: header.kind,
        });
    }

    let Some(handler) = handlers.get(&header.kind) else {
        return Err(Error::Unhandled {
            msg_type: header.kind,
        });
    };

    debug!(target: "maelstrom::compute", msg_type = %header.kind, src = %msg.src, "Processing");
    handler(node, msg).map_err(|source| Error::Handler {
        msg_type: header.kind,
        source,
    })
}

fn initialize(node: &Node, msg: &Envelope) -> Result<(), Error> {
    let body: InitBody = msg.decode_body()?;
    node.init(body.node_id, body.node_ids)?;
    info!(
        target: "maelstrom::compute",
        node_id = node.id().unwrap_or_default(),
        cluster_size = node.node_ids().len(),
        "Initialized node"
    );
    node.reply(msg, &Header::reply("init_ok", body.header.msg_id))
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::{json, Value};
    use std::sync::atomic::{AtomicUsize, Ordering};
    use std::sync::Mutex;

    #[derive(Clone, Default)]
    struct Capture(Arc<Mutex<Vec<u8>>>);

    impl Write for Capture {
        fn write(&mut self, buf: &[u8]) -> io::Result<usize> {
            self.0.lock().unwrap().write(buf)
        }

        fn flush(&mut self) -> io::Result<()> {
            Ok(())
        }
    }

    impl Capture {
        fn lines(&self) -> Vec<Value> {
            let bytes = self.0.lock().unwrap();
            String::from_utf8_lossy(&bytes)
                .lines()
                .map(|line| serde_json::from_str(line).unwrap())
                .collect()
        }
    }

    const INIT_LINE: &str = r#"{"src":"c0","dest":"n1","body":{"type":"init","msg_id":1,"node_id":"n1","node_ids":["n1","n2"]}}"#;

    fn runtime(input: String) -> (Maelstrom<io::Cursor<String>>, Capture) {
        let capture = Capture::default();
        (Maelstrom::new(io::Cursor::new(input), capture.clone()), capture)
    }

    #[test]
    fn init_is_acknowledged_and_sets_identity() {
        let (maelstrom, capture) = runtime(format!("{INIT_LINE}\n"));
        let node = maelstrom.node();

        maelstrom.start().unwrap();

        assert_eq!(node.id(), Some("n1"));
        assert_eq!(node.node_ids(), ["n1", "n2"]);
        assert_eq!(
            capture.lines(),
            vec![json!({ "src": "n1", "dest": "c0", "body": { "type": "init_ok", "in_reply_to": 1 } })]
        );
    }

    #[test]
    fn end_of_input_is_a_clean_shutdown() {
        let (maelstrom, capture) = runtime(String::new());
        maelstrom.start().unwrap();
        assert!(capture.lines().is_empty());
    }

    #[test]
    fn messages_before_init_are_rejected_without_running_handlers() {
        let calls = Arc::new(AtomicUsize::new(0));
        let (mut maelstrom, _) = runtime(format!(
            "{}\n{INIT_LINE}\n",
            r#"{"src":"c1","dest":"n1","body":{"type":"read","msg_id":2}}"#
        ));
        let counter = Arc::clone(&calls);
        maelstrom
            .handle("read", move |_: &Node, _: &Envelope| {
                counter.fetch_add(1, Ordering::SeqCst);
                Ok::<_, HandlerError>(())
            })
            .unwrap();
        let node = maelstrom.node();

        let err = maelstrom.start().unwrap_err();

        assert!(matches!(err, Error::Uninitialized { ref msg_type } if msg_type == "read"));
        assert_eq!(calls.load(Ordering::SeqCst), 0);
        // The loop stopped before it ever saw init.
        assert!(!node.is_initialized());
    }

    #[test]
    fn unknown_types_end_the_loop() {
        let (maelstrom, capture) = runtime(format!(
            "{INIT_LINE}\n{}\n{}\n",
            r#"{"src":"c1","dest":"n1","body":{"type":"txn","msg_id":2}}"#,
            r#"{"src":"c0","dest":"n1","body":{"type":"init","msg_id":3,"node_id":"n1"}}"#
        ));

        let err = maelstrom.start().unwrap_err();

        assert!(matches!(err, Error::Unhandled { ref msg_type } if msg_type == "txn"));
        // Only the first init got an answer.
        assert_eq!(capture.lines().len(), 1);
    }

    #[test]
    fn handler_errors_are_wrapped_with_the_message_type() {
        #[derive(Debug, thiserror::Error)]
        #[error("boom")]
        struct Boom;

        let (mut maelstrom, _) = runtime(format!(
            "{INIT_LINE}\n{}\n",
            r#"{"src":"c1","dest":"n1","body":{"type":"read","msg_id":2}}"#
        ));
        maelstrom
            .handle("read", |_: &Node, _: &Envelope| Err(Boom))
            .unwrap();

        let err = maelstrom.start().unwrap_err();

        match err {
            Error::Handler { msg_type, source } => {
                assert_eq!(msg_type, "read");
                assert_eq!(source.to_string(), "boom");
            }
            other => panic!("unexpected error: {other:?}"),
        }
    }

    #[test]
    fn handlers_see_the_message_and_can_reply() {
        let (mut maelstrom, capture) = runtime(format!(
            "{INIT_LINE}\n{}\n",
            r#"{"src":"c1","dest":"n1","body":{"type":"ping","msg_id":9}}"#
        ));
        maelstrom
            .handle("ping", |node: &Node, msg: &Envelope| {
                let header = msg.header()?;
                node.reply(msg, &Header::reply("pong", header.msg_id))
            })
            .unwrap();

        maelstrom.start().unwrap();

        assert_eq!(
            capture.lines()[1],
            json!({ "src": "n1", "dest": "c1", "body": { "type": "pong", "in_reply_to": 9 } })
        );
    }

    #[test]
    fn init_cannot_be_registered() {
        let (mut maelstrom, _) = runtime(String::new());
        let err = maelstrom.ignore(INIT).unwrap_err();
        assert!(matches!(err, Error::DuplicateHandler { ref msg_type } if msg_type == "init"));
    }

    #[test]
    fn registering_a_type_twice_keeps_the_first_handler() {
        let (mut maelstrom, capture) = runtime(format!(
            "{INIT_LINE}\n{}\n",
            r#"{"src":"c1","dest":"n1","body":{"type":"ping","msg_id":4}}"#
        ));
        maelstrom
            .handle("ping", |node: &Node, msg: &Envelope| {
                node.reply(msg, &Header::reply("first", Some(4)))
            })
            .unwrap();

        let err = maelstrom
            .handle("ping", |node: &Node, msg: &Envelope| {
                node.reply(msg, &Header::reply("second", Some(4)))
            })
            .unwrap_err();
        assert!(matches!(err, Error::DuplicateHandler { .. }));

        maelstrom.start().unwrap();
        assert_eq!(capture.lines()[1]["body"]["type"], "first");
    }

    #[test]
    fn ignored_types_produce_no_output() {
        let (mut maelstrom, capture) = runtime(format!(
            "{INIT_LINE}\n{}\n",
            r#"{"src":"n2","dest":"n1","body":{"type":"broadcast_ok","in_reply_to":4}}"#
        ));
        maelstrom.ignore("broadcast_ok").unwrap();

        maelstrom.start().unwrap();
        assert_eq!(capture.lines().len(), 1);
    }

    #[test]
    fn a_second_init_is_an_error() {
        let (maelstrom, _) = runtime(format!("{INIT_LINE}\n{INIT_LINE}\n"));
        let err = maelstrom.start().unwrap_err();
        assert!(matches!(err, Error::AlreadyInitialized));
    }

    #[test]
    fn malformed_lines_are_decode_errors() {
        let (maelstrom, _) = runtime(format!("{INIT_LINE}\nnot json\n"));
        assert!(matches!(maelstrom.start().unwrap_err(), Error::Decode(_)));

        let (maelstrom, _) = runtime(r#"{"src":"c1","dest":"n1","body":{"msg_id":1}}"#.to_string());
        assert!(matches!(maelstrom.start().unwrap_err(), Error::Decode(_)));
    }

    #[test]
    fn invalid_utf8_is_a_decode_error() {
        let mut input = INIT_LINE.as_bytes().to_vec();
        input.push(b'\n');
        input.extend_from_slice(b"{\"src\":\"c\xff\",\"dest\":\"n1\",\"body\":{\"type\":\"read\"}}\n");
        let maelstrom = Maelstrom::new(io::Cursor::new(input), io::sink());

        assert!(matches!(maelstrom.start().unwrap_err(), Error::Decode(_)));
    }

    #[test]
    fn read_failures_end_the_loop_as_io_errors() {
        struct Unreadable;

        impl io::Read for Unreadable {
            fn read(&mut self, _: &mut [u8]) -> io::Result<usize> {
                Err(io::Error::new(io::ErrorKind::ConnectionReset, "gone"))
            }
        }

        let maelstrom = Maelstrom::new(io::BufReader::new(Unreadable), io::sink());
        match maelstrom.start().unwrap_err() {
            Error::Io(err) => assert_eq!(err.kind(), io::ErrorKind::ConnectionReset),
            other => panic!("unexpected error: {other:?}"),
        }
    }

    #[test]
    fn crlf_lines_are_accepted() {
        let (maelstrom, capture) = runtime(format!("{INIT_LINE}\r\n"));
        maelstrom.start().unwrap();
        assert_eq!(capture.lines().len(), 1);
    }

    #[test]
    fn dispatch_processes_one_message() {
        let (maelstrom, capture) = runtime(String::new());
        let init: Envelope = serde_json::from_str(INIT_LINE).unwrap();

        maelstrom.dispatch(&init).unwrap();

        assert!(maelstrom.node().is_initialized());
        assert_eq!(capture.lines().len(), 1);
    }
}
