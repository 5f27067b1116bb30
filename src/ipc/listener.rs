//! Unix-socket [`MessageSource`] implementation.
//!
//! Binds a Unix stream socket and serves every accepted connection on a
//! thread of its own.  A connection carries a stream of JSON objects (see
//! [`codec`](super::codec)); each one is decoded, handed to the engine and
//! answered with one reply line before the next is read, so replies come
//! back in arrival order.
//!
//! A message that is valid JSON but not a valid message gets an error reply
//! and the connection stays open.  Malformed JSON cannot be resynchronized:
//! it gets an error reply without a `UID` and the connection is closed.

use super::codec;
use crate::action::message::Reply;
use crate::error::EngineError;
use crate::objects::connection::Connection;
use crate::objects::ObjectRef;
use crate::traits::{MessageSource, Request};
use log::{debug, error, info, warn};
use std::io::{BufReader, Write};
use std::os::unix::net::{UnixListener, UnixStream};
use std::path::{Path, PathBuf};
use std::sync::mpsc;

/// A [`MessageSource`] that listens on a Unix stream socket.
pub struct UnixSocketListener {
    path: PathBuf,
}

/// Errors produced by the Unix socket listener.
#[derive(Debug, thiserror::Error)]
pub enum ListenerError {
    #[error("io error: {0}")]
    Io(#[from] std::io::Error),
    #[error("json error: {0}")]
    Json(#[from] serde_json::Error),
}

impl UnixSocketListener {
    /// Create a new listener bound to `path`.
    ///
    /// The socket file is created when [`run`](MessageSource::run) is
    /// called.
    pub fn new(path: impl AsRef<Path>) -> Self {
        Self {
            path: path.as_ref().to_path_buf(),
        }
    }

    /// The filesystem path of the socket.
    pub fn path(&self) -> &Path {
        &self.path
    }
}

impl MessageSource for UnixSocketListener {
    type Error = ListenerError;

    /// Bind the socket and start accepting connections.
    ///
    /// This method **blocks** indefinitely.  Run it on a dedicated thread.
    fn run(&mut self, sink: mpsc::Sender<Request>) -> Result<(), Self::Error> {
        // Remove stale socket if present.
        let _ = std::fs::remove_file(&self.path);

        let listener = UnixListener::bind(&self.path)?;
        info!("listening on {}", self.path.display());

        let mut next_id = 0u64;
        for stream in listener.incoming() {
            match stream {
                Ok(stream) => {
                    next_id += 1;
                    let id = next_id;
                    let sink = sink.clone();
                    let spawned = std::thread::Builder::new()
                        .name(format!("waysome-conn-{}", id))
                        .spawn(move || {
                            debug!("client {} connected", id);
                            if let Err(e) = serve_connection(stream, id, sink) {
                                warn!("client {}: {}", id, e);
                            }
                            debug!("client {} disconnected", id);
                        });
                    if let Err(e) = spawned {
                        error!("failed to spawn connection thread: {}", e);
                    }
                }
                Err(e) => {
                    error!("accept error: {}", e);
                }
            }
        }
        Ok(())
    }
}

fn write_reply(writer: &mut UnixStream, reply: &Reply) -> Result<(), ListenerError> {
    writer.write_all(&codec::encode(reply)?)?;
    Ok(())
}

/// Read messages from `stream` until it closes, the JSON breaks or the
/// engine goes away.
fn serve_connection(
    stream: UnixStream,
    id: u64,
    sink: mpsc::Sender<Request>,
) -> Result<(), ListenerError> {
    let context = ObjectRef::new(Connection::new(id));
    let mut writer = stream.try_clone()?;
    let values =
        serde_json::Deserializer::from_reader(BufReader::new(stream)).into_iter::<serde_json::Value>();

    for value in values {
        let json = match value {
            Ok(json) => json,
            Err(e) if e.is_io() => return Err(e.into()),
            Err(e) if e.is_eof() => {
                debug!("client {}: stream ended inside a message", id);
                return Ok(());
            }
            Err(e) => {
                warn!("client {}: malformed JSON: {}", id, e);
                let reply = Reply::error(None, &EngineError::Protocol(e.to_string()));
                return write_reply(&mut writer, &reply);
            }
        };
        let reply = match codec::decode(json) {
            Ok(incoming) => {
                debug!("client {}: message {}", id, incoming.id());
                let (request, reply_rx) = Request::new(Some(context.clone()), incoming);
                if sink.send(request).is_err() {
                    info!("sink closed, dropping client {}", id);
                    return Ok(());
                }
                match reply_rx.recv() {
                    Ok(reply) => reply,
                    Err(_) => {
                        info!("engine stopped, dropping client {}", id);
                        return Ok(());
                    }
                }
            }
            Err(e) => {
                warn!("client {}: {}", id, e);
                e.into_reply()
            }
        };
        write_reply(&mut writer, &reply)?;
    }
    Ok(())
}

//  Tests

#[cfg(test)]
mod tests {
    use super::*;
    use crate::engine::Engine;
    use serde_json::json;
    use std::io::{BufRead, Read};
    use std::sync::atomic::{AtomicU32, Ordering};

    /// Monotonic counter to generate unique socket paths per test.
    static TEST_ID: AtomicU32 = AtomicU32::new(0);

    /// Helper: create a unique temporary socket path for each test.
    fn tmp_socket_path() -> PathBuf {
        let id = TEST_ID.fetch_add(1, Ordering::SeqCst);
        std::env::temp_dir().join(format!("waysome-test-{}-{}.sock", std::process::id(), id))
    }

    /// Start a listener and an engine on background threads.
    fn start(path: &Path) {
        let (tx, rx) = mpsc::channel();
        let listen_path = path.to_path_buf();
        std::thread::spawn(move || {
            let mut listener = UnixSocketListener::new(&listen_path);
            let _ = listener.run(tx);
        });
        std::thread::spawn(move || Engine::default().serve(rx));

        // Give the listener a moment to bind.
        std::thread::sleep(std::time::Duration::from_millis(150));
    }

    /// Reply lines until the server closes (or resets) the connection.
    fn read_replies(stream: UnixStream) -> Vec<serde_json::Value> {
        std::io::BufReader::new(stream)
            .lines()
            .map_while(Result::ok)
            .map(|line| serde_json::from_str(&line).unwrap())
            .collect()
    }

    #[test]
    fn round_trip_over_socket() {
        let path = tmp_socket_path();
        start(&path);

        let mut stream = UnixStream::connect(&path).expect("connect");
        let messages = [
            json!({"UID": 1, "TYPE": "transaction", "NAME": "t1", "FLAGS": ["EXEC", "REGISTER"],
                "EVENT": "combo-1",
                "CMDS": [{"push": [1, 2]}, {"push": [1, 3]}, {"add": []}]}),
            json!({"UID": 2, "TYPE": "event", "NAME": "combo-1"}),
            json!({"UID": 3, "TYPE": "transaction", "FLAGS": ["EXEC"], "CMDS": [{"nope": []}]}),
            json!({"UID": 4, "TYPE": "transaction", "FLAGS": ["EXEC"], "CMDS": [{"context": []}]}),
        ];
        for message in &messages {
            // Whitespace between objects is the only framing.
            write!(stream, "{} ", message).unwrap();
        }
        stream.shutdown(std::net::Shutdown::Write).unwrap();

        let replies = read_replies(stream);
        assert_eq!(replies.len(), 4);
        assert_eq!(replies[0], json!({"UID": 1, "VALUE": {"int": 5}}));
        assert_eq!(replies[1], json!({"UID": 2, "VALUE": null}));
        assert_eq!(replies[2]["UID"], json!(3));
        assert_eq!(replies[2]["ERROR"]["code"], json!(libc::ENOENT));
        assert_eq!(replies[3]["UID"], json!(4));
        assert!(replies[3]["VALUE"]["object"]["connection"].is_u64());

        let _ = std::fs::remove_file(&path);
    }

    #[test]
    fn malformed_json_closes_the_connection() {
        let path = tmp_socket_path();
        start(&path);

        let mut stream = UnixStream::connect(&path).expect("connect");
        writeln!(stream, r#"{{"UID": 1, "TYPE": "event", "NAME": "e"}}"#).unwrap();
        writeln!(stream, "not json at all").unwrap();
        writeln!(stream, r#"{{"UID": 2, "TYPE": "event", "NAME": "e"}}"#).unwrap();

        let replies = read_replies(stream.try_clone().unwrap());
        assert_eq!(replies.len(), 2);
        assert_eq!(replies[0], json!({"UID": 1, "VALUE": null}));
        assert_eq!(replies[1]["UID"], serde_json::Value::Null);
        assert_eq!(replies[1]["ERROR"]["code"], json!(libc::EPROTO));

        // The server side is gone.
        let mut rest = Vec::new();
        let _ = stream.read_to_end(&mut rest);
        assert!(rest.is_empty());

        let _ = std::fs::remove_file(&path);
    }

    #[test]
    fn connections_are_independent() {
        let path = tmp_socket_path();
        start(&path);

        let mut a = UnixStream::connect(&path).expect("connect a");
        let mut b = UnixStream::connect(&path).expect("connect b");
        writeln!(a, r#"{{"UID": 1, "TYPE": "transaction", "FLAGS": ["EXEC"], "CMDS": [{{"context": []}}]}}"#)
            .unwrap();
        writeln!(b, r#"{{"UID": 1, "TYPE": "transaction", "FLAGS": ["EXEC"], "CMDS": [{{"context": []}}]}}"#)
            .unwrap();
        a.shutdown(std::net::Shutdown::Write).unwrap();
        b.shutdown(std::net::Shutdown::Write).unwrap();

        let ra = read_replies(a);
        let rb = read_replies(b);
        let id = |r: &serde_json::Value| r["VALUE"]["object"]["connection"].as_u64().unwrap();
        assert_ne!(id(&ra[0]), id(&rb[0]));

        let _ = std::fs::remove_file(&path);
    }
}
