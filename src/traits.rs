//! Traits that decouple the engine from the transport delivering messages.
//!
//! The [`Engine`](crate::engine::Engine) only consumes [`Request`]s from a
//! channel.  Whatever produces them (the Unix-socket listener, a compositor
//! plugin, a test harness) implements [`MessageSource`].

use crate::action::message::Reply;
use crate::ipc::codec::Incoming;
use crate::objects::ObjectRef;
use std::sync::mpsc;

/// A decoded message together with the way back to its sender.
#[derive(Debug)]
pub struct Request {
    /// The object the message arrived through, handed to transactions as
    /// their context.
    pub context: Option<ObjectRef>,
    pub incoming: Incoming,
    /// Receives exactly one reply.
    pub reply: mpsc::Sender<Reply>,
}

impl Request {
    /// Build a request and the receiver its reply will arrive on.
    pub fn new(context: Option<ObjectRef>, incoming: Incoming) -> (Self, mpsc::Receiver<Reply>) {
        let (reply, rx) = mpsc::channel();
        (
            Self {
                context,
                incoming,
                reply,
            },
            rx,
        )
    }
}

/// A source of [`Request`]s.
///
/// # Contract
///
/// * [`run`](MessageSource::run) **blocks** until the source is exhausted
///   or an unrecoverable error occurs.
/// * Each decoded message is sent through `sink` exactly once.
/// * Implementations must be [`Send`] so they can run on a dedicated thread.
pub trait MessageSource: Send {
    /// The error type produced by this source.
    type Error: std::error::Error + Send + 'static;

    /// Start listening and forward every incoming message into `sink`.
    fn run(&mut self, sink: mpsc::Sender<Request>) -> Result<(), Self::Error>;
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::action::message::{EventMessage, Message};

    #[derive(Debug, thiserror::Error)]
    #[error("mock error")]
    struct MockError;

    /// A test double that emits a fixed sequence of messages.
    struct MockSource {
        messages: Vec<Incoming>,
    }

    impl MessageSource for MockSource {
        type Error = MockError;

        fn run(&mut self, sink: mpsc::Sender<Request>) -> Result<(), MockError> {
            for incoming in self.messages.drain(..) {
                let (request, _rx) = Request::new(None, incoming);
                sink.send(request).map_err(|_| MockError)?;
            }
            Ok(())
        }
    }

    fn event(id: u64, name: &str) -> Incoming {
        Incoming::Message(Message::Event(EventMessage {
            id,
            name: name.into(),
        }))
    }

    #[test]
    fn mock_source_emits_in_order() {
        let mut src = MockSource {
            messages: vec![event(1, "a"), event(2, "b")],
        };
        let (tx, rx) = mpsc::channel();
        src.run(tx).unwrap();
        let ids: Vec<u64> = rx.try_iter().map(|r| r.incoming.id()).collect();
        assert_eq!(ids, vec![1, 2]);
    }

    #[test]
    fn closed_sink_is_an_error() {
        let mut src = MockSource {
            messages: vec![event(1, "a")],
        };
        let (tx, rx) = mpsc::channel();
        drop(rx);
        assert!(src.run(tx).is_err());
    }

    #[test]
    fn reply_reaches_the_requester() {
        let (request, rx) = Request::new(None, event(4, "e"));
        request.reply.send(Reply::value(4, None)).unwrap();
        assert_eq!(rx.recv().unwrap(), Reply::value(4, None));
    }
}
