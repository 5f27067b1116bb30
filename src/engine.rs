//! The orchestrator that ties the action manager and the hotkey matcher
//! together.
//!
//! [`Engine`] owns every piece of mutable state: the transaction registry,
//! the event bindings, the shared execution stack and the hotkey trie.  It
//! reacts to decoded [`Incoming`] messages and produces one [`Reply`] each.
//!
//! # Typical usage
//!
//! ```ignore
//! let mut engine = Engine::from_config(&config)?;
//! let (tx, rx) = mpsc::channel();
//! spawn_listener(tx);
//! engine.serve(rx);
//! ```

use crate::action::message::{EventMessage, Message, Reply};
use crate::action::ActionManager;
use crate::config::Config;
use crate::error::EngineError;
use crate::input::Hotkeys;
use crate::ipc::codec::Incoming;
use crate::objects::connection::Connection;
use crate::objects::ObjectRef;
use crate::traits::Request;
use log::{debug, info};
use std::sync::mpsc;

pub struct Engine {
    actions: ActionManager,
    hotkeys: Hotkeys,
}

impl Engine {
    pub fn new(actions: ActionManager, hotkeys: Hotkeys) -> Self {
        Self { actions, hotkeys }
    }

    /// Build an engine with the stack size and hotkeys of `config`.
    pub fn from_config(config: &Config) -> Result<Self, EngineError> {
        let mut hotkeys = Hotkeys::new();
        for hk in &config.hotkeys {
            hotkeys.add(&hk.name, hk.codes.clone())?;
        }
        info!("{} hotkey(s) configured", config.hotkeys.len());
        Ok(Self::new(
            ActionManager::new(config.stack.initial_capacity),
            hotkeys,
        ))
    }

    pub fn actions(&self) -> &ActionManager {
        &self.actions
    }

    pub fn actions_mut(&mut self) -> &mut ActionManager {
        &mut self.actions
    }

    pub fn hotkeys_mut(&mut self) -> &mut Hotkeys {
        &mut self.hotkeys
    }

    /// `true` once a transaction ran `exit`.
    pub fn exit_requested(&self) -> bool {
        self.actions.exit_requested()
    }

    /// Process a single message.
    ///
    /// Key events are fed to the hotkey matcher; every combo they complete
    /// fires as an event carrying the key message's id.  The key message
    /// itself always gets an empty reply.
    pub fn handle(&mut self, incoming: Incoming, context: Option<ObjectRef>) -> Reply {
        match incoming {
            Incoming::Message(mut message) => {
                debug!("message {}", message.id());
                if let Message::Transaction(t) = &mut message {
                    t.connection_id = context
                        .as_ref()
                        .and_then(|c| c.with(|c: &Connection| c.id()));
                }
                self.actions.process(message, context)
            }
            Incoming::Key { id, event } => {
                for name in self.hotkeys.eval(event) {
                    info!("hotkey {}", name);
                    let event = Message::Event(EventMessage { id, name });
                    self.actions.process(event, context.clone());
                }
                Reply::value(id, None)
            }
        }
    }

    /// Answer requests until every sender is gone or a transaction asks to
    /// exit.
    pub fn serve(&mut self, requests: mpsc::Receiver<Request>) {
        info!("waysome running");
        for request in requests {
            let reply = self.handle(request.incoming, request.context);
            if request.reply.send(reply).is_err() {
                debug!("requester went away before its reply");
            }
            if self.exit_requested() {
                info!("exit requested");
                return;
            }
        }
        info!("all message sources closed");
    }
}

impl Default for Engine {
    fn default() -> Self {
        Self::new(ActionManager::default(), Hotkeys::new())
    }
}
