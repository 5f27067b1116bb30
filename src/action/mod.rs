//! Transaction registry, event bindings and execution.
//!
//! [`ActionManager`] is the single entry point for messages arriving from
//! clients or from the hotkey matcher.  It owns the shared
//! [`ExecutionStack`], the registry of named transactions and the map from
//! event names to the transactions bound to them.
//!
//! # Typical usage
//!
//! ```ignore
//! let mut actions = ActionManager::new(16);
//! let reply = actions.process(Message::Transaction(t), None);
//! ```

pub mod message;
pub mod processor;
pub mod stack;
pub mod transaction;

use crate::error::EngineError;
use crate::objects::ObjectRef;
use crate::value::Value;
use log::{debug, info, warn};
use message::{EventMessage, Message, Reply};
use processor::{Halt, Processor};
use stack::ExecutionStack;
use std::collections::HashMap;
use std::sync::Arc;
use transaction::{Statement, Transaction};

/// Run `statements` on a fresh frame of `stack`.
///
/// Returns the reply value and whether the transaction asked to exit.  A
/// jump out of the statement list counts as a normal completion.
pub fn run_transaction(
    stack: &mut ExecutionStack,
    name: &str,
    statements: &[Statement],
    context: Option<ObjectRef>,
) -> Result<(Option<Value>, bool), EngineError> {
    let mut processor = Processor::new(stack, statements, context);
    let result = processor.run();
    let exit = processor.exit_requested();
    match result {
        Ok(Halt::Ok(value)) => Ok((value, exit)),
        Ok(Halt::JumpOut { spill, value }) => {
            debug!("{}: jumped out by {}", name, spill);
            Ok((value, exit))
        }
        Err(e) => {
            warn!("{}: {}", name, e);
            Err(e.source)
        }
    }
}

/// Owns registered transactions and their event bindings.
#[derive(Debug)]
pub struct ActionManager {
    stack: ExecutionStack,
    /// Shared so firing an event does not copy the statements.
    transactions: HashMap<String, Arc<Transaction>>,
    /// Event name to the names of the transactions it fires, in bind order.
    bindings: HashMap<String, Vec<String>>,
    exit_requested: bool,
}

impl ActionManager {
    pub fn new(initial_stack_capacity: usize) -> Self {
        Self {
            stack: ExecutionStack::new(initial_stack_capacity),
            transactions: HashMap::new(),
            bindings: HashMap::new(),
            exit_requested: false,
        }
    }

    pub fn stack(&self) -> &ExecutionStack {
        &self.stack
    }

    /// `true` once any executed transaction ran `exit`.
    pub fn exit_requested(&self) -> bool {
        self.exit_requested
    }

    pub fn transaction(&self, name: &str) -> Option<&Transaction> {
        self.transactions.get(name).map(Arc::as_ref)
    }

    /// Names of the transactions bound to `event`.
    pub fn bound(&self, event: &str) -> &[String] {
        self.bindings.get(event).map(Vec::as_slice).unwrap_or(&[])
    }

    /// Handle one message and produce its reply.
    ///
    /// `context` is the object the message arrived through (usually the
    /// client connection); transactions reach it with `context`.
    pub fn process(&mut self, message: Message, context: Option<ObjectRef>) -> Reply {
        let id = message.id();
        let result = match message {
            Message::Transaction(t) => self.process_transaction(t, context),
            Message::Event(e) => {
                self.fire(&e, context);
                Ok(None)
            }
        };
        match result {
            Ok(value) => Reply::value(id, value),
            Err(e) => Reply::error(Some(id), &e),
        }
    }

    fn process_transaction(
        &mut self,
        t: Transaction,
        context: Option<ObjectRef>,
    ) -> Result<Option<Value>, EngineError> {
        if t.flags.is_empty() {
            return Err(EngineError::invalid(format!(
                "transaction {:?} has neither EXEC nor REGISTER",
                t.name
            )));
        }
        let mut value = None;
        if t.is_exec() {
            debug!("exec transaction {:?} ({} statements)", t.name, t.statements.len());
            value = self.execute(&t.name, &t.statements, context)?;
        }
        if t.is_register() {
            let event = t.event.clone();
            let name = t.name.clone();
            debug!("register {:?} from connection {:?}", name, t.connection_id);
            self.add_transaction(t);
            if let Some(event) = event {
                self.register(&event, &name)?;
            }
        }
        Ok(value)
    }

    fn execute(
        &mut self,
        name: &str,
        statements: &[Statement],
        context: Option<ObjectRef>,
    ) -> Result<Option<Value>, EngineError> {
        let (value, exit) = run_transaction(&mut self.stack, name, statements, context)?;
        if exit {
            info!("transaction {:?} requested exit", name);
            self.exit_requested = true;
        }
        Ok(value)
    }

    /// Store `t` under its name, replacing any previous entry.
    pub fn add_transaction(&mut self, t: Transaction) {
        if self.transactions.insert(t.name.clone(), Arc::new(t)).is_some() {
            debug!("replaced a registered transaction");
        }
    }

    /// Run every transaction bound to the event.  Replies are only logged.
    fn fire(&mut self, event: &EventMessage, context: Option<ObjectRef>) {
        let names = self.bound(&event.name).to_vec();
        if names.is_empty() {
            debug!("event {:?} has no bindings", event.name);
        }
        for name in names {
            let Some(t) = self.transactions.get(&name).map(Arc::clone) else {
                debug!("event {:?}: transaction {:?} is not registered", event.name, name);
                continue;
            };
            match self.execute(&name, &t.statements, context.clone()) {
                Ok(value) => debug!("event {:?} ran {:?}: {:?}", event.name, name, value),
                Err(e) => warn!("event {:?} ran {:?}: {}", event.name, name, e),
            }
        }
    }

    /// Bind `event` to the registered transaction `transaction`.
    pub fn register(&mut self, event: &str, transaction: &str) -> Result<(), EngineError> {
        if !self.transactions.contains_key(transaction) {
            return Err(EngineError::not_found(format!("transaction {:?}", transaction)));
        }
        let bound = self.bindings.entry(event.to_string()).or_default();
        if !bound.iter().any(|n| n == transaction) {
            info!("bind {:?} to {:?}", event, transaction);
            bound.push(transaction.to_string());
        }
        Ok(())
    }

    /// Remove every binding of `event`.
    pub fn unregister_event(&mut self, event: &str) -> Result<(), EngineError> {
        self.bindings
            .remove(event)
            .map(|_| ())
            .ok_or_else(|| EngineError::not_found(format!("event {:?}", event)))
    }

    /// Remove a transaction from the registry.  Bindings naming it are kept
    /// and fire again once a transaction of that name is registered.
    pub fn unregister_transaction(&mut self, name: &str) -> Result<(), EngineError> {
        self.transactions
            .remove(name)
            .map(|_| ())
            .ok_or_else(|| EngineError::not_found(format!("transaction {:?}", name)))
    }
}

impl Default for ActionManager {
    fn default() -> Self {
        Self::new(16)
    }
}
