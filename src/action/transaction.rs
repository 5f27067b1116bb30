//! Statements and transactions: the parsed form of a client's program.

use crate::command::Command;
use crate::value::Value;
use bitflags::bitflags;

/// How a statement argument is obtained.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Argument {
    /// A literal value owned by the statement.
    Direct(Value),
    /// A stack position resolved when the statement runs.  Non-negative
    /// positions count from the bottom, negative ones from the top.
    Indirect(i64),
}

/// One command invocation.
#[derive(Debug, Clone)]
pub struct Statement {
    pub command: &'static Command,
    pub args: Vec<Argument>,
}

impl Statement {
    pub fn new(command: &'static Command, args: Vec<Argument>) -> Self {
        Self { command, args }
    }
}

bitflags! {
    /// What the action manager should do with a transaction.
    #[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
    pub struct TransactionFlags: u8 {
        /// Run it now.
        const EXEC = 1 << 0;
        /// Keep it in the registry under its name.
        const REGISTER = 1 << 1;
    }
}

/// A named, ordered list of statements.
#[derive(Debug, Clone)]
pub struct Transaction {
    /// Message id, echoed in the reply.
    pub id: u64,
    pub name: String,
    pub flags: TransactionFlags,
    /// The client connection the transaction arrived on, if any.
    pub connection_id: Option<u64>,
    /// Event to bind the transaction to when it is registered.
    pub event: Option<String>,
    pub statements: Vec<Statement>,
}

impl Transaction {
    pub fn new(id: u64, name: impl Into<String>, flags: TransactionFlags) -> Self {
        Self {
            id,
            name: name.into(),
            flags,
            connection_id: None,
            event: None,
            statements: Vec::new(),
        }
    }

    /// Append a statement (builder style).
    pub fn with_statement(mut self, command: &'static Command, args: Vec<Argument>) -> Self {
        self.statements.push(Statement::new(command, args));
        self
    }

    /// Bind to `event` on registration (builder style).
    pub fn bound_to(mut self, event: impl Into<String>) -> Self {
        self.event = Some(event.into());
        self
    }

    pub fn is_exec(&self) -> bool {
        self.flags.contains(TransactionFlags::EXEC)
    }

    pub fn is_register(&self) -> bool {
        self.flags.contains(TransactionFlags::REGISTER)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::command::table;

    #[test]
    fn flags_combine() {
        let t = Transaction::new(1, "t", TransactionFlags::EXEC | TransactionFlags::REGISTER);
        assert!(t.is_exec());
        assert!(t.is_register());
        let t = Transaction::new(2, "t", TransactionFlags::REGISTER);
        assert!(!t.is_exec());
    }

    #[test]
    fn builder_appends_in_order() {
        let push = table::lookup("push").unwrap();
        let add = table::lookup("add").unwrap();
        let t = Transaction::new(1, "t", TransactionFlags::EXEC)
            .with_statement(push, vec![Argument::Direct(Value::Int(1))])
            .with_statement(add, vec![])
            .bound_to("combo");
        let names: Vec<_> = t.statements.iter().map(|s| s.command.name).collect();
        assert_eq!(names, vec!["push", "add"]);
        assert_eq!(t.event.as_deref(), Some("combo"));
        assert!(matches!(t.statements[0].args[0], Argument::Direct(_)));
    }
}
