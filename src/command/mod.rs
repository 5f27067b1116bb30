//! Commands a transaction can invoke.
//!
//! Every command is either **regular** or **special**:
//!
//! * A regular command only sees a run of stack values.  It may rewrite them
//!   in place and returns how many leading slots it keeps; the processor pops
//!   the rest.  Arithmetic, comparison, `log` and `exec` are regular.
//! * A special command receives the [`Processor`] and the statement's raw
//!   [`Argument`]s, so it can address the stack by position (`store`), change
//!   its shape (`push`, `pop`) or alter control flow (`jump`).
//!
//! All commands live in one statically sorted [`table`].

pub mod builtins;
pub mod special;
pub mod table;

use crate::action::processor::Processor;
use crate::action::transaction::Argument;
use crate::error::EngineError;
use crate::value::Value;
use std::fmt;

/// Handler of a regular command.
pub type RegularFn = fn(&mut [Value]) -> Result<usize, EngineError>;

/// Handler of a special command.
pub type SpecialFn = fn(&mut Processor<'_>, &[Argument]) -> Result<(), EngineError>;

/// Which calling convention a command uses.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CommandKind {
    Regular,
    Special,
}

#[derive(Clone, Copy)]
pub enum Handler {
    Regular(RegularFn),
    Special(SpecialFn),
}

/// A named command.  Instances only exist in the static [`table`].
pub struct Command {
    pub name: &'static str,
    pub handler: Handler,
}

impl Command {
    pub const fn regular(name: &'static str, f: RegularFn) -> Self {
        Self {
            name,
            handler: Handler::Regular(f),
        }
    }

    pub const fn special(name: &'static str, f: SpecialFn) -> Self {
        Self {
            name,
            handler: Handler::Special(f),
        }
    }

    pub fn kind(&self) -> CommandKind {
        match self.handler {
            Handler::Regular(_) => CommandKind::Regular,
            Handler::Special(_) => CommandKind::Special,
        }
    }
}

impl fmt::Debug for Command {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Command")
            .field("name", &self.name)
            .field("kind", &self.kind())
            .finish()
    }
}

/// Commands are unique by name.
impl PartialEq for Command {
    fn eq(&self, other: &Self) -> bool {
        self.name == other.name
    }
}

impl Eq for Command {}
