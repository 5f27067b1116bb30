//! The static command registry.
//!
//! [`COMMANDS`] is sorted by name at compile time; [`lookup`] binary-searches
//! it and finishes short windows with a linear scan.  The table is read-only,
//! so no locking is needed.

use super::{builtins, special, Command};
use crate::error::EngineError;

/// Windows at most this wide are scanned linearly.
const LINEAR_SCAN_WIDTH: usize = 4;

/// Every command, sorted by name.
pub static COMMANDS: [Command; 25] = [
    Command::regular("add", builtins::add),
    Command::regular("and", builtins::and),
    Command::regular("call", builtins::call),
    Command::regular("concat", builtins::concat),
    Command::special("context", special::context),
    Command::regular("div", builtins::div),
    Command::regular("eq", builtins::eq),
    Command::regular("exec", builtins::exec),
    Command::special("exit", special::exit),
    Command::regular("gt", builtins::gt),
    Command::regular("hash", builtins::hash),
    Command::special("jump", special::jump),
    Command::special("jump_if", special::jump_if),
    Command::regular("log", builtins::log),
    Command::regular("lt", builtins::lt),
    Command::regular("mod", builtins::modulo),
    Command::regular("mul", builtins::mul),
    Command::regular("named", builtins::named),
    Command::regular("not", builtins::not),
    Command::regular("or", builtins::or),
    Command::special("pop", special::pop),
    Command::special("push", special::push),
    Command::regular("set", builtins::set),
    Command::special("store", special::store),
    Command::regular("sub", builtins::sub),
];

/// Find the command called `name`.
pub fn lookup(name: &str) -> Option<&'static Command> {
    let (mut lo, mut hi) = (0, COMMANDS.len());
    while hi - lo > LINEAR_SCAN_WIDTH {
        let mid = lo + (hi - lo) / 2;
        let cmd = &COMMANDS[mid];
        match cmd.name.cmp(name) {
            std::cmp::Ordering::Equal => return Some(cmd),
            std::cmp::Ordering::Less => lo = mid + 1,
            std::cmp::Ordering::Greater => hi = mid,
        }
    }
    COMMANDS[lo..hi].iter().find(|c| c.name == name)
}

/// Like [`lookup`], but a missing command is a [`EngineError::NotFound`].
pub fn find(name: &str) -> Result<&'static Command, EngineError> {
    lookup(name).ok_or_else(|| EngineError::not_found(format!("command {:?}", name)))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::command::CommandKind;

    #[test]
    fn table_is_sorted_and_unique() {
        for pair in COMMANDS.windows(2) {
            assert!(
                pair[0].name < pair[1].name,
                "{} must sort before {}",
                pair[0].name,
                pair[1].name
            );
        }
    }

    #[test]
    fn every_command_is_found() {
        for cmd in COMMANDS.iter() {
            let found = lookup(cmd.name).expect(cmd.name);
            assert!(std::ptr::eq(found, cmd));
        }
    }

    #[test]
    fn unknown_names_are_not_found() {
        for name in ["", "a", "zzz", "ad", "addd", "jump_", "pushh", "Add"] {
            assert!(lookup(name).is_none(), "{:?} should not exist", name);
            assert!(matches!(find(name), Err(EngineError::NotFound(_))));
        }
    }

    #[test]
    fn kinds() {
        assert_eq!(lookup("add").unwrap().kind(), CommandKind::Regular);
        assert_eq!(lookup("store").unwrap().kind(), CommandKind::Special);
        assert_eq!(lookup("jump").unwrap().kind(), CommandKind::Special);
    }
}
