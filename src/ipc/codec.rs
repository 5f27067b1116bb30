//! JSON wire format.
//!
//! # Inbound
//!
//! ```json
//! {"UID":1,"TYPE":"transaction","NAME":"t1","FLAGS":["EXEC","REGISTER"],
//!  "EVENT":"combo-1","CMDS":[{"push":[1,2]},{"add":[]},{"store":[{"pos":-1},{"pos":0}]}]}
//! {"UID":2,"TYPE":"event","NAME":"combo-1"}
//! {"UID":3,"TYPE":"input","CODE":30,"STATE":"down"}
//! ```
//!
//! Each `CMDS` entry maps one command name to its argument list.  Arguments
//! are literals (`null`, booleans, integers, strings), stack positions
//! (`{"pos":-1}`), named values (`{"name":"k","value":1}`) or arrays of
//! literals, which become sets.
//!
//! # Outbound
//!
//! One reply per message, serialized by [`Reply`]'s `Serialize` impl and
//! terminated by `\n`.

use crate::action::message::{EventMessage, Message, Reply};
use crate::action::transaction::{Argument, Statement, Transaction, TransactionFlags};
use crate::command::table;
use crate::error::EngineError;
use crate::input::{KeyEvent, KeyState};
use crate::value::Value;
use serde::Deserialize;
use serde_json::Value as Json;

/// A decoded inbound message.
#[derive(Debug, Clone)]
pub enum Incoming {
    /// Goes to the action manager.
    Message(Message),
    /// Goes to the hotkey matcher.
    Key { id: u64, event: KeyEvent },
}

impl Incoming {
    pub fn id(&self) -> u64 {
        match self {
            Incoming::Message(m) => m.id(),
            Incoming::Key { id, .. } => *id,
        }
    }
}

/// A message that could not be decoded.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
#[error("message {id:?}: {error}")]
pub struct DecodeError {
    /// The message's `UID`, if it could be read.
    pub id: Option<u64>,
    pub error: EngineError,
}

impl DecodeError {
    pub fn into_reply(self) -> Reply {
        Reply::error(self.id, &self.error)
    }
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "lowercase")]
enum Kind {
    Transaction,
    Event,
    Input,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "UPPERCASE", deny_unknown_fields)]
struct Envelope {
    uid: u64,
    #[serde(rename = "TYPE")]
    kind: Kind,
    name: Option<String>,
    #[serde(default)]
    flags: Vec<String>,
    event: Option<String>,
    #[serde(default)]
    cmds: Vec<serde_json::Map<String, Json>>,
    code: Option<u16>,
    state: Option<KeyState>,
}

fn protocol(msg: impl Into<String>) -> EngineError {
    EngineError::Protocol(msg.into())
}

/// Decode one inbound JSON value.
pub fn decode(json: Json) -> Result<Incoming, DecodeError> {
    let id = json.get("UID").and_then(Json::as_u64);
    let envelope = Envelope::deserialize(json).map_err(|e| DecodeError {
        id,
        error: protocol(e.to_string()),
    })?;
    decode_envelope(envelope).map_err(|error| DecodeError { id, error })
}

fn decode_envelope(env: Envelope) -> Result<Incoming, EngineError> {
    match env.kind {
        Kind::Transaction => {
            let flags = decode_flags(&env.flags)?;
            let name = match env.name {
                Some(name) => name,
                None if flags.contains(TransactionFlags::REGISTER) => {
                    return Err(protocol("REGISTER requires a NAME"))
                }
                None => String::new(),
            };
            let statements = env
                .cmds
                .iter()
                .map(decode_statement)
                .collect::<Result<Vec<_>, _>>()?;
            let mut t = Transaction::new(env.uid, name, flags);
            t.event = env.event;
            t.statements = statements;
            Ok(Incoming::Message(Message::Transaction(t)))
        }
        Kind::Event => {
            let name = env.name.ok_or_else(|| protocol("event without NAME"))?;
            Ok(Incoming::Message(Message::Event(EventMessage {
                id: env.uid,
                name,
            })))
        }
        Kind::Input => {
            let code = env.code.ok_or_else(|| protocol("input without CODE"))?;
            let state = env.state.ok_or_else(|| protocol("input without STATE"))?;
            Ok(Incoming::Key {
                id: env.uid,
                event: KeyEvent { code, state },
            })
        }
    }
}

fn decode_flags(flags: &[String]) -> Result<TransactionFlags, EngineError> {
    flags.iter().try_fold(TransactionFlags::empty(), |acc, flag| {
        let flag = TransactionFlags::from_name(flag)
            .ok_or_else(|| protocol(format!("unknown flag {:?}", flag)))?;
        Ok(acc | flag)
    })
}

fn decode_statement(entry: &serde_json::Map<String, Json>) -> Result<Statement, EngineError> {
    let mut entries = entry.iter();
    let (Some((name, args)), None) = (entries.next(), entries.next()) else {
        return Err(protocol("a command entry must have exactly one key"));
    };
    let command = table::find(name)?;
    let args = match args {
        Json::Array(args) => args
            .iter()
            .map(decode_argument)
            .collect::<Result<Vec<_>, _>>()?,
        Json::Null => Vec::new(),
        other => {
            return Err(protocol(format!(
                "{}: arguments must be an array, got {}",
                name, other
            )))
        }
    };
    Ok(Statement::new(command, args))
}

fn decode_argument(json: &Json) -> Result<Argument, EngineError> {
    match json {
        Json::Object(map) if map.len() == 1 && map.contains_key("pos") => {
            let pos = map["pos"]
                .as_i64()
                .ok_or_else(|| protocol(format!("bad stack position {}", map["pos"])))?;
            Ok(Argument::Indirect(pos))
        }
        Json::Object(map) if map.len() == 2 && map.contains_key("name") => {
            let name = map["name"]
                .as_str()
                .ok_or_else(|| protocol("a named value needs a string name"))?;
            let value = map
                .get("value")
                .ok_or_else(|| protocol("a named value needs a value"))?;
            Ok(Argument::Direct(Value::named(name, decode_literal(value)?)))
        }
        Json::Array(items) => {
            let items = items.iter().map(decode_literal).collect::<Result<Vec<_>, _>>()?;
            Ok(Argument::Direct(Value::set(items)))
        }
        other => decode_literal(other).map(Argument::Direct),
    }
}

fn decode_literal(json: &Json) -> Result<Value, EngineError> {
    match json {
        Json::Null => Ok(Value::Nil),
        Json::Bool(b) => Ok(Value::Bool(*b)),
        Json::Number(n) => n
            .as_i64()
            .map(Value::Int)
            .ok_or_else(|| protocol(format!("{} is not a 64-bit integer", n))),
        Json::String(s) => Ok(Value::String(s.clone())),
        other => Err(protocol(format!("unsupported literal {}", other))),
    }
}

/// Serialize `reply` as one line.
pub fn encode(reply: &Reply) -> Result<Vec<u8>, serde_json::Error> {
    let mut line = serde_json::to_vec(reply)?;
    line.push(b'\n');
    Ok(line)
}
