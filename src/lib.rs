//! **waysome**: a window manager whose control surface is a programmable
//! transaction engine.
//!
//! Clients send *transactions*: short programs of stack-machine commands
//! that run against a shared execution stack.  A transaction can run once,
//! or be registered by name and bound to an *event* that fires it later.
//! Events come from clients directly or from key combos matched by the
//! hotkey trie.
//!
//! # Architecture
//!
//! * [`value`] and [`objects`]: the tagged values commands operate on and
//!   the reference-counted objects they can point to.
//! * [`command`]: the static, sorted command table (`push`, `jump`, `add`,
//!   `call`, ...).
//! * [`action`]: the execution stack, the per-transaction processor and the
//!   action manager that registers transactions and binds events.
//! * [`input`]: the sparse radix table and the hotkey trie built on it.
//! * [`ipc`]: the JSON codec and the Unix-socket listener.
//! * [`engine`]: the single owner of all mutable state; consumes
//!   [`traits::Request`]s from any [`traits::MessageSource`].

pub mod action;
pub mod command;
pub mod config;
pub mod engine;
pub mod error;
pub mod input;
pub mod ipc;
pub mod objects;
pub mod traits;
pub mod value;
