//! IPC: the Unix-socket listener and the JSON wire codec.
//!
//! External clients (plugins, scripts, `waysome-msg`) connect to the socket
//! and send JSON messages; each one is answered with one JSON reply line.

pub mod codec;
pub mod listener;
