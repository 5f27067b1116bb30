//! Hotkey recognition.
//!
//! Key codes arrive one transition at a time (see [`KeyEvent`]).  The
//! [`Hotkeys`] matcher follows them through a [`HotkeyDag`] and reports the
//! names of completed combos, which the engine then fires as events.

pub mod hotkey_dag;
pub mod hotkeys;
pub mod table;

pub use hotkey_dag::{HotkeyDag, HotkeyDagNode, HotkeyEvent};
pub use hotkeys::{Hotkeys, KeyEvent, KeyState};
