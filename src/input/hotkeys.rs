//! Turns raw key events into combo event names.

use super::hotkey_dag::{HotkeyDag, HotkeyEvent};
use crate::error::EngineError;
use log::{debug, trace};
use serde::Deserialize;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum KeyState {
    Down,
    Up,
    Repeat,
}

/// One key transition as reported by the input device.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct KeyEvent {
    pub code: u16,
    pub state: KeyState,
}

impl KeyEvent {
    pub fn down(code: u16) -> Self {
        Self {
            code,
            state: KeyState::Down,
        }
    }

    pub fn up(code: u16) -> Self {
        Self {
            code,
            state: KeyState::Up,
        }
    }
}

/// The combo matcher.
///
/// Key-downs walk a cursor through the trie; a key that leads nowhere
/// abandons the pending sequence and puts the cursor back at the root.
/// Once every pressed key is released, the combo ending at the cursor (if
/// any) is emitted and the cursor returns to the root.
#[derive(Debug, Default)]
pub struct Hotkeys {
    dag: HotkeyDag,
    /// Codes from the root to the cursor.
    cursor: Vec<u16>,
    pressed: usize,
}

impl Hotkeys {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn dag(&self) -> &HotkeyDag {
        &self.dag
    }

    /// Register the combo `codes` under `name`.
    pub fn add(&mut self, name: &str, codes: Vec<u16>) -> Result<(), EngineError> {
        let event = HotkeyEvent::new(name, codes)?;
        debug!("hotkey {}", event);
        self.dag.insert(event)
    }

    pub fn remove(&mut self, codes: &[u16]) -> Result<(), EngineError> {
        let event = self.dag.remove(codes)?;
        debug!("removed hotkey {}", event);
        self.cursor.clear();
        Ok(())
    }

    /// Feed one key event.  Returns the names of the combos it completed.
    pub fn eval(&mut self, key: KeyEvent) -> Vec<String> {
        match key.state {
            KeyState::Down => {
                self.pressed += 1;
                self.cursor.push(key.code);
                if self.dag.walk(&self.cursor).is_none() {
                    trace!("no combo continues with {:?}", self.cursor);
                    self.cursor.clear();
                }
                Vec::new()
            }
            KeyState::Up => {
                self.pressed = self.pressed.saturating_sub(1);
                if self.pressed > 0 {
                    return Vec::new();
                }
                let fired = self
                    .dag
                    .walk(&self.cursor)
                    .and_then(|node| node.event())
                    .map(|event| event.name().to_string());
                self.cursor.clear();
                fired.into_iter().collect()
            }
            KeyState::Repeat => Vec::new(),
        }
    }
}
