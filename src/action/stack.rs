//! The execution stack shared by all processors.
//!
//! Slots `[0, top)` hold live values.  `frame` marks the lowest slot the
//! current processor may pop; frames nest, so a processor started on top of
//! another can never disturb its caller's values.
//!
//! Capacity grows by doubling and shrinks by halving, never below the
//! capacity the stack was created with.

use crate::error::EngineError;
use crate::value::Value;
use log::trace;

/// Smallest capacity a stack is ever shrunk to, regardless of configuration.
const MIN_CAPACITY: usize = 4;

/// A growable array of [`Value`]s with frame save/restore.
#[derive(Debug)]
pub struct ExecutionStack {
    slots: Vec<Value>,
    frame: usize,
    min_capacity: usize,
}

impl ExecutionStack {
    /// Create an empty stack with room for `initial_capacity` values.
    pub fn new(initial_capacity: usize) -> Self {
        let min_capacity = initial_capacity.max(MIN_CAPACITY);
        Self {
            slots: Vec::with_capacity(min_capacity),
            frame: 0,
            min_capacity,
        }
    }

    /// Number of live slots.
    pub fn top(&self) -> usize {
        self.slots.len()
    }

    /// Lowest slot of the current frame.
    pub fn frame(&self) -> usize {
        self.frame
    }

    pub fn capacity(&self) -> usize {
        self.slots.capacity()
    }

    /// Slots above the frame.
    pub fn frame_len(&self) -> usize {
        self.slots.len() - self.frame
    }

    /// Push `n` `Nil` slots and return them for the caller to fill.
    pub fn push(&mut self, n: usize) -> Result<&mut [Value], EngineError> {
        let start = self.slots.len();
        let needed = start
            .checked_add(n)
            .ok_or(EngineError::OutOfMemory)?;
        if needed > self.slots.capacity() {
            let mut capacity = self.slots.capacity().max(self.min_capacity);
            while capacity < needed {
                capacity = capacity.checked_mul(2).ok_or(EngineError::OutOfMemory)?;
            }
            trace!("stack grows to {} slots", capacity);
            self.slots.try_reserve_exact(capacity - start)?;
        }
        self.slots.resize(needed, Value::Nil);
        Ok(&mut self.slots[start..])
    }

    /// Push each of `values` in order.
    pub fn push_values(&mut self, values: Vec<Value>) -> Result<(), EngineError> {
        let slots = self.push(values.len())?;
        for (slot, value) in slots.iter_mut().zip(values) {
            *slot = value;
        }
        Ok(())
    }

    /// Pop `n` slots, topmost first.
    ///
    /// Fails if that would reach below the current frame.
    pub fn pop(&mut self, n: usize) -> Result<(), EngineError> {
        if n > self.frame_len() {
            return Err(EngineError::invalid(format!(
                "cannot pop {} slots, only {} above the frame",
                n,
                self.frame_len()
            )));
        }
        for _ in 0..n {
            drop(self.slots.pop());
        }
        self.shrink();
        Ok(())
    }

    /// Halve the capacity while the stack uses at most a quarter of it.
    fn shrink(&mut self) {
        let mut capacity = self.slots.capacity();
        while capacity / 2 >= self.min_capacity && self.slots.len() <= capacity / 4 {
            capacity /= 2;
        }
        if capacity < self.slots.capacity() {
            trace!("stack shrinks to {} slots", capacity);
            self.slots.shrink_to(capacity);
        }
    }

    /// Mutable view of the slots from `start` to the top.
    pub fn slots_from_mut(&mut self, start: usize) -> Result<&mut [Value], EngineError> {
        self.slots
            .get_mut(start..)
            .ok_or_else(|| EngineError::invalid(format!("slot {} is above the top", start)))
    }

    /// Resolve a signed position to an absolute slot index.
    ///
    /// Non-negative positions count from the bottom; negative positions
    /// count from the top (`-1` is the topmost slot).
    pub fn index_of(&self, pos: i64) -> Result<usize, EngineError> {
        let top = self.slots.len();
        let index = if pos >= 0 {
            usize::try_from(pos).ok().filter(|&i| i < top)
        } else {
            usize::try_from(pos.unsigned_abs())
                .ok()
                .and_then(|back| top.checked_sub(back))
        };
        index.ok_or_else(|| {
            EngineError::invalid(format!("position {} outside stack of {}", pos, top))
        })
    }

    pub fn value_at(&self, pos: i64) -> Result<&Value, EngineError> {
        let index = self.index_of(pos)?;
        Ok(&self.slots[index])
    }

    pub fn value_at_mut(&mut self, pos: i64) -> Result<&mut Value, EngineError> {
        let index = self.index_of(pos)?;
        Ok(&mut self.slots[index])
    }

    /// Topmost value, if any slot is live.
    pub fn peek(&self) -> Option<&Value> {
        self.slots.last()
    }

    /// Start a new frame at the current top.  Returns the previous frame
    /// marker, to be handed back to [`restore_frame`](Self::restore_frame).
    pub fn start_frame(&mut self) -> usize {
        let saved = self.frame;
        self.frame = self.slots.len();
        saved
    }

    /// Drop every slot of the current frame and reinstate `saved`.
    ///
    /// `saved` must not be above the current frame: frames nest.
    pub fn restore_frame(&mut self, saved: usize) -> Result<(), EngineError> {
        if saved > self.frame {
            return Err(EngineError::invalid(format!(
                "cannot restore frame {} from inside frame {}",
                saved, self.frame
            )));
        }
        self.pop(self.frame_len())?;
        self.frame = saved;
        Ok(())
    }
}

impl Default for ExecutionStack {
    fn default() -> Self {
        Self::new(16)
    }
}
