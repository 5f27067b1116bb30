//! A sparse radix table keyed by 16-bit codes.
//!
//! Each level is 16 wide and consumes one nibble of the key, most
//! significant first.  A table of depth `d` covers keys `0..16^d`.  Inserting
//! a key outside that range wraps the current root into slot 0 of a new,
//! deeper root as many times as needed; lookups never grow the table.

const BITS: u32 = 4;
const WIDTH: usize = 1 << BITS;
const MASK: u32 = (WIDTH as u32) - 1;
/// Levels needed to cover every `u16`.
const MAX_DEPTH: u32 = u16::BITS / BITS;

#[derive(Debug)]
enum Level<T> {
    Leaf([Option<T>; WIDTH]),
    Branch([Option<Box<Level<T>>>; WIDTH]),
}

impl<T> Level<T> {
    fn leaf() -> Self {
        Level::Leaf(std::array::from_fn(|_| None))
    }

    fn branch() -> Self {
        Level::Branch(std::array::from_fn(|_| None))
    }

    fn is_empty(&self) -> bool {
        match self {
            Level::Leaf(slots) => slots.iter().all(Option::is_none),
            Level::Branch(slots) => slots.iter().all(Option::is_none),
        }
    }
}

fn nibble(key: u16, level: u32) -> usize {
    ((u32::from(key) >> (level * BITS)) & MASK) as usize
}

/// Smallest depth covering `key`.
fn depth_for(key: u16) -> u32 {
    let bits = u16::BITS - key.leading_zeros();
    bits.div_ceil(BITS).max(1)
}

/// Map from `u16` to `T` that only allocates the levels it uses.
#[derive(Debug)]
pub struct SparseTable<T> {
    depth: u32,
    root: Option<Box<Level<T>>>,
    len: usize,
}

impl<T> SparseTable<T> {
    pub fn new() -> Self {
        Self {
            depth: 1,
            root: None,
            len: 0,
        }
    }

    /// Number of levels between the root and the values.
    pub fn depth(&self) -> u32 {
        self.depth
    }

    pub fn len(&self) -> usize {
        self.len
    }

    pub fn is_empty(&self) -> bool {
        self.len == 0
    }

    /// `true` if `key` lies inside the range the current depth covers.
    pub fn covers(&self, key: u16) -> bool {
        depth_for(key) <= self.depth
    }

    pub fn get(&self, key: u16) -> Option<&T> {
        if !self.covers(key) {
            return None;
        }
        let mut level = self.root.as_deref()?;
        for d in (0..self.depth).rev() {
            match level {
                Level::Branch(slots) => level = slots[nibble(key, d)].as_deref()?,
                Level::Leaf(slots) => return slots[nibble(key, d)].as_ref(),
            }
        }
        None
    }

    pub fn get_mut(&mut self, key: u16) -> Option<&mut T> {
        if !self.covers(key) {
            return None;
        }
        let mut level = self.root.as_deref_mut()?;
        for d in (0..self.depth).rev() {
            match level {
                Level::Branch(slots) => level = slots[nibble(key, d)].as_deref_mut()?,
                Level::Leaf(slots) => return slots[nibble(key, d)].as_mut(),
            }
        }
        None
    }

    /// Deepen the table until it covers `key`.
    fn grow_to(&mut self, key: u16) {
        let target = depth_for(key).min(MAX_DEPTH);
        while self.depth < target {
            if let Some(old) = self.root.take() {
                let mut root = Level::branch();
                if let Level::Branch(slots) = &mut root {
                    slots[0] = Some(old);
                }
                self.root = Some(Box::new(root));
            }
            self.depth += 1;
        }
    }

    /// The value at `key`, inserting `f()` first if the slot is empty.
    pub fn get_or_insert_with(&mut self, key: u16, f: impl FnOnce() -> T) -> &mut T {
        self.grow_to(key);
        let slot = slot_in(&mut self.root, self.depth, key);
        if slot.is_none() {
            self.len += 1;
        }
        slot.get_or_insert_with(f)
    }

    /// Clear the slot at `key` and free every level left empty.
    pub fn remove(&mut self, key: u16) -> Option<T> {
        if !self.covers(key) {
            return None;
        }
        let root = self.root.as_deref_mut()?;
        let removed = remove_in(root, key, self.depth - 1)?;
        self.len -= 1;
        if self.root.as_deref().is_some_and(Level::is_empty) {
            self.root = None;
            self.depth = 1;
        }
        Some(removed)
    }
}

/// The slot for `key`, allocating the levels leading to it.
fn slot_in<T>(root: &mut Option<Box<Level<T>>>, depth: u32, key: u16) -> &mut Option<T> {
    let new_level = |d: u32| Box::new(if d == 0 { Level::leaf() } else { Level::branch() });
    let mut d = depth - 1;
    let mut level: &mut Level<T> = &mut **root.get_or_insert_with(|| new_level(d));
    loop {
        match level {
            Level::Leaf(slots) => return &mut slots[nibble(key, d)],
            Level::Branch(slots) => {
                let child = d - 1;
                level = &mut **slots[nibble(key, d)].get_or_insert_with(|| new_level(child));
                d = child;
            }
        }
    }
}

fn remove_in<T>(level: &mut Level<T>, key: u16, d: u32) -> Option<T> {
    match level {
        Level::Leaf(slots) => slots[nibble(key, d)].take(),
        Level::Branch(slots) => {
            let slot = &mut slots[nibble(key, d)];
            let child = slot.as_deref_mut()?;
            let removed = remove_in(child, key, d.checked_sub(1)?)?;
            if child.is_empty() {
                *slot = None;
            }
            Some(removed)
        }
    }
}

impl<T> Default for SparseTable<T> {
    fn default() -> Self {
        Self::new()
    }
}
