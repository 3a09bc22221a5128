//! The priority-ordered buffer behind every tank.

use crate::core::Packet;
use crate::errors::AttributeError;
use parking_lot::Mutex;
use std::collections::BTreeMap;
use std::fmt;
use std::sync::Arc;

/// Priority of a tank slot. Placeholders sort before every real entry.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub enum SlotPriority {
    /// Padding slot.
    Placeholder,
    /// A packet's priority attribute.
    Value(i64),
}

/// One entry taken off a tank.
#[derive(Debug, Clone, PartialEq)]
pub enum TankEntry {
    /// Padding, never forwarded.
    Placeholder,
    /// A buffered packet.
    Packet(Packet),
}

impl TankEntry {
    /// Returns the packet, if any.
    #[must_use]
    pub fn into_packet(self) -> Option<Packet> {
        match self {
            Self::Packet(p) => Some(p),
            Self::Placeholder => None,
        }
    }
}

/// A bounded or unbounded buffer ordered by `(priority, insertion sequence)`.
///
/// The insertion sequence always increments, so entries of equal priority
/// leave in arrival order.
#[derive(Debug)]
pub struct TankBuffer {
    entries: BTreeMap<(SlotPriority, u64), TankEntry>,
    next_seq: u64,
    capacity: Option<usize>,
    priority_field_name: String,
}

impl TankBuffer {
    /// Creates an empty buffer. A negative capacity means unbounded.
    #[must_use]
    pub fn new(capacity: i64, priority_field_name: impl Into<String>) -> Self {
        Self {
            entries: BTreeMap::new(),
            next_seq: 0,
            capacity: to_capacity(capacity),
            priority_field_name: priority_field_name.into(),
        }
    }

    /// The configured capacity; `None` is unbounded.
    #[must_use]
    pub fn capacity(&self) -> Option<usize> {
        self.capacity
    }

    /// Sets the capacity without moving any entry.
    pub fn set_capacity(&mut self, capacity: i64) {
        self.capacity = to_capacity(capacity);
    }

    /// The attribute read as a packet's priority.
    #[must_use]
    pub fn priority_field_name(&self) -> &str {
        &self.priority_field_name
    }

    /// Sets the attribute read as a packet's priority.
    pub fn set_priority_field_name(&mut self, name: impl Into<String>) {
        self.priority_field_name = name.into();
    }

    fn next_key(&mut self, priority: SlotPriority) -> (SlotPriority, u64) {
        let key = (priority, self.next_seq);
        self.next_seq += 1;
        key
    }

    /// Inserts a packet at the priority held in its priority attribute.
    ///
    /// Fails if the attribute is missing or not an integer.
    pub fn push(&mut self, packet: Packet) -> Result<(), AttributeError> {
        let priority = packet.get_i64(&self.priority_field_name)?;
        let key = self.next_key(SlotPriority::Value(priority));
        self.entries.insert(key, TankEntry::Packet(packet));
        Ok(())
    }

    /// Inserts a padding slot at the front.
    pub fn push_placeholder(&mut self) {
        let key = self.next_key(SlotPriority::Placeholder);
        self.entries.insert(key, TankEntry::Placeholder);
    }

    /// Removes and returns the head, placeholder or not.
    pub fn pop(&mut self) -> Option<TankEntry> {
        self.entries.pop_first().map(|(_, entry)| entry)
    }

    /// Pops the head only while occupancy exceeds capacity.
    pub fn pop_excess(&mut self) -> Option<TankEntry> {
        if self.excess() > 0 {
            self.pop()
        } else {
            None
        }
    }

    /// Pads the front with placeholders until occupancy matches capacity.
    ///
    /// Does nothing for an unbounded buffer.
    pub fn pad_to_capacity(&mut self) {
        while self.spare() > 0 {
            self.push_placeholder();
        }
    }

    /// Number of entries, placeholders included.
    #[must_use]
    pub fn len(&self) -> usize {
        self.entries.len()
    }

    /// Returns true if nothing is buffered.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    /// Entries that could be added before reaching capacity.
    #[must_use]
    pub fn spare(&self) -> usize {
        self.capacity.map_or(0, |cap| cap.saturating_sub(self.len()))
    }

    /// Entries held beyond capacity.
    #[must_use]
    pub fn excess(&self) -> usize {
        self.capacity.map_or(0, |cap| self.len().saturating_sub(cap))
    }

    /// Buffered packets in priority order, placeholders skipped.
    #[must_use]
    pub fn sorted_packets(&self) -> Vec<Packet> {
        self.entries
            .values()
            .filter_map(|entry| match entry {
                TankEntry::Packet(p) => Some(p.clone()),
                TankEntry::Placeholder => None,
            })
            .collect()
    }

    /// Number of real packets held.
    #[must_use]
    pub fn packets_held(&self) -> usize {
        self.entries
            .values()
            .filter(|entry| matches!(entry, TankEntry::Packet(_)))
            .count()
    }

    /// Drops every entry.
    pub fn clear(&mut self) {
        self.entries.clear();
    }
}

fn to_capacity(capacity: i64) -> Option<usize> {
    usize::try_from(capacity).ok()
}

/// Shared handle to a tank's buffer.
///
/// The tank filter drains it; a feeder pushes into it directly. The lock is
/// only held for single buffer operations, never across a send.
#[derive(Clone)]
pub struct TankHandle {
    inner: Arc<Mutex<TankBuffer>>,
}

impl TankHandle {
    /// Creates a handle around a new buffer.
    #[must_use]
    pub fn new(capacity: i64, priority_field_name: impl Into<String>) -> Self {
        Self {
            inner: Arc::new(Mutex::new(TankBuffer::new(capacity, priority_field_name))),
        }
    }

    /// Runs `f` with the buffer locked.
    pub fn with<R>(&self, f: impl FnOnce(&mut TankBuffer) -> R) -> R {
        f(&mut self.inner.lock())
    }

    /// Pushes a packet.
    pub fn push(&self, packet: Packet) -> Result<(), AttributeError> {
        self.inner.lock().push(packet)
    }

    /// Pops the head while over capacity.
    pub fn pop_excess(&self) -> Option<TankEntry> {
        self.inner.lock().pop_excess()
    }

    /// Number of entries.
    #[must_use]
    pub fn len(&self) -> usize {
        self.inner.lock().len()
    }

    /// Returns true if nothing is buffered.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.inner.lock().is_empty()
    }

    /// Buffered packets in priority order.
    #[must_use]
    pub fn sorted_packets(&self) -> Vec<Packet> {
        self.inner.lock().sorted_packets()
    }

    /// Number of real packets held.
    #[must_use]
    pub fn packets_held(&self) -> usize {
        self.inner.lock().packets_held()
    }

    /// Returns true if both handles share one buffer.
    #[must_use]
    pub fn same_tank(&self, other: &Self) -> bool {
        Arc::ptr_eq(&self.inner, &other.inner)
    }
}

impl fmt::Debug for TankHandle {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let buffer = self.inner.lock();
        f.debug_struct("TankHandle")
            .field("capacity", &buffer.capacity())
            .field("len", &buffer.len())
            .field("priority_field_name", &buffer.priority_field_name())
            .finish()
    }
}
