//! Bounded command history with least-recently-used eviction.
//!
//! Records live in a [`Slab`] arena and are threaded into a doubly-linked
//! recency list by index, most recent at the head. A map from command text to
//! slab index gives constant-time duplicate detection.

pub mod persist;
pub mod service;

use chrono::{DateTime, Utc};
use slab::Slab;
use std::collections::HashMap;
use std::sync::{Arc, Mutex};

pub use service::HistoryService;

/// Default bound on resident records.
pub const MAX_HISTORY: usize = 500;

/// History shared between the REPL and the autosave thread.
pub type SharedHistory = Arc<Mutex<HistoryStore>>;

#[derive(Debug, Clone, PartialEq)]
pub struct HistoryItem {
    pub command: String,
    pub directory: String,
    pub timestamp: DateTime<Utc>,
    pub usage_count: usize,
}

impl HistoryItem {
    pub fn new(command: &str, directory: &str) -> Self {
        Self {
            command: command.to_string(),
            directory: directory.to_string(),
            timestamp: Utc::now(),
            usage_count: 1,
        }
    }
}

#[derive(Clone)]
struct Node {
    item: HistoryItem,
    prev: Option<usize>,
    next: Option<usize>,
}

#[derive(Clone)]
pub struct HistoryStore {
    nodes: Slab<Node>,
    index: HashMap<String, usize>,
    head: Option<usize>,
    tail: Option<usize>,
    capacity: usize,
}

impl Default for HistoryStore {
    fn default() -> Self {
        Self::with_capacity(MAX_HISTORY)
    }
}

impl HistoryStore {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_capacity(capacity: usize) -> Self {
        let capacity = capacity.max(1);
        Self {
            nodes: Slab::with_capacity(capacity + 1),
            index: HashMap::with_capacity(capacity + 1),
            head: None,
            tail: None,
            capacity,
        }
    }

    pub fn into_shared(self) -> SharedHistory {
        Arc::new(Mutex::new(self))
    }

    pub fn len(&self) -> usize {
        self.index.len()
    }

    pub fn is_empty(&self) -> bool {
        self.index.is_empty()
    }

    pub fn capacity(&self) -> usize {
        self.capacity
    }

    pub fn get(&self, command: &str) -> Option<&HistoryItem> {
        self.index.get(command).map(|&idx| &self.nodes[idx].item)
    }

    /// Records a use of `command`.
    ///
    /// A known command has its usage count bumped and moves to the front.
    /// A new command is inserted at the front; if that pushes the store over
    /// capacity the least recently used record is evicted and returned.
    pub fn add_or_touch(&mut self, command: &str, directory: &str) -> Option<HistoryItem> {
        if command.is_empty() {
            return None;
        }

        if let Some(&idx) = self.index.get(command) {
            let item = &mut self.nodes[idx].item;
            item.usage_count += 1;
            item.timestamp = Utc::now();
            self.move_to_front(idx);
            return None;
        }

        self.insert_front(HistoryItem::new(command, directory))
    }

    /// Inserts a fully formed record as the most recent one, replacing any
    /// record with the same command. Used when loading a persisted file.
    pub fn restore(&mut self, item: HistoryItem) -> Option<HistoryItem> {
        if item.command.is_empty() {
            return None;
        }
        if let Some(idx) = self.index.remove(&item.command) {
            self.unlink(idx);
            self.nodes.remove(idx);
        }
        self.insert_front(item)
    }

    /// Up to `limit` commands, most recent first.
    pub fn recent(&self, limit: usize) -> impl Iterator<Item = &str> + '_ {
        self.iter().take(limit).map(|item| item.command.as_str())
    }

    /// All records, most recent first.
    pub fn iter(&self) -> Iter<'_> {
        Iter {
            store: self,
            cursor: self.head,
        }
    }

    fn insert_front(&mut self, item: HistoryItem) -> Option<HistoryItem> {
        let command = item.command.clone();
        let idx = self.nodes.insert(Node {
            item,
            prev: None,
            next: None,
        });
        self.index.insert(command, idx);
        self.link_front(idx);

        if self.index.len() > self.capacity {
            return self.evict_oldest();
        }
        None
    }

    fn evict_oldest(&mut self) -> Option<HistoryItem> {
        let idx = self.tail?;
        // The head was just touched; a capacity of one still keeps it
        if Some(idx) == self.head {
            return None;
        }
        self.unlink(idx);
        let node = self.nodes.remove(idx);
        self.index.remove(&node.item.command);
        Some(node.item)
    }

    fn move_to_front(&mut self, idx: usize) {
        if self.head == Some(idx) {
            return;
        }
        self.unlink(idx);
        self.link_front(idx);
    }

    fn link_front(&mut self, idx: usize) {
        let old_head = self.head;
        {
            let node = &mut self.nodes[idx];
            node.prev = None;
            node.next = old_head;
        }
        match old_head {
            Some(h) => self.nodes[h].prev = Some(idx),
            None => self.tail = Some(idx),
        }
        self.head = Some(idx);
    }

    fn unlink(&mut self, idx: usize) {
        let (prev, next) = {
            let node = &self.nodes[idx];
            (node.prev, node.next)
        };
        match prev {
            Some(p) => self.nodes[p].next = next,
            None => self.head = next,
        }
        match next {
            Some(n) => self.nodes[n].prev = prev,
            None => self.tail = prev,
        }
        let node = &mut self.nodes[idx];
        node.prev = None;
        node.next = None;
    }
}

/// Walks the recency list from most to least recent.
pub struct Iter<'a> {
    store: &'a HistoryStore,
    cursor: Option<usize>,
}

impl<'a> Iterator for Iter<'a> {
    type Item = &'a HistoryItem;

    fn next(&mut self) -> Option<Self::Item> {
        let idx = self.cursor?;
        let node = &self.store.nodes[idx];
        self.cursor = node.next;
        Some(&node.item)
    }
}
