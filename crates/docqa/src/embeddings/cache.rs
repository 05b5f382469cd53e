//! Bounded embedding cache keyed by content hash

use sha2::{Digest, Sha256};
use std::collections::{HashMap, VecDeque};

/// FIFO-evicting map from text hash to vector
#[derive(Debug, Default)]
pub struct EmbeddingCache {
    capacity: usize,
    entries: HashMap<String, Vec<f32>>,
    order: VecDeque<String>,
}

impl EmbeddingCache {
    /// A capacity of zero disables caching
    pub fn new(capacity: usize) -> Self {
        Self {
            capacity,
            entries: HashMap::new(),
            order: VecDeque::new(),
        }
    }

    pub fn key(text: &str) -> String {
        hex::encode(Sha256::digest(text.as_bytes()))
    }

    pub fn get(&self, text: &str) -> Option<Vec<f32>> {
        self.entries.get(&Self::key(text)).cloned()
    }

    pub fn insert(&mut self, text: &str, vector: Vec<f32>) {
        if self.capacity == 0 {
            return;
        }
        let key = Self::key(text);
        if self.entries.insert(key.clone(), vector).is_none() {
            self.order.push_back(key);
        }
        while self.entries.len() > self.capacity {
            match self.order.pop_front() {
                Some(oldest) => {
                    self.entries.remove(&oldest);
                }
                None => break,
            }
        }
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    pub fn clear(&mut self) {
        self.entries.clear();
        self.order.clear();
    }
}
