//! Pens: bounded groups of animals.

use std::fmt;

use serde::{Deserialize, Serialize};

use crate::error::FeedlotError;

pub const DEFAULT_PEN_CAPACITY: usize = 50;

/// A pen holds animal ids, not the animals themselves; the registry
/// owns the animals. Size never exceeds capacity.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Pen {
    number: u32,
    capacity: usize,
    animal_ids: Vec<u32>,
}

impl Pen {
    pub fn new(number: u32) -> Self {
        Self::with_capacity(number, DEFAULT_PEN_CAPACITY)
    }

    pub fn with_capacity(number: u32, capacity: usize) -> Self {
        Self {
            number,
            capacity,
            animal_ids: Vec::new(),
        }
    }

    pub fn number(&self) -> u32 {
        self.number
    }

    pub fn capacity(&self) -> usize {
        self.capacity
    }

    pub fn animal_ids(&self) -> &[u32] {
        &self.animal_ids
    }

    pub fn len(&self) -> usize {
        self.animal_ids.len()
    }

    pub fn is_empty(&self) -> bool {
        self.animal_ids.is_empty()
    }

    pub fn is_full(&self) -> bool {
        self.animal_ids.len() >= self.capacity
    }

    pub fn contains(&self, id: u32) -> bool {
        self.animal_ids.contains(&id)
    }

    /// Add an animal id; a full pen rejects the add without mutating.
    pub fn add(&mut self, id: u32) -> Result<(), FeedlotError> {
        if self.is_full() {
            return Err(FeedlotError::PenFull {
                pen: self.number,
                capacity: self.capacity,
            });
        }
        self.animal_ids.push(id);
        Ok(())
    }

    /// Remove an animal id, reporting whether it was present.
    pub fn remove(&mut self, id: u32) -> bool {
        match self.animal_ids.iter().position(|&a| a == id) {
            Some(pos) => {
                self.animal_ids.remove(pos);
                true
            }
            None => false,
        }
    }

    /// Used capacity as a percentage.
    pub fn occupancy(&self) -> f64 {
        if self.capacity == 0 {
            return 0.0;
        }
        self.animal_ids.len() as f64 / self.capacity as f64 * 100.0
    }

    /// Drop all ids, keeping number and capacity. Used when a snapshot
    /// is restored and the registry re-adds each animal.
    pub fn clear(&mut self) {
        self.animal_ids.clear();
    }
}

impl fmt::Display for Pen {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "pen #{} ({}/{})", self.number, self.len(), self.capacity)
    }
}
