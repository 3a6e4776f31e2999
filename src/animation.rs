//! Animation sets and die settings as transferred over bulk.
//!
//! The host does not interpret animation or settings content; both are
//! carried as the die's serialized bytes.

use crate::error::{Error, Result};
use crate::protocol::bulk::MAX_BULK_SIZE;

/// Ordered list of serialized animations, as stored on the die.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct AnimationSet {
    animations: Vec<Vec<u8>>,
}

impl AnimationSet {
    /// At most `u8::MAX` animations, each small enough for one bulk
    /// transfer, with a combined size that fits the announcement.
    pub fn new(animations: Vec<Vec<u8>>) -> Result<Self> {
        if animations.len() > usize::from(u8::MAX) {
            return Err(Error::TooManyAnimations(animations.len()));
        }
        if let Some(big) = animations.iter().find(|a| a.len() > MAX_BULK_SIZE) {
            return Err(Error::PayloadTooLarge(big.len()));
        }
        let set = Self { animations };
        if set.total_size() > MAX_BULK_SIZE {
            return Err(Error::PayloadTooLarge(set.total_size()));
        }
        Ok(set)
    }

    pub fn animations(&self) -> &[Vec<u8>] {
        &self.animations
    }

    pub fn len(&self) -> usize {
        self.animations.len()
    }

    pub fn is_empty(&self) -> bool {
        self.animations.is_empty()
    }

    /// Sum of every animation's byte length.
    pub fn total_size(&self) -> usize {
        self.animations.iter().map(Vec::len).sum()
    }

    pub fn into_inner(self) -> Vec<Vec<u8>> {
        self.animations
    }
}

/// Serialized die settings.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct DieSettings {
    pub bytes: Vec<u8>,
}

impl DieSettings {
    pub fn new(bytes: Vec<u8>) -> Self {
        Self { bytes }
    }
}
