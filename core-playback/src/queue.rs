//! Play queue with linear and shuffled orders.
//!
//! Tracks are stored once in insertion (linear) order. Shuffling produces a
//! permutation of linear indices; positions handed out by the queue always
//! refer to whichever order is active.

use core_library::models::{Track, TrackId};
use rand::seq::SliceRandom;
use rand::Rng;

#[derive(Debug, Clone, Default)]
pub struct PlayQueue {
    tracks: Vec<Track>,
    /// `shuffle_order[position]` is a linear index. Present only while shuffled.
    shuffle_order: Option<Vec<usize>>,
}

impl PlayQueue {
    pub fn new(tracks: Vec<Track>) -> Self {
        Self {
            tracks,
            shuffle_order: None,
        }
    }

    pub fn len(&self) -> usize {
        self.tracks.len()
    }

    pub fn is_empty(&self) -> bool {
        self.tracks.is_empty()
    }

    pub fn is_shuffled(&self) -> bool {
        self.shuffle_order.is_some()
    }

    /// Tracks in linear order.
    pub fn tracks(&self) -> &[Track] {
        &self.tracks
    }

    pub fn track_ids(&self) -> Vec<TrackId> {
        self.tracks.iter().map(|track| track.id).collect()
    }

    /// Linear index of the track at `position` in the active order.
    pub fn linear_index(&self, position: usize) -> Option<usize> {
        match &self.shuffle_order {
            Some(order) => order.get(position).copied(),
            None => (position < self.tracks.len()).then_some(position),
        }
    }

    /// Position in the active order of the track stored at `linear_index`.
    pub fn position_of(&self, linear_index: usize) -> Option<usize> {
        match &self.shuffle_order {
            Some(order) => order.iter().position(|&index| index == linear_index),
            None => (linear_index < self.tracks.len()).then_some(linear_index),
        }
    }

    /// Track at `position` in the active order.
    pub fn get(&self, position: usize) -> Option<&Track> {
        self.linear_index(position)
            .and_then(|index| self.tracks.get(index))
    }

    /// First position of `id` in the active order.
    pub fn index_of(&self, id: TrackId) -> Option<usize> {
        (0..self.len()).find(|&position| self.get(position).is_some_and(|track| track.id == id))
    }

    /// Position after `position`, wrapping to the start.
    pub fn next_position(&self, position: usize) -> Option<usize> {
        if self.is_empty() {
            return None;
        }
        Some((position + 1) % self.len())
    }

    /// Position before `position`, wrapping to the end.
    pub fn previous_position(&self, position: usize) -> Option<usize> {
        if self.is_empty() {
            return None;
        }
        let len = self.len();
        Some((position % len + len - 1) % len)
    }

    /// Activate a fresh uniform permutation of the whole queue.
    pub fn shuffle<R: Rng + ?Sized>(&mut self, rng: &mut R) {
        let mut order: Vec<usize> = (0..self.tracks.len()).collect();
        order.shuffle(rng);
        self.shuffle_order = Some(order);
    }

    /// Drop the permutation and go back to linear order.
    pub fn unshuffle(&mut self) {
        self.shuffle_order = None;
    }
}
