// crates/core/src/shared_log.rs
//! Append-only list whose clones share every sealed chunk.
//!
//! Items live in fixed-size `Arc<[Arc<T>]>` chunks behind one more `Arc`, so
//! cloning copies at most one open chunk of pointers. A clone never observes
//! items pushed after it was taken.

use serde::{Serialize, Serializer};
use std::ops::Index;
use std::sync::Arc;

const CHUNK_LEN: usize = 256;

#[derive(Debug)]
pub struct SharedLog<T> {
    sealed: Arc<Vec<Arc<[Arc<T>]>>>,
    tail: Vec<Arc<T>>,
}

impl<T> Clone for SharedLog<T> {
    fn clone(&self) -> Self {
        Self {
            sealed: Arc::clone(&self.sealed),
            tail: self.tail.clone(),
        }
    }
}

impl<T> Default for SharedLog<T> {
    fn default() -> Self {
        Self {
            sealed: Arc::new(Vec::new()),
            tail: Vec::new(),
        }
    }
}

impl<T> SharedLog<T> {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn push(&mut self, item: Arc<T>) {
        self.tail.push(item);
        if self.tail.len() == CHUNK_LEN {
            let chunk: Arc<[Arc<T>]> = std::mem::replace(&mut self.tail, Vec::with_capacity(CHUNK_LEN)).into();
            // Copies the chunk index only when a clone still holds it.
            Arc::make_mut(&mut self.sealed).push(chunk);
        }
    }

    pub fn len(&self) -> usize {
        self.sealed.len() * CHUNK_LEN + self.tail.len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    pub fn get(&self, index: usize) -> Option<&Arc<T>> {
        let chunk = index / CHUNK_LEN;
        match self.sealed.get(chunk) {
            Some(sealed) => sealed.get(index % CHUNK_LEN),
            None => self.tail.get(index - self.sealed.len() * CHUNK_LEN),
        }
    }

    pub fn last(&self) -> Option<&Arc<T>> {
        self.tail
            .last()
            .or_else(|| self.sealed.last().and_then(|chunk| chunk.last()))
    }

    pub fn iter(&self) -> impl Iterator<Item = &Arc<T>> + '_ {
        self.iter_from(0)
    }

    /// Items at `start` and after. Skips whole chunks without walking them.
    pub fn iter_from(&self, start: usize) -> impl Iterator<Item = &Arc<T>> + '_ {
        let first_chunk = (start / CHUNK_LEN).min(self.sealed.len());
        let skip = start - first_chunk * CHUNK_LEN;
        self.sealed[first_chunk..]
            .iter()
            .flat_map(|chunk| chunk.iter())
            .chain(self.tail.iter())
            .skip(skip)
    }

    pub fn to_vec(&self) -> Vec<Arc<T>> {
        self.iter().cloned().collect()
    }
}

impl<T> Index<usize> for SharedLog<T> {
    type Output = Arc<T>;

    fn index(&self, index: usize) -> &Arc<T> {
        match self.get(index) {
            Some(item) => item,
            None => panic!("index {index} out of range for log of length {}", self.len()),
        }
    }
}

impl<T: PartialEq> PartialEq for SharedLog<T> {
    fn eq(&self, other: &Self) -> bool {
        self.len() == other.len() && self.iter().eq(other.iter())
    }
}

impl<T: Serialize> Serialize for SharedLog<T> {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.collect_seq(self.iter())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;

    fn filled(n: usize) -> SharedLog<usize> {
        let mut log = SharedLog::new();
        for i in 0..n {
            log.push(Arc::new(i));
        }
        log
    }

    #[test]
    fn test_get_across_chunk_boundary() {
        let log = filled(CHUNK_LEN * 2 + 3);
        assert_eq!(log.len(), CHUNK_LEN * 2 + 3);
        assert_eq!(*log[0], 0);
        assert_eq!(*log[CHUNK_LEN - 1], CHUNK_LEN - 1);
        assert_eq!(*log[CHUNK_LEN], CHUNK_LEN);
        assert_eq!(**log.last().unwrap(), CHUNK_LEN * 2 + 2);
        assert!(log.get(CHUNK_LEN * 2 + 3).is_none());
    }

    #[test]
    fn test_last_on_exact_chunk_multiple() {
        let log = filled(CHUNK_LEN);
        assert_eq!(**log.last().unwrap(), CHUNK_LEN - 1);
        assert!(SharedLog::<usize>::new().last().is_none());
    }

    #[test]
    fn test_iter_from_matches_skip() {
        let log = filled(CHUNK_LEN * 3 + 10);
        for start in [0, 5, CHUNK_LEN, CHUNK_LEN * 2 + 7, CHUNK_LEN * 3 + 10, 100_000] {
            let fast: Vec<usize> = log.iter_from(start).map(|v| **v).collect();
            let slow: Vec<usize> = log.iter().skip(start).map(|v| **v).collect();
            assert_eq!(fast, slow, "start {start}");
        }
    }

    #[test]
    fn test_clone_is_frozen() {
        let mut log = filled(CHUNK_LEN - 1);
        let frozen = log.clone();
        log.push(Arc::new(999));
        log.push(Arc::new(1000));
        assert_eq!(frozen.len(), CHUNK_LEN - 1);
        assert_eq!(log.len(), CHUNK_LEN + 1);
        assert_eq!(*log[CHUNK_LEN - 1], 999);
    }

    #[test]
    fn test_clone_shares_sealed_chunks() {
        let log = filled(CHUNK_LEN * 4);
        let copy = log.clone();
        assert!(Arc::ptr_eq(&log.sealed, &copy.sealed));
        assert!(copy.tail.is_empty());
    }

    #[test]
    fn test_serializes_as_sequence() {
        let log = filled(3);
        assert_eq!(serde_json::to_value(&log).unwrap(), serde_json::json!([0, 1, 2]));
    }
}
