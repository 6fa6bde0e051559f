//! Data sets carried by buffers
//!
//! A `DataSet` is an ordered sequence of samples plus metadata. Its length
//! is set by the producer when the write slot is acquired and is never
//! changed by the consumer. A `StackDataSet` is the byte-message equivalent
//! used between stack components; its deque allows cheap header prepend and
//! trailer append at both ends.

use crate::types::value::Value;
use crate::types::Sample;
use crate::util::align::AlignedVec;
use std::collections::{HashMap, VecDeque};

/// Free-form metadata attached to a data set: lower-cased string keys to
/// tagged values. Copied by value when a set is forwarded.
#[derive(Debug, Clone, Default)]
pub struct MetadataMap {
    entries: HashMap<String, Value>,
}

impl MetadataMap {
    pub fn new() -> Self {
        MetadataMap::default()
    }

    pub fn set(&mut self, key: &str, value: impl Into<Value>) {
        self.entries.insert(key.to_ascii_lowercase(), value.into());
    }

    pub fn get(&self, key: &str) -> Option<&Value> {
        self.entries.get(&key.to_ascii_lowercase())
    }

    pub fn has(&self, key: &str) -> bool {
        self.entries.contains_key(&key.to_ascii_lowercase())
    }

    pub fn remove(&mut self, key: &str) -> Option<Value> {
        self.entries.remove(&key.to_ascii_lowercase())
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }
}

/// An ordered sequence of samples plus stream metadata
#[derive(Debug)]
pub struct DataSet<T: Sample> {
    /// The samples. Length is fixed by the producer at acquisition time.
    pub data: AlignedVec<T>,
    /// Sample rate of the sequence, in Hz. Zero when not applicable.
    pub sample_rate: f64,
    /// Timestamp of the first sample. Zeroed when a write slot is handed out.
    pub timestamp: f64,
    /// Optional key/value annotations, copied by value when forwarded
    pub metadata: MetadataMap,
}

impl<T: Sample> DataSet<T> {
    pub fn new() -> Self {
        DataSet {
            data: AlignedVec::new(),
            sample_rate: 0.0,
            timestamp: 0.0,
            metadata: MetadataMap::new(),
        }
    }
}

impl<T: Sample> Default for DataSet<T> {
    fn default() -> Self {
        DataSet::new()
    }
}

/// Which side of a stack component a message came from
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Direction {
    FromAbove,
    FromBelow,
}

/// A byte message passed between stack components
#[derive(Debug, Clone)]
pub struct StackDataSet {
    /// Message bytes; prepend/append at both ends is O(1)
    pub data: VecDeque<u8>,
    /// Which side this message came from
    pub direction: Direction,
    /// Name of the port this was sent from
    pub source_port: String,
    /// Name of the port this arrived on
    pub dest_port: String,
    /// Timestamp for this message
    pub timestamp: f64,
    /// Optional key/value annotations
    pub metadata: MetadataMap,
}

impl StackDataSet {
    pub fn new() -> Self {
        StackDataSet {
            data: VecDeque::new(),
            direction: Direction::FromBelow,
            source_port: String::new(),
            dest_port: String::new(),
            timestamp: 0.0,
            metadata: MetadataMap::new(),
        }
    }

    pub fn from_bytes(bytes: &[u8]) -> Self {
        let mut set = StackDataSet::new();
        set.data.extend(bytes.iter().copied());
        set
    }
}

impl Default for StackDataSet {
    fn default() -> Self {
        StackDataSet::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_metadata_keys_are_case_insensitive() {
        let mut m = MetadataMap::new();
        m.set("CenterFreq", 2.4e9);
        assert!(m.has("centerfreq"));
        assert_eq!(m.get("CENTERFREQ"), Some(&Value::Float64(2.4e9)));
        assert_eq!(m.remove("centerFreq"), Some(Value::Float64(2.4e9)));
        assert!(m.is_empty());
    }

    #[test]
    fn test_metadata_is_copied_with_the_set() {
        let mut a = StackDataSet::from_bytes(&[1, 2, 3]);
        a.metadata.set("hop", 7u32);
        let b = a.clone();
        assert_eq!(b.metadata.get("hop"), Some(&Value::Uint32(7)));
        assert_eq!(b.data, VecDeque::from(vec![1, 2, 3]));
    }

    #[test]
    fn test_stack_set_supports_both_ends() {
        let mut s = StackDataSet::from_bytes(&[10, 11]);
        s.data.push_front(9);
        s.data.push_back(12);
        let bytes: Vec<u8> = s.data.iter().copied().collect();
        assert_eq!(bytes, vec![9, 10, 11, 12]);
    }
}
