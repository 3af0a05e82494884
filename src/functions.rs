//! src/functions.rs
use crate::record::KeyValue;

/// User-supplied map function. Receives the input file's name and its whole
/// contents, and returns the records to partition. A returned error fails the
/// current task attempt; the scheduler retries it.
pub trait Mapper: Send + Sync {
    fn map(&self, input_file: &str, contents: &str) -> anyhow::Result<Vec<KeyValue>>;
}

/// User-supplied reduce function. Receives one key and every value emitted
/// under it, in map-task order, and returns the reduced value.
pub trait Reducer: Send + Sync {
    fn reduce(&self, key: &str, values: &[String]) -> anyhow::Result<String>;
}
