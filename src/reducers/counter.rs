//! src/reducers/counter.rs
use crate::functions::Reducer;

/// Reduces a key to the number of values emitted under it, as a decimal
/// string.
#[derive(Debug, Default)]
pub struct Counter;

impl Reducer for Counter {
    fn reduce(&self, _key: &str, values: &[String]) -> anyhow::Result<String> {
        Ok(values.len().to_string())
    }
}
