//! src/mappers/line_counter.rs
use crate::functions::Mapper;
use crate::record::KeyValue;

/// Emits `(line, "1")` for every non-blank line, untouched. Pairs with
/// [`crate::reducers::Counter`] to count distinct lines.
#[derive(Debug, Default)]
pub struct LineCounter;

impl Mapper for LineCounter {
    fn map(&self, _input_file: &str, contents: &str) -> anyhow::Result<Vec<KeyValue>> {
        let records = contents
            .lines()
            .filter(|line| !line.trim().is_empty())
            .map(|line| KeyValue::new(line, "1"))
            .collect();
        Ok(records)
    }
}
