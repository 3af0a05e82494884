//! src/mappers/word_counter.rs
use crate::functions::Mapper;
use crate::record::KeyValue;

/// Emits `(word, "1")` for every whitespace-separated token, lowercased.
#[derive(Debug, Default)]
pub struct WordCounter;

impl Mapper for WordCounter {
    fn map(&self, _input_file: &str, contents: &str) -> anyhow::Result<Vec<KeyValue>> {
        let records = contents
            .split_whitespace()
            .map(|word| KeyValue::new(word.to_lowercase(), "1"))
            .collect();
        Ok(records)
    }
}
