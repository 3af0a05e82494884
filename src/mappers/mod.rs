//! src/mappers/mod.rs
mod line_counter;
mod word_counter;

pub use line_counter::LineCounter;
pub use word_counter::WordCounter;
