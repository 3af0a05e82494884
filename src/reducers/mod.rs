//! src/reducers/mod.rs
mod counter;

pub use counter::Counter;
