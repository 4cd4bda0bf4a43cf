pub mod matching;
pub mod records;

#[cfg(test)]
pub mod fixtures;

pub use matching::*;
pub use records::*;
