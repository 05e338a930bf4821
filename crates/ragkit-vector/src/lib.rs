//! Exact vector index and corpus store, each optionally backed by a file
//! in the data directory.
//!
//! - [`FlatL2Index`]: brute-force squared-L2 search over every entry
//! - [`JsonCorpusStore`]: id → text map persisted as sorted JSON
//! - [`DataLayout`]: where both files live, plus atomic writes

pub mod corpus;
pub mod flat;
pub mod layout;

pub use corpus::JsonCorpusStore;
pub use flat::FlatL2Index;
pub use layout::{write_atomic, DataLayout};
