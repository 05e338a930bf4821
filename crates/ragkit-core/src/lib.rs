#![deny(warnings)]
#![deny(dead_code)]
#![deny(unused_variables)]
#![deny(unused_imports)]

pub mod backoff;
pub mod config;
pub mod data_processor;
pub mod error;
pub mod splitter;
pub mod traits;
pub mod types;

pub use error::{Error, Result};
