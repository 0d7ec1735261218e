pub mod cache;
pub mod config;
pub mod error;
pub mod intake;
pub mod models;
pub mod pipeline;
pub mod reader;
pub mod validation;
pub mod worker;
pub mod writer;

#[cfg(test)]
mod test_support;
