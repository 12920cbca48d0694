// Library for the binary and tests to access modules

pub mod aggregator;
pub mod collector;
pub mod config;
pub mod counter_source;
pub mod error;
pub mod models;
pub mod parser;
pub mod run_state;
pub mod store;
pub mod version;
