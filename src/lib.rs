pub mod commands;
pub mod config;
pub mod dataset;
pub mod error;
pub mod model;
pub mod output;
pub mod scoring;
pub mod store;
