pub mod app;
pub mod cli;
pub mod config;
pub mod domain;
pub mod error;
pub mod notion;
pub mod output;
pub mod rewrite;
pub mod rows;
pub mod store;
