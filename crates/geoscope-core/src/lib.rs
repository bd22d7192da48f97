pub mod bank;
pub mod config;
pub mod engine;
pub mod errors;
pub mod export;
pub mod extract;
pub mod model;
pub mod providers;
pub mod registry;
pub mod report;
pub mod storage;
