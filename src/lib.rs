pub mod aggregate;
pub mod catalog;
pub mod config;
pub mod db;
pub mod engine;
pub mod error;
pub mod export;
pub mod mapping;
pub mod models;
pub mod org;
pub mod participation;
pub mod periods;
pub mod ranking;
pub mod report;
pub mod scale;
pub mod signal;
pub mod stages;

pub use engine::Engine;
pub use error::EngineError;
