//! Course progress and quiz assessment engine with a small JSON API on top.

pub mod authoring;
pub mod badges;
pub mod completion;
pub mod config;
pub mod db;
pub mod enrollment;
pub mod error;
pub mod hierarchy;
pub mod identity;
pub mod models;
pub mod quiz;
pub mod routes;
pub mod state;
pub mod stats;
pub mod store;

pub use error::{Error, Result};
pub use state::AppState;
