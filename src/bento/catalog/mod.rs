pub mod config;
pub mod engine;
pub mod error;
pub mod flatten;
pub mod io;
pub mod model;
pub mod normalize;
pub mod plan;
pub mod report;
pub mod store;
pub mod sync;

pub use error::{Result, SyncError};
