pub mod aggregate;
pub mod cli;
pub mod config;
pub mod db;
pub mod descriptor;
mod error;
pub mod extract;
pub mod kdtree;
mod metrics;
pub mod pipeline;
pub mod ranker;
pub mod service;
mod server;
pub mod utils;

pub use config::Opts;
pub use descriptor::Descriptor;
pub use error::{Error, Result};
pub use kdtree::{Neighbor, SpatialIndex};
pub use pipeline::{IndexingPipeline, IngestOutcome};
pub use service::{QueryOptions, QueryService, SearchHit, SearchOutcome};
