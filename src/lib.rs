pub mod config;
pub mod core;
pub mod history;

pub use crate::config::Policy;
pub use crate::core::caption::{CaptionError, Captioner, CommandCaptioner};
pub use crate::core::listing::ListingRecord;
pub use crate::core::pipeline::{Buckets, Pipeline, PipelineError, RunReport};
