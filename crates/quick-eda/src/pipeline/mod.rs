//! Pipeline module.
//!
//! This module provides the EDA pipeline that runs the whole analysis.

mod builder;

pub use builder::{EdaPipeline, EdaPipelineBuilder, run_eda};
