pub mod error;
pub mod logging;
pub mod dataset;
pub mod default_data;
pub mod correlation;
pub mod expression;
pub mod templates;
pub mod writer;
pub mod reader;
pub mod config;
