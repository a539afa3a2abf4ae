//! Errors shared across the fcdr-rs crate
use std::path::PathBuf;

use crate::expression::ExpressionError;

/// Errors related to building or evaluating an in-memory [`crate::dataset::Dataset`]
#[derive(Debug, thiserror::Error)]
pub enum DatasetError {
    #[error("Variable has {ndims} dimension names but its data has rank {rank}")]
    RankMismatch { ndims: usize, rank: usize },
    #[error("Dimension '{0}' is repeated within a single variable")]
    RepeatedDimension(String),
    #[error("Cannot add variable '{variable}': dimension '{dim}' already has length {existing}, the new variable has length {new}")]
    DimensionConflict { variable: String, dim: String, existing: usize, new: usize },
    #[error("No variable named '{0}' in the dataset")]
    MissingVariable(String),
    #[error("Variable '{0}' is marked as virtual but has no string 'expression' attribute")]
    MissingExpression(String),
    #[error("Circular reference between virtual variables: {0}")]
    CircularReference(String),
    #[error("Could not evaluate virtual variable '{variable}': {inner}")]
    Expression { variable: String, #[source] inner: ExpressionError },
    #[error("netCDF error while reading variable '{variable}': {inner}")]
    Netcdf { variable: String, #[source] inner: netcdf::Error },
    #[error("Variable '{variable}' has netCDF type {nctype}, which is not supported")]
    UnsupportedType { variable: String, nctype: String },
}

/// Errors raised while writing a [`crate::dataset::Dataset`] to a netCDF file
#[derive(Debug, thiserror::Error)]
pub enum WriteError {
    #[error("Output file {} already exists and overwriting was not requested", .0.display())]
    FileExists(PathBuf),
    #[error("Could not create netCDF file {}", .0.display())]
    Create(PathBuf),
    #[error("Could not create dimension '{0}'")]
    Dimension(String),
    #[error("Could not write variable '{0}'")]
    Variable(String),
    #[error("Could not write global attribute '{0}'")]
    GlobalAttribute(String),
    #[error("Could not move the completed file from {} to {}", .from.display(), .to.display())]
    Finalize { from: PathBuf, to: PathBuf },
}

impl WriteError {
    pub fn variable<S: ToString>(name: S) -> Self {
        Self::Variable(name.to_string())
    }
}

/// Errors raised while reading a netCDF file into a [`crate::dataset::Dataset`]
#[derive(Debug, thiserror::Error)]
pub enum ReadError {
    #[error("Could not open netCDF file {}", .0.display())]
    Open(PathBuf),
    #[error("Could not read variable '{0}'")]
    Variable(String),
    #[error("Could not read attribute '{attribute}' of {owner}")]
    Attribute { owner: String, attribute: String },
    #[error("Could not set up virtual variable '{0}'")]
    Virtual(String),
}

/// Errors raised while loading or writing the writer configuration
#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    #[error("Configuration file {} does not exist", .0.display())]
    Missing(PathBuf),
    #[error("Could not load configuration: {0}")]
    Load(#[from] Box<figment::Error>),
    #[error("Could not write the example configuration to {}", .0.display())]
    WriteExample(PathBuf),
    #[error("Invalid configuration: {0}")]
    Invalid(String),
}
