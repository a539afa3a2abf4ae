use std::fmt::Display;

use fcdr_rs::error::{ConfigError, WriteError};

#[derive(Debug, thiserror::Error)]
pub(crate) enum CliError {
    /// The user called the program incorrectly, e.g. asked to write over an
    /// existing file without --overwrite
    UsageError(String),

    /// A problem with an input file: a configuration or netCDF file that is
    /// missing, unreadable or has invalid contents.
    InputError(String),

    /// A problem that is not necessarily the user's fault but comes from their
    /// system, e.g. an output directory that cannot be written to.
    RuntimeError(String),

    /// A problem with the templates or writer themselves, something the user
    /// should not be expected to fix.
    InternalError(String),
}

impl CliError {
    pub(crate) fn usage_error<S: ToString>(msg: S) -> Self {
        Self::UsageError(msg.to_string())
    }

    pub(crate) fn input_error<S: ToString>(msg: S) -> Self {
        Self::InputError(msg.to_string())
    }

    pub(crate) fn runtime_error<S: ToString>(msg: S) -> Self {
        Self::RuntimeError(msg.to_string())
    }

    pub(crate) fn internal_error<S: ToString>(msg: S) -> Self {
        Self::InternalError(msg.to_string())
    }

    /// Categorize a failed write.
    pub(crate) fn from_write_error(err: &WriteError) -> Self {
        match err {
            WriteError::FileExists(path) => Self::usage_error(format!(
                "{} already exists; pass --overwrite or set overwrite = true in the configuration to replace it",
                path.display()
            )),
            WriteError::Create(_) | WriteError::Finalize { .. } => Self::runtime_error(err),
            WriteError::Dimension(_) | WriteError::Variable(_) | WriteError::GlobalAttribute(_) => {
                Self::internal_error(format!("the product could not be written: {err}"))
            }
        }
    }

    /// Categorize a failed configuration load.
    pub(crate) fn from_config_error(err: &ConfigError) -> Self {
        match err {
            ConfigError::Missing(_) | ConfigError::Load(_) => Self::input_error(err),
            ConfigError::Invalid(_) => Self::usage_error(err),
            ConfigError::WriteExample(_) => Self::runtime_error(err),
        }
    }
}

impl Display for CliError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let (type_str, err_msg, fix_msg) = match self {
            CliError::UsageError(msg) => {
                let typestr = "Usage error";
                let fix = "Please double check the command line arguments and configuration file. Run with --help to see the available options.";
                (typestr, msg, fix)
            },
            CliError::InputError(msg) => {
                let typestr = "Input error";
                let fix = "Please double check the file referenced in the above error message. Configuration files must be valid TOML (see the config-template command) and inputs to inspect must be netCDF files.";
                (typestr, msg, fix)
            },
            CliError::RuntimeError(msg) => {
                let typestr = "Runtime error";
                let fix = "This may indicate a problem with your system, such as missing write permissions or a full disk. Check the output location, then try again.";
                (typestr, msg, fix)
            },
            CliError::InternalError(msg) => {
                let typestr = "Internal error";
                let fix = "This likely indicates a problem with the product templates or the writer. Please note the command you ran and open an issue.";
                (typestr, msg, fix)
            },
        };

        writeln!(f, "{type_str}: {err_msg}\n\n{fix_msg}")
    }
}
