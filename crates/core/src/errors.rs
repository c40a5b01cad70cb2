use thiserror::Error;

use crate::config::ConfigError;

#[derive(Clone, Debug, Error, PartialEq, Eq)]
pub enum AnalyticsError {
    #[error("no transaction records were loaded")]
    EmptyDataset,
    #[error("malformed transaction input: {0}")]
    MalformedInput(String),
}

#[derive(Clone, Debug, Error, PartialEq, Eq)]
pub enum ApplicationError {
    #[error(transparent)]
    Analytics(#[from] AnalyticsError),
    #[error("input load failure: {0}")]
    InputLoad(String),
    #[error("configuration failure: {0}")]
    Configuration(String),
}

impl From<ConfigError> for ApplicationError {
    fn from(value: ConfigError) -> Self {
        Self::Configuration(value.to_string())
    }
}

impl ApplicationError {
    /// Stable machine-readable class used in command outcomes.
    pub fn error_class(&self) -> &'static str {
        match self {
            Self::Analytics(AnalyticsError::EmptyDataset)
            | Self::Analytics(AnalyticsError::MalformedInput(_))
            | Self::InputLoad(_) => "input_load",
            Self::Configuration(_) => "config_validation",
        }
    }

    pub fn exit_code(&self) -> u8 {
        match self {
            Self::Configuration(_) => 2,
            Self::Analytics(_) | Self::InputLoad(_) => 3,
        }
    }

    pub fn user_message(&self) -> &'static str {
        match self {
            Self::Analytics(AnalyticsError::EmptyDataset) => {
                "No sales records were found. Check the data source and try again."
            }
            Self::Analytics(AnalyticsError::MalformedInput(_)) | Self::InputLoad(_) => {
                "Sales records could not be loaded."
            }
            Self::Configuration(_) => "Analytics configuration is invalid.",
        }
    }
}
