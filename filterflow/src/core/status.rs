//! Filter lifecycle state and route enums.

use crate::errors::ConfigurationError;
use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

/// One of the two outbound directions a filter may emit to.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Route {
    /// The main route.
    #[default]
    Main,
    /// The branch route.
    Branch,
}

impl fmt::Display for Route {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Main => write!(f, "main"),
            Self::Branch => write!(f, "branch"),
        }
    }
}

impl FromStr for Route {
    type Err = ConfigurationError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "main" => Ok(Self::Main),
            "branch" => Ok(Self::Branch),
            other => Err(ConfigurationError::new(format!(
                "Unknown route '{other}', expected 'main' or 'branch'"
            ))),
        }
    }
}

/// The lifecycle state of a filter instance.
///
/// Transitions only move forward; reopening a closed filter is not supported.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum FilterState {
    /// Constructed, parameters not yet validated.
    #[default]
    Constructed,
    /// Parameters validated, `init_filter` and `zero_inputs` have run.
    Initialized,
    /// Has received at least one data or control call.
    Active,
    /// `flush_buffer` has been called.
    Flushing,
    /// `close_filter` has been called.
    Closed,
}

impl fmt::Display for FilterState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Constructed => write!(f, "constructed"),
            Self::Initialized => write!(f, "initialized"),
            Self::Active => write!(f, "active"),
            Self::Flushing => write!(f, "flushing"),
            Self::Closed => write!(f, "closed"),
        }
    }
}

impl FilterState {
    /// Returns true if the filter may still receive data or control calls.
    #[must_use]
    pub fn accepts_units(&self) -> bool {
        matches!(self, Self::Initialized | Self::Active | Self::Flushing)
    }
}
