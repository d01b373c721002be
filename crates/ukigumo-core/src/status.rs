//! Run outcome taxonomy.

use serde::{Deserialize, Serialize, Serializer};
use std::fmt;
use std::str::FromStr;

/// Outcome of one test run.
///
/// The collector identifies statuses by their numeric wire code
/// (`"1"` through `"6"`), see [`Status::code`].
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Hash)]
#[serde(rename_all = "snake_case")]
pub enum Status {
    /// Build and tests passed.
    Success,

    /// The test step ran and failed.
    Fail,

    /// The project could not be detected, configured or built.
    NotApplicable,

    /// Reserved.
    Skip,

    /// Queued but not yet finished.
    Pending,

    /// A step exceeded its deadline.
    Timeout,
}

impl Status {
    /// All statuses, in wire-code order.
    pub const ALL: [Status; 6] = [
        Status::Success,
        Status::Fail,
        Status::NotApplicable,
        Status::Skip,
        Status::Pending,
        Status::Timeout,
    ];

    /// Wire code sent to the collector.
    pub fn code(&self) -> &'static str {
        match self {
            Status::Success => "1",
            Status::Fail => "2",
            Status::NotApplicable => "3",
            Status::Skip => "4",
            Status::Pending => "5",
            Status::Timeout => "6",
        }
    }

    /// Human-readable name.
    pub fn name(&self) -> &'static str {
        match self {
            Status::Success => "success",
            Status::Fail => "fail",
            Status::NotApplicable => "not_applicable",
            Status::Skip => "skip",
            Status::Pending => "pending",
            Status::Timeout => "timeout",
        }
    }

    /// Whether this status ends a run.
    pub fn is_terminal(&self) -> bool {
        !matches!(self, Status::Pending)
    }
}

impl fmt::Display for Status {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

/// Serialize a [`Status`] as its wire code, for `#[serde(serialize_with)]`.
pub fn serialize_code<S: Serializer>(status: &Status, serializer: S) -> Result<S::Ok, S::Error> {
    serializer.serialize_str(status.code())
}

/// Error returned when parsing an unknown status code or name.
#[derive(Debug, thiserror::Error)]
#[error("unknown status: {0}")]
pub struct ParseStatusError(String);

impl FromStr for Status {
    type Err = ParseStatusError;

    /// Accepts either the wire code (`"2"`) or the name (`"fail"`).
    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Status::ALL
            .iter()
            .copied()
            .find(|status| status.code() == s || status.name() == s)
            .ok_or_else(|| ParseStatusError(s.to_string()))
    }
}
