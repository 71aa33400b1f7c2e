//! Telemetry output format selection.

use serde::{Deserialize, Serialize};
use strum::{Display, EnumString};

/// How harness events are rendered on stderr.
///
/// Accepted spellings are `compact` and `json`, in any letter case, from
/// `HARNESS_LOG_FORMAT` or the `log_format` key of a configuration file.
#[derive(
    Debug, Clone, Copy, Default, Deserialize, Serialize, PartialEq, Eq, EnumString, Display,
)]
#[serde(rename_all = "snake_case")]
#[strum(serialize_all = "snake_case", ascii_case_insensitive)]
pub enum LogFormat {
    /// One short line per event, readable in captured test output.
    #[default]
    Compact,
    /// One JSON object per event, for CI jobs that ship logs elsewhere.
    Json,
}

/// Error returned when text names no known [`LogFormat`].
pub type LogFormatParseError = strum::ParseError;
