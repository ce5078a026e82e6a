//! Error kinds for question loading, configuration and run control.
//!
//! | Error | Code | Fatal to the run |
//! |-------|------|------------------|
//! | [`GameError::MalformedRecord`] | `MALFORMED_RECORD` | Yes (setup aborts) |
//! | [`GameError::InsufficientQuestions`] | `INSUFFICIENT_QUESTIONS` | No (warning) |
//! | [`GameError::StaleCallback`] | `STALE_CALLBACK` | No (ignored) |
//! | [`GameError::AlreadyAnswered`] | `ALREADY_ANSWERED` | No (ignored) |
//! | [`GameError::NoActiveQuestion`] | `NO_ACTIVE_QUESTION` | No (ignored) |
//! | [`GameError::InvalidChoice`] | `INVALID_CHOICE` | No (ignored) |
//! | [`GameError::QuestionUnavailable`] | `QUESTION_UNAVAILABLE` | Yes (forces defeat) |
//! | [`GameError::InvalidConfig`] | `INVALID_CONFIG` | Yes |
//! | [`GameError::ConfigParse`] | `CONFIG_PARSE` | Yes |

use std::fmt;

use thiserror::Error;

/// Why a question row was rejected
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum RecordFault {
    /// Row did not split into exactly six fields
    FieldCount { found: usize },
    /// A field was empty after trimming
    EmptyField { index: usize },
    /// Correct answer matches none of the four options
    AnswerNotInOptions,
    /// Correct answer matches more than one option
    AmbiguousAnswer,
}

impl fmt::Display for RecordFault {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            RecordFault::FieldCount { found } => write!(f, "expected 6 fields, found {found}"),
            RecordFault::EmptyField { index } => write!(f, "field {} is empty", index + 1),
            RecordFault::AnswerNotInOptions => write!(f, "correct answer is not one of the options"),
            RecordFault::AmbiguousAnswer => write!(f, "correct answer matches several options"),
        }
    }
}

/// Crate-wide error type
#[derive(Debug, Error)]
pub enum GameError {
    /// A non-empty question row could not be parsed
    #[error("malformed question record on line {line}: {fault}")]
    MalformedRecord { line: usize, fault: RecordFault },

    /// Bank holds fewer questions than a run wants to ask
    #[error("question bank has {available} records, run wants {requested}")]
    InsufficientQuestions { requested: usize, available: usize },

    /// A timer or presentation from an earlier run (or presentation) was delivered
    #[error("stale callback from epoch {epoch} (current {current})")]
    StaleCallback { epoch: u32, current: u32 },

    /// The active presentation already accepted an answer
    #[error("question already answered")]
    AlreadyAnswered,

    /// An answer arrived while no question is on screen
    #[error("no question is being presented")]
    NoActiveQuestion,

    /// Answer index outside the presented options
    #[error("no option at index {index}")]
    InvalidChoice { index: usize },

    /// A bonus was collected but the run queue has no question left
    #[error("no question available for collected bonus ({asked} asked of {queued} queued)")]
    QuestionUnavailable { asked: usize, queued: usize },

    /// Configuration values violate a constraint
    #[error("invalid config: {0}")]
    InvalidConfig(String),

    /// Configuration JSON could not be parsed
    #[error("config parse error: {0}")]
    ConfigParse(#[from] serde_json::Error),
}

impl GameError {
    /// Machine-readable code
    pub fn code(&self) -> &'static str {
        match self {
            GameError::MalformedRecord { .. } => "MALFORMED_RECORD",
            GameError::InsufficientQuestions { .. } => "INSUFFICIENT_QUESTIONS",
            GameError::StaleCallback { .. } => "STALE_CALLBACK",
            GameError::AlreadyAnswered => "ALREADY_ANSWERED",
            GameError::NoActiveQuestion => "NO_ACTIVE_QUESTION",
            GameError::InvalidChoice { .. } => "INVALID_CHOICE",
            GameError::QuestionUnavailable { .. } => "QUESTION_UNAVAILABLE",
            GameError::InvalidConfig(_) => "INVALID_CONFIG",
            GameError::ConfigParse(_) => "CONFIG_PARSE",
        }
    }

    /// Whether the error ends run setup or the run itself
    pub fn is_fatal(&self) -> bool {
        matches!(
            self,
            GameError::MalformedRecord { .. }
                | GameError::QuestionUnavailable { .. }
                | GameError::InvalidConfig(_)
                | GameError::ConfigParse(_)
        )
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_codes_and_fatality() {
        let err = GameError::MalformedRecord {
            line: 3,
            fault: RecordFault::FieldCount { found: 4 },
        };
        assert_eq!(err.code(), "MALFORMED_RECORD");
        assert!(err.is_fatal());
        assert!(err.to_string().contains("line 3"));
        assert!(err.to_string().contains("found 4"));

        let warn = GameError::InsufficientQuestions {
            requested: 10,
            available: 3,
        };
        assert!(!warn.is_fatal());
        assert!(!GameError::StaleCallback { epoch: 0, current: 1 }.is_fatal());
        assert!(GameError::QuestionUnavailable { asked: 0, queued: 0 }.is_fatal());
    }

    #[test]
    fn test_config_parse_from_serde() {
        let err: GameError = serde_json::from_str::<u32>("nope").unwrap_err().into();
        assert_eq!(err.code(), "CONFIG_PARSE");
    }
}
