use crate::link::LinkError;
use crate::protocol::MatchStatus;
use hmilock_hal::HalError;
use thiserror::Error;

#[derive(Debug, Error, Clone, Eq, PartialEq)]
pub enum HmiError {
    #[error("hardware error: {0}")]
    Hal(#[from] HalError),
    #[error("link error: {0}")]
    Link(#[from] LinkError),
    #[error("expected verdict {expected:?}, got {got:?}")]
    UnexpectedVerdict {
        expected: MatchStatus,
        got: MatchStatus,
    },
}

impl HmiError {
    /// Whether the session can show the fault and carry on from the menu.
    ///
    /// Hardware failures, a vanished link and cancellation are not.
    pub fn is_recoverable(&self) -> bool {
        matches!(
            self,
            HmiError::UnexpectedVerdict { .. }
                | HmiError::Link(LinkError::UnknownOpcode(_))
                | HmiError::Link(LinkError::InvalidDigit(_))
                | HmiError::Link(LinkError::TimedOut(_))
        )
    }

    pub fn is_cancelled(&self) -> bool {
        matches!(self, HmiError::Link(LinkError::Cancelled))
    }
}

pub type HmiResult<T> = Result<T, HmiError>;
