//! Errors of the oscilloscope driver.

use std::time::Duration;

use benchlink::InstrumentError;
use thiserror::Error;

use crate::{BlockError, PreambleError};

/// Everything that can go wrong while talking to the oscilloscope.
#[derive(Debug, Error)]
#[non_exhaustive]
pub enum ScopeError {
    /// There is no open connection to an oscilloscope.
    #[error("Oscilloscope is not connected")]
    NotConnected,
    /// A command or query failed at the link. Re-attempting the whole operation may help.
    #[error("Communication with the oscilloscope failed: {0}")]
    Transport(String),
    /// The oscilloscope answered with something the driver cannot interpret.
    #[error(transparent)]
    Protocol(#[from] ProtocolError),
    /// The trigger did not reach the stopped state within the given time.
    #[error("Trigger did not stop within {0:?}")]
    TriggerTimeout(Duration),
    /// An argument was rejected before anything was sent to the instrument.
    #[error(transparent)]
    Argument(#[from] InstrumentError),
}

impl ScopeError {
    /// Returns `true` if re-attempting the operation could succeed.
    ///
    /// Protocol errors point to a firmware or version mismatch and will not go away by retrying.
    pub fn is_retryable(&self) -> bool {
        matches!(self, ScopeError::Transport(_) | ScopeError::TriggerTimeout(_))
    }
}

impl From<BlockError> for ScopeError {
    fn from(value: BlockError) -> Self {
        match value {
            BlockError::Transport(e) => {
                ScopeError::Transport(format!("reading binary block failed: {e}"))
            }
            other => ScopeError::Protocol(ProtocolError::Block(other)),
        }
    }
}

impl From<PreambleError> for ScopeError {
    fn from(value: PreambleError) -> Self {
        ScopeError::Protocol(ProtocolError::Preamble(value))
    }
}

/// Malformed responses. These are not retryable.
#[derive(Debug, Error)]
#[non_exhaustive]
pub enum ProtocolError {
    /// The header or the payload of a binary block was malformed.
    #[error(transparent)]
    Block(BlockError),
    /// The waveform preamble could not be parsed.
    #[error(transparent)]
    Preamble(PreambleError),
    /// A query returned a value that could not be parsed.
    #[error("Could not parse response `{response}` to query `{query}`")]
    Response {
        /// The query that was sent.
        query: String,
        /// The response as received.
        response: String,
    },
}
