//! Definite length binary blocks as returned by `:WAV:DATA?`.
//!
//! A block starts with `#`, followed by a single digit `N` and then `N` decimal digits that give
//! the number of payload bytes. The payload follows and the instrument terminates the whole
//! response with its usual line terminator, e.g.:
//!
//! ```text
//! #9000001200<1200 bytes of sample codes>\n
//! ```

use benchlink::{InstrumentError, InstrumentInterface};
use thiserror::Error;

/// Largest payload a DS1000Z can send, its deep memory depth of 24 Mpts at one byte per point.
pub const MAX_BLOCK_LEN: usize = 24_000_000;

/// Errors that can occur while reading a binary block.
#[derive(Debug, Error)]
#[non_exhaustive]
pub enum BlockError {
    /// The interface failed while reading.
    #[error(transparent)]
    Transport(#[from] InstrumentError),
    /// The length header could not be parsed.
    #[error("Malformed block header: {0}")]
    MalformedHeader(String),
    /// The instrument stopped sending before the declared length was reached.
    #[error("Block truncated after {received} of {expected} payload bytes")]
    Truncated {
        /// Declared payload length.
        expected: usize,
        /// Bytes received before the instrument stopped sending.
        received: usize,
    },
}

/// Read a complete definite length block from the interface and return its payload.
///
/// The payload is accumulated over as many partial reads as the interface needs. After the
/// payload, the trailing line terminator is consumed so that the next query starts clean.
pub fn read_block<T: InstrumentInterface>(interface: &mut T) -> Result<Vec<u8>, BlockError> {
    let expected = read_header(interface)?;
    log::debug!("Reading binary block with {expected} payload bytes");

    let mut payload = vec![0u8; expected];
    let mut received = 0;
    while received < expected {
        let n = interface.read_chunk(&mut payload[received..])?;
        if n == 0 {
            return Err(BlockError::Truncated { expected, received });
        }
        received += n;
    }

    let mut trailer = [0u8];
    interface.read_exact(&mut trailer)?;
    if !interface.get_terminator().as_bytes().starts_with(&trailer) {
        log::warn!("Unexpected byte {:#04x} after binary block", trailer[0]);
    }

    Ok(payload)
}

/// Read the `#N<digits>` header and return the declared payload length.
///
/// Lengths above [`MAX_BLOCK_LEN`] are rejected before anything is allocated.
fn read_header<T: InstrumentInterface>(interface: &mut T) -> Result<usize, BlockError> {
    let mut byte = [0u8];
    interface.read_exact(&mut byte)?;
    if byte[0] != b'#' {
        return Err(BlockError::MalformedHeader(format!(
            "expected '#', got {:#04x}",
            byte[0]
        )));
    }

    interface.read_exact(&mut byte)?;
    let nof_digits = match byte[0] {
        b'1'..=b'9' => usize::from(byte[0] - b'0'),
        other => {
            return Err(BlockError::MalformedHeader(format!(
                "invalid length-of-length digit {:?}",
                char::from(other)
            )));
        }
    };

    let mut digits = vec![0u8; nof_digits];
    interface.read_exact(&mut digits)?;
    parse_length(&digits)
}

fn parse_length(digits: &[u8]) -> Result<usize, BlockError> {
    let text = std::str::from_utf8(digits)
        .map_err(|_| BlockError::MalformedHeader(format!("non-ASCII length {digits:?}")))?;
    if !text.bytes().all(|b| b.is_ascii_digit()) {
        return Err(BlockError::MalformedHeader(format!("invalid length {text:?}")));
    }
    let length: usize = text
        .parse()
        .map_err(|_| BlockError::MalformedHeader(format!("invalid length {text:?}")))?;
    if length > MAX_BLOCK_LEN {
        return Err(BlockError::MalformedHeader(format!(
            "length {length} exceeds the memory depth of {MAX_BLOCK_LEN} points"
        )));
    }
    Ok(length)
}
