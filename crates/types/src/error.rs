//! Wire-level error types using snafu.

use snafu::Snafu;

/// Errors produced while decoding length-prefixed wire data.
///
/// These surface from [`crate::wire`] and are mapped to richer errors
/// (e.g. `InvalidBatch`) by the callers that know what was being decoded.
#[derive(Debug, Snafu, PartialEq, Eq)]
#[snafu(visibility(pub))]
pub enum WireError {
    /// The input ended before the declared field could be read in full.
    #[snafu(display("Input truncated: needed {needed} more bytes reading {context}"))]
    UnexpectedEnd {
        /// Bytes still required.
        needed: usize,
        /// What was being decoded.
        context: &'static str,
    },

    /// A length prefix was negative.
    #[snafu(display("Negative length {length} reading {context}"))]
    NegativeLength {
        /// The declared length.
        length: i32,
        /// What was being decoded.
        context: &'static str,
    },

    /// A string field contained invalid UTF-8.
    #[snafu(display("Invalid UTF-8 in {context}"))]
    InvalidUtf8 {
        /// What was being decoded.
        context: &'static str,
    },
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_wire_error_display() {
        let err = WireError::UnexpectedEnd { needed: 4, context: "xid" };
        assert_eq!(err.to_string(), "Input truncated: needed 4 more bytes reading xid");
    }
}
