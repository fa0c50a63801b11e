use common::ErrorLocation;

use std::panic::Location;

use thiserror::Error as ThisError;

/// A frame that could not be turned into a [`Command`](crate::command::Command), or a
/// command that cannot be framed.
///
/// Unknown instruction codes are not errors; they decode to
/// [`Command::Unsupported`](crate::command::Command::Unsupported).
#[derive(Debug, ThisError)]
pub enum CodecError {
    #[error("Unknown Frame Type Error: tag {tag:#04x} {location}")]
    UnknownFrameType { tag: u8, location: ErrorLocation },

    #[error("Missing Header Error: {message} {location}")]
    MissingHeader {
        message: String,
        location: ErrorLocation,
    },

    #[error("Unencodable Instruction Error: {instruction} has a typed command {location}")]
    UnencodableInstruction {
        instruction: i32,
        location: ErrorLocation,
    },

    #[error("Protobuf Decode Error: {message} {location}")]
    ProtobufDecode {
        message: String,
        location: ErrorLocation,
    },
}

impl From<prost::DecodeError> for CodecError {
    #[track_caller]
    fn from(error: prost::DecodeError) -> Self {
        CodecError::ProtobufDecode {
            message: error.to_string(),
            location: ErrorLocation::from(Location::caller()),
        }
    }
}
