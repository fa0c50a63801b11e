//! Typed commands exchanged with the development host.
//!
//! [`Command`] is a closed set. Anything the codec cannot map to a known
//! variant because of an unrecognized instruction code becomes
//! [`Command::Unsupported`], so newer hosts never crash older receivers.

use prost::bytes::Bytes;

/// A file location as the development host sees it: absolute on the host
/// machine, and relative to the project root.
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub struct FilePath {
    pub absolute: String,
    pub relative: String,
}

impl FilePath {
    pub fn new(absolute: impl Into<String>, relative: impl Into<String>) -> Self {
        Self {
            absolute: absolute.into(),
            relative: relative.into(),
        }
    }
}

/// Script entry point plus the launch parameters that go with it.
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub struct EntryDescriptor {
    pub entry: FilePath,
    pub params: String,
}

impl EntryDescriptor {
    pub fn new(
        absolute: impl Into<String>,
        relative: impl Into<String>,
        params: impl Into<String>,
    ) -> Self {
        Self {
            entry: FilePath::new(absolute, relative),
            params: params.into(),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Command {
    FileUpdate { file: FilePath, data: Bytes },
    FileCreate { file: FilePath, data: Bytes },
    FileRemove { file: FilePath },
    FileRename { from: FilePath, to: FilePath },
    FileMove { from: FilePath, to: FilePath },
    EntryFile(EntryDescriptor),
    Reload { serial_num: u64 },
    IpAddressChanged { address: String },
    Log { text: String },
    Error { text: String },
    Ping,
    Pong,
    /// A message frame whose instruction code this build does not know.
    ///
    /// Only unknown codes and `0` can be encoded back onto the wire.
    Unsupported { instruction: i32 },
}

impl Command {
    /// Short name used in log lines and dispatch errors.
    pub fn name(&self) -> &'static str {
        match self {
            Command::FileUpdate { .. } => "FileUpdate",
            Command::FileCreate { .. } => "FileCreate",
            Command::FileRemove { .. } => "FileRemove",
            Command::FileRename { .. } => "FileRename",
            Command::FileMove { .. } => "FileMove",
            Command::EntryFile(_) => "EntryFile",
            Command::Reload { .. } => "Reload",
            Command::IpAddressChanged { .. } => "IpAddressChanged",
            Command::Log { .. } => "Log",
            Command::Error { .. } => "Error",
            Command::Ping => "Ping",
            Command::Pong => "Pong",
            Command::Unsupported { .. } => "Unsupported",
        }
    }
}
