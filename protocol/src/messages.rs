use prost::bytes::Bytes;

/// Instruction codes carried in [`BaseCommand::instruction`].
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, PartialOrd, Ord, prost::Enumeration)]
#[repr(i32)]
pub enum Instruction {
    Unspecified = 0,
    Ping = 1,
    Pong = 2,
    Update = 3,
    Create = 4,
    Remove = 5,
    Rename = 6,
    Move = 7,
    EntryFile = 8,
    Reload = 9,
    IpAddress = 10,
    Log = 11,
    Error = 12,
}

#[derive(Clone, PartialEq, prost::Message)]
pub struct BaseCommand {
    #[prost(uint32, tag = "1")]
    pub version: u32,
    #[prost(string, tag = "2")]
    pub serial_number: String,
    #[prost(enumeration = "Instruction", tag = "3")]
    pub instruction: i32,
}

/// Header-only view of any command message. Unknown fields are skipped.
#[derive(Clone, PartialEq, prost::Message)]
pub struct MessageHeader {
    #[prost(message, optional, tag = "1")]
    pub basecommand: Option<BaseCommand>,
}

#[derive(Clone, PartialEq, prost::Message)]
pub struct PingCommand {
    #[prost(message, optional, tag = "1")]
    pub basecommand: Option<BaseCommand>,
}

#[derive(Clone, PartialEq, prost::Message)]
pub struct PongCommand {
    #[prost(message, optional, tag = "1")]
    pub basecommand: Option<BaseCommand>,
}

#[derive(Clone, PartialEq, prost::Message)]
pub struct UpdateCommand {
    #[prost(message, optional, tag = "1")]
    pub basecommand: Option<BaseCommand>,
    #[prost(string, tag = "2")]
    pub file_path: String,
    #[prost(string, tag = "3")]
    pub relative_file_path: String,
    #[prost(bytes = "bytes", tag = "4")]
    pub file_data: Bytes,
}

#[derive(Clone, PartialEq, prost::Message)]
pub struct CreateCommand {
    #[prost(message, optional, tag = "1")]
    pub basecommand: Option<BaseCommand>,
    #[prost(string, tag = "2")]
    pub file_path: String,
    #[prost(string, tag = "3")]
    pub relative_file_path: String,
    #[prost(bytes = "bytes", tag = "4")]
    pub file_data: Bytes,
}

#[derive(Clone, PartialEq, prost::Message)]
pub struct RemoveCommand {
    #[prost(message, optional, tag = "1")]
    pub basecommand: Option<BaseCommand>,
    #[prost(string, tag = "2")]
    pub file_path: String,
    #[prost(string, tag = "3")]
    pub relative_file_path: String,
}

#[derive(Clone, PartialEq, prost::Message)]
pub struct RenameCommand {
    #[prost(message, optional, tag = "1")]
    pub basecommand: Option<BaseCommand>,
    #[prost(string, tag = "2")]
    pub old_file_path: String,
    #[prost(string, tag = "3")]
    pub old_relative_file_path: String,
    #[prost(string, tag = "4")]
    pub new_file_path: String,
    #[prost(string, tag = "5")]
    pub new_relative_file_path: String,
}

#[derive(Clone, PartialEq, prost::Message)]
pub struct MoveCommand {
    #[prost(message, optional, tag = "1")]
    pub basecommand: Option<BaseCommand>,
    #[prost(string, tag = "2")]
    pub old_file_path: String,
    #[prost(string, tag = "3")]
    pub old_relative_file_path: String,
    #[prost(string, tag = "4")]
    pub new_file_path: String,
    #[prost(string, tag = "5")]
    pub new_relative_file_path: String,
}

#[derive(Clone, PartialEq, prost::Message)]
pub struct EntryFileCommand {
    #[prost(message, optional, tag = "1")]
    pub basecommand: Option<BaseCommand>,
    #[prost(string, tag = "2")]
    pub entry_file_path: String,
    #[prost(string, tag = "3")]
    pub relative_entry_file_path: String,
    #[prost(string, tag = "4")]
    pub params: String,
}

#[derive(Clone, PartialEq, prost::Message)]
pub struct ReloadCommand {
    #[prost(message, optional, tag = "1")]
    pub basecommand: Option<BaseCommand>,
    #[prost(uint64, tag = "2")]
    pub serial_num: u64,
}

#[derive(Clone, PartialEq, prost::Message)]
pub struct IpAddressCommand {
    #[prost(message, optional, tag = "1")]
    pub basecommand: Option<BaseCommand>,
    #[prost(string, tag = "2")]
    pub mac_ip_address: String,
}

#[derive(Clone, PartialEq, prost::Message)]
pub struct LogCommand {
    #[prost(message, optional, tag = "1")]
    pub basecommand: Option<BaseCommand>,
    #[prost(string, tag = "2")]
    pub log: String,
}

#[derive(Clone, PartialEq, prost::Message)]
pub struct ErrorCommand {
    #[prost(message, optional, tag = "1")]
    pub basecommand: Option<BaseCommand>,
    #[prost(string, tag = "2")]
    pub error: String,
}
