//! Conversion between [`Command`] values and wire [`Frame`]s.
//!
//! Ping and pong travel under their own frame tags. Everything else uses
//! [`MAGIC_MESSAGE`] and is told apart by the instruction code in the
//! [`BaseCommand`] header at the front of the payload.
//!
//! File contents are carried as [`Bytes`] and sliced straight out of the frame
//! payload on decode, never copied.

use crate::command::{Command, EntryDescriptor, FilePath};
use crate::error::CodecError;
use crate::transport::Frame;

use common::ErrorLocation;

use protocol::{
    BaseCommand, CreateCommand, EntryFileCommand, ErrorCommand, Instruction, IpAddressCommand,
    LogCommand, MAGIC_MESSAGE, MAGIC_PING, MAGIC_PONG, MessageHeader, MoveCommand,
    PROTOCOL_VERSION, PingCommand, PongCommand, ReloadCommand, RemoveCommand, RenameCommand,
    UpdateCommand,
};

use log::debug;
use prost::Message as ProstMessage;
use prost::bytes::Bytes;

/// Encode `command` into a frame, stamping `serial` into its header.
///
/// # Errors
///
/// Returns [`CodecError::UnencodableInstruction`] for a [`Command::Unsupported`]
/// whose code belongs to a known instruction. Sending it would reach the peer
/// as that instruction with every field empty.
pub fn encode(command: &Command, serial: &str) -> Result<Frame, CodecError> {
    let header = |instruction: i32| {
        Some(BaseCommand {
            version: PROTOCOL_VERSION,
            serial_number: serial.to_string(),
            instruction,
        })
    };

    let frame = match command {
        Command::Ping => Frame::new(
            MAGIC_PING,
            PingCommand {
                basecommand: header(Instruction::Ping as i32),
            }
            .encode_to_vec(),
        ),
        Command::Pong => Frame::new(
            MAGIC_PONG,
            PongCommand {
                basecommand: header(Instruction::Pong as i32),
            }
            .encode_to_vec(),
        ),
        Command::FileUpdate { file, data } => message(UpdateCommand {
            basecommand: header(Instruction::Update as i32),
            file_path: file.absolute.clone(),
            relative_file_path: file.relative.clone(),
            file_data: data.clone(),
        }),
        Command::FileCreate { file, data } => message(CreateCommand {
            basecommand: header(Instruction::Create as i32),
            file_path: file.absolute.clone(),
            relative_file_path: file.relative.clone(),
            file_data: data.clone(),
        }),
        Command::FileRemove { file } => message(RemoveCommand {
            basecommand: header(Instruction::Remove as i32),
            file_path: file.absolute.clone(),
            relative_file_path: file.relative.clone(),
        }),
        Command::FileRename { from, to } => message(RenameCommand {
            basecommand: header(Instruction::Rename as i32),
            old_file_path: from.absolute.clone(),
            old_relative_file_path: from.relative.clone(),
            new_file_path: to.absolute.clone(),
            new_relative_file_path: to.relative.clone(),
        }),
        Command::FileMove { from, to } => message(MoveCommand {
            basecommand: header(Instruction::Move as i32),
            old_file_path: from.absolute.clone(),
            old_relative_file_path: from.relative.clone(),
            new_file_path: to.absolute.clone(),
            new_relative_file_path: to.relative.clone(),
        }),
        Command::EntryFile(entry) => message(EntryFileCommand {
            basecommand: header(Instruction::EntryFile as i32),
            entry_file_path: entry.entry.absolute.clone(),
            relative_entry_file_path: entry.entry.relative.clone(),
            params: entry.params.clone(),
        }),
        Command::Reload { serial_num } => message(ReloadCommand {
            basecommand: header(Instruction::Reload as i32),
            serial_num: *serial_num,
        }),
        Command::IpAddressChanged { address } => message(IpAddressCommand {
            basecommand: header(Instruction::IpAddress as i32),
            mac_ip_address: address.clone(),
        }),
        Command::Log { text } => message(LogCommand {
            basecommand: header(Instruction::Log as i32),
            log: text.clone(),
        }),
        Command::Error { text } => message(ErrorCommand {
            basecommand: header(Instruction::Error as i32),
            error: text.clone(),
        }),
        Command::Unsupported { instruction } => {
            if !is_unsupported_code(*instruction) {
                return Err(CodecError::UnencodableInstruction {
                    instruction: *instruction,
                    location: ErrorLocation::caller(),
                });
            }
            message(MessageHeader {
                basecommand: header(*instruction),
            })
        }
    };

    Ok(frame)
}

/// Codes that decode to [`Command::Unsupported`]: unknown ones and `Unspecified`.
fn is_unsupported_code(instruction: i32) -> bool {
    matches!(
        Instruction::try_from(instruction),
        Err(_) | Ok(Instruction::Unspecified)
    )
}

/// Decode a frame received from the transport.
///
/// # Errors
///
/// - [`CodecError::UnknownFrameType`] - the tag is not ping, pong or message
/// - [`CodecError::MissingHeader`] - a message frame without a `BaseCommand`
/// - [`CodecError::ProtobufDecode`] - truncated or otherwise malformed payload
pub fn decode(frame: &Frame) -> Result<Command, CodecError> {
    match frame.tag {
        MAGIC_PING => {
            PingCommand::decode(frame.payload.clone())?;
            Ok(Command::Ping)
        }
        MAGIC_PONG => {
            PongCommand::decode(frame.payload.clone())?;
            Ok(Command::Pong)
        }
        MAGIC_MESSAGE => decode_message(frame.payload.clone()),
        tag => Err(CodecError::UnknownFrameType {
            tag,
            location: ErrorLocation::caller(),
        }),
    }
}

fn decode_message(payload: Bytes) -> Result<Command, CodecError> {
    let header = MessageHeader::decode(payload.clone())?;
    let base = header.basecommand.ok_or_else(|| CodecError::MissingHeader {
        message: format!("message frame of {} bytes has no base command", payload.len()),
        location: ErrorLocation::caller(),
    })?;

    let Ok(instruction) = Instruction::try_from(base.instruction) else {
        debug!("Ignoring unknown instruction code {}", base.instruction);
        return Ok(Command::Unsupported {
            instruction: base.instruction,
        });
    };

    let command = match instruction {
        Instruction::Update => {
            let cmd = UpdateCommand::decode(payload)?;
            Command::FileUpdate {
                file: FilePath::new(cmd.file_path, cmd.relative_file_path),
                data: cmd.file_data,
            }
        }
        Instruction::Create => {
            let cmd = CreateCommand::decode(payload)?;
            Command::FileCreate {
                file: FilePath::new(cmd.file_path, cmd.relative_file_path),
                data: cmd.file_data,
            }
        }
        Instruction::Remove => {
            let cmd = RemoveCommand::decode(payload)?;
            Command::FileRemove {
                file: FilePath::new(cmd.file_path, cmd.relative_file_path),
            }
        }
        Instruction::Rename => {
            let cmd = RenameCommand::decode(payload)?;
            Command::FileRename {
                from: FilePath::new(cmd.old_file_path, cmd.old_relative_file_path),
                to: FilePath::new(cmd.new_file_path, cmd.new_relative_file_path),
            }
        }
        Instruction::Move => {
            let cmd = MoveCommand::decode(payload)?;
            Command::FileMove {
                from: FilePath::new(cmd.old_file_path, cmd.old_relative_file_path),
                to: FilePath::new(cmd.new_file_path, cmd.new_relative_file_path),
            }
        }
        Instruction::EntryFile => {
            let cmd = EntryFileCommand::decode(payload)?;
            Command::EntryFile(EntryDescriptor::new(
                cmd.entry_file_path,
                cmd.relative_entry_file_path,
                cmd.params,
            ))
        }
        Instruction::Reload => {
            let cmd = ReloadCommand::decode(payload)?;
            Command::Reload {
                serial_num: cmd.serial_num,
            }
        }
        Instruction::IpAddress => {
            let cmd = IpAddressCommand::decode(payload)?;
            Command::IpAddressChanged {
                address: cmd.mac_ip_address,
            }
        }
        Instruction::Log => Command::Log {
            text: LogCommand::decode(payload)?.log,
        },
        Instruction::Error => Command::Error {
            text: ErrorCommand::decode(payload)?.error,
        },
        Instruction::Ping => Command::Ping,
        Instruction::Pong => Command::Pong,
        Instruction::Unspecified => Command::Unsupported {
            instruction: base.instruction,
        },
    };

    Ok(command)
}

fn message<M: ProstMessage>(payload: M) -> Frame {
    Frame::new(MAGIC_MESSAGE, payload.encode_to_vec())
}
