// Command set, argument/reply shapes and the fixed-layout payload codec.
//
// Request body:  [commandId][slotId][argument bytes]
// Response body: [commandId][reply bytes]  or  [0x80 | commandId][rejection code]

use super::wire::{
    pack_bool, pack_f32, pack_i16, pack_i32, take, unpack_bool, unpack_f32, unpack_i16,
    unpack_i32,
};
use crate::motor::{InterfaceKind, StepperConfig};

/// Set on the command byte of a rejection response
pub const REJECT_FLAG: u8 = 0x80;

/// Command identifiers. These values are the wire contract and never change.
#[repr(u8)]
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum CommandId {
    Create = 0x01,
    Delete = 0x02,
    MoveTo = 0x03,
    Move = 0x04,
    SetMaxSpeed = 0x05,
    MaxSpeed = 0x06,
    SetAcceleration = 0x07,
    Acceleration = 0x08,
    SetSpeed = 0x09,
    Speed = 0x0A,
    DistanceToGo = 0x0B,
    TargetPosition = 0x0C,
    CurrentPosition = 0x0D,
    SetCurrentPosition = 0x0E,
    Stop = 0x0F,
    DisableOutputs = 0x10,
    EnableOutputs = 0x11,
    IsRunning = 0x12,
    StartRun = 0x13,
    StartRunSpeed = 0x14,
    StopRun = 0x15,
}

impl CommandId {
    pub const ALL: [CommandId; 21] = [
        CommandId::Create,
        CommandId::Delete,
        CommandId::MoveTo,
        CommandId::Move,
        CommandId::SetMaxSpeed,
        CommandId::MaxSpeed,
        CommandId::SetAcceleration,
        CommandId::Acceleration,
        CommandId::SetSpeed,
        CommandId::Speed,
        CommandId::DistanceToGo,
        CommandId::TargetPosition,
        CommandId::CurrentPosition,
        CommandId::SetCurrentPosition,
        CommandId::Stop,
        CommandId::DisableOutputs,
        CommandId::EnableOutputs,
        CommandId::IsRunning,
        CommandId::StartRun,
        CommandId::StartRunSpeed,
        CommandId::StopRun,
    ];

    /// Layout of the argument bytes following the slot id
    pub const fn arg_shape(self) -> ArgShape {
        match self {
            CommandId::Create => ArgShape::Create,
            CommandId::MoveTo | CommandId::Move | CommandId::SetCurrentPosition => ArgShape::I32,
            CommandId::SetMaxSpeed | CommandId::SetAcceleration | CommandId::SetSpeed => {
                ArgShape::F32
            }
            _ => ArgShape::None,
        }
    }

    /// Layout of the reply payload
    pub const fn reply_shape(self) -> ReplyShape {
        match self {
            CommandId::MaxSpeed | CommandId::Acceleration | CommandId::Speed => ReplyShape::F32,
            CommandId::DistanceToGo | CommandId::TargetPosition | CommandId::CurrentPosition => {
                ReplyShape::I32
            }
            CommandId::IsRunning => ReplyShape::Bool,
            _ => ReplyShape::None,
        }
    }
}

impl TryFrom<u8> for CommandId {
    type Error = DecodeError;

    fn try_from(value: u8) -> Result<Self, Self::Error> {
        // Ids are dense from 0x01
        CommandId::ALL
            .get((value as usize).wrapping_sub(1))
            .copied()
            .ok_or(DecodeError::UnknownCommand(value))
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ArgShape {
    None,
    I16,
    I32,
    F32,
    Create,
}

impl ArgShape {
    pub const fn width(self) -> usize {
        match self {
            ArgShape::None => 0,
            ArgShape::I16 => 2,
            ArgShape::I32 | ArgShape::F32 => 4,
            ArgShape::Create => 6,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ReplyShape {
    None,
    Bool,
    I16,
    I32,
    F32,
}

impl ReplyShape {
    pub const fn width(self) -> usize {
        match self {
            ReplyShape::None => 0,
            ReplyShape::Bool => 1,
            ReplyShape::I16 => 2,
            ReplyShape::I32 | ReplyShape::F32 => 4,
        }
    }
}

/// Typed argument of a decoded command
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum Argument {
    None,
    I16(i16),
    I32(i32),
    F32(f32),
    Create(StepperConfig),
}

/// A decoded request
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Command {
    pub id: CommandId,
    pub slot: u8,
    pub argument: Argument,
}

/// Typed result of a command
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum Reply {
    None,
    Bool(bool),
    I16(i16),
    I32(i32),
    F32(f32),
}

impl Reply {
    pub fn shape(&self) -> ReplyShape {
        match self {
            Reply::None => ReplyShape::None,
            Reply::Bool(_) => ReplyShape::Bool,
            Reply::I16(_) => ReplyShape::I16,
            Reply::I32(_) => ReplyShape::I32,
            Reply::F32(_) => ReplyShape::F32,
        }
    }
}

/// Why a command was refused. Values are the wire code.
#[repr(u8)]
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Rejection {
    InvalidSlot = 0x01,
    EngineAbsent = 0x02,
    Truncated = 0x03,
    UnsupportedInterface = 0x04,
}

impl TryFrom<u8> for Rejection {
    type Error = DecodeError;

    fn try_from(value: u8) -> Result<Self, Self::Error> {
        match value {
            0x01 => Ok(Rejection::InvalidSlot),
            0x02 => Ok(Rejection::EngineAbsent),
            0x03 => Ok(Rejection::Truncated),
            0x04 => Ok(Rejection::UnsupportedInterface),
            other => Err(DecodeError::UnknownRejection(other)),
        }
    }
}

/// A response, always correlated to the command that produced it
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum Response {
    Ok { id: CommandId, reply: Reply },
    Rejected { id: CommandId, reason: Rejection },
}

impl Response {
    pub fn id(&self) -> CommandId {
        match self {
            Response::Ok { id, .. } | Response::Rejected { id, .. } => *id,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, thiserror::Error)]
pub enum DecodeError {
    #[error("empty body")]
    Empty,

    #[error("unknown command 0x{0:02X}")]
    UnknownCommand(u8),

    #[error("command {0:?} is missing its slot id")]
    MissingSlot(CommandId),

    #[error("command {id:?} needs {expected} argument bytes, got {actual}")]
    Truncated {
        id: CommandId,
        expected: usize,
        actual: usize,
    },

    #[error("unsupported interface kind {0}")]
    UnsupportedInterface(u8),

    #[error("unknown rejection code 0x{0:02X}")]
    UnknownRejection(u8),
}

impl DecodeError {
    /// Wire rejection for decode failures that still identify a command
    pub fn rejection(&self) -> Option<Rejection> {
        match self {
            DecodeError::MissingSlot(_) | DecodeError::Truncated { .. } => {
                Some(Rejection::Truncated)
            }
            DecodeError::UnsupportedInterface(_) => Some(Rejection::UnsupportedInterface),
            _ => None,
        }
    }
}

/// Decode a request. `data` starts at the slot id byte.
pub fn decode_command(command_id: u8, data: &[u8]) -> Result<Command, DecodeError> {
    let id = CommandId::try_from(command_id)?;
    let (&slot, args) = data.split_first().ok_or(DecodeError::MissingSlot(id))?;

    let shape = id.arg_shape();
    let truncated = || DecodeError::Truncated {
        id,
        expected: shape.width(),
        actual: args.len(),
    };

    let argument = match shape {
        ArgShape::None => Argument::None,
        ArgShape::I16 => Argument::I16(unpack_i16(take(args, 0).ok_or_else(truncated)?)),
        ArgShape::I32 => Argument::I32(unpack_i32(take(args, 0).ok_or_else(truncated)?)),
        ArgShape::F32 => Argument::F32(unpack_f32(take(args, 0).ok_or_else(truncated)?)),
        ArgShape::Create => {
            let raw: [u8; 6] = take(args, 0).ok_or_else(truncated)?;
            let interface =
                InterfaceKind::try_from(raw[0]).map_err(DecodeError::UnsupportedInterface)?;
            Argument::Create(StepperConfig {
                interface,
                pins: [raw[1], raw[2], raw[3], raw[4]],
                enable_invert: raw[5] != 0,
            })
        }
    };

    Ok(Command { id, slot, argument })
}

/// Encode a request body, the inverse of `decode_command`
pub fn encode_command(command: &Command) -> Vec<u8> {
    let mut body = Vec::with_capacity(2 + command.id.arg_shape().width());
    body.push(command.id as u8);
    body.push(command.slot);
    match command.argument {
        Argument::None => {}
        Argument::I16(v) => body.extend_from_slice(&pack_i16(v)),
        Argument::I32(v) => body.extend_from_slice(&pack_i32(v)),
        Argument::F32(v) => body.extend_from_slice(&pack_f32(v)),
        Argument::Create(config) => {
            body.push(config.interface as u8);
            body.extend_from_slice(&config.pins);
            body.push(config.enable_invert as u8);
        }
    }
    body
}

/// Encode only the reply payload bytes
pub fn encode_reply(reply: &Reply) -> Vec<u8> {
    match *reply {
        Reply::None => Vec::new(),
        Reply::Bool(v) => pack_bool(v).to_vec(),
        Reply::I16(v) => pack_i16(v).to_vec(),
        Reply::I32(v) => pack_i32(v).to_vec(),
        Reply::F32(v) => pack_f32(v).to_vec(),
    }
}

/// Decode a reply payload of a known shape
pub fn decode_reply(
    id: CommandId,
    shape: ReplyShape,
    payload: &[u8],
) -> Result<Reply, DecodeError> {
    let truncated = || DecodeError::Truncated {
        id,
        expected: shape.width(),
        actual: payload.len(),
    };
    Ok(match shape {
        ReplyShape::None => Reply::None,
        ReplyShape::Bool => Reply::Bool(unpack_bool(take(payload, 0).ok_or_else(truncated)?)),
        ReplyShape::I16 => Reply::I16(unpack_i16(take(payload, 0).ok_or_else(truncated)?)),
        ReplyShape::I32 => Reply::I32(unpack_i32(take(payload, 0).ok_or_else(truncated)?)),
        ReplyShape::F32 => Reply::F32(unpack_f32(take(payload, 0).ok_or_else(truncated)?)),
    })
}

/// Encode a response body
pub fn encode_response(response: &Response) -> Vec<u8> {
    match response {
        Response::Ok { id, reply } => {
            let mut body = Vec::with_capacity(1 + reply.shape().width());
            body.push(*id as u8);
            body.extend_from_slice(&encode_reply(reply));
            body
        }
        Response::Rejected { id, reason } => vec![*id as u8 | REJECT_FLAG, *reason as u8],
    }
}

/// Decode a response body, using the command's fixed reply shape
pub fn decode_response(body: &[u8]) -> Result<Response, DecodeError> {
    let (&head, payload) = body.split_first().ok_or(DecodeError::Empty)?;
    let id = CommandId::try_from(head & !REJECT_FLAG)?;

    if head & REJECT_FLAG != 0 {
        let code = payload.first().copied().ok_or(DecodeError::Truncated {
            id,
            expected: 1,
            actual: 0,
        })?;
        return Ok(Response::Rejected {
            id,
            reason: Rejection::try_from(code)?,
        });
    }

    let reply = decode_reply(id, id.reply_shape(), payload)?;
    Ok(Response::Ok { id, reply })
}
