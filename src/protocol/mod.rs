// Stepper command protocol
//
// Provides:
// - Little-endian packing of wire numbers
// - The 21-command set with fixed argument and reply layouts
// - Request/response body codec

pub mod command;
pub mod wire;

pub use command::{
    decode_command, decode_reply, decode_response, encode_command, encode_reply,
    encode_response, ArgShape, Argument, Command, CommandId, DecodeError, Rejection, Reply,
    ReplyShape, Response, REJECT_FLAG,
};
