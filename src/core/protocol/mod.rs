// src/core/protocol/mod.rs

mod frame;

pub use frame::{
    FRAME_LEN, Frame, FrameCodec, KEY_LEN, OperationTag, Status, VALUE_LEN, clamp,
};
pub(crate) use frame::{put_padded, take_terminated};
