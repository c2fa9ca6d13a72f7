// src/core/protocol/frame.rs

//! Implements the fixed-size wire frame exchanged with clients and peers, and
//! the corresponding `Encoder` and `Decoder` for network communication.
//!
//! Every request and response is exactly [`FRAME_LEN`] bytes: a little-endian
//! operation tag, a null-padded key buffer, a null-padded value buffer, and a
//! little-endian status word. The key and value buffers are always
//! null-terminated within their field, so their payload capacity is one byte
//! less than the field width; longer input is silently truncated.

use crate::core::BasaltError;
use bytes::{Buf, BufMut, Bytes, BytesMut};
use tokio_util::codec::{Decoder, Encoder};

/// Width of the fixed key buffer in a frame, terminator included.
pub const KEY_LEN: usize = 128;
/// Width of the fixed value buffer in a frame, terminator included.
pub const VALUE_LEN: usize = 1024;
/// Total size of one frame on the wire.
pub const FRAME_LEN: usize = 4 + KEY_LEN + VALUE_LEN + 4;

/// The operation requested by a frame.
///
/// Tags 1 through 7 are the client-facing operations. The bare `Replicate`
/// tag is retired: it does not say whether the embedded mutation was a put or
/// a delete, so nodes answer it with [`Status::UnknownOp`] and fan mutations
/// out with the two explicit replication tags instead.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[repr(u32)]
pub enum OperationTag {
    Get = 1,
    Put = 2,
    Delete = 3,
    Replicate = 4,
    NodeJoin = 5,
    NodeLeave = 6,
    ListKeys = 7,
    ReplicatePut = 8,
    ReplicateDelete = 9,
}

impl OperationTag {
    /// Maps a raw wire tag to an operation, or `None` for an unknown tag.
    pub fn from_wire(raw: u32) -> Option<Self> {
        match raw {
            1 => Some(Self::Get),
            2 => Some(Self::Put),
            3 => Some(Self::Delete),
            4 => Some(Self::Replicate),
            5 => Some(Self::NodeJoin),
            6 => Some(Self::NodeLeave),
            7 => Some(Self::ListKeys),
            8 => Some(Self::ReplicatePut),
            9 => Some(Self::ReplicateDelete),
            _ => None,
        }
    }
}

/// The response status carried in the last field of a frame.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[repr(i32)]
pub enum Status {
    /// Semantic failure: key absent, or the store is full.
    Fail = 0,
    Ok = 1,
    /// The key is owned by a different node under the current routing.
    Redirect = -1,
    UnknownOp = -2,
}

/// A single request/response record.
///
/// The tag is kept raw so that a frame with an unrecognized tag can still be
/// echoed back to the client with its buffers intact and status set to
/// [`Status::UnknownOp`].
#[derive(Debug, Clone, PartialEq)]
pub struct Frame {
    pub tag: u32,
    pub key: Bytes,
    pub value: Bytes,
    pub status: i32,
}

impl Frame {
    /// Builds a request frame. Requests leave the status unspecified; zero is
    /// written on the wire.
    pub fn request(tag: OperationTag, key: impl Into<Bytes>, value: impl Into<Bytes>) -> Self {
        Self {
            tag: tag as u32,
            key: clamp(key.into(), KEY_LEN),
            value: clamp(value.into(), VALUE_LEN),
            status: 0,
        }
    }

    /// The typed operation, or `None` when the tag is not recognized.
    pub fn op(&self) -> Option<OperationTag> {
        OperationTag::from_wire(self.tag)
    }

    pub fn set_status(&mut self, status: Status) {
        self.status = status as i32;
    }

    pub fn set_value(&mut self, value: impl Into<Bytes>) {
        self.value = clamp(value.into(), VALUE_LEN);
    }

    /// True when the response status equals `status`.
    pub fn has_status(&self, status: Status) -> bool {
        self.status == status as i32
    }
}

/// Truncates `data` so it fits a null-terminated buffer of `field` bytes.
pub fn clamp(data: Bytes, field: usize) -> Bytes {
    if data.len() > field - 1 {
        data.slice(..field - 1)
    } else {
        data
    }
}

/// Writes `data` into a fixed field of `field` bytes, null-padded. The last
/// byte of the field is always a terminator.
pub(crate) fn put_padded(dst: &mut BytesMut, data: &[u8], field: usize) {
    let len = data.len().min(field - 1);
    dst.put_slice(&data[..len]);
    dst.put_bytes(0, field - len);
}

/// Reads a fixed field of `field` bytes and returns the payload up to its
/// terminator.
pub(crate) fn take_terminated(buf: &mut Bytes, field: usize) -> Bytes {
    let raw = buf.split_to(field);
    let end = raw
        .iter()
        .position(|&b| b == 0)
        .unwrap_or(field - 1);
    raw.slice(..end)
}

/// A `tokio_util::codec` implementation for encoding and decoding [`Frame`]s.
#[derive(Debug, Default)]
pub struct FrameCodec;

impl Encoder<Frame> for FrameCodec {
    type Error = BasaltError;

    fn encode(&mut self, item: Frame, dst: &mut BytesMut) -> Result<(), Self::Error> {
        dst.reserve(FRAME_LEN);
        dst.put_u32_le(item.tag);
        put_padded(dst, &item.key, KEY_LEN);
        put_padded(dst, &item.value, VALUE_LEN);
        dst.put_i32_le(item.status);
        Ok(())
    }
}

impl Decoder for FrameCodec {
    type Item = Frame;
    type Error = BasaltError;

    fn decode(&mut self, src: &mut BytesMut) -> Result<Option<Frame>, Self::Error> {
        if src.len() < FRAME_LEN {
            return Ok(None);
        }
        let mut buf = src.split_to(FRAME_LEN).freeze();
        let tag = buf.get_u32_le();
        let key = take_terminated(&mut buf, KEY_LEN);
        let value = take_terminated(&mut buf, VALUE_LEN);
        let status = buf.get_i32_le();
        Ok(Some(Frame {
            tag,
            key,
            value,
            status,
        }))
    }

    /// A partial frame left in the buffer at EOF is a protocol error; the
    /// connection is dropped rather than answered.
    fn decode_eof(&mut self, src: &mut BytesMut) -> Result<Option<Frame>, Self::Error> {
        match self.decode(src)? {
            Some(frame) => Ok(Some(frame)),
            None if src.is_empty() => Ok(None),
            None => Err(BasaltError::IncompleteFrame),
        }
    }
}
