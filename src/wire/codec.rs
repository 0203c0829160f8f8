//! Encode/decode and frame pack/unpack for the wire records in [`super::types`].
//!
//! Every record in `types` is `Unaligned + FromBytes + IntoBytes`, so encoding
//! and decoding really is a pure byte copy — `zerocopy` gives us that without
//! reaching for `unsafe` transmutes ourselves.

use zerocopy::{FromBytes, Immutable, IntoBytes, KnownLayout, Unaligned};

use crate::error::CodecError;
use crate::wire::types::{Header, MAX_FRAME, PROTOCOL_VERSION};

/// Emits exactly `size_of::<T>()` bytes in wire byte order.
pub fn encode<T>(record: &T) -> Vec<u8>
where
    T: IntoBytes + Immutable,
{
    record.as_bytes().to_vec()
}

/// Decodes a `T` from the front of `bytes`. Fails with [`CodecError::ShortBuffer`]
/// if fewer than `size_of::<T>()` bytes are available.
pub fn decode<T>(bytes: &[u8]) -> Result<T, CodecError>
where
    T: FromBytes + KnownLayout + Immutable + Unaligned + Copy,
{
    T::read_from_bytes(bytes).map_err(|_| CodecError::ShortBuffer {
        need: core::mem::size_of::<T>(),
        have: bytes.len(),
    })
}

/// Sets `header.size` to the total frame length and concatenates header + body.
pub fn pack<B>(mut header: Header, body: &B) -> Vec<u8>
where
    B: IntoBytes + Immutable,
{
    let total = core::mem::size_of::<Header>() + core::mem::size_of::<B>();
    header.size = (total as u16).into();

    let mut out = Vec::with_capacity(total);
    out.extend_from_slice(header.as_bytes());
    out.extend_from_slice(body.as_bytes());
    out
}

/// A decoded header paired with the raw body bytes, borrowed from the input.
pub struct FrameView<'a> {
    pub header: Header,
    pub body: &'a [u8],
}

/// Splits a raw frame into header and body view. Fails with
/// [`CodecError::ShortFrame`] if shorter than the header, or
/// [`CodecError::SizeMismatch`] if `header.size` disagrees with the actual
/// frame length.
pub fn unpack_frame(frame: &[u8]) -> Result<FrameView<'_>, CodecError> {
    let header_len = core::mem::size_of::<Header>();
    if frame.len() < header_len {
        return Err(CodecError::ShortFrame {
            need: header_len,
            have: frame.len(),
        });
    }

    let header: Header = decode(&frame[..header_len])?;
    let declared = u16::from(header.size) as usize;
    if declared != frame.len() {
        return Err(CodecError::SizeMismatch {
            declared,
            actual: frame.len(),
        });
    }

    Ok(FrameView {
        header,
        body: &frame[header_len..],
    })
}

/// Decodes `body` as a `T`, requiring an exact length match (not merely
/// "at least", unlike [`decode`]).
pub fn decode_body<T>(body: &[u8]) -> Result<T, CodecError>
where
    T: FromBytes + KnownLayout + Immutable + Unaligned + Copy,
{
    let expected = core::mem::size_of::<T>();
    if body.len() != expected {
        return Err(CodecError::BodyLengthMismatch {
            expected,
            actual: body.len(),
        });
    }
    decode(body)
}

/// Validates `header.version` against [`PROTOCOL_VERSION`].
pub fn check_version(header: &Header) -> Result<(), CodecError> {
    if header.version != PROTOCOL_VERSION {
        return Err(CodecError::VersionMismatch {
            expected: PROTOCOL_VERSION,
            actual: header.version,
        });
    }
    Ok(())
}

/// Validates a header's declared `size`: the body portion must fit within
/// `[0, MAX_FRAME]`.
pub fn check_frame_size(header: &Header) -> Result<usize, CodecError> {
    let header_len = core::mem::size_of::<Header>();
    let declared = u16::from(header.size) as usize;
    if declared < header_len {
        return Err(CodecError::ShortFrame {
            need: header_len,
            have: declared,
        });
    }
    let body_len = declared - header_len;
    if body_len > MAX_FRAME {
        return Err(CodecError::OversizeFrame {
            body_len,
            max: MAX_FRAME,
        });
    }
    Ok(body_len)
}
