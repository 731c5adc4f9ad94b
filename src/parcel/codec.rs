//! # Frame codec shared by both ends of the sink pipe.
//!
//! Each parcel travels as one length-delimited frame: a 4-byte big-endian
//! length followed by the JSON body. Both sides build their codec with the
//! same `max_parcel_bytes`, so an oversized parcel is refused by the producer
//! before it is queued and could never be half-read by the sink.

use bytes::Bytes;
use tokio_util::codec::LengthDelimitedCodec;

use super::Parcel;
use crate::error::SendError;

/// Default upper bound for one encoded parcel (1 MiB).
pub const DEFAULT_MAX_PARCEL_BYTES: usize = 1 << 20;

/// Builds the length-delimited codec used on the pipe.
pub fn frame_codec(max_parcel_bytes: usize) -> LengthDelimitedCodec {
    LengthDelimitedCodec::builder()
        .length_field_length(4)
        .big_endian()
        .max_frame_length(max_parcel_bytes)
        .new_codec()
}

/// Encodes a parcel into a frame body, enforcing the size limit.
pub fn encode(parcel: &Parcel, limit: usize) -> Result<Bytes, SendError> {
    let body = serde_json::to_vec(parcel)?;
    if body.len() > limit {
        return Err(SendError::ParcelTooLarge {
            size: body.len(),
            limit,
        });
    }
    Ok(Bytes::from(body))
}

/// Decodes one frame body.
pub fn decode(frame: &[u8]) -> Result<Parcel, serde_json::Error> {
    serde_json::from_slice(frame)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::Level;

    #[test]
    fn test_encode_rejects_oversized() {
        let parcel = Parcel::record(Level::INFO, "x".repeat(64));
        match encode(&parcel, 32) {
            Err(SendError::ParcelTooLarge { size, limit }) => {
                assert!(size > 64);
                assert_eq!(limit, 32);
            }
            other => panic!("expected ParcelTooLarge, got {other:?}"),
        }
    }

    #[test]
    fn test_decode_encoded_frame() {
        let parcel = Parcel::record(Level::WARNING, "disk almost full");
        let frame = encode(&parcel, DEFAULT_MAX_PARCEL_BYTES).unwrap();
        assert_eq!(decode(&frame).unwrap(), parcel);
    }
}
