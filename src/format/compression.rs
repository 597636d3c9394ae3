use std::io::Read;

use bytes::Bytes;
use flate2::read::GzDecoder;

use super::header::Compression;
use crate::error::DecodeError;

/// Undo `compression` on `data`.
///
/// Uncompressed data is passed through without copying.
pub fn decompress(data: Bytes, compression: Compression) -> Result<Bytes, DecodeError> {
    match compression {
        Compression::None => Ok(data),
        Compression::Gzip => {
            let mut out = Vec::with_capacity(data.len() * 2);
            GzDecoder::new(&data[..])
                .read_to_end(&mut out)
                .map_err(|e| DecodeError::Decompress(e.to_string()))?;
            Ok(Bytes::from(out))
        }
        other => Err(DecodeError::Decompress(format!(
            "{} is not supported",
            other.as_str()
        ))),
    }
}
