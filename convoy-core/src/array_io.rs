//! `.npy` encoding helpers
//!
//! Arrays are encoded to an in-memory buffer first so callers can
//! checksum exactly the bytes that hit the disk.

use bytes::Bytes;
use ndarray::{ArrayBase, Data, Dimension};
use ndarray_npy::{ReadNpyExt, WritableElement, WriteNpyExt};
use std::path::Path;

use crate::error::{ConvoyError, Result};

/// Encode an array in `.npy` format
pub fn encode<A, S, D>(array: &ArrayBase<S, D>, path: &Path) -> Result<Bytes>
where
    A: WritableElement,
    S: Data<Elem = A>,
    D: Dimension,
{
    let mut buf = Vec::new();
    array.write_npy(&mut buf).map_err(|e| ConvoyError::Npy {
        path: path.to_path_buf(),
        reason: e.to_string(),
    })?;
    Ok(Bytes::from(buf))
}

/// Decode `.npy` bytes previously read from `path`
pub fn decode<T: ReadNpyExt>(data: &[u8], path: &Path) -> Result<T> {
    T::read_npy(data).map_err(|e| ConvoyError::Npy {
        path: path.to_path_buf(),
        reason: e.to_string(),
    })
}

/// Read a whole file into a zero-copy buffer
pub fn read_bytes(path: &Path) -> std::io::Result<Bytes> {
    std::fs::read(path).map(Bytes::from)
}

#[cfg(test)]
mod tests {
    use super::*;
    use ndarray::{arr2, Array2};

    #[test]
    fn test_encode_decode() {
        let path = Path::new("mem.npy");
        let a = arr2(&[[1.0f32, -2.5], [3.25, f32::MIN_POSITIVE]]);
        let bytes = encode(&a, path).unwrap();
        assert!(bytes.starts_with(b"\x93NUMPY"));

        let b: Array2<f32> = decode(&bytes, path).unwrap();
        assert_eq!(a, b);
    }

    #[test]
    fn test_decode_garbage() {
        let err = decode::<Array2<f32>>(b"not an array", Path::new("bad.npy")).unwrap_err();
        assert!(matches!(err, ConvoyError::Npy { .. }));
    }
}
