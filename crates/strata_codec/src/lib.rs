//! # StrataKV Codec
//!
//! Typed key/value encoding for the StrataKV storage layer.
//!
//! The storage layer treats keys and values as opaque byte buffers. This
//! crate provides the [`Encode`] and [`Decode`] traits that bridge caller
//! types to those buffers, together with implementations for the primitive
//! shapes the storage layer itself needs (fixed-width integers, raw byte
//! buffers, strings).
//!
//! ## Encoding Rules
//!
//! - Encoding is deterministic: identical inputs produce identical bytes
//! - Integers are fixed-width big-endian, so encoded keys sort bytewise in
//!   numeric order
//! - A buffer decodes as a whole; trailing bytes are an error for
//!   fixed-width types
//!
//! Domain types (block indexes, coins, wallet records) implement these
//! traits themselves; their wire formats are not this crate's concern.
//!
//! ## Example
//!
//! ```
//! use strata_codec::{Decode, Encode};
//!
//! let bytes = 42u64.encode().unwrap();
//! assert_eq!(bytes.len(), 8);
//! let back = u64::decode(&bytes).unwrap();
//! assert_eq!(back, 42);
//! ```

#![deny(unsafe_code)]
#![warn(missing_docs)]

mod error;

pub use error::{CodecError, CodecResult};

/// Trait for types that can be encoded to stored bytes.
pub trait Encode {
    /// Encodes this value to bytes.
    fn encode(&self) -> CodecResult<Vec<u8>>;
}

/// Trait for types that can be decoded from stored bytes.
pub trait Decode: Sized {
    /// Decodes a value from bytes.
    ///
    /// The buffer must contain exactly one value.
    fn decode(bytes: &[u8]) -> CodecResult<Self>;
}

macro_rules! impl_codec_for_int {
    ($($ty:ty),*) => {
        $(
            impl Encode for $ty {
                fn encode(&self) -> CodecResult<Vec<u8>> {
                    Ok(self.to_be_bytes().to_vec())
                }
            }

            impl Decode for $ty {
                fn decode(bytes: &[u8]) -> CodecResult<Self> {
                    let arr: [u8; std::mem::size_of::<$ty>()] = bytes
                        .try_into()
                        .map_err(|_| CodecError::unexpected_length(
                            std::mem::size_of::<$ty>(),
                            bytes.len(),
                        ))?;
                    Ok(<$ty>::from_be_bytes(arr))
                }
            }
        )*
    };
}

impl_codec_for_int!(u8, u16, u32, u64);

impl Encode for Vec<u8> {
    fn encode(&self) -> CodecResult<Vec<u8>> {
        Ok(self.clone())
    }
}

impl Decode for Vec<u8> {
    fn decode(bytes: &[u8]) -> CodecResult<Self> {
        Ok(bytes.to_vec())
    }
}

impl<const N: usize> Encode for [u8; N] {
    fn encode(&self) -> CodecResult<Vec<u8>> {
        Ok(self.to_vec())
    }
}

impl<const N: usize> Decode for [u8; N] {
    fn decode(bytes: &[u8]) -> CodecResult<Self> {
        bytes
            .try_into()
            .map_err(|_| CodecError::unexpected_length(N, bytes.len()))
    }
}

impl Encode for String {
    fn encode(&self) -> CodecResult<Vec<u8>> {
        Ok(self.as_bytes().to_vec())
    }
}

impl Decode for String {
    fn decode(bytes: &[u8]) -> CodecResult<Self> {
        String::from_utf8(bytes.to_vec()).map_err(|_| CodecError::InvalidUtf8)
    }
}

impl Encode for &str {
    fn encode(&self) -> CodecResult<Vec<u8>> {
        Ok(self.as_bytes().to_vec())
    }
}

impl Encode for &[u8] {
    fn encode(&self) -> CodecResult<Vec<u8>> {
        Ok(self.to_vec())
    }
}
