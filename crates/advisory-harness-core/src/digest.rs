//! Streaming SHA-256 content digests.
//!
//! Digests are the deduplication key for uploads and the cooldown key for
//! generation topics. They are always lowercase hex, 64 characters long.
//!
//! # Example
//!
//! ```rust
//! use advisory_harness_core::digest::{hash_bytes, hash_reader};
//!
//! let data = b"sugarcane ratoon management";
//! let streamed = hash_reader(&data[..], 4).unwrap();
//! assert_eq!(streamed, hash_bytes(data));
//! ```

use sha2::{Digest, Sha256};
use std::io::{self, Read};

/// Default read size when streaming a source into the hasher.
pub const DIGEST_CHUNK_SIZE: usize = 8192;

/// Hash an in-memory byte slice.
pub fn hash_bytes(data: &[u8]) -> String {
    let mut hasher = Sha256::new();
    hasher.update(data);
    hex::encode(hasher.finalize())
}

/// Hash a UTF-8 string.
pub fn hash_str(text: &str) -> String {
    hash_bytes(text.as_bytes())
}

/// Hash everything readable from `reader`, pulling at most `chunk_size`
/// bytes per read.
///
/// The digest does not depend on `chunk_size`; only memory use does.
/// A `chunk_size` of zero is treated as [`DIGEST_CHUNK_SIZE`].
///
/// # Errors
///
/// Propagates any I/O error from the reader other than `Interrupted`,
/// which is retried.
pub fn hash_reader<R: Read>(mut reader: R, chunk_size: usize) -> io::Result<String> {
    let chunk_size = if chunk_size == 0 {
        DIGEST_CHUNK_SIZE
    } else {
        chunk_size
    };
    let mut hasher = Sha256::new();
    let mut buf = vec![0u8; chunk_size];

    loop {
        let n = match reader.read(&mut buf) {
            Ok(0) => break,
            Ok(n) => n,
            Err(e) if e.kind() == io::ErrorKind::Interrupted => continue,
            Err(e) => return Err(e),
        };
        hasher.update(&buf[..n]);
    }

    Ok(hex::encode(hasher.finalize()))
}
