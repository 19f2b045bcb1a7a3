//! Image identity validation and mapping to on-disk file names.
//!
//! An identity is the image name a client annotates. It is used verbatim
//! as the collection key, so it has to be turned into a file name that
//! cannot escape the store root and cannot collide with another identity.

use std::fmt::Write;

use uuid::Uuid;

use crate::error::CoreError;

/// Maximum identity length in bytes.
pub const MAX_IDENTITY_LEN: usize = 255;

/// Extension appended to every collection file.
pub const COLLECTION_EXTENSION: &str = "json";

/// Longest encoded stem stored verbatim. Longer stems are shortened to a
/// prefix plus a name-based UUID so the file name stays well under the
/// 255-byte limit of common filesystems.
pub const MAX_ENCODED_STEM: usize = 200;

/// Bytes of the encoded stem kept in front of the UUID when shortening.
const SHORTENED_PREFIX: usize = 160;

/// Separator between the kept prefix and the UUID. `~` is always
/// percent-encoded in a stem, so shortened names never collide with
/// verbatim ones.
const SHORTENED_SEPARATOR: char = '~';

/// Namespace for name-based collection UUIDs.
const COLLECTION_NAMESPACE: Uuid = Uuid::from_u128(0x6b1f_2c4e_9a57_4d0b_8e3a_51c2_7f90_d4a6);

/// Validate an identity supplied by a client.
///
/// Must be non-empty (after trimming), at most [`MAX_IDENTITY_LEN`] bytes,
/// and free of control characters.
pub fn validate_identity(identity: &str) -> Result<(), CoreError> {
    if identity.trim().is_empty() {
        return Err(CoreError::Validation(
            "image_name must not be empty".to_string(),
        ));
    }
    if identity.len() > MAX_IDENTITY_LEN {
        return Err(CoreError::Validation(format!(
            "image_name must be at most {MAX_IDENTITY_LEN} bytes, got {}",
            identity.len()
        )));
    }
    if identity.chars().any(char::is_control) {
        return Err(CoreError::Validation(
            "image_name must not contain control characters".to_string(),
        ));
    }
    Ok(())
}

/// Map an identity to the file name holding its collection.
///
/// Every byte outside `[A-Za-z0-9_.-]` is percent-encoded, as is a
/// leading `.`, so the result is a single path component and the mapping
/// is injective. Stems longer than [`MAX_ENCODED_STEM`] (non-ASCII names
/// triple in size) are shortened to a prefix plus a UUIDv5 of the full
/// identity.
pub fn collection_file_name(identity: &str) -> String {
    let mut stem = encode_stem(identity);
    if stem.len() > MAX_ENCODED_STEM {
        let cut = prefix_boundary(&stem, SHORTENED_PREFIX);
        let id = Uuid::new_v5(&COLLECTION_NAMESPACE, identity.as_bytes());
        stem.truncate(cut);
        stem.push(SHORTENED_SEPARATOR);
        stem.push_str(&id.simple().to_string());
    }
    stem.push('.');
    stem.push_str(COLLECTION_EXTENSION);
    stem
}

fn encode_stem(identity: &str) -> String {
    let mut stem = String::with_capacity(identity.len() + COLLECTION_EXTENSION.len() + 1);
    for (i, byte) in identity.bytes().enumerate() {
        let keep = byte.is_ascii_alphanumeric()
            || byte == b'_'
            || byte == b'-'
            || (byte == b'.' && i > 0);
        if keep {
            stem.push(byte as char);
        } else {
            // Writing into a String cannot fail.
            let _ = write!(stem, "%{byte:02X}");
        }
    }
    stem
}

/// Largest cut at or below `max` that does not split a `%XX` escape.
fn prefix_boundary(stem: &str, max: usize) -> usize {
    let bytes = stem.as_bytes();
    let mut cut = max.min(bytes.len());
    // An escape starting at cut-1 or cut-2 would be split.
    for back in 1..=2 {
        if cut >= back && bytes[cut - back] == b'%' {
            cut -= back;
            break;
        }
    }
    cut
}
