//! Key validation shared by every pool and the simple cache facade.

use crate::cache::{MAX_KEY_LENGTH, RESERVED_KEY_CHARACTERS};
use crate::error::{CacheError, Result};

/// Rejects keys that are empty, too long, or contain reserved characters.
pub fn validate_key(key: &str) -> Result<()> {
    if key.is_empty() {
        return Err(CacheError::InvalidArgument(
            "Key cannot be empty".to_string(),
        ));
    }

    if key.len() > MAX_KEY_LENGTH {
        return Err(CacheError::InvalidArgument(format!(
            "Key exceeds maximum length of {} bytes",
            MAX_KEY_LENGTH
        )));
    }

    if let Some(c) = key.chars().find(|c| RESERVED_KEY_CHARACTERS.contains(*c)) {
        return Err(CacheError::InvalidArgument(format!(
            "Key {:?} contains reserved character {:?}",
            key, c
        )));
    }

    Ok(())
}

/// Validates every key before any of them is used.
pub fn validate_keys<'a, I>(keys: I) -> Result<()>
where
    I: IntoIterator<Item = &'a str>,
{
    keys.into_iter().try_for_each(validate_key)
}
