//! Human-readable recovery codes.

use rand::Rng;

use crate::config::constants::identity::RECOVERY_CODE_ALPHABET;
use crate::error::RecoveryError;

/// Random code of `length` characters drawn from the unambiguous alphabet.
pub fn generate(length: usize) -> String {
    let mut rng = rand::thread_rng();
    (0..length)
        .map(|_| {
            let idx = rng.gen_range(0..RECOVERY_CODE_ALPHABET.len());
            RECOVERY_CODE_ALPHABET[idx] as char
        })
        .collect()
}

/// Canonical form of user input: uppercased, spaces and dashes dropped.
///
/// # Errors
/// `RecoveryError::Malformed` on wrong length or characters outside the
/// alphabet.
pub fn normalize(input: &str, length: usize) -> Result<String, RecoveryError> {
    let code: String = input
        .chars()
        .filter(|c| !c.is_whitespace() && *c != '-')
        .map(|c| c.to_ascii_uppercase())
        .collect();

    if code.chars().count() != length {
        return Err(RecoveryError::Malformed(format!(
            "expected {} characters, got {}",
            length,
            code.chars().count()
        )));
    }
    if let Some(bad) = code
        .bytes()
        .find(|b| !RECOVERY_CODE_ALPHABET.contains(b))
    {
        return Err(RecoveryError::Malformed(format!(
            "invalid character '{}'",
            bad as char
        )));
    }
    Ok(code)
}
