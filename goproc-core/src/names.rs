//! Record name validation.
//!
//! Names are optional handles for records: empty means unset, non-empty
//! names must be unique across live records and safe to use as shell
//! arguments and file-name fragments.

use crate::error::RegistryError;

/// Upper bound on a name's UTF-8 byte length.
pub const MAX_NAME_LEN: usize = 64;

/// Trim and validate a record name.
///
/// Empty (after trimming) is allowed and means "unset". Non-empty names are
/// limited to [`MAX_NAME_LEN`] bytes of letters, digits, `-`, `_`, and `.`.
pub fn normalize_name(raw: &str) -> Result<String, RegistryError> {
    let name = raw.trim();
    if name.is_empty() {
        return Ok(String::new());
    }
    if name.len() > MAX_NAME_LEN {
        return Err(RegistryError::InvalidName {
            name: name.to_string(),
            reason: format!("longer than {MAX_NAME_LEN} bytes"),
        });
    }
    if let Some(bad) = name.chars().find(|c| !is_allowed_name_char(*c)) {
        return Err(RegistryError::InvalidName {
            name: name.to_string(),
            reason: format!("character {bad:?} not allowed (letters, digits, '.', '-', '_')"),
        });
    }
    Ok(name.to_string())
}

fn is_allowed_name_char(c: char) -> bool {
    c.is_alphanumeric() || matches!(c, '-' | '_' | '.')
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn empty_and_whitespace_mean_unset() {
        assert_eq!(normalize_name("").expect("empty ok"), "");
        assert_eq!(normalize_name("   ").expect("blank ok"), "");
    }

    #[test]
    fn surrounding_whitespace_is_trimmed() {
        assert_eq!(normalize_name("  api-v2  ").expect("trim"), "api-v2");
    }

    #[test]
    fn allowed_characters_pass() {
        for name in ["api", "web.front-end_01", "Üñïcode"] {
            assert_eq!(normalize_name(name).expect("valid"), name);
        }
    }

    #[test]
    fn sixty_four_bytes_pass_sixty_five_fail() {
        let ok = "a".repeat(MAX_NAME_LEN);
        assert_eq!(normalize_name(&ok).expect("64 bytes"), ok);

        let long = "a".repeat(MAX_NAME_LEN + 1);
        let err = normalize_name(&long).unwrap_err();
        assert!(matches!(err, RegistryError::InvalidName { .. }), "got: {err}");
        assert!(err.to_string().contains("64 bytes"));
    }

    #[test]
    fn slash_and_inner_whitespace_fail() {
        for name in ["a/b", "a b", "tab\there", "semi;colon"] {
            let err = normalize_name(name).unwrap_err();
            assert!(matches!(err, RegistryError::InvalidName { .. }), "{name}: {err}");
        }
    }
}
