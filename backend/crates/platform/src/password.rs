//! Password Policy and Argon2id Hashing
//!
//! - [`PasswordPolicy`] decides whether a new password is acceptable
//! - [`ClearTextPassword`] holds user input and is zeroized on drop
//! - [`HashedPassword`] is the PHC string that gets stored
//!
//! Hash parameters follow the OWASP baseline for Argon2id
//! (19 MiB memory, 2 iterations, 1 lane). Verification reads the
//! parameters embedded in the stored hash, so old hashes keep working
//! after the baseline moves.

use std::fmt;
use std::sync::OnceLock;

use argon2::{
    Algorithm, Argon2, Params, PasswordHash, PasswordHasher, PasswordVerifier, Version,
    password_hash::SaltString,
};
use rand::rngs::OsRng;
use thiserror::Error;
use unicode_normalization::UnicodeNormalization;
use zeroize::{Zeroize, ZeroizeOnDrop};

pub const MIN_PASSWORD_LENGTH: usize = 8;
pub const MAX_PASSWORD_LENGTH: usize = 128;

/// Login attempts longer than this are refused before hashing
const MAX_VERIFY_LENGTH: usize = MAX_PASSWORD_LENGTH * 4;

const ARGON2_MEMORY_KIB: u32 = 19 * 1024;
const ARGON2_ITERATIONS: u32 = 2;
const ARGON2_LANES: u32 = 1;

#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum PasswordPolicyError {
    #[error("Password must be at least {min} characters")]
    TooShort { min: usize },

    #[error("Password must be at most {max} characters")]
    TooLong { max: usize },

    #[error("Password cannot be empty")]
    Blank,

    #[error("Password contains invalid characters")]
    ControlCharacter,

    #[error("Password must contain at least one letter and one digit")]
    MissingCharacterClass,

    #[error("Password is too common or follows a predictable pattern")]
    Predictable,
}

#[derive(Debug, Error)]
pub enum PasswordHashError {
    #[error("Password hashing failed: {0}")]
    Hashing(String),

    #[error("Invalid password hash format")]
    InvalidFormat,
}

/// Rules applied to passwords chosen at signup and reset
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct PasswordPolicy {
    pub min_length: usize,
    pub max_length: usize,
    /// Require at least one letter and one digit
    pub require_letter_and_digit: bool,
}

impl Default for PasswordPolicy {
    fn default() -> Self {
        Self {
            min_length: MIN_PASSWORD_LENGTH,
            max_length: MAX_PASSWORD_LENGTH,
            require_letter_and_digit: true,
        }
    }
}

impl PasswordPolicy {
    /// Check an already NFKC-normalized password
    ///
    /// Length is counted in code points, not bytes.
    pub fn check(&self, password: &str) -> Result<(), PasswordPolicyError> {
        if password.trim().is_empty() {
            return Err(PasswordPolicyError::Blank);
        }

        let length = password.chars().count();
        if length < self.min_length {
            return Err(PasswordPolicyError::TooShort {
                min: self.min_length,
            });
        }
        if length > self.max_length {
            return Err(PasswordPolicyError::TooLong {
                max: self.max_length,
            });
        }

        if password
            .chars()
            .any(|c| c.is_control() && !matches!(c, ' ' | '\t'))
        {
            return Err(PasswordPolicyError::ControlCharacter);
        }

        if self.require_letter_and_digit {
            let has_letter = password.chars().any(char::is_alphabetic);
            let has_digit = password.chars().any(|c| c.is_ascii_digit());
            if !(has_letter && has_digit) {
                return Err(PasswordPolicyError::MissingCharacterClass);
            }
        }

        if is_predictable(password) {
            return Err(PasswordPolicyError::Predictable);
        }

        Ok(())
    }
}

/// Password as typed by the user
///
/// Not `Clone`; the buffer is wiped when dropped.
///
/// ```rust
/// use platform::password::ClearTextPassword;
///
/// let password = ClearTextPassword::new("Passw0rd1".to_string()).unwrap();
/// let stored = password.hash(None).unwrap();
/// assert!(stored.verify(&password, None));
/// ```
#[derive(Zeroize, ZeroizeOnDrop)]
pub struct ClearTextPassword(String);

impl ClearTextPassword {
    /// Normalize (NFKC) and check against the default policy
    pub fn new(raw: String) -> Result<Self, PasswordPolicyError> {
        Self::with_policy(raw, &PasswordPolicy::default())
    }

    pub fn with_policy(raw: String, policy: &PasswordPolicy) -> Result<Self, PasswordPolicyError> {
        let mut raw = raw;
        let candidate = Self(raw.nfkc().collect());
        raw.zeroize();
        policy.check(&candidate.0)?;
        Ok(candidate)
    }

    /// Normalize a login attempt without applying the policy
    ///
    /// Hashes created under an older policy must still verify.
    pub fn for_verification(raw: String) -> Option<Self> {
        if raw.chars().count() > MAX_VERIFY_LENGTH {
            return None;
        }
        Some(Self(raw.nfkc().collect()))
    }

    /// Hash with a fresh 128-bit salt
    pub fn hash(&self, pepper: Option<&[u8]>) -> Result<HashedPassword, PasswordHashError> {
        let input = Peppered::new(self.0.as_bytes(), pepper);
        let salt = SaltString::generate(OsRng);

        let hash = hasher()?
            .hash_password(input.as_bytes(), &salt)
            .map_err(|e| PasswordHashError::Hashing(e.to_string()))?;

        Ok(HashedPassword(hash.to_string()))
    }
}

impl fmt::Debug for ClearTextPassword {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str("ClearTextPassword([REDACTED])")
    }
}

/// Argon2id hash in PHC string format
#[derive(Clone, PartialEq, Eq)]
pub struct HashedPassword(String);

impl HashedPassword {
    /// Accept a stored PHC string after checking it parses
    pub fn from_phc_string(s: impl Into<String>) -> Result<Self, PasswordHashError> {
        let phc = s.into();
        PasswordHash::new(&phc).map_err(|_| PasswordHashError::InvalidFormat)?;
        Ok(Self(phc))
    }

    pub fn as_phc_string(&self) -> &str {
        &self.0
    }

    /// Constant-time verification using the parameters stored in the hash
    pub fn verify(&self, password: &ClearTextPassword, pepper: Option<&[u8]>) -> bool {
        let Ok(parsed) = PasswordHash::new(&self.0) else {
            return false;
        };
        let input = Peppered::new(password.0.as_bytes(), pepper);

        Argon2::default()
            .verify_password(input.as_bytes(), &parsed)
            .is_ok()
    }
}

impl fmt::Debug for HashedPassword {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str("HashedPassword([HASH])")
    }
}

/// Run a full verification against a throwaway hash
///
/// Used when an account or its credential is missing so the response
/// time matches a wrong-password attempt. Always `false`.
pub fn verify_dummy(password: &ClearTextPassword, pepper: Option<&[u8]>) -> bool {
    static DUMMY: OnceLock<Option<HashedPassword>> = OnceLock::new();

    let dummy = DUMMY.get_or_init(|| {
        ClearTextPassword(crate::crypto::random_token(24))
            .hash(None)
            .ok()
    });

    if let Some(hash) = dummy {
        let _ = hash.verify(password, pepper);
    }
    false
}

fn hasher() -> Result<Argon2<'static>, PasswordHashError> {
    let params = Params::new(ARGON2_MEMORY_KIB, ARGON2_ITERATIONS, ARGON2_LANES, None)
        .map_err(|e| PasswordHashError::Hashing(e.to_string()))?;
    Ok(Argon2::new(Algorithm::Argon2id, Version::V0x13, params))
}

/// Password bytes with the optional pepper appended, wiped on drop
#[derive(Zeroize, ZeroizeOnDrop)]
struct Peppered(Vec<u8>);

impl Peppered {
    fn new(password: &[u8], pepper: Option<&[u8]>) -> Self {
        let mut bytes = Vec::with_capacity(password.len() + pepper.map_or(0, <[u8]>::len));
        bytes.extend_from_slice(password);
        if let Some(pepper) = pepper {
            bytes.extend_from_slice(pepper);
        }
        Self(bytes)
    }

    fn as_bytes(&self) -> &[u8] {
        &self.0
    }
}

const BLOCKLIST: &[&str] = &[
    "password1",
    "passw0rd",
    "password123",
    "admin123",
    "welcome1",
    "letmein1",
    "iloveyou1",
    "abc12345",
    "qwerty123",
    "compliance1",
];

const KEYBOARD_RUNS: &[&str] = &["qwerty", "asdfgh", "zxcvbn", "1qaz2wsx"];

fn is_predictable(password: &str) -> bool {
    let lower = password.to_lowercase();

    if BLOCKLIST.contains(&lower.as_str()) {
        return true;
    }
    if KEYBOARD_RUNS.iter().any(|run| lower.contains(run)) {
        return true;
    }

    let mut chars = lower.chars();
    if let Some(first) = chars.next() {
        if chars.all(|c| c == first) {
            return true;
        }
    }

    is_digit_run(&lower)
}

/// Digits dominate the password and form one ascending or descending run
fn is_digit_run(s: &str) -> bool {
    let digits: Vec<u32> = s.chars().filter_map(|c| c.to_digit(10)).collect();
    if digits.len() < 6 || digits.len() * 2 < s.chars().count() {
        return false;
    }

    let step = |a: u32, b: u32| (b + 10 - a) % 10;
    let ascending = digits.windows(2).all(|w| step(w[0], w[1]) == 1);
    let descending = digits.windows(2).all(|w| step(w[1], w[0]) == 1);
    ascending || descending
}

#[cfg(test)]
mod tests {
    use super::*;

    fn clear(raw: &str) -> ClearTextPassword {
        ClearTextPassword::for_verification(raw.to_string()).unwrap()
    }

    #[test]
    fn test_policy_lengths() {
        let policy = PasswordPolicy::default();
        assert_eq!(
            policy.check("Ab1"),
            Err(PasswordPolicyError::TooShort { min: 8 })
        );
        let long = format!("a1{}", "b".repeat(MAX_PASSWORD_LENGTH));
        assert_eq!(
            policy.check(&long),
            Err(PasswordPolicyError::TooLong { max: 128 })
        );
        assert_eq!(policy.check("   "), Err(PasswordPolicyError::Blank));
    }

    #[test]
    fn test_policy_character_classes() {
        let policy = PasswordPolicy::default();
        assert_eq!(
            policy.check("onlyletters"),
            Err(PasswordPolicyError::MissingCharacterClass)
        );
        assert_eq!(
            policy.check("90817263"),
            Err(PasswordPolicyError::MissingCharacterClass)
        );
        assert_eq!(
            policy.check("abc\u{0007}12345"),
            Err(PasswordPolicyError::ControlCharacter)
        );

        let relaxed = PasswordPolicy {
            require_letter_and_digit: false,
            ..PasswordPolicy::default()
        };
        assert!(relaxed.check("onlyletters").is_ok());
    }

    #[test]
    fn test_policy_predictable() {
        let policy = PasswordPolicy::default();
        for weak in ["Password123", "qwerty12ab", "x123456789", "zzzzzzzz"] {
            assert!(policy.check(weak).is_err(), "{weak}");
        }
        assert_eq!(
            policy.check("x123456789"),
            Err(PasswordPolicyError::Predictable)
        );
        assert!(policy.check("Passw0rd1").is_ok());
        assert!(policy.check("Sicher1ch!").is_ok());
    }

    #[test]
    fn test_nfkc_applied_before_policy() {
        // Fullwidth digits normalize to ASCII
        let password = ClearTextPassword::new("Secret\u{FF11}\u{FF12}x".to_string()).unwrap();
        let stored = password.hash(None).unwrap();
        assert!(stored.verify(&clear("Secret12x"), None));
    }

    #[test]
    fn test_hash_and_verify() {
        let password = clear("TestPassword123!");
        let stored = password.hash(None).unwrap();

        assert!(
            stored
                .as_phc_string()
                .starts_with("$argon2id$v=19$m=19456,t=2,p=1$")
        );
        assert!(stored.verify(&password, None));
        assert!(!stored.verify(&clear("WrongPassword123!"), None));
    }

    #[test]
    fn test_pepper_must_match() {
        let password = clear("TestPassword123!");
        let stored = password.hash(Some(b"pepper")).unwrap();

        assert!(stored.verify(&password, Some(b"pepper")));
        assert!(!stored.verify(&password, None));
        assert!(!stored.verify(&password, Some(b"other")));
    }

    #[test]
    fn test_from_phc_string() {
        let stored = clear("TestPassword123!").hash(None).unwrap();
        let restored = HashedPassword::from_phc_string(stored.as_phc_string()).unwrap();
        assert!(restored.verify(&clear("TestPassword123!"), None));

        assert!(HashedPassword::from_phc_string("not_a_valid_hash").is_err());
    }

    #[test]
    fn test_for_verification_skips_policy() {
        let stored = clear("short").hash(None).unwrap();
        assert!(stored.verify(&clear("short"), None));
        assert!(ClearTextPassword::for_verification("a".repeat(MAX_VERIFY_LENGTH + 1)).is_none());
    }

    #[test]
    fn test_verify_dummy_never_matches() {
        assert!(!verify_dummy(&clear("TestPassword123!"), None));
        assert!(!verify_dummy(&clear("TestPassword123!"), Some(b"pepper")));
    }

    #[test]
    fn test_debug_redaction() {
        let password = clear("secret-value");
        assert!(!format!("{password:?}").contains("secret-value"));
        let stored = password.hash(None).unwrap();
        assert!(!format!("{stored:?}").contains("argon2"));
    }
}
