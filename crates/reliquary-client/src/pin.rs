use std::fmt;

use argon2::{
    Algorithm, Argon2, Params, PasswordHash, PasswordHasher, PasswordVerifier, Version,
    password_hash::{SaltString, rand_core::OsRng},
};

/// Number of digits in a character PIN.
pub const PIN_LENGTH: usize = 6;

/// Digits typed on the PIN pad so far.
#[derive(Clone, Default, PartialEq, Eq)]
pub struct PinInput {
    digits: String,
}

impl PinInput {
    pub fn new() -> Self {
        Self::default()
    }

    /// Append one digit. Returns false (and changes nothing) if the digit
    /// is not 0-9 or the PIN is already full.
    pub fn push(&mut self, digit: u8) -> bool {
        if digit > 9 || self.is_complete() {
            return false;
        }
        self.digits.push(char::from(b'0' + digit));
        true
    }

    pub fn pop(&mut self) {
        self.digits.pop();
    }

    pub fn clear(&mut self) {
        self.digits.clear();
    }

    pub fn len(&self) -> usize {
        self.digits.len()
    }

    pub fn is_empty(&self) -> bool {
        self.digits.is_empty()
    }

    pub fn is_complete(&self) -> bool {
        self.digits.len() == PIN_LENGTH
    }

    pub fn as_str(&self) -> &str {
        &self.digits
    }
}

// Only the fill level is ever shown, never the digits.
impl fmt::Debug for PinInput {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "PinInput({}/{})", self.len(), PIN_LENGTH)
    }
}

/// One-way PIN hashing with Argon2id PHC strings.
#[derive(Clone)]
pub struct PinHasher {
    params: Params,
}

impl PinHasher {
    pub fn new(params: Params) -> Self {
        Self { params }
    }

    pub fn hash(&self, pin: &str) -> Result<String, argon2::password_hash::Error> {
        let salt = SaltString::generate(&mut OsRng);
        let argon2 = Argon2::new(Algorithm::Argon2id, Version::V0x13, self.params.clone());
        Ok(argon2.hash_password(pin.as_bytes(), &salt)?.to_string())
    }

    /// Cost parameters come from the stored hash, not from `self`, so hashes
    /// made with older settings keep verifying.
    pub fn verify(&self, pin: &str, hash: &str) -> bool {
        let Ok(parsed) = PasswordHash::new(hash) else {
            return false;
        };
        Argon2::default()
            .verify_password(pin.as_bytes(), &parsed)
            .is_ok()
    }
}

impl Default for PinHasher {
    fn default() -> Self {
        Self::new(Params::default())
    }
}

#[cfg(test)]
pub(crate) fn cheap_hasher() -> PinHasher {
    PinHasher::new(Params::new(256, 1, 1, None).unwrap())
}
