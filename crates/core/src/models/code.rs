//! Secret codes and per-position feedback

use std::fmt;
use std::str::FromStr;

use serde::{Deserialize, Serialize};

use crate::error::{Error, Result};

/// Number of digits in every code
pub const CODE_LENGTH: usize = 4;

/// A 4-digit code, used both as a secret and as a guess.
///
/// Digits are stored as their numeric values (0-9). Construction goes through
/// [`Code::new`] or [`FromStr`], so a `Code` in hand is always well-formed.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(try_from = "String", into = "String")]
pub struct Code([u8; CODE_LENGTH]);

impl Code {
    /// Build a code from digit values, rejecting anything above 9
    pub fn new(digits: [u8; CODE_LENGTH]) -> Result<Self> {
        if let Some(bad) = digits.iter().find(|d| **d > 9) {
            return Err(Error::InvalidCode(format!("digit {} out of range", bad)));
        }
        Ok(Self(digits))
    }

    pub fn digits(&self) -> &[u8; CODE_LENGTH] {
        &self.0
    }
}

impl FromStr for Code {
    type Err = Error;

    fn from_str(s: &str) -> Result<Self> {
        let chars: Vec<char> = s.chars().collect();
        if chars.len() != CODE_LENGTH {
            return Err(Error::InvalidCode(format!(
                "expected {} digits, got {:?}",
                CODE_LENGTH, s
            )));
        }

        let mut digits = [0u8; CODE_LENGTH];
        for (slot, c) in digits.iter_mut().zip(chars) {
            let value = c
                .to_digit(10)
                .ok_or_else(|| Error::InvalidCode(format!("{:?} is not a digit", c)))?;
            *slot = value as u8;
        }

        Ok(Self(digits))
    }
}

impl TryFrom<String> for Code {
    type Error = Error;

    fn try_from(value: String) -> Result<Self> {
        value.parse()
    }
}

impl From<Code> for String {
    fn from(code: Code) -> Self {
        code.to_string()
    }
}

impl fmt::Display for Code {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        for d in self.0 {
            write!(f, "{}", d)?;
        }
        Ok(())
    }
}

/// Feedback for a single position of a guess
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Status {
    /// Right digit in the right position
    Correct,
    /// Digit occurs elsewhere in the secret
    Present,
    /// Digit does not occur (or every occurrence is already consumed)
    Absent,
}

/// Per-position statuses for one guess
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct Feedback(pub [Status; CODE_LENGTH]);

impl Feedback {
    pub fn statuses(&self) -> &[Status; CODE_LENGTH] {
        &self.0
    }

    /// Number of positions carrying `status`
    pub fn count(&self, status: Status) -> usize {
        self.0.iter().filter(|s| **s == status).count()
    }

    /// True when every position is correct
    pub fn is_solved(&self) -> bool {
        self.count(Status::Correct) == CODE_LENGTH
    }
}
