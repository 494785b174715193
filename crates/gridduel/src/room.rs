//! Room codes and their transport identifiers.

use derive_more::{Display, Error};
use rand::Rng;
use serde::{Deserialize, Serialize};
use std::str::FromStr;

/// Namespace for transport identifiers. Bump the version whenever the peer
/// protocol changes incompatibly so old clients can't resolve new rooms.
pub const DEFAULT_PEER_PREFIX: &str = "gridduel-v2-";

const LOWEST_CODE: u16 = 100;
const HIGHEST_CODE: u16 = 999;

/// Three-digit code a host shares with the joiner.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Display, Serialize, Deserialize)]
#[serde(try_from = "String", into = "String")]
pub struct RoomCode(u16);

/// Text that is not a three-digit room code.
#[derive(Debug, Clone, PartialEq, Eq, Display, Error)]
#[display("Room codes are three digits from 100 to 999, got {:?}", input)]
pub struct RoomCodeError {
    /// The rejected input.
    pub input: String,
}

impl RoomCode {
    /// Picks a code uniformly from 100..=999.
    pub fn generate<R: Rng + ?Sized>(rng: &mut R) -> Self {
        Self(rng.gen_range(LOWEST_CODE..=HIGHEST_CODE))
    }

    /// Transport identifier for this room under `prefix`.
    pub fn peer_id(&self, prefix: &str) -> String {
        format!("{prefix}{}", self.0)
    }
}

impl FromStr for RoomCode {
    type Err = RoomCodeError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let trimmed = s.trim();
        let error = || RoomCodeError {
            input: s.to_string(),
        };
        if trimmed.len() != 3 || !trimmed.bytes().all(|b| b.is_ascii_digit()) {
            return Err(error());
        }
        let value: u16 = trimmed.parse().map_err(|_| error())?;
        if !(LOWEST_CODE..=HIGHEST_CODE).contains(&value) {
            return Err(error());
        }
        Ok(Self(value))
    }
}

impl TryFrom<String> for RoomCode {
    type Error = RoomCodeError;

    fn try_from(value: String) -> Result<Self, Self::Error> {
        value.parse()
    }
}

impl From<RoomCode> for String {
    fn from(code: RoomCode) -> Self {
        code.to_string()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use rand::SeedableRng;
    use rand_chacha::ChaCha8Rng;

    #[test]
    fn test_generated_codes_stay_in_range() {
        let mut rng = ChaCha8Rng::seed_from_u64(99);
        for _ in 0..1000 {
            let code = RoomCode::generate(&mut rng);
            let text = code.to_string();
            assert_eq!(text.len(), 3);
            assert_eq!(text.parse::<RoomCode>().unwrap(), code);
        }
    }

    #[test]
    fn test_parse_rejects_bad_codes() {
        assert_eq!(" 427 ".parse::<RoomCode>().unwrap().to_string(), "427");
        for bad in ["", "42", "4270", "099", "abc", "-12", "+12"] {
            assert!(bad.parse::<RoomCode>().is_err(), "{bad} accepted");
        }
    }

    #[test]
    fn test_peer_id_uses_prefix() {
        let code: RoomCode = "512".parse().unwrap();
        assert_eq!(code.peer_id(DEFAULT_PEER_PREFIX), "gridduel-v2-512");
    }
}
