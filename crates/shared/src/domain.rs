use std::{fmt, str::FromStr};

use serde::{de, Deserialize, Deserializer, Serialize, Serializer};
use thiserror::Error;

#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum HexParseError {
    #[error("expected 0x-prefixed hex string")]
    MissingPrefix,
    #[error("expected {expected} hex characters, got {actual}")]
    BadLength { expected: usize, actual: usize },
    #[error("invalid hex digit")]
    BadDigit,
}

macro_rules! hex_bytes_newtype {
    ($name:ident, $len:expr) => {
        #[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
        pub struct $name(pub [u8; $len]);

        impl $name {
            pub const ZERO: Self = Self([0u8; $len]);

            pub fn as_bytes(&self) -> &[u8; $len] {
                &self.0
            }
        }

        impl fmt::Display for $name {
            fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
                write!(f, "0x{}", hex::encode(self.0))
            }
        }

        impl FromStr for $name {
            type Err = HexParseError;

            fn from_str(s: &str) -> Result<Self, Self::Err> {
                let digits = s
                    .strip_prefix("0x")
                    .or_else(|| s.strip_prefix("0X"))
                    .ok_or(HexParseError::MissingPrefix)?;
                if digits.len() != $len * 2 {
                    return Err(HexParseError::BadLength {
                        expected: $len * 2,
                        actual: digits.len(),
                    });
                }
                let mut bytes = [0u8; $len];
                hex::decode_to_slice(digits, &mut bytes)
                    .map_err(|_| HexParseError::BadDigit)?;
                Ok(Self(bytes))
            }
        }

        impl Serialize for $name {
            fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
                serializer.collect_str(self)
            }
        }

        impl<'de> Deserialize<'de> for $name {
            fn deserialize<D: Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
                let raw = String::deserialize(deserializer)?;
                raw.parse().map_err(de::Error::custom)
            }
        }
    };
}

hex_bytes_newtype!(Address, 20);
hex_bytes_newtype!(TxHash, 32);

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct ChainId(pub u64);

impl ChainId {
    pub const MAINNET: Self = Self(1);
    pub const SEPOLIA: Self = Self(11_155_111);
}

impl fmt::Display for ChainId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parses_checksummed_address_case_insensitively() {
        let addr: Address = "0xAb5801a7D398351b8bE11C439e05C5B3259aeC9B"
            .parse()
            .expect("parse");
        assert_eq!(
            addr.to_string(),
            "0xab5801a7d398351b8be11c439e05c5b3259aec9b"
        );
    }

    #[test]
    fn rejects_address_without_prefix() {
        let err = "ab5801a7d398351b8be11c439e05c5b3259aec9b"
            .parse::<Address>()
            .unwrap_err();
        assert_eq!(err, HexParseError::MissingPrefix);
    }

    #[test]
    fn rejects_address_with_wrong_length() {
        let err = "0xab5801".parse::<Address>().unwrap_err();
        assert_eq!(
            err,
            HexParseError::BadLength {
                expected: 40,
                actual: 6
            }
        );
    }

    #[test]
    fn rejects_address_with_invalid_digit() {
        let err = "0xzz5801a7d398351b8be11c439e05c5b3259aec9b"
            .parse::<Address>()
            .unwrap_err();
        assert_eq!(err, HexParseError::BadDigit);
    }

    #[test]
    fn tx_hash_round_trips_through_serde() {
        let hash: TxHash =
            "0x88df016429689c079f3b2f6ad39fa052532c56795b733da78a91ebe6a713944b"
                .parse()
                .expect("parse");
        let json = serde_json::to_string(&hash).expect("serialize");
        let back: TxHash = serde_json::from_str(&json).expect("deserialize");
        assert_eq!(hash, back);
    }

    #[test]
    fn chain_id_constants() {
        assert_eq!(ChainId::MAINNET.0, 1);
        assert_eq!(ChainId::SEPOLIA.0, 11_155_111);
    }
}
