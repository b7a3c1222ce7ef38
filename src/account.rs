//! Fixed-length account identifiers.
//!
//! Accounts are opaque 20-byte addresses. Equality is exact byte equality and
//! the derived byte-wise ordering doubles as the canonical enumeration order
//! used when claim indices are assigned. Text form is `0x`-prefixed lowercase
//! hex; checksum casing is an upstream concern and is never applied here.

use serde::de::{self, Deserializer, Visitor};
use serde::{Deserialize, Serialize, Serializer};
use std::fmt;

/// Opaque 20-byte account identifier.
#[derive(Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct Account([u8; 20]);

impl Account {
    /// The all-zero address, used by transfer logs to mark mints and burns.
    pub const ZERO: Account = Account([0u8; 20]);

    /// Wraps raw address bytes.
    pub fn from_bytes(bytes: [u8; 20]) -> Self {
        Account(bytes)
    }

    /// Returns the raw address bytes.
    pub fn as_bytes(&self) -> &[u8; 20] {
        &self.0
    }

    /// Parses a `0x`-prefixed 40-character hex address.
    pub fn parse(input: &str) -> Result<Self, String> {
        let body = input
            .strip_prefix("0x")
            .or_else(|| input.strip_prefix("0X"))
            .ok_or_else(|| format!("account '{input}' is missing the 0x prefix"))?;
        if body.len() != 40 {
            return Err(format!(
                "account '{input}' must be 40 hex chars, got {}",
                body.len()
            ));
        }
        let mut out = [0u8; 20];
        hex::decode_to_slice(body, &mut out)
            .map_err(|err| format!("account '{input}' is not valid hex: {err}"))?;
        Ok(Account(out))
    }
}

impl fmt::Display for Account {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "0x{}", hex::encode(self.0))
    }
}

impl fmt::Debug for Account {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "Account({self})")
    }
}

impl Serialize for Account {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.collect_str(self)
    }
}

struct AccountVisitor;

impl Visitor<'_> for AccountVisitor {
    type Value = Account;

    fn expecting(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str("a 0x-prefixed 20-byte hex address")
    }

    fn visit_str<E: de::Error>(self, value: &str) -> Result<Account, E> {
        Account::parse(value).map_err(de::Error::custom)
    }
}

impl<'de> Deserialize<'de> for Account {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        deserializer.deserialize_str(AccountVisitor)
    }
}
