use anyhow::{Context, Result, anyhow, bail};
use parity_scale_codec::{Decode, Encode};
use std::fmt;
use std::str::FromStr;

use crate::utils::ss58;

pub type Balance = u128;
pub type BlockNumber = u32;

/// 32-byte account id. Displays as `0x` hex; use [`AccountId::to_ss58`] for addresses.
#[derive(Encode, Decode, PartialEq, Eq, PartialOrd, Ord, Hash, Clone, Copy, Default)]
pub struct AccountId(pub [u8; 32]);

impl AccountId {
    pub fn as_bytes(&self) -> &[u8; 32] {
        &self.0
    }

    pub fn to_ss58(&self, format: u16) -> String {
        ss58::encode(&self.0, format)
    }
}

impl fmt::Display for AccountId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "0x{}", hex::encode(self.0))
    }
}

impl fmt::Debug for AccountId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        fmt::Display::fmt(self, f)
    }
}

impl FromStr for AccountId {
    type Err = anyhow::Error;

    /// Accepts `0x`-prefixed (or bare 64 char) hex public keys and SS58 addresses of any network.
    fn from_str(s: &str) -> Result<Self> {
        let s = s.trim();
        let bare = s.strip_prefix("0x");
        if bare.is_some() || (s.len() == 64 && s.chars().all(|c| c.is_ascii_hexdigit())) {
            let raw = hex::decode(bare.unwrap_or(s))
                .with_context(|| format!("invalid hex account id '{s}'"))?;
            let arr: [u8; 32] = raw
                .as_slice()
                .try_into()
                .map_err(|_| anyhow!("account id must be 32 bytes, got {}", raw.len()))?;
            return Ok(AccountId(arr));
        }
        let (_, public) = ss58::decode(s)?;
        Ok(AccountId(public))
    }
}

#[derive(Encode, Decode, PartialEq, Eq, PartialOrd, Ord, Hash, Clone, Copy, Default)]
pub struct BlockHash(pub [u8; 32]);

impl fmt::Display for BlockHash {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "0x{}", hex::encode(self.0))
    }
}

impl fmt::Debug for BlockHash {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        fmt::Display::fmt(self, f)
    }
}

impl FromStr for BlockHash {
    type Err = anyhow::Error;

    fn from_str(s: &str) -> Result<Self> {
        let x = s.trim();
        let x = x.strip_prefix("0x").unwrap_or(x);
        let raw = hex::decode(x).with_context(|| format!("invalid block hash '{s}'"))?;
        if raw.len() != 32 {
            bail!("block hash must be 32 bytes, got {}", raw.len());
        }
        let mut arr = [0u8; 32];
        arr.copy_from_slice(&raw);
        Ok(BlockHash(arr))
    }
}

/// One reservation an account is expected to hold, tagged `module.reason`.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct Deposit {
    pub source: String,
    pub amount: Balance,
}

impl Deposit {
    pub fn new(source: impl Into<String>, amount: Balance) -> Self {
        Self { source: source.into(), amount }
    }
}

/// Reserved balance of one account at one block.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct BalanceSnapshot {
    pub who: AccountId,
    pub reserved: Balance,
}

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct UnreserveEvent {
    pub who: AccountId,
    pub amount: Balance,
}

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct Slash {
    pub who: AccountId,
    pub amount: Balance,
    pub at: BlockHash,
}

/// A `NewTerm` block as discovered through the explorer, and as kept in the cache file.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct ElectionBlock {
    pub at: BlockHash,
    pub time: String,
    pub deposits: Vec<Balance>,
    pub unreserve: Vec<UnreserveEvent>,
}

/// The unit of reconciliation: the state right before and right after a term change.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct ElectionTransition {
    pub before: BlockHash,
    pub after: BlockHash,
    pub time: String,
    pub deposits: Vec<Balance>,
    pub unreserves: Vec<UnreserveEvent>,
}

impl ElectionTransition {
    pub fn from_block(block: &ElectionBlock, parent: BlockHash) -> Self {
        Self {
            before: parent,
            after: block.at,
            time: block.time.clone(),
            deposits: block.deposits.clone(),
            unreserves: block.unreserve.clone(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn account_id_parses_hex_and_ss58() {
        let raw = [9u8; 32];
        let hex_form = format!("0x{}", hex::encode(raw));
        assert_eq!(hex_form.parse::<AccountId>().unwrap(), AccountId(raw));
        assert_eq!(hex::encode(raw).parse::<AccountId>().unwrap(), AccountId(raw));

        let addr = AccountId(raw).to_ss58(2);
        assert_eq!(addr.parse::<AccountId>().unwrap(), AccountId(raw));
    }

    #[test]
    fn account_id_rejects_short_hex() {
        assert!("0x1234".parse::<AccountId>().is_err());
    }

    #[test]
    fn block_hash_round_trips_display() {
        let h = BlockHash([0xab; 32]);
        let s = h.to_string();
        assert!(s.starts_with("0xabab"));
        assert_eq!(s.parse::<BlockHash>().unwrap(), h);
    }
}
