// src/chain/storage.rs

use anyhow::{Context, Result, bail};
use parity_scale_codec::{Decode, DecodeAll};
use sp_crypto_hashing::{blake2_128, blake2_256, twox_64, twox_128};

/// Key hashers used by the storage items we read.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum Hasher {
    Twox64Concat,
    Blake2_128Concat,
    /// opaque, legacy `Balances.ReservedBalance` layout
    Blake2_256,
    Identity,
}

impl Hasher {
    pub fn hash(&self, encoded_key: &[u8]) -> Vec<u8> {
        match self {
            Hasher::Twox64Concat => {
                let mut v = twox_64(encoded_key).to_vec();
                v.extend_from_slice(encoded_key);
                v
            }
            Hasher::Blake2_128Concat => {
                let mut v = blake2_128(encoded_key).to_vec();
                v.extend_from_slice(encoded_key);
                v
            }
            Hasher::Blake2_256 => blake2_256(encoded_key).to_vec(),
            Hasher::Identity => encoded_key.to_vec(),
        }
    }

    /// Length of the hash that precedes the raw key, or `None` when the key is not recoverable.
    fn concat_offset(&self) -> Option<usize> {
        match self {
            Hasher::Twox64Concat => Some(8),
            Hasher::Blake2_128Concat => Some(16),
            Hasher::Identity => Some(0),
            Hasher::Blake2_256 => None,
        }
    }
}

/// A storage item, addressed by pallet prefix and item name.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct StorageItem {
    pub pallet: &'static str,
    pub item: &'static str,
    pub hasher: Hasher,
}

impl StorageItem {
    pub const fn new(pallet: &'static str, item: &'static str, hasher: Hasher) -> Self {
        Self { pallet, item, hasher }
    }

    /// twox128(pallet) ++ twox128(item)
    pub fn prefix(&self) -> Vec<u8> {
        let mut k = Vec::with_capacity(32);
        k.extend_from_slice(&twox_128(self.pallet.as_bytes()));
        k.extend_from_slice(&twox_128(self.item.as_bytes()));
        k
    }

    pub fn value_key(&self) -> Vec<u8> {
        self.prefix()
    }

    pub fn map_key(&self, encoded_key: &[u8]) -> Vec<u8> {
        let mut k = self.prefix();
        k.extend_from_slice(&self.hasher.hash(encoded_key));
        k
    }

    /// Recover the map key from a full storage key under this item.
    pub fn decode_map_key<K: Decode>(&self, full_key: &[u8]) -> Result<K> {
        let Some(offset) = self.hasher.concat_offset() else {
            bail!("{}.{} keys are not reversible", self.pallet, self.item);
        };
        let start = 32 + offset;
        if full_key.len() < start {
            bail!("{}.{} key too short: {} bytes", self.pallet, self.item, full_key.len());
        }
        let mut raw = &full_key[start..];
        K::decode_all(&mut raw)
            .with_context(|| format!("failed to decode {}.{} map key", self.pallet, self.item))
    }
}

pub const SYSTEM_ACCOUNT: StorageItem =
    StorageItem::new("System", "Account", Hasher::Blake2_128Concat);
pub const BALANCES_RESERVED_LEGACY: StorageItem =
    StorageItem::new("Balances", "ReservedBalance", Hasher::Blake2_256);

pub const ELECTIONS_MEMBERS: StorageItem =
    StorageItem::new("PhragmenElection", "Members", Hasher::Identity);
pub const ELECTIONS_RUNNERS_UP: StorageItem =
    StorageItem::new("PhragmenElection", "RunnersUp", Hasher::Identity);
pub const ELECTIONS_CANDIDATES: StorageItem =
    StorageItem::new("PhragmenElection", "Candidates", Hasher::Identity);
pub const ELECTIONS_VOTING: StorageItem =
    StorageItem::new("PhragmenElection", "Voting", Hasher::Twox64Concat);

pub const DEMOCRACY_DEPOSIT_OF: StorageItem =
    StorageItem::new("Democracy", "DepositOf", Hasher::Twox64Concat);
pub const DEMOCRACY_PREIMAGES: StorageItem =
    StorageItem::new("Democracy", "Preimages", Hasher::Identity);

pub const IDENTITY_OF: StorageItem =
    StorageItem::new("Identity", "IdentityOf", Hasher::Twox64Concat);
pub const IDENTITY_SUBS_OF: StorageItem =
    StorageItem::new("Identity", "SubsOf", Hasher::Twox64Concat);

pub const INDICES_ACCOUNTS: StorageItem =
    StorageItem::new("Indices", "Accounts", Hasher::Blake2_128Concat);

pub const MULTISIG_MULTISIGS: StorageItem =
    StorageItem::new("Multisig", "Multisigs", Hasher::Twox64Concat);
pub const MULTISIG_CALLS: StorageItem = StorageItem::new("Multisig", "Calls", Hasher::Identity);

pub const PROXY_PROXIES: StorageItem =
    StorageItem::new("Proxy", "Proxies", Hasher::Twox64Concat);
pub const PROXY_ANNOUNCEMENTS: StorageItem =
    StorageItem::new("Proxy", "Announcements", Hasher::Twox64Concat);

pub const TREASURY_PROPOSALS: StorageItem =
    StorageItem::new("Treasury", "Proposals", Hasher::Twox64Concat);
pub const TREASURY_TIPS: StorageItem = StorageItem::new("Treasury", "Tips", Hasher::Twox64Concat);
pub const TREASURY_BOUNTIES: StorageItem =
    StorageItem::new("Treasury", "Bounties", Hasher::Twox64Concat);
