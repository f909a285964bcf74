use crate::schemas::Balance;

pub const DEFAULT_EXPLORER_URL: &str = "https://explorer-31.polkascan.io";

pub const EXPLORER_PAGE_SIZE: usize = 100;

/// `state_getKeysPaged` page size.
pub const STORAGE_KEYS_PAGE_SIZE: u32 = 1000;

/// Number of keys per `state_queryStorageAt` request.
pub const STORAGE_QUERY_CHUNK: usize = 256;

pub const TREASURY_PALLET_ID: &[u8; 8] = b"py/trsry";

pub const MODULE_ACCOUNT_PREFIX: &[u8; 4] = b"modl";

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum Network {
    Polkadot,
    Kusama,
}

impl Network {
    pub fn name(&self) -> &'static str {
        match self {
            Network::Polkadot => "polkadot",
            Network::Kusama => "kusama",
        }
    }
}

/// How the `LookupSource` of `balances.force_transfer` is encoded by the target runtime.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum AddressFormat {
    /// `MultiAddress::Id`, a `0x00` tag then the account id.
    MultiAddress,
    /// legacy `pallet_indices::Address::Id`, a `0xff` tag then the account id.
    Indices,
    /// bare account id
    AccountId,
}

/// Runtime constants the reconciliation needs but cannot read from storage.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct NetworkParams {
    pub network: Network,
    pub ss58_prefix: u16,
    pub decimals: u32,
    pub symbol: &'static str,
    pub candidacy_bond: Balance,
    pub voting_bond: Balance,
    pub society_candidate_deposit: Balance,
    pub balances_pallet_index: u8,
    pub force_transfer_call_index: u8,
    pub utility_pallet_index: u8,
    pub batch_call_index: u8,
    pub democracy_pallet_index: u8,
    pub note_preimage_call_index: u8,
    pub address_format: AddressFormat,
    /// Known treasury address, used as a sanity check on the derived one.
    pub treasury_address: &'static str,
}

pub fn network_params(network: Network) -> NetworkParams {
    match network {
        Network::Polkadot => {
            const DOLLARS: Balance = 10_000_000_000;
            NetworkParams {
                network,
                ss58_prefix: 0,
                decimals: 10,
                symbol: "DOT",
                candidacy_bond: 100 * DOLLARS,
                voting_bond: 5 * DOLLARS,
                society_candidate_deposit: 0,
                balances_pallet_index: 5,
                force_transfer_call_index: 2,
                utility_pallet_index: 26,
                batch_call_index: 0,
                democracy_pallet_index: 14,
                note_preimage_call_index: 14,
                address_format: AddressFormat::MultiAddress,
                treasury_address: "13UVJyLnbVp9RBZYFwFGyDvVd1y27Tt8tkntv6Q7JVPhFsTB",
            }
        }
        Network::Kusama => {
            const DOLLARS: Balance = 1_000_000_000_000 / 6;
            const CENTS: Balance = DOLLARS / 100;
            NetworkParams {
                network,
                ss58_prefix: 2,
                decimals: 12,
                symbol: "KSM",
                candidacy_bond: DOLLARS,
                voting_bond: 5 * CENTS,
                society_candidate_deposit: 10 * DOLLARS,
                balances_pallet_index: 4,
                force_transfer_call_index: 2,
                utility_pallet_index: 24,
                batch_call_index: 0,
                democracy_pallet_index: 13,
                note_preimage_call_index: 14,
                address_format: AddressFormat::MultiAddress,
                treasury_address: "F3opxRbN5ZbjJNU511Kj2TLuzFcDq9BGduA9TgiECafpg29",
            }
        }
    }
}
