// src/chain/types.rs
//
// SCALE layouts of the module records we read. Only the fields the ledger needs are exposed
// by name; the rest are decoded to keep the cursor aligned.

use anyhow::{Result, bail};
use parity_scale_codec::{Decode, Error as CodecError, Input};

use crate::schemas::{AccountId, Balance, BlockNumber};

pub type PropIndex = u32;
pub type AccountIndex = u32;

/// `frame_system::AccountInfo`, decoded by layout rather than by type.
///
/// The header (nonce, ref counters) changed width across runtime upgrades, but `AccountData`
/// (free, reserved, misc_frozen, fee_frozen) has always been the trailing 64 bytes.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Default)]
pub struct AccountInfoRecord {
    pub nonce: u32,
    pub free: Balance,
    pub reserved: Balance,
}

impl AccountInfoRecord {
    pub fn from_raw(bytes: &[u8]) -> Result<Self> {
        if bytes.len() < 4 + 64 {
            bail!("account info too short: {} bytes", bytes.len());
        }
        let le_u128 = |at: usize| {
            let mut a = [0u8; 16];
            a.copy_from_slice(&bytes[at..at + 16]);
            u128::from_le_bytes(a)
        };
        let mut n = [0u8; 4];
        n.copy_from_slice(&bytes[..4]);
        let data_start = bytes.len() - 64;
        Ok(Self {
            nonce: u32::from_le_bytes(n),
            free: le_u128(data_start),
            reserved: le_u128(data_start + 16),
        })
    }
}

/// `Democracy.DepositOf` value: backers (one entry per `second`) and the per-backer deposit.
#[derive(Decode, Clone, Debug, PartialEq, Eq)]
pub struct DepositOf {
    pub backers: Vec<AccountId>,
    pub deposit: Balance,
}

#[derive(Decode, Clone, Debug, PartialEq, Eq)]
pub enum PreimageStatus {
    Missing(BlockNumber),
    Available {
        data: Vec<u8>,
        provider: AccountId,
        deposit: Balance,
        since: BlockNumber,
        expiry: Option<BlockNumber>,
    },
}

/// `PhragmenElection.Voting` value: (stake, votes).
#[derive(Decode, Clone, Debug, PartialEq, Eq)]
pub struct Voter {
    pub stake: Balance,
    pub votes: Vec<AccountId>,
}

/// `Identity` display data. Variant tags 1..=33 carry raw bytes of length `tag - 1`.
#[derive(Clone, Debug, PartialEq, Eq, Default)]
pub enum Data {
    #[default]
    None,
    Raw(Vec<u8>),
    BlakeTwo256([u8; 32]),
    Sha256([u8; 32]),
    Keccak256([u8; 32]),
    ShaThree256([u8; 32]),
}

impl Decode for Data {
    fn decode<I: Input>(input: &mut I) -> Result<Self, CodecError> {
        let tag = input.read_byte()?;
        let hash = |input: &mut I| -> Result<[u8; 32], CodecError> {
            let mut h = [0u8; 32];
            input.read(&mut h)?;
            Ok(h)
        };
        Ok(match tag {
            0 => Data::None,
            1..=33 => {
                let mut raw = vec![0u8; (tag - 1) as usize];
                input.read(&mut raw)?;
                Data::Raw(raw)
            }
            34 => Data::BlakeTwo256(hash(input)?),
            35 => Data::Sha256(hash(input)?),
            36 => Data::Keccak256(hash(input)?),
            37 => Data::ShaThree256(hash(input)?),
            _ => return Err("invalid identity data tag".into()),
        })
    }
}

impl Data {
    pub fn as_display(&self) -> Option<String> {
        match self {
            Data::Raw(bytes) => Some(String::from_utf8_lossy(bytes).into_owned()),
            _ => None,
        }
    }
}

#[derive(Decode, Clone, Debug, PartialEq, Eq)]
pub enum Judgement {
    Unknown,
    FeePaid(Balance),
    Reasonable,
    KnownGood,
    OutOfDate,
    LowQuality,
    Erroneous,
}

#[derive(Decode, Clone, Debug, PartialEq, Eq, Default)]
pub struct IdentityInfo {
    pub additional: Vec<(Data, Data)>,
    pub display: Data,
    pub legal: Data,
    pub web: Data,
    pub riot: Data,
    pub email: Data,
    pub pgp_fingerprint: Option<[u8; 20]>,
    pub image: Data,
    pub twitter: Data,
}

#[derive(Decode, Clone, Debug, PartialEq, Eq)]
pub struct Registration {
    pub judgements: Vec<(u32, Judgement)>,
    pub deposit: Balance,
    pub info: IdentityInfo,
}

/// `Identity.SubsOf` value: (deposit, sub accounts).
#[derive(Decode, Clone, Debug, PartialEq, Eq)]
pub struct Subs {
    pub deposit: Balance,
    pub accounts: Vec<AccountId>,
}

/// `Indices.Accounts` value: (owner, deposit, frozen).
#[derive(Decode, Clone, Debug, PartialEq, Eq)]
pub struct IndexRecord {
    pub owner: AccountId,
    pub deposit: Balance,
    pub frozen: bool,
}

#[derive(Decode, Clone, Copy, Debug, PartialEq, Eq)]
pub struct Timepoint {
    pub height: BlockNumber,
    pub index: u32,
}

#[derive(Decode, Clone, Debug, PartialEq, Eq)]
pub struct Multisig {
    pub when: Timepoint,
    pub deposit: Balance,
    pub depositor: AccountId,
    pub approvals: Vec<AccountId>,
}

/// `Multisig.Calls` value: (opaque call, depositor, deposit).
#[derive(Decode, Clone, Debug, PartialEq, Eq)]
pub struct MultisigCall {
    pub call: Vec<u8>,
    pub depositor: AccountId,
    pub deposit: Balance,
}

#[derive(Decode, Clone, Debug, PartialEq, Eq)]
pub struct ProxyDefinition {
    pub delegate: AccountId,
    pub proxy_type: u8,
    pub delay: BlockNumber,
}

/// `Proxy.Proxies` value: (definitions, deposit).
#[derive(Decode, Clone, Debug, PartialEq, Eq)]
pub struct Proxies {
    pub definitions: Vec<ProxyDefinition>,
    pub deposit: Balance,
}

#[derive(Decode, Clone, Debug, PartialEq, Eq)]
pub struct Announcement {
    pub real: AccountId,
    pub call_hash: [u8; 32],
    pub height: BlockNumber,
}

/// `Proxy.Announcements` value: (announcements, deposit).
#[derive(Decode, Clone, Debug, PartialEq, Eq)]
pub struct Announcements {
    pub announcements: Vec<Announcement>,
    pub deposit: Balance,
}

#[derive(Decode, Clone, Debug, PartialEq, Eq)]
pub struct TreasuryProposal {
    pub proposer: AccountId,
    pub value: Balance,
    pub beneficiary: AccountId,
    pub bond: Balance,
}

#[derive(Decode, Clone, Debug, PartialEq, Eq)]
pub struct OpenTip {
    pub reason: [u8; 32],
    pub who: AccountId,
    pub finder: AccountId,
    pub deposit: Balance,
    pub closes: Option<BlockNumber>,
    pub tips: Vec<(AccountId, Balance)>,
    pub finders_fee: bool,
}

#[derive(Decode, Clone, Debug, PartialEq, Eq)]
pub enum BountyStatus {
    Proposed,
    Approved,
    Funded,
    CuratorProposed { curator: AccountId },
    Active { curator: AccountId, update_due: BlockNumber },
    PendingPayout { curator: AccountId, beneficiary: AccountId, unlock_at: BlockNumber },
}

impl BountyStatus {
    pub fn curator(&self) -> Option<&AccountId> {
        match self {
            BountyStatus::CuratorProposed { curator }
            | BountyStatus::Active { curator, .. }
            | BountyStatus::PendingPayout { curator, .. } => Some(curator),
            _ => None,
        }
    }
}

#[derive(Decode, Clone, Debug, PartialEq, Eq)]
pub struct Bounty {
    pub proposer: AccountId,
    pub value: Balance,
    pub fee: Balance,
    pub curator_deposit: Balance,
    pub bond: Balance,
    pub status: BountyStatus,
}

#[cfg(test)]
mod tests {
    use super::*;
    use parity_scale_codec::Encode;

    #[test]
    fn account_info_reads_trailing_account_data() {
        // nonce u32, refcount u8, then four u128
        let mut raw = Vec::new();
        raw.extend_from_slice(&7u32.to_le_bytes());
        raw.push(1u8);
        for v in [1_000u128, 200, 0, 0] {
            raw.extend_from_slice(&v.to_le_bytes());
        }
        let info = AccountInfoRecord::from_raw(&raw).expect("decode");
        assert_eq!(info, AccountInfoRecord { nonce: 7, free: 1_000, reserved: 200 });

        // newer header: nonce, consumers, providers, sufficients
        let mut raw = Vec::new();
        for v in [3u32, 0, 1, 0] {
            raw.extend_from_slice(&v.to_le_bytes());
        }
        for v in [5u128, 6, 0, 0] {
            raw.extend_from_slice(&v.to_le_bytes());
        }
        let info = AccountInfoRecord::from_raw(&raw).expect("decode");
        assert_eq!(info.reserved, 6);
        assert_eq!(info.nonce, 3);

        assert!(AccountInfoRecord::from_raw(&[0u8; 10]).is_err());
    }

    #[test]
    fn identity_registration_decodes_raw_display() {
        let mut raw = Vec::new();
        // judgements: [(0, FeePaid(10)), (1, Reasonable)]
        raw.extend_from_slice(&parity_scale_codec::Compact(2u32).encode());
        raw.extend_from_slice(&0u32.encode());
        raw.push(1);
        raw.extend_from_slice(&10u128.encode());
        raw.extend_from_slice(&1u32.encode());
        raw.push(2);
        // deposit
        raw.extend_from_slice(&500u128.encode());
        // info: additional = []
        raw.extend_from_slice(&parity_scale_codec::Compact(0u32).encode());
        // display = Raw("bob")
        raw.push(4);
        raw.extend_from_slice(b"bob");
        // legal, web, riot, email = None
        raw.extend_from_slice(&[0, 0, 0, 0]);
        // pgp None
        raw.push(0);
        // image, twitter None
        raw.extend_from_slice(&[0, 0]);

        let reg = Registration::decode(&mut raw.as_slice()).expect("decode");
        assert_eq!(reg.deposit, 500);
        assert_eq!(reg.judgements.len(), 2);
        assert_eq!(reg.judgements[0].1, Judgement::FeePaid(10));
        assert_eq!(reg.judgements[1].1, Judgement::Reasonable);
        assert_eq!(reg.info.display.as_display().as_deref(), Some("bob"));
    }

    #[test]
    fn bounty_status_exposes_curator() {
        let curator = AccountId([4u8; 32]);
        let mut raw = Vec::new();
        raw.extend_from_slice(&[1u8; 32]);
        for v in [100u128, 1, 5, 9] {
            raw.extend_from_slice(&v.encode());
        }
        raw.push(4); // Active
        raw.extend_from_slice(&curator.0);
        raw.extend_from_slice(&77u32.encode());

        let b = Bounty::decode(&mut raw.as_slice()).expect("decode");
        assert_eq!(b.curator_deposit, 5);
        assert_eq!(b.bond, 9);
        assert_eq!(b.status.curator(), Some(&curator));
    }
}
