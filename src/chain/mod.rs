pub mod rpc;
pub mod storage;
pub mod types;

#[cfg(test)]
pub mod mock;

use anyhow::{Context, Result};

use crate::schemas::{AccountId, Balance, BalanceSnapshot, BlockHash};
use types::{
    AccountIndex, AccountInfoRecord, Announcements, Bounty, DepositOf, IndexRecord, Multisig,
    MultisigCall, OpenTip, PreimageStatus, PropIndex, Proxies, Registration, Subs,
    TreasuryProposal, Voter,
};

/// Point-in-time, read-only view of the chain.
///
/// Every lookup is explicit about absence: `Ok(None)` means the record is not in storage at
/// `at`, an `Err` means we could not find out.
pub trait ChainSource: Send + Sync {
    fn finalized_head(&self) -> Result<BlockHash>;
    fn parent_hash(&self, at: BlockHash) -> Result<BlockHash>;

    fn account(&self, who: &AccountId, at: BlockHash) -> Result<Option<AccountInfoRecord>>;
    /// Pre-`AccountInfo` storage of reserved balance (`Balances.ReservedBalance`).
    fn legacy_reserved(&self, who: &AccountId, at: BlockHash) -> Result<Option<Balance>>;
    fn accounts(&self, at: BlockHash) -> Result<Vec<AccountId>>;

    fn members(&self, at: BlockHash) -> Result<Vec<(AccountId, Balance)>>;
    fn runners_up(&self, at: BlockHash) -> Result<Vec<(AccountId, Balance)>>;
    fn candidates(&self, at: BlockHash) -> Result<Vec<AccountId>>;
    fn voting(&self, who: &AccountId, at: BlockHash) -> Result<Option<Voter>>;

    fn identity_of(&self, who: &AccountId, at: BlockHash) -> Result<Option<Registration>>;
    fn subs_of(&self, who: &AccountId, at: BlockHash) -> Result<Option<Subs>>;
    fn proxies(&self, who: &AccountId, at: BlockHash) -> Result<Option<Proxies>>;
    fn announcements(&self, who: &AccountId, at: BlockHash) -> Result<Option<Announcements>>;

    fn democracy_deposits(&self, at: BlockHash) -> Result<Vec<(PropIndex, DepositOf)>>;
    fn democracy_preimages(&self, at: BlockHash) -> Result<Vec<PreimageStatus>>;
    fn indices(&self, at: BlockHash) -> Result<Vec<(AccountIndex, IndexRecord)>>;
    fn multisigs(&self, at: BlockHash) -> Result<Vec<Multisig>>;
    fn multisig_calls(&self, at: BlockHash) -> Result<Vec<MultisigCall>>;
    fn treasury_proposals(&self, at: BlockHash) -> Result<Vec<TreasuryProposal>>;
    fn treasury_tips(&self, at: BlockHash) -> Result<Vec<OpenTip>>;
    fn treasury_bounties(&self, at: BlockHash) -> Result<Vec<Bounty>>;

    /// Reserved balance of each account at `at`, in input order.
    ///
    /// Sequential by default; sources with a network round trip override this to batch.
    fn reserved_snapshots(&self, whos: &[AccountId], at: BlockHash) -> Result<Vec<BalanceSnapshot>> {
        whos.iter()
            .map(|who| {
                let current = self.account(who, at)?.map(|a| a.reserved);
                let legacy = self.legacy_reserved(who, at)?;
                Ok(BalanceSnapshot { who: *who, reserved: effective_reserved(current, legacy) })
            })
            .collect()
    }
}

/// Funds that moved from the legacy reserved map into `AccountData` are not spent; take the
/// larger of the two readings.
pub fn effective_reserved(current: Option<Balance>, legacy: Option<Balance>) -> Balance {
    current.unwrap_or(0).max(legacy.unwrap_or(0))
}

/// Full-table scans used by the deposit ledger, taken once per block.
#[derive(Clone, Debug, Default)]
pub struct ModuleSnapshots {
    pub democracy_deposits: Vec<(PropIndex, DepositOf)>,
    pub democracy_preimages: Vec<PreimageStatus>,
    pub members: Vec<AccountId>,
    pub runners_up: Vec<AccountId>,
    pub candidates: Vec<AccountId>,
    pub indices: Vec<(AccountIndex, IndexRecord)>,
    pub multisigs: Vec<Multisig>,
    pub multisig_calls: Vec<MultisigCall>,
    pub treasury_proposals: Vec<TreasuryProposal>,
    pub treasury_tips: Vec<OpenTip>,
    pub treasury_bounties: Vec<Bounty>,
}

impl ModuleSnapshots {
    pub fn fetch(source: &dyn ChainSource, at: BlockHash) -> Result<Self> {
        Ok(Self {
            democracy_deposits: source
                .democracy_deposits(at)
                .context("failed to scan Democracy.DepositOf")?,
            democracy_preimages: source
                .democracy_preimages(at)
                .context("failed to scan Democracy.Preimages")?,
            members: source
                .members(at)
                .context("failed to read elections members")?
                .into_iter()
                .map(|(who, _)| who)
                .collect(),
            runners_up: source
                .runners_up(at)
                .context("failed to read elections runners-up")?
                .into_iter()
                .map(|(who, _)| who)
                .collect(),
            candidates: source.candidates(at).context("failed to read elections candidates")?,
            indices: source.indices(at).context("failed to scan Indices.Accounts")?,
            multisigs: source.multisigs(at).context("failed to scan Multisig.Multisigs")?,
            multisig_calls: source.multisig_calls(at).context("failed to scan Multisig.Calls")?,
            treasury_proposals: source
                .treasury_proposals(at)
                .context("failed to scan Treasury.Proposals")?,
            treasury_tips: source.treasury_tips(at).context("failed to scan Treasury.Tips")?,
            treasury_bounties: source
                .treasury_bounties(at)
                .context("failed to scan Treasury.Bounties")?,
        })
    }
}

/// Point lookups for a single account.
#[derive(Clone, Debug, Default)]
pub struct AccountRecords {
    pub info: Option<AccountInfoRecord>,
    pub voting: Option<Voter>,
    pub identity: Option<Registration>,
    pub subs: Option<Subs>,
    pub proxies: Option<Proxies>,
    pub announcements: Option<Announcements>,
}

impl AccountRecords {
    pub fn fetch(source: &dyn ChainSource, who: &AccountId, at: BlockHash) -> Result<Self> {
        let ctx = |what: &str| format!("failed to read {what} of {who} at {at}");
        Ok(Self {
            info: source.account(who, at).with_context(|| ctx("account info"))?,
            voting: source.voting(who, at).with_context(|| ctx("voting"))?,
            identity: source.identity_of(who, at).with_context(|| ctx("identity"))?,
            subs: source.subs_of(who, at).with_context(|| ctx("subs"))?,
            proxies: source.proxies(who, at).with_context(|| ctx("proxies"))?,
            announcements: source.announcements(who, at).with_context(|| ctx("announcements"))?,
        })
    }

    pub fn reserved(&self) -> Balance {
        self.info.map(|i| i.reserved).unwrap_or(0)
    }
}
