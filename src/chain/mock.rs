// In-memory chain used by the unit tests.

use anyhow::{Result, anyhow, bail};
use std::collections::{HashMap, HashSet};

use super::ChainSource;
use super::types::{
    AccountIndex, AccountInfoRecord, Announcements, Bounty, DepositOf, IndexRecord, Multisig,
    MultisigCall, OpenTip, PreimageStatus, PropIndex, Proxies, Registration, Subs,
    TreasuryProposal, Voter,
};
use crate::schemas::{AccountId, Balance, BlockHash};

#[derive(Clone, Debug, Default)]
pub struct MockBlock {
    pub accounts: HashMap<AccountId, AccountInfoRecord>,
    pub legacy_reserved: HashMap<AccountId, Balance>,
    pub members: Vec<(AccountId, Balance)>,
    pub runners_up: Vec<(AccountId, Balance)>,
    pub candidates: Vec<AccountId>,
    pub voting: HashMap<AccountId, Voter>,
    pub identity: HashMap<AccountId, Registration>,
    pub subs: HashMap<AccountId, Subs>,
    pub proxies: HashMap<AccountId, Proxies>,
    pub announcements: HashMap<AccountId, Announcements>,
    pub democracy_deposits: Vec<(PropIndex, DepositOf)>,
    pub democracy_preimages: Vec<PreimageStatus>,
    pub indices: Vec<(AccountIndex, IndexRecord)>,
    pub multisigs: Vec<Multisig>,
    pub multisig_calls: Vec<MultisigCall>,
    pub treasury_proposals: Vec<TreasuryProposal>,
    pub treasury_tips: Vec<OpenTip>,
    pub treasury_bounties: Vec<Bounty>,
}

#[derive(Clone, Debug, Default)]
pub struct MockChain {
    pub head: BlockHash,
    pub parents: HashMap<BlockHash, BlockHash>,
    pub blocks: HashMap<BlockHash, MockBlock>,
    /// reads at these blocks fail, as a dropped connection would
    pub broken: HashSet<BlockHash>,
}

pub fn acc(n: u8) -> AccountId {
    AccountId([n; 32])
}

pub fn hash(n: u8) -> BlockHash {
    BlockHash([n; 32])
}

impl MockChain {
    pub fn block_mut(&mut self, at: BlockHash) -> &mut MockBlock {
        self.blocks.entry(at).or_default()
    }

    pub fn set_reserved(&mut self, at: BlockHash, who: AccountId, reserved: Balance) {
        let info = self.block_mut(at).accounts.entry(who).or_default();
        info.reserved = reserved;
    }

    pub fn set_parent(&mut self, child: BlockHash, parent: BlockHash) {
        self.parents.insert(child, parent);
    }

    fn block(&self, at: BlockHash) -> Result<MockBlock> {
        if self.broken.contains(&at) {
            bail!("connection reset while reading block {at}");
        }
        Ok(self.blocks.get(&at).cloned().unwrap_or_default())
    }
}

impl ChainSource for MockChain {
    fn finalized_head(&self) -> Result<BlockHash> {
        Ok(self.head)
    }

    fn parent_hash(&self, at: BlockHash) -> Result<BlockHash> {
        if self.broken.contains(&at) {
            bail!("connection reset while reading header {at}");
        }
        self.parents.get(&at).copied().ok_or_else(|| anyhow!("unknown block {at}"))
    }

    fn account(&self, who: &AccountId, at: BlockHash) -> Result<Option<AccountInfoRecord>> {
        Ok(self.block(at)?.accounts.get(who).copied())
    }

    fn legacy_reserved(&self, who: &AccountId, at: BlockHash) -> Result<Option<Balance>> {
        Ok(self.block(at)?.legacy_reserved.get(who).copied())
    }

    fn accounts(&self, at: BlockHash) -> Result<Vec<AccountId>> {
        let mut all: Vec<AccountId> = self.block(at)?.accounts.keys().copied().collect();
        all.sort();
        Ok(all)
    }

    fn members(&self, at: BlockHash) -> Result<Vec<(AccountId, Balance)>> {
        Ok(self.block(at)?.members)
    }

    fn runners_up(&self, at: BlockHash) -> Result<Vec<(AccountId, Balance)>> {
        Ok(self.block(at)?.runners_up)
    }

    fn candidates(&self, at: BlockHash) -> Result<Vec<AccountId>> {
        Ok(self.block(at)?.candidates)
    }

    fn voting(&self, who: &AccountId, at: BlockHash) -> Result<Option<Voter>> {
        Ok(self.block(at)?.voting.get(who).cloned())
    }

    fn identity_of(&self, who: &AccountId, at: BlockHash) -> Result<Option<Registration>> {
        Ok(self.block(at)?.identity.get(who).cloned())
    }

    fn subs_of(&self, who: &AccountId, at: BlockHash) -> Result<Option<Subs>> {
        Ok(self.block(at)?.subs.get(who).cloned())
    }

    fn proxies(&self, who: &AccountId, at: BlockHash) -> Result<Option<Proxies>> {
        Ok(self.block(at)?.proxies.get(who).cloned())
    }

    fn announcements(&self, who: &AccountId, at: BlockHash) -> Result<Option<Announcements>> {
        Ok(self.block(at)?.announcements.get(who).cloned())
    }

    fn democracy_deposits(&self, at: BlockHash) -> Result<Vec<(PropIndex, DepositOf)>> {
        Ok(self.block(at)?.democracy_deposits)
    }

    fn democracy_preimages(&self, at: BlockHash) -> Result<Vec<PreimageStatus>> {
        Ok(self.block(at)?.democracy_preimages)
    }

    fn indices(&self, at: BlockHash) -> Result<Vec<(AccountIndex, IndexRecord)>> {
        Ok(self.block(at)?.indices)
    }

    fn multisigs(&self, at: BlockHash) -> Result<Vec<Multisig>> {
        Ok(self.block(at)?.multisigs)
    }

    fn multisig_calls(&self, at: BlockHash) -> Result<Vec<MultisigCall>> {
        Ok(self.block(at)?.multisig_calls)
    }

    fn treasury_proposals(&self, at: BlockHash) -> Result<Vec<TreasuryProposal>> {
        Ok(self.block(at)?.treasury_proposals)
    }

    fn treasury_tips(&self, at: BlockHash) -> Result<Vec<OpenTip>> {
        Ok(self.block(at)?.treasury_tips)
    }

    fn treasury_bounties(&self, at: BlockHash) -> Result<Vec<Bounty>> {
        Ok(self.block(at)?.treasury_bounties)
    }
}
