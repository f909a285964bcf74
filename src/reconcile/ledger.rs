// src/reconcile/ledger.rs

use anyhow::Result;
use tracing::{info, warn};

use crate::chain::types::{BountyStatus, Judgement, PreimageStatus};
use crate::chain::{AccountRecords, ChainSource, ModuleSnapshots};
use crate::consts::NetworkParams;
use crate::schemas::{AccountId, Balance, BlockHash, Deposit};
use crate::utils::amounts::{format_token, signed_diff};

/// Deposits an account should be holding, and their sum.
#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct DepositSet {
    pub deposits: Vec<Deposit>,
    pub sum: Balance,
}

impl DepositSet {
    fn push(&mut self, source: impl Into<String>, amount: Balance) {
        self.sum = self.sum.saturating_add(amount);
        self.deposits.push(Deposit::new(source, amount));
    }
}

/// Walk every module table and collect the reservations that belong to `who`.
pub fn compute_deposits(
    who: &AccountId,
    snapshots: &ModuleSnapshots,
    records: &AccountRecords,
    params: &NetworkParams,
) -> DepositSet {
    let mut out = DepositSet::default();

    // democracy: one deposit per second, plus provided preimages
    for (prop, deposit_of) in &snapshots.democracy_deposits {
        let seconds = deposit_of.backers.iter().filter(|b| *b == who).count();
        for _ in 0..seconds {
            out.push(format!("democracy.depositOf-{prop}"), deposit_of.deposit);
        }
    }
    for preimage in &snapshots.democracy_preimages {
        if let PreimageStatus::Available { provider, deposit, .. } = preimage {
            if provider == who {
                out.push("democracy.preImages", *deposit);
            }
        }
    }

    // elections-phragmen
    if records.voting.as_ref().is_some_and(|v| !v.votes.is_empty()) {
        out.push("elections-phragmen.voter", params.voting_bond);
    }
    let is_member = snapshots.members.contains(who);
    let is_runner_up = snapshots.runners_up.contains(who);
    let is_candidate = snapshots.candidates.contains(who);
    if is_member || is_runner_up || is_candidate {
        out.push("elections-phragmen.candidacy", params.candidacy_bond);
    }

    // identity
    if let Some(identity) = &records.identity {
        out.push("identity.deposit", identity.deposit);
        for (_, judgement) in &identity.judgements {
            if let Judgement::FeePaid(fee) = judgement {
                out.push("identity.judgments", *fee);
            }
        }
    }
    if let Some(subs) = &records.subs {
        out.push("identity.subs", subs.deposit);
    }

    // indices
    for (index, record) in &snapshots.indices {
        if &record.owner == who && !record.frozen {
            out.push(format!("indices.{index}"), record.deposit);
        }
    }

    // multisig
    for multi in &snapshots.multisigs {
        if &multi.depositor == who {
            out.push("multisig.multisig", multi.deposit);
        }
    }
    for call in &snapshots.multisig_calls {
        if &call.depositor == who {
            out.push("multisig.call", call.deposit);
        }
    }

    // proxy
    if let Some(proxies) = &records.proxies {
        out.push("proxy.proxies[direct]", proxies.deposit);
    }
    if let Some(announcements) = &records.announcements {
        out.push("proxy.announcements", announcements.deposit);
    }

    // treasury
    for prop in &snapshots.treasury_proposals {
        if &prop.proposer == who {
            out.push("treasury.proposals", prop.bond);
        }
    }
    for tip in &snapshots.treasury_tips {
        if &tip.finder == who {
            out.push("treasury.tip", tip.deposit);
        }
    }
    for bounty in &snapshots.treasury_bounties {
        match &bounty.status {
            BountyStatus::Proposed | BountyStatus::Funded => {
                if &bounty.proposer == who {
                    out.push("treasury.bounty.proposer", bounty.bond);
                }
            }
            status => {
                if bounty.curator_deposit != 0 && status.curator() == Some(who) {
                    out.push("treasury.bounty.curator", bounty.curator_deposit);
                }
            }
        }
    }

    out
}

/// Ledger result for one account next to what the chain actually reserves.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct LedgerCheck {
    pub who: AccountId,
    pub deposits: DepositSet,
    pub reserved: Balance,
    pub nonce: Option<u32>,
}

impl LedgerCheck {
    pub fn matches(&self) -> bool {
        self.deposits.sum == self.reserved
    }

    /// `should_reserve - has_reserve`, signed.
    pub fn missing(&self) -> Result<i128> {
        signed_diff(self.deposits.sum, self.reserved)
    }
}

#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct LedgerSummary {
    pub good: usize,
    pub bad: usize,
}

/// Compare module bookkeeping against on-chain reserved for each account at `at`.
///
/// Mismatches are reported, never treated as errors.
pub fn check_reserved(
    source: &dyn ChainSource,
    whos: &[AccountId],
    at: BlockHash,
    params: &NetworkParams,
) -> Result<(Vec<LedgerCheck>, LedgerSummary)> {
    let snapshots = ModuleSnapshots::fetch(source, at)?;
    let mut summary = LedgerSummary::default();
    let mut out = Vec::with_capacity(whos.len());

    for who in whos {
        let records = AccountRecords::fetch(source, who, at)?;
        let deposits = compute_deposits(who, &snapshots, &records, params);
        let check = LedgerCheck {
            who: *who,
            deposits,
            reserved: records.reserved(),
            nonce: records.info.map(|i| i.nonce),
        };

        let addr = who.to_ss58(params.ss58_prefix);
        if check.matches() {
            summary.good += 1;
            info!(
                "[ledger] ✅ {addr} on-chain reserved = {} // module-sum = {}",
                format_token(check.reserved, params.decimals, params.symbol),
                format_token(check.deposits.sum, params.decimals, params.symbol),
            );
        } else {
            summary.bad += 1;
            warn!(
                "[ledger] ❌ {addr} on-chain reserved = {} ({}) // module-sum = {} ({})",
                format_token(check.reserved, params.decimals, params.symbol),
                check.reserved,
                format_token(check.deposits.sum, params.decimals, params.symbol),
                check.deposits.sum,
            );
            if check.nonce == Some(0) {
                warn!("[ledger] ⚠️  {addr} has nonce zero, probably a multisig account");
            }
            for d in &check.deposits.deposits {
                warn!(
                    "[ledger]   + {} => {}",
                    d.source,
                    format_token(d.amount, params.decimals, params.symbol)
                );
            }
        }
        out.push(check);
    }

    info!("[ledger] {} good / {} bad", summary.good, summary.bad);
    Ok((out, summary))
}
