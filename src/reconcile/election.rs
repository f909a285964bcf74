// src/reconcile/election.rs

use anyhow::{Context, Result, bail};
use std::collections::{BTreeMap, BTreeSet};
use tracing::{info, warn};

use super::slash::detect_slash;
use crate::chain::ChainSource;
use crate::schemas::{
    AccountId, Balance, BalanceSnapshot, BlockHash, ElectionBlock, ElectionTransition, Slash,
};

/// Per-account refunds owed by the treasury, plus the slashes that produced them.
#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct RefundLedger {
    totals: BTreeMap<AccountId, Balance>,
    trail: Vec<Slash>,
}

impl RefundLedger {
    pub fn credit(&mut self, slash: Slash) {
        let e = self.totals.entry(slash.who).or_default();
        *e = e.saturating_add(slash.amount);
        self.trail.push(slash);
    }

    pub fn get(&self, who: &AccountId) -> Balance {
        self.totals.get(who).copied().unwrap_or(0)
    }

    pub fn iter(&self) -> impl Iterator<Item = (&AccountId, &Balance)> {
        self.totals.iter()
    }

    pub fn len(&self) -> usize {
        self.totals.len()
    }

    pub fn is_empty(&self) -> bool {
        self.totals.is_empty()
    }

    pub fn total(&self) -> Balance {
        self.totals.values().fold(0u128, |acc, v| acc.saturating_add(*v))
    }

    /// Every refunded slash, in the order it was credited.
    pub fn trail(&self) -> &[Slash] {
        &self.trail
    }
}

/// Greedy first-fit: each slash takes the first equal, unused deposit; slashes with no
/// matching deposit are dropped.
pub fn subset_match(slashes: &[Slash], deposits: &[Balance]) -> Vec<Slash> {
    let mut remaining: Vec<Balance> = deposits.to_vec();
    let mut out = Vec::new();
    for s in slashes {
        if let Some(idx) = remaining.iter().position(|d| *d == s.amount) {
            remaining.remove(idx);
            out.push(*s);
        }
    }
    out
}

/// Multiset inclusion of `xs` in `ys`.
pub fn is_subset_of(xs: &[Balance], ys: &[Balance]) -> bool {
    let mut remaining: Vec<Balance> = ys.to_vec();
    for x in xs {
        match remaining.iter().position(|y| y == x) {
            Some(idx) => {
                remaining.remove(idx);
            }
            None => return false,
        }
    }
    true
}

/// Accounts that held a seat or a runner-up slot before and hold neither after.
pub fn correct_slashes(
    pre_members: &[AccountId],
    post_members: &[AccountId],
    pre_runners_up: &[AccountId],
    post_runners_up: &[AccountId],
) -> BTreeSet<AccountId> {
    pre_members
        .iter()
        .chain(pre_runners_up.iter())
        .filter(|who| !post_members.contains(who) && !post_runners_up.contains(who))
        .copied()
        .collect()
}

/// Everything read from the chain for one transition.
#[derive(Clone, Debug)]
pub struct TransitionState {
    pub transition: ElectionTransition,
    pub pre_members: Vec<AccountId>,
    pub pre_runners_up: Vec<AccountId>,
    pub pre_candidates: Vec<AccountId>,
    pub post_members: Vec<AccountId>,
    pub post_runners_up: Vec<AccountId>,
    /// reserved of every involved account, before and after, in `involved()` order
    pub before: Vec<BalanceSnapshot>,
    pub after: Vec<BalanceSnapshot>,
}

fn first_seen(lists: &[&[AccountId]]) -> Vec<AccountId> {
    let mut seen = BTreeSet::new();
    let mut out = Vec::new();
    for list in lists {
        for who in list.iter() {
            if seen.insert(*who) {
                out.push(*who);
            }
        }
    }
    out
}

impl TransitionState {
    pub fn fetch(source: &dyn ChainSource, block: &ElectionBlock) -> Result<Self> {
        let after = block.at;
        let before = source
            .parent_hash(after)
            .with_context(|| format!("failed to fetch parent of {after}"))?;
        let transition = ElectionTransition::from_block(block, before);

        let seats = |at: BlockHash| -> Result<(Vec<AccountId>, Vec<AccountId>)> {
            let members = source.members(at)?.into_iter().map(|(w, _)| w).collect();
            let runners = source.runners_up(at)?.into_iter().map(|(w, _)| w).collect();
            Ok((members, runners))
        };
        let (pre_members, pre_runners_up) =
            seats(before).with_context(|| format!("failed to read seats at {before}"))?;
        let (post_members, post_runners_up) =
            seats(after).with_context(|| format!("failed to read seats at {after}"))?;
        let pre_candidates = source
            .candidates(before)
            .with_context(|| format!("failed to read candidates at {before}"))?;

        let involved = first_seen(&[
            pre_members.as_slice(),
            pre_runners_up.as_slice(),
            post_members.as_slice(),
            post_runners_up.as_slice(),
        ]);
        let before_snaps = source
            .reserved_snapshots(&involved, before)
            .with_context(|| format!("failed to read reserved balances at {before}"))?;
        let after_snaps = source
            .reserved_snapshots(&involved, after)
            .with_context(|| format!("failed to read reserved balances at {after}"))?;

        Ok(Self {
            transition,
            pre_members,
            pre_runners_up,
            pre_candidates,
            post_members,
            post_runners_up,
            before: before_snaps,
            after: after_snaps,
        })
    }

    /// Every account in any of the four seat lists, first-seen order.
    pub fn involved(&self) -> Vec<AccountId> {
        first_seen(&[
            self.pre_members.as_slice(),
            self.pre_runners_up.as_slice(),
            self.post_members.as_slice(),
            self.post_runners_up.as_slice(),
        ])
    }

    fn pre_set(&self) -> BTreeSet<AccountId> {
        self.pre_members.iter().chain(self.pre_runners_up.iter()).copied().collect()
    }

    fn post_set(&self) -> BTreeSet<AccountId> {
        self.post_members.iter().chain(self.post_runners_up.iter()).copied().collect()
    }
}

/// Outcome of reconciling one transition.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct TransitionReport {
    pub at: BlockHash,
    pub time: String,
    pub detected: Vec<Slash>,
    pub effective: Vec<Slash>,
    pub correct: BTreeSet<AccountId>,
    pub refunded: Vec<Slash>,
    pub deposits: usize,
    pub unreserves: usize,
    pub pre_set: usize,
    pub post_set: usize,
    pub sets_equal: bool,
    pub candidate_outcomes: Vec<bool>,
    pub warnings: Vec<String>,
}

/// Classify the slashes of one transition. Invariant violations become warnings; only a
/// transition with no seat holders at all is an error.
pub fn reconcile_transition(state: &TransitionState) -> Result<TransitionReport> {
    let t = &state.transition;
    let involved = state.involved();
    if involved.is_empty() {
        bail!("no members or runners-up around election {}, chain data looks wrong", t.after);
    }

    let pre_set = state.pre_set();
    let post_set = state.post_set();
    let sets_equal = pre_set == post_set;
    let correct = correct_slashes(
        &state.pre_members,
        &state.post_members,
        &state.pre_runners_up,
        &state.post_runners_up,
    );

    let mut detected = Vec::new();
    for (before, after) in state.before.iter().zip(state.after.iter()) {
        let amount = detect_slash(&before.who, before, after, &t.unreserves);
        if amount != 0 {
            detected.push(Slash { who: before.who, amount, at: t.after });
        }
    }

    let effective = subset_match(&detected, &t.deposits);
    let refunded: Vec<Slash> =
        effective.iter().filter(|s| !correct.contains(&s.who)).copied().collect();

    let candidate_outcomes: Vec<bool> =
        state.pre_candidates.iter().map(|c| post_set.contains(c)).collect();
    let failed_candidates = candidate_outcomes.iter().filter(|elected| !**elected).count();

    let mut warnings = Vec::new();
    if effective.len() != detected.len() {
        warnings.push(format!(
            "a reduction in reserved seems to have been discarded: effective {:?}, all {:?}",
            effective.iter().map(|s| (s.who, s.amount)).collect::<Vec<_>>(),
            detected.iter().map(|s| (s.who, s.amount)).collect::<Vec<_>>(),
        ));
    }
    let effective_amounts: Vec<Balance> = effective.iter().map(|s| s.amount).collect();
    if !is_subset_of(&effective_amounts, &t.deposits) {
        warnings.push(format!(
            "a slash is not among the deposits {:?}; reserved was reduced for another reason",
            t.deposits
        ));
    }
    if correct.len() + effective.len() != t.deposits.len() {
        warnings.push(format!(
            "correct removals ({}) + matched slashes ({}) != deposits ({})",
            correct.len(),
            effective.len(),
            t.deposits.len()
        ));
    }
    if failed_candidates + effective.len() != t.deposits.len() {
        warnings.push(format!(
            "failed candidates ({failed_candidates}) + matched slashes ({}) != deposits ({})",
            effective.len(),
            t.deposits.len()
        ));
    }
    if candidate_outcomes.contains(&true) && sets_equal {
        warnings.push("a candidate was elected but the seat set did not change".to_string());
    }
    if !correct.is_empty() && sets_equal {
        warnings.push("correct slash recorded although the seat set did not change".to_string());
    }

    for w in &warnings {
        warn!("[reconcile] ⚠️  [{} / {}] {w}", t.time, t.after);
    }

    Ok(TransitionReport {
        at: t.after,
        time: t.time.clone(),
        detected,
        effective,
        correct,
        refunded,
        deposits: t.deposits.len(),
        unreserves: t.unreserves.len(),
        pre_set: pre_set.len(),
        post_set: post_set.len(),
        sets_equal,
        candidate_outcomes,
        warnings,
    })
}

/// Walk the elections newest first and accumulate what the treasury owes.
///
/// `elections` is in chronological order, as stored in the cache.
pub fn calculate_refund(
    source: &dyn ChainSource,
    elections: &[ElectionBlock],
) -> Result<(RefundLedger, Vec<TransitionReport>)> {
    let mut ledger = RefundLedger::default();
    let mut reports = Vec::new();

    for block in elections.iter().rev() {
        if block.deposits.is_empty() {
            info!("[reconcile] 📗 [{} / {}] Skipped.", block.time, block.at);
            continue;
        }

        let state = match TransitionState::fetch(source, block) {
            Ok(s) => s,
            Err(e) => {
                warn!("[reconcile] failed to load election at {}: {e:?}", block.at);
                continue;
            }
        };

        let report = reconcile_transition(&state)?;
        for s in &report.refunded {
            ledger.credit(*s);
        }

        info!(
            "[reconcile] 📕 [{} / {}] {} slashes / {} correct / {} deposits / {} unreserve / preSet = {} / postSet = {} / Equal? {} / candidates {} / outcome {:?}",
            report.time,
            report.at,
            report.effective.len(),
            report.correct.len(),
            report.deposits,
            report.unreserves,
            report.pre_set,
            report.post_set,
            report.sets_equal,
            report.candidate_outcomes.len(),
            report.candidate_outcomes,
        );
        reports.push(report);
    }

    Ok((ledger, reports))
}
