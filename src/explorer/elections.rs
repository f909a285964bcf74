// src/explorer/elections.rs

use anyhow::{Context, Result, anyhow};
use serde_json::Value;

use crate::schemas::{AccountId, Balance, BlockHash, ElectionBlock, UnreserveEvent};
use crate::utils::amounts::balance_from_json;

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum EventPhase {
    ApplyExtrinsic(u32),
    Finalization,
    Initialization,
}

/// One event of a block, as listed by the explorer.
#[derive(Clone, Debug, PartialEq)]
pub struct ExplorerEvent {
    pub module_id: String,
    pub event_id: String,
    pub phase: EventPhase,
    pub args: Vec<Value>,
}

impl ExplorerEvent {
    fn is(&self, module: &str, event: &str) -> bool {
        self.module_id.eq_ignore_ascii_case(module) && self.event_id.eq_ignore_ascii_case(event)
    }

    fn named(&self, event: &str) -> bool {
        self.event_id.eq_ignore_ascii_case(event)
    }

    fn arg(&self, idx: usize) -> Result<&Value> {
        self.args
            .get(idx)
            .ok_or_else(|| anyhow!("{}.{} has no argument {idx}", self.module_id, self.event_id))
    }

    fn balance_arg(&self, idx: usize) -> Result<Balance> {
        balance_from_json(self.arg(idx)?)
            .with_context(|| format!("{}.{} argument {idx}", self.module_id, self.event_id))
    }
}

fn account_from_json(v: &Value) -> Result<AccountId> {
    match v {
        Value::String(s) => s.parse(),
        other => Err(anyhow!("expected an account, got {other}")),
    }
}

fn accounts_from_json(v: &Value) -> Result<Vec<AccountId>> {
    match v {
        Value::Array(items) => items.iter().map(account_from_json).collect(),
        other => Err(anyhow!("expected a list of accounts, got {other}")),
    }
}

/// Turn the events of a `NewTerm` block into the record kept in the cache.
///
/// Deposits are the treasury `Deposit` events forming an unbroken run right before the last
/// `NewTerm`, emitted during initialization or by extrinsic 0. When the block carries no
/// `Unreserved` event, `Tabled` depositors, `PreimageUsed` and society `Inducted` members
/// stand in for them.
pub fn election_block_from_events(
    at: BlockHash,
    time: String,
    events: &[ExplorerEvent],
    society_candidate_deposit: Balance,
) -> Result<ElectionBlock> {
    let new_term = events
        .iter()
        .rposition(|e| e.named("NewTerm"))
        .ok_or_else(|| anyhow!("block {at} has no NewTerm event"))?;

    // the run of Deposit events that ends right before NewTerm
    let mut run_start = new_term;
    while run_start > 0 && events[run_start - 1].named("Deposit") {
        run_start -= 1;
    }

    let mut deposits = Vec::new();
    for ev in &events[run_start..new_term] {
        let in_scope = matches!(
            ev.phase,
            EventPhase::Initialization | EventPhase::ApplyExtrinsic(0)
        );
        if ev.is("treasury", "Deposit") && in_scope {
            deposits.push(ev.balance_arg(0)?);
        }
    }

    let mut unreserve = Vec::new();
    for ev in events.iter().filter(|e| e.named("Unreserved")) {
        unreserve.push(UnreserveEvent {
            who: account_from_json(ev.arg(0)?)?,
            amount: ev.balance_arg(1)?,
        });
    }

    if unreserve.is_empty() {
        for ev in events {
            if ev.named("Tabled") {
                let amount = ev.balance_arg(1)?;
                for who in accounts_from_json(ev.arg(2)?)? {
                    unreserve.push(UnreserveEvent { who, amount });
                }
            } else if ev.named("PreimageUsed") {
                unreserve.push(UnreserveEvent {
                    who: account_from_json(ev.arg(1)?)?,
                    amount: ev.balance_arg(2)?,
                });
            } else if ev.named("Inducted") {
                for who in accounts_from_json(ev.arg(1)?)? {
                    unreserve.push(UnreserveEvent { who, amount: society_candidate_deposit });
                }
            }
        }
    }

    Ok(ElectionBlock { at, time, deposits, unreserve })
}
