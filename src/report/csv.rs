// src/report/csv.rs

use anyhow::{Context, Result, anyhow, bail};
use std::fmt;
use std::io::Write;

use crate::chain::{AccountRecords, ChainSource, ModuleSnapshots};
use crate::consts::NetworkParams;
use crate::reconcile::{RefundLedger, compute_deposits};
use crate::schemas::{AccountId, Balance, BlockHash};
use crate::utils::amounts::{format_token, signed_diff};

pub const SIMPLE_HEADER: &str = "who,role,identity,effective_slash_planck,effective_slash_token";
pub const DETAILED_HEADER: &str =
    "who,role,should_reserve,has_reserve,missing,effective_slash,trivial,reserved_refund,free_refund";

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum Role {
    Members,
    RunnerUp,
    None,
}

impl fmt::Display for Role {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            Role::Members => "Members",
            Role::RunnerUp => "RunnerUp",
            Role::None => "None",
        };
        f.write_str(s)
    }
}

pub fn current_role(who: &AccountId, members: &[AccountId], runners_up: &[AccountId]) -> Result<Role> {
    match (members.contains(who), runners_up.contains(who)) {
        (true, true) => bail!("{who} is both a member and a runner-up"),
        (true, false) => Ok(Role::Members),
        (false, true) => Ok(Role::RunnerUp),
        (false, false) => Ok(Role::None),
    }
}

#[derive(Clone, Debug, PartialEq, Eq)]
pub struct SimpleRow {
    pub who: String,
    pub role: Role,
    pub identity: String,
    pub slash: Balance,
    pub slash_token: String,
}

#[derive(Clone, Debug, PartialEq, Eq)]
pub struct DetailedRow {
    pub who: String,
    pub role: Role,
    pub should_reserve: Balance,
    pub has_reserve: Balance,
    pub missing: i128,
    pub effective_slash: Balance,
    pub trivial: bool,
    pub reserved_refund: i128,
    pub free_refund: i128,
}

fn seats(source: &dyn ChainSource, at: BlockHash) -> Result<(Vec<AccountId>, Vec<AccountId>)> {
    let members = source.members(at).context("failed to read current members")?;
    let runners = source.runners_up(at).context("failed to read current runners-up")?;
    Ok((
        members.into_iter().map(|(w, _)| w).collect(),
        runners.into_iter().map(|(w, _)| w).collect(),
    ))
}

pub fn simple_rows(
    source: &dyn ChainSource,
    ledger: &RefundLedger,
    at: BlockHash,
    params: &NetworkParams,
) -> Result<Vec<SimpleRow>> {
    let (members, runners_up) = seats(source, at)?;
    let mut rows = Vec::with_capacity(ledger.len());
    for (who, slash) in ledger.iter() {
        let identity = source
            .identity_of(who, at)
            .with_context(|| format!("failed to read identity of {who}"))?
            .and_then(|r| r.info.display.as_display())
            .unwrap_or_default();
        rows.push(SimpleRow {
            who: who.to_ss58(params.ss58_prefix),
            role: current_role(who, &members, &runners_up)?,
            identity,
            slash: *slash,
            slash_token: format_token(*slash, params.decimals, params.symbol),
        });
    }
    Ok(rows)
}

/// Rows that split each refund into the part owed back to reserved and the part owed to free.
pub fn detailed_rows(
    source: &dyn ChainSource,
    ledger: &RefundLedger,
    at: BlockHash,
    params: &NetworkParams,
) -> Result<Vec<DetailedRow>> {
    let (members, runners_up) = seats(source, at)?;
    let snapshots = ModuleSnapshots::fetch(source, at)?;
    let mut rows = Vec::with_capacity(ledger.len());
    for (who, slash) in ledger.iter() {
        let records = AccountRecords::fetch(source, who, at)?;
        let should_reserve = compute_deposits(who, &snapshots, &records, params).sum;
        let has_reserve = records.reserved();
        let missing = signed_diff(should_reserve, has_reserve)
            .with_context(|| format!("reserved of {who} out of range"))?;
        let slash_signed = i128::try_from(*slash)
            .with_context(|| format!("refund of {who} out of range"))?;
        let free_refund = slash_signed
            .checked_sub(missing)
            .ok_or_else(|| anyhow!("free refund of {who} out of range"))?;
        rows.push(DetailedRow {
            who: who.to_ss58(params.ss58_prefix),
            role: current_role(who, &members, &runners_up)?,
            should_reserve,
            has_reserve,
            missing,
            effective_slash: *slash,
            trivial: slash_signed == missing,
            reserved_refund: missing,
            free_refund,
        });
    }
    Ok(rows)
}

pub fn write_simple<W: Write>(out: &mut W, rows: &[SimpleRow]) -> Result<()> {
    let mut w = csv::Writer::from_writer(out);
    w.write_record(SIMPLE_HEADER.split(','))?;
    for r in rows {
        w.write_record([
            r.who.clone(),
            r.role.to_string(),
            r.identity.clone(),
            r.slash.to_string(),
            r.slash_token.clone(),
        ])?;
    }
    w.flush().context("failed to flush csv")?;
    Ok(())
}

pub fn write_detailed<W: Write>(out: &mut W, rows: &[DetailedRow]) -> Result<()> {
    let mut w = csv::Writer::from_writer(out);
    w.write_record(DETAILED_HEADER.split(','))?;
    for r in rows {
        w.write_record([
            r.who.clone(),
            r.role.to_string(),
            r.should_reserve.to_string(),
            r.has_reserve.to_string(),
            r.missing.to_string(),
            r.effective_slash.to_string(),
            if r.trivial { "✅" } else { "❌" }.to_string(),
            r.reserved_refund.to_string(),
            r.free_refund.to_string(),
        ])?;
    }
    w.flush().context("failed to flush csv")?;
    Ok(())
}
