// src/explorer/cache.rs

use anyhow::{Context, Result, anyhow};
use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::fs;
use std::path::{Path, PathBuf};

use crate::schemas::{Balance, ElectionBlock, UnreserveEvent};
use crate::utils::amounts::{parse_hex_u128, to_even_hex};

#[derive(Serialize, Deserialize)]
struct CachedUnreserve {
    who: String,
    amount: Value,
}

#[derive(Serialize, Deserialize)]
struct CachedElection {
    at: String,
    deposits: Vec<Value>,
    time: String,
    unreserve: Vec<CachedUnreserve>,
}

/// `elections.<chain>.json` next to the working directory unless overridden.
pub fn default_cache_path(chain: &str) -> PathBuf {
    PathBuf::from(format!("elections.{chain}.json"))
}

// amounts are hex without prefix; 0x-prefixed strings and plain numbers are tolerated
fn cached_amount(v: &Value) -> Result<Balance> {
    match v {
        Value::String(s) => parse_hex_u128(s).ok_or_else(|| anyhow!("invalid hex amount '{s}'")),
        Value::Number(n) => n
            .as_u64()
            .map(|x| x as u128)
            .ok_or_else(|| anyhow!("amount {n} is not an unsigned integer")),
        other => Err(anyhow!("unexpected amount {other}")),
    }
}

fn to_cached(block: &ElectionBlock, ss58_prefix: u16) -> CachedElection {
    CachedElection {
        at: block.at.to_string(),
        deposits: block.deposits.iter().map(|d| Value::String(to_even_hex(*d))).collect(),
        time: block.time.clone(),
        unreserve: block
            .unreserve
            .iter()
            .map(|u| CachedUnreserve {
                who: u.who.to_ss58(ss58_prefix),
                amount: Value::String(to_even_hex(u.amount)),
            })
            .collect(),
    }
}

fn from_cached(c: CachedElection) -> Result<ElectionBlock> {
    let at = c.at.parse().with_context(|| format!("bad block hash '{}'", c.at))?;
    let deposits = c.deposits.iter().map(cached_amount).collect::<Result<Vec<_>>>()?;
    let unreserve = c
        .unreserve
        .iter()
        .map(|u| {
            Ok(UnreserveEvent {
                who: u.who.parse().with_context(|| format!("bad account '{}'", u.who))?,
                amount: cached_amount(&u.amount)?,
            })
        })
        .collect::<Result<Vec<_>>>()?;
    Ok(ElectionBlock { at, time: c.time, deposits, unreserve })
}

pub fn encode_elections(blocks: &[ElectionBlock], ss58_prefix: u16) -> Result<String> {
    let cached: Vec<CachedElection> = blocks.iter().map(|b| to_cached(b, ss58_prefix)).collect();
    serde_json::to_string(&cached).context("failed to serialize elections")
}

pub fn decode_elections(raw: &str) -> Result<Vec<ElectionBlock>> {
    let cached: Vec<CachedElection> =
        serde_json::from_str(raw).context("elections cache is not valid JSON")?;
    cached
        .into_iter()
        .enumerate()
        .map(|(i, c)| from_cached(c).with_context(|| format!("elections cache entry {i}")))
        .collect()
}

pub fn load(path: &Path) -> Result<Vec<ElectionBlock>> {
    let raw = fs::read_to_string(path)
        .with_context(|| format!("failed to read elections cache {}", path.display()))?;
    decode_elections(&raw)
}

pub fn save(path: &Path, blocks: &[ElectionBlock], ss58_prefix: u16) -> Result<()> {
    let raw = encode_elections(blocks, ss58_prefix)?;
    fs::write(path, raw)
        .with_context(|| format!("failed to write elections cache {}", path.display()))
}
