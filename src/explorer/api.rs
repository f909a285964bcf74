// src/explorer/api.rs

use anyhow::{Context, Result, anyhow};
use reqwest::Client as HttpClient;
use serde_json::Value;
use std::future::Future;
use tokio::runtime::Handle;
use tracing::{info, warn};

use super::elections::{EventPhase, ExplorerEvent, election_block_from_events};
use crate::consts::EXPLORER_PAGE_SIZE;
use crate::schemas::{Balance, BlockHash, ElectionBlock};
use crate::utils::runtime::block_on_result;

/// A block with its events, in emission order.
#[derive(Clone, Debug)]
pub struct ExplorerBlock {
    pub id: u64,
    pub hash: BlockHash,
    pub datetime: String,
    pub events: Vec<ExplorerEvent>,
}

/// Polkascan-style JSON:API explorer.
pub struct PolkascanClient {
    base_url: String,
    chain: String,
    http: HttpClient,
    handle: Option<Handle>,
}

impl PolkascanClient {
    pub fn new(base_url: impl Into<String>, chain: impl Into<String>, handle: Option<Handle>) -> Self {
        let mut url = base_url.into();
        while url.ends_with('/') {
            url.pop();
        }
        Self { base_url: url, chain: chain.into(), http: HttpClient::new(), handle }
    }

    fn run<F, T>(&self, fut: F) -> Result<T>
    where
        F: Future<Output = Result<T>>,
    {
        block_on_result(self.handle.as_ref(), fut)
    }

    async fn get_json(&self, url: &str) -> Result<Value> {
        let resp = self
            .http
            .get(url)
            .send()
            .await
            .with_context(|| format!("explorer GET {url} failed"))?
            .error_for_status()
            .with_context(|| format!("explorer GET {url} returned error status"))?;
        resp.json().await.with_context(|| format!("explorer GET {url}: malformed JSON"))
    }

    /// Block numbers of every `NewTerm` event, oldest first.
    pub fn new_term_block_ids(&self) -> Result<Vec<u64>> {
        self.run(async {
            let mut ids: Vec<u64> = Vec::new();
            let mut page = 1u32;
            loop {
                info!("[explorer] fetching NewTerm page {page}");
                let url = format!(
                    "{}/{}/api/v1/event?filter[module_id]=electionsphragmen&filter[event_id]=NewTerm&page[number]={page}&page[size]={EXPLORER_PAGE_SIZE}",
                    self.base_url, self.chain
                );
                let more = parse_event_page(&self.get_json(&url).await?)?;
                let n = more.len();
                ids.extend(more);
                if n < EXPLORER_PAGE_SIZE {
                    break;
                }
                page += 1;
            }
            ids.sort_unstable();
            ids.dedup();
            info!("[explorer] collected {} election events", ids.len());
            Ok(ids)
        })
    }

    pub fn block(&self, id: u64) -> Result<ExplorerBlock> {
        self.run(async {
            let url = format!("{}/{}/api/v1/block/{id}?include=events", self.base_url, self.chain);
            parse_block(&self.get_json(&url).await?)
        })
    }

    /// Discover every election and classify its events. A block that cannot be fetched or
    /// has no `NewTerm` is logged and left out.
    pub fn find_elections(&self, society_candidate_deposit: Balance) -> Result<Vec<ElectionBlock>> {
        let ids = self.new_term_block_ids()?;
        let mut out = Vec::with_capacity(ids.len());
        for id in ids {
            let classified = self.block(id).and_then(|b| {
                election_block_from_events(b.hash, b.datetime, &b.events, society_candidate_deposit)
            });
            match classified {
                Ok(e) => {
                    info!(
                        "[explorer] #{id} {} deposits={} unreserve={}",
                        e.at,
                        e.deposits.len(),
                        e.unreserve.len()
                    );
                    out.push(e);
                }
                Err(e) => warn!("[explorer] error at block #{id}: {e:?}"),
            }
        }
        Ok(out)
    }
}

fn parse_event_page(page: &Value) -> Result<Vec<u64>> {
    let data = page
        .get("data")
        .and_then(Value::as_array)
        .ok_or_else(|| anyhow!("explorer event page has no data array"))?;
    data.iter()
        .map(|e| {
            e.pointer("/attributes/block_id")
                .and_then(Value::as_u64)
                .ok_or_else(|| anyhow!("event without block_id: {e}"))
        })
        .collect()
}

// polkascan nests the decoded params as [{type, value}, ...]; older dumps give bare values
fn event_args(attrs: &Value) -> Vec<Value> {
    let raw = match attrs.get("attributes") {
        Some(Value::String(s)) => serde_json::from_str(s).unwrap_or(Value::Null),
        Some(v) => v.clone(),
        None => Value::Null,
    };
    match raw {
        Value::Array(items) => items
            .into_iter()
            .map(|item| match item {
                Value::Object(mut m) if m.contains_key("value") => {
                    m.remove("value").unwrap_or(Value::Null)
                }
                other => other,
            })
            .collect(),
        _ => Vec::new(),
    }
}

fn event_phase(attrs: &Value) -> EventPhase {
    let extrinsic = attrs.get("extrinsic_idx").and_then(Value::as_u64).map(|x| x as u32);
    match attrs.get("phase").and_then(Value::as_u64) {
        Some(0) => EventPhase::ApplyExtrinsic(extrinsic.unwrap_or(0)),
        Some(1) => EventPhase::Finalization,
        Some(2) => EventPhase::Initialization,
        _ => match extrinsic {
            Some(x) => EventPhase::ApplyExtrinsic(x),
            None => EventPhase::Initialization,
        },
    }
}

fn parse_block(doc: &Value) -> Result<ExplorerBlock> {
    let data = doc.get("data").ok_or_else(|| anyhow!("explorer block has no data"))?;
    let id = match data.get("id") {
        Some(Value::Number(n)) => n.as_u64(),
        Some(Value::String(s)) => s.parse().ok(),
        _ => None,
    }
    .ok_or_else(|| anyhow!("explorer block has no id"))?;
    let hash_str = data
        .pointer("/attributes/hash")
        .and_then(Value::as_str)
        .ok_or_else(|| anyhow!("explorer block #{id} has no hash"))?;
    let hash: BlockHash = hash_str.parse().with_context(|| format!("block #{id} hash"))?;
    let datetime = data
        .pointer("/attributes/datetime")
        .and_then(Value::as_str)
        .unwrap_or_default()
        .to_string();

    let mut indexed: Vec<(u64, ExplorerEvent)> = Vec::new();
    for item in doc.get("included").and_then(Value::as_array).into_iter().flatten() {
        if item.get("type").and_then(Value::as_str) != Some("event") {
            continue;
        }
        let Some(attrs) = item.get("attributes") else { continue };
        let field = |k: &str| attrs.get(k).and_then(Value::as_str).unwrap_or_default().to_string();
        let idx = attrs.get("event_idx").and_then(Value::as_u64).unwrap_or(indexed.len() as u64);
        indexed.push((
            idx,
            ExplorerEvent {
                module_id: field("module_id"),
                event_id: field("event_id"),
                phase: event_phase(attrs),
                args: event_args(attrs),
            },
        ));
    }
    indexed.sort_by_key(|(idx, _)| *idx);

    Ok(ExplorerBlock {
        id,
        hash,
        datetime,
        events: indexed.into_iter().map(|(_, e)| e).collect(),
    })
}
