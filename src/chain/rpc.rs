// src/chain/rpc.rs

use anyhow::{Context, Result, anyhow, bail};
use futures::{StreamExt, stream::FuturesUnordered};
use parity_scale_codec::{Decode, DecodeAll, Encode};
use reqwest::Client as HttpClient;
use serde::Deserialize;
use serde::de::DeserializeOwned;
use serde_json::{Value, json};
use std::collections::HashMap;
use std::future::Future;
use std::ops::Range;
use std::sync::atomic::{AtomicU64, Ordering};
use tokio::runtime::Handle;

use super::storage::{self, StorageItem};
use super::types::{
    AccountIndex, AccountInfoRecord, Announcements, Bounty, DepositOf, IndexRecord, Multisig,
    MultisigCall, OpenTip, PreimageStatus, PropIndex, Proxies, Registration, Subs,
    TreasuryProposal, Voter,
};
use super::{ChainSource, effective_reserved};
use crate::consts::{STORAGE_KEYS_PAGE_SIZE, STORAGE_QUERY_CHUNK};
use crate::schemas::{AccountId, Balance, BalanceSnapshot, BlockHash};
use crate::utils::amounts::balance_from_json;
use crate::utils::runtime::block_on_result;

#[derive(Deserialize)]
struct JsonRpcError {
    code: i64,
    message: String,
}

#[derive(Deserialize)]
struct JsonRpcResponse<T> {
    result: Option<T>,
    error: Option<JsonRpcError>,
}

#[derive(Deserialize)]
#[serde(rename_all = "camelCase")]
struct Header {
    parent_hash: String,
}

/// `payment_queryInfo` answer. Older nodes send weight as a number, newer ones as
/// `{ refTime, proofSize }`, and the fee as either a number or a decimal string.
#[derive(Deserialize, Debug, Clone, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct FeeInfo {
    pub weight: Value,
    pub class: String,
    pub partial_fee: Value,
}

impl FeeInfo {
    pub fn fee(&self) -> Result<Balance> {
        balance_from_json(&self.partial_fee)
    }
}

#[derive(Deserialize)]
struct StorageChangeSet {
    changes: Vec<(String, Option<String>)>,
}

fn to_hex(bytes: &[u8]) -> String {
    format!("0x{}", hex::encode(bytes))
}

fn from_hex(s: &str) -> Result<Vec<u8>> {
    hex::decode(s.strip_prefix("0x").unwrap_or(s)).with_context(|| format!("invalid hex '{s}'"))
}

// trailing bytes mean the runtime changed the layout; refuse rather than misread
fn decode_value<T: Decode>(bytes: &[u8], what: &str) -> Result<T> {
    let mut raw = bytes;
    T::decode_all(&mut raw).map_err(|e| anyhow!("failed to decode {what}: {e}"))
}

/// Start key of the next `state_getKeysPaged` page, `None` once a short page came back.
fn next_page_start(page: &[String], page_size: usize) -> Option<String> {
    if page.len() < page_size { None } else { page.last().cloned() }
}

/// Values of a `state_queryStorageAt` answer, in the order the keys were asked for.
fn values_in_key_order(
    hex_keys: &[String],
    sets: Vec<StorageChangeSet>,
) -> Result<Vec<Option<Vec<u8>>>> {
    let mut by_key: HashMap<String, Option<String>> = HashMap::new();
    for set in sets {
        for (k, v) in set.changes {
            by_key.insert(k.to_ascii_lowercase(), v);
        }
    }
    hex_keys
        .iter()
        .map(|k| by_key.get(k).cloned().flatten().map(|v| from_hex(&v)).transpose())
        .collect()
}

/// Chunk index ranges, one per wave of at most `max_concurrency` requests.
fn waves(n_chunks: usize, max_concurrency: usize) -> Vec<Range<usize>> {
    let step = max_concurrency.max(1);
    (0..n_chunks).step_by(step).map(|start| start..(start + step).min(n_chunks)).collect()
}

/// Put per-chunk results back in chunk order, whatever order they completed in.
fn reassemble<T>(n_chunks: usize, results: Vec<(usize, Vec<T>)>) -> Result<Vec<T>> {
    let mut slots: Vec<Option<Vec<T>>> = (0..n_chunks).map(|_| None).collect();
    for (idx, values) in results {
        let slot = slots.get_mut(idx).ok_or_else(|| anyhow!("chunk {idx} out of range"))?;
        if slot.replace(values).is_some() {
            bail!("chunk {idx} answered twice");
        }
    }
    let mut out = Vec::new();
    for (idx, slot) in slots.into_iter().enumerate() {
        out.extend(slot.ok_or_else(|| anyhow!("chunk {idx} never answered"))?);
    }
    Ok(out)
}

/// Pair `[System.Account, Balances.ReservedBalance]` values, two per account, with their owner.
fn pair_snapshots(
    whos: &[AccountId],
    values: &[Option<Vec<u8>>],
) -> Result<Vec<BalanceSnapshot>> {
    if values.len() != whos.len() * 2 {
        bail!("expected {} storage values, got {}", whos.len() * 2, values.len());
    }
    let mut out = Vec::with_capacity(whos.len());
    for (who, pair) in whos.iter().zip(values.chunks(2)) {
        let current = match &pair[0] {
            Some(bytes) => Some(AccountInfoRecord::from_raw(bytes)?.reserved),
            None => None,
        };
        let legacy = match &pair[1] {
            Some(bytes) => Some(decode_value::<Balance>(bytes, "Balances.ReservedBalance")?),
            None => None,
        };
        out.push(BalanceSnapshot { who: *who, reserved: effective_reserved(current, legacy) });
    }
    Ok(out)
}

/// Substrate node reached over HTTP JSON-RPC.
pub struct RpcChainSource {
    url: String,
    http: HttpClient,
    handle: Option<Handle>,
    max_concurrency: usize,
    next_id: AtomicU64,
}

impl RpcChainSource {
    pub fn new(url: impl Into<String>, handle: Option<Handle>, max_concurrency: usize) -> Self {
        Self {
            url: url.into(),
            http: HttpClient::new(),
            handle,
            max_concurrency: max_concurrency.max(1),
            next_id: AtomicU64::new(1),
        }
    }

    fn run<F, T>(&self, fut: F) -> Result<T>
    where
        F: Future<Output = Result<T>>,
    {
        block_on_result(self.handle.as_ref(), fut)
    }

    async fn call<T: DeserializeOwned>(&self, method: &str, params: Value) -> Result<Option<T>> {
        let id = self.next_id.fetch_add(1, Ordering::Relaxed);
        let body = json!({ "jsonrpc": "2.0", "id": id, "method": method, "params": params });
        let resp = self
            .http
            .post(&self.url)
            .json(&body)
            .send()
            .await
            .with_context(|| format!("rpc {method} to {} failed", self.url))?
            .error_for_status()
            .with_context(|| format!("rpc {method} returned error status"))?;

        let parsed: JsonRpcResponse<T> = resp
            .json()
            .await
            .with_context(|| format!("rpc {method}: malformed response"))?;
        if let Some(e) = parsed.error {
            bail!("rpc {method} error {}: {}", e.code, e.message);
        }
        Ok(parsed.result)
    }

    async fn storage(&self, key: &[u8], at: BlockHash) -> Result<Option<Vec<u8>>> {
        let raw: Option<String> =
            self.call("state_getStorage", json!([to_hex(key), at.to_string()])).await?;
        raw.map(|s| from_hex(&s)).transpose()
    }

    async fn keys_paged(&self, prefix: &[u8], at: BlockHash) -> Result<Vec<Vec<u8>>> {
        let prefix_hex = to_hex(prefix);
        let mut out: Vec<Vec<u8>> = Vec::new();
        let mut start: Option<String> = None;
        loop {
            let page: Vec<String> = self
                .call(
                    "state_getKeysPaged",
                    json!([prefix_hex, STORAGE_KEYS_PAGE_SIZE, start, at.to_string()]),
                )
                .await?
                .unwrap_or_default();
            let next = next_page_start(&page, STORAGE_KEYS_PAGE_SIZE as usize);
            for k in &page {
                out.push(from_hex(k)?);
            }
            match next {
                Some(k) => start = Some(k),
                None => break,
            }
        }
        Ok(out)
    }

    async fn query_chunk(
        &self,
        idx: usize,
        keys: &[Vec<u8>],
        at: BlockHash,
    ) -> Result<(usize, Vec<Option<Vec<u8>>>)> {
        let hex_keys: Vec<String> = keys.iter().map(|k| to_hex(k)).collect();
        let sets: Vec<StorageChangeSet> = self
            .call("state_queryStorageAt", json!([hex_keys, at.to_string()]))
            .await?
            .unwrap_or_default();

        Ok((idx, values_in_key_order(&hex_keys, sets)?))
    }

    /// Values for many keys, in key order. At most `max_concurrency` requests are in flight.
    async fn query_many(&self, keys: &[Vec<u8>], at: BlockHash) -> Result<Vec<Option<Vec<u8>>>> {
        let chunks: Vec<&[Vec<u8>]> = keys.chunks(STORAGE_QUERY_CHUNK).collect();
        let mut results = Vec::with_capacity(chunks.len());

        for wave in waves(chunks.len(), self.max_concurrency) {
            let mut futs = FuturesUnordered::new();
            for idx in wave {
                futs.push(self.query_chunk(idx, chunks[idx], at));
            }
            while let Some(res) = futs.next().await {
                results.push(res?);
            }
        }

        reassemble(chunks.len(), results)
    }

    fn read<T: Decode>(&self, key: Vec<u8>, at: BlockHash, what: &str) -> Result<Option<T>> {
        self.run(async {
            match self.storage(&key, at).await? {
                Some(bytes) => Ok(Some(decode_value(&bytes, what)?)),
                None => Ok(None),
            }
        })
    }

    /// Every `(full key, value)` under a storage item.
    fn scan<T: Decode>(&self, item: &StorageItem, at: BlockHash) -> Result<Vec<(Vec<u8>, T)>> {
        let what = format!("{}.{}", item.pallet, item.item);
        self.run(async {
            let keys = self.keys_paged(&item.prefix(), at).await?;
            let values = self.query_many(&keys, at).await?;
            let mut out = Vec::with_capacity(keys.len());
            for (k, v) in keys.into_iter().zip(values) {
                // keys can vanish between paging and querying only if `at` is not a fixed block
                let Some(bytes) = v else { continue };
                let decoded: T = decode_value(&bytes, &what)?;
                out.push((k, decoded));
            }
            Ok(out)
        })
    }

    fn scan_values<T: Decode>(&self, item: &StorageItem, at: BlockHash) -> Result<Vec<T>> {
        Ok(self.scan(item, at)?.into_iter().map(|(_, v)| v).collect())
    }

    /// Weight, class and fee the node's runtime assigns to an encoded extrinsic. Nothing is
    /// submitted.
    pub fn query_fee_info(&self, extrinsic: &[u8], at: BlockHash) -> Result<FeeInfo> {
        self.run(self.call("payment_queryInfo", json!([to_hex(extrinsic), at.to_string()])))?
            .ok_or_else(|| anyhow!("node returned no fee info at {at}"))
    }
}

impl ChainSource for RpcChainSource {
    fn finalized_head(&self) -> Result<BlockHash> {
        let head: String = self
            .run(self.call("chain_getFinalizedHead", json!([])))?
            .ok_or_else(|| anyhow!("node returned no finalized head"))?;
        head.parse()
    }

    fn parent_hash(&self, at: BlockHash) -> Result<BlockHash> {
        let header: Header = self
            .run(self.call("chain_getHeader", json!([at.to_string()])))?
            .ok_or_else(|| anyhow!("no header for block {at}"))?;
        header.parent_hash.parse()
    }

    fn account(&self, who: &AccountId, at: BlockHash) -> Result<Option<AccountInfoRecord>> {
        let key = storage::SYSTEM_ACCOUNT.map_key(who.as_bytes());
        match self.run(self.storage(&key, at))? {
            Some(bytes) => Ok(Some(AccountInfoRecord::from_raw(&bytes)?)),
            None => Ok(None),
        }
    }

    fn legacy_reserved(&self, who: &AccountId, at: BlockHash) -> Result<Option<Balance>> {
        let key = storage::BALANCES_RESERVED_LEGACY.map_key(who.as_bytes());
        self.read(key, at, "Balances.ReservedBalance")
    }

    fn accounts(&self, at: BlockHash) -> Result<Vec<AccountId>> {
        let item = storage::SYSTEM_ACCOUNT;
        let keys = self.run(self.keys_paged(&item.prefix(), at))?;
        keys.iter().map(|k| item.decode_map_key::<AccountId>(k)).collect()
    }

    fn members(&self, at: BlockHash) -> Result<Vec<(AccountId, Balance)>> {
        let key = storage::ELECTIONS_MEMBERS.value_key();
        Ok(self.read(key, at, "PhragmenElection.Members")?.unwrap_or_default())
    }

    fn runners_up(&self, at: BlockHash) -> Result<Vec<(AccountId, Balance)>> {
        let key = storage::ELECTIONS_RUNNERS_UP.value_key();
        Ok(self.read(key, at, "PhragmenElection.RunnersUp")?.unwrap_or_default())
    }

    fn candidates(&self, at: BlockHash) -> Result<Vec<AccountId>> {
        let key = storage::ELECTIONS_CANDIDATES.value_key();
        Ok(self.read(key, at, "PhragmenElection.Candidates")?.unwrap_or_default())
    }

    fn voting(&self, who: &AccountId, at: BlockHash) -> Result<Option<Voter>> {
        let key = storage::ELECTIONS_VOTING.map_key(&who.encode());
        self.read(key, at, "PhragmenElection.Voting")
    }

    fn identity_of(&self, who: &AccountId, at: BlockHash) -> Result<Option<Registration>> {
        let key = storage::IDENTITY_OF.map_key(&who.encode());
        self.read(key, at, "Identity.IdentityOf")
    }

    fn subs_of(&self, who: &AccountId, at: BlockHash) -> Result<Option<Subs>> {
        let key = storage::IDENTITY_SUBS_OF.map_key(&who.encode());
        self.read(key, at, "Identity.SubsOf")
    }

    fn proxies(&self, who: &AccountId, at: BlockHash) -> Result<Option<Proxies>> {
        let key = storage::PROXY_PROXIES.map_key(&who.encode());
        self.read(key, at, "Proxy.Proxies")
    }

    fn announcements(&self, who: &AccountId, at: BlockHash) -> Result<Option<Announcements>> {
        let key = storage::PROXY_ANNOUNCEMENTS.map_key(&who.encode());
        self.read(key, at, "Proxy.Announcements")
    }

    fn democracy_deposits(&self, at: BlockHash) -> Result<Vec<(PropIndex, DepositOf)>> {
        let item = storage::DEMOCRACY_DEPOSIT_OF;
        self.scan::<DepositOf>(&item, at)?
            .into_iter()
            .map(|(k, v)| Ok((item.decode_map_key::<PropIndex>(&k)?, v)))
            .collect()
    }

    fn democracy_preimages(&self, at: BlockHash) -> Result<Vec<PreimageStatus>> {
        self.scan_values(&storage::DEMOCRACY_PREIMAGES, at)
    }

    fn indices(&self, at: BlockHash) -> Result<Vec<(AccountIndex, IndexRecord)>> {
        let item = storage::INDICES_ACCOUNTS;
        self.scan::<IndexRecord>(&item, at)?
            .into_iter()
            .map(|(k, v)| Ok((item.decode_map_key::<AccountIndex>(&k)?, v)))
            .collect()
    }

    fn multisigs(&self, at: BlockHash) -> Result<Vec<Multisig>> {
        self.scan_values(&storage::MULTISIG_MULTISIGS, at)
    }

    fn multisig_calls(&self, at: BlockHash) -> Result<Vec<MultisigCall>> {
        self.scan_values(&storage::MULTISIG_CALLS, at)
    }

    fn treasury_proposals(&self, at: BlockHash) -> Result<Vec<TreasuryProposal>> {
        self.scan_values(&storage::TREASURY_PROPOSALS, at)
    }

    fn treasury_tips(&self, at: BlockHash) -> Result<Vec<OpenTip>> {
        self.scan_values(&storage::TREASURY_TIPS, at)
    }

    fn treasury_bounties(&self, at: BlockHash) -> Result<Vec<Bounty>> {
        self.scan_values(&storage::TREASURY_BOUNTIES, at)
    }

    fn reserved_snapshots(&self, whos: &[AccountId], at: BlockHash) -> Result<Vec<BalanceSnapshot>> {
        if whos.is_empty() {
            return Ok(Vec::new());
        }
        let mut keys = Vec::with_capacity(whos.len() * 2);
        for who in whos {
            keys.push(storage::SYSTEM_ACCOUNT.map_key(who.as_bytes()));
            keys.push(storage::BALANCES_RESERVED_LEGACY.map_key(who.as_bytes()));
        }
        let values = self.run(self.query_many(&keys, at))?;
        pair_snapshots(whos, &values)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn account_info(nonce: u32, free: Balance, reserved: Balance) -> Vec<u8> {
        let mut raw = nonce.encode();
        raw.extend(free.encode());
        raw.extend(reserved.encode());
        raw.extend(0u128.encode());
        raw.extend(0u128.encode());
        raw
    }

    #[test]
    fn seat_holder_layout_is_not_read_as_pairs() {
        // newer runtimes store (who, stake, deposit) per seat
        let seats: Vec<(AccountId, Balance, Balance)> =
            vec![(AccountId([1; 32]), 10, 5), (AccountId([2; 32]), 20, 5)];
        let raw = seats.encode();
        assert!(decode_value::<Vec<(AccountId, Balance)>>(&raw, "PhragmenElection.Members").is_err());
        let back: Vec<(AccountId, Balance, Balance)> =
            decode_value(&raw, "PhragmenElection.Members").expect("decode");
        assert_eq!(back, seats);
    }

    #[test]
    fn key_pages_stop_on_short_page() {
        let full: Vec<String> = (0..3).map(|i| format!("0x0{i}")).collect();
        assert_eq!(next_page_start(&full, 3), Some("0x02".to_string()));
        assert_eq!(next_page_start(&full[..2], 3), None);
        assert_eq!(next_page_start(&[], 3), None);
    }

    #[test]
    fn query_answer_follows_key_order() {
        let sets: Vec<StorageChangeSet> = serde_json::from_value(json!([
            { "block": "0x00", "changes": [["0xBB", "0x02"], ["0xaa", "0x01"], ["0xcc", null]] }
        ]))
        .expect("changeset");
        let keys = vec!["0xaa".to_string(), "0xcc".to_string(), "0xdd".to_string(), "0xbb".to_string()];
        let values = values_in_key_order(&keys, sets).expect("values");
        assert_eq!(values, vec![Some(vec![1]), None, None, Some(vec![2])]);
    }

    #[test]
    fn waves_cover_every_chunk_once() {
        assert_eq!(waves(5, 2), vec![0..2, 2..4, 4..5]);
        assert_eq!(waves(2, 16), vec![0..2]);
        assert_eq!(waves(0, 4), Vec::<Range<usize>>::new());
        assert_eq!(waves(3, 0), vec![0..1, 1..2, 2..3]);
    }

    #[test]
    fn chunks_reassemble_in_index_order() {
        // completion order scrambled across two waves
        let results = vec![(1, vec!['c', 'd']), (0, vec!['a', 'b']), (3, vec!['g']), (2, vec!['e', 'f'])];
        assert_eq!(reassemble(4, results).expect("ok"), vec!['a', 'b', 'c', 'd', 'e', 'f', 'g']);

        assert!(reassemble(2, vec![(0, vec![1])]).is_err());
        assert!(reassemble(1, vec![(0, vec![1]), (0, vec![2])]).is_err());
        assert!(reassemble(1, vec![(3, vec![1])]).is_err());
    }

    #[test]
    fn snapshots_pair_current_and_legacy_per_account() {
        let (a, b, c) = (AccountId([1; 32]), AccountId([2; 32]), AccountId([3; 32]));
        let values = vec![
            Some(account_info(1, 1_000, 40)),
            None,
            None,
            Some(70u128.encode()),
            Some(account_info(0, 0, 10)),
            Some(30u128.encode()),
        ];
        let snaps = pair_snapshots(&[a, b, c], &values).expect("pair");
        assert_eq!(
            snaps,
            vec![
                BalanceSnapshot { who: a, reserved: 40 },
                BalanceSnapshot { who: b, reserved: 70 },
                BalanceSnapshot { who: c, reserved: 30 },
            ]
        );
        assert!(pair_snapshots(&[a, b], &values).is_err());
    }

    #[test]
    fn fee_info_reads_both_weight_shapes() {
        let old: FeeInfo = serde_json::from_value(json!({
            "weight": 1_000_000,
            "class": "normal",
            "partialFee": 150_000_000,
        }))
        .expect("old shape");
        assert_eq!(old.fee().expect("fee"), 150_000_000);

        let new: FeeInfo = serde_json::from_value(json!({
            "weight": { "refTime": 1_000_000, "proofSize": 0 },
            "class": "normal",
            "partialFee": "152000000",
        }))
        .expect("new shape");
        assert_eq!(new.fee().expect("fee"), 152_000_000);
        assert_eq!(new.weight["refTime"], 1_000_000);
    }
}
