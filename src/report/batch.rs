// src/report/batch.rs

use anyhow::{Context, Result};
use parity_scale_codec::{Compact, Encode};
use sp_crypto_hashing::blake2_256;
use std::fs;
use std::path::{Path, PathBuf};
use tracing::{info, warn};

use crate::consts::{AddressFormat, MODULE_ACCOUNT_PREFIX, NetworkParams, TREASURY_PALLET_ID};
use crate::reconcile::RefundLedger;
use crate::schemas::{AccountId, Balance};
use crate::utils::amounts::format_token;

/// The encoded `utility.batch` call that pays every refund out of the treasury.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct RefundBatch {
    pub call: Vec<u8>,
    pub hash: [u8; 32],
    pub sum: Balance,
    pub transfers: usize,
}

impl RefundBatch {
    pub fn preimage_hex(&self) -> String {
        format!("0x{}", hex::encode(&self.call))
    }

    pub fn hash_hex(&self) -> String {
        format!("0x{}", hex::encode(self.hash))
    }
}

/// `b"modl" ++ pallet_id`, zero padded.
pub fn module_account(pallet_id: &[u8; 8]) -> AccountId {
    let mut raw = [0u8; 32];
    raw[..4].copy_from_slice(MODULE_ACCOUNT_PREFIX);
    raw[4..12].copy_from_slice(pallet_id);
    AccountId(raw)
}

pub fn treasury_account() -> AccountId {
    module_account(TREASURY_PALLET_ID)
}

fn encode_address(who: &AccountId, format: AddressFormat, out: &mut Vec<u8>) {
    match format {
        AddressFormat::MultiAddress => out.push(0x00),
        AddressFormat::Indices => out.push(0xff),
        AddressFormat::AccountId => {}
    }
    out.extend_from_slice(who.as_bytes());
}

fn encode_force_transfer(
    params: &NetworkParams,
    format: AddressFormat,
    source: &AccountId,
    dest: &AccountId,
    amount: Balance,
    out: &mut Vec<u8>,
) {
    out.push(params.balances_pallet_index);
    out.push(params.force_transfer_call_index);
    encode_address(source, format, out);
    encode_address(dest, format, out);
    Compact(amount).encode_to(out);
}

pub fn build_refund_batch(
    ledger: &RefundLedger,
    params: &NetworkParams,
    format: AddressFormat,
) -> RefundBatch {
    let treasury = treasury_account();
    let derived = treasury.to_ss58(params.ss58_prefix);
    if derived != params.treasury_address {
        warn!(
            "[batch] derived treasury {derived} differs from the known {}",
            params.treasury_address
        );
    }

    let mut call = vec![params.utility_pallet_index, params.batch_call_index];
    Compact(ledger.len() as u32).encode_to(&mut call);
    let mut sum: Balance = 0;
    for (who, amount) in ledger.iter() {
        info!(
            "[batch] force_transfer {derived} -> {} {}",
            who.to_ss58(params.ss58_prefix),
            format_token(*amount, params.decimals, params.symbol)
        );
        encode_force_transfer(params, format, &treasury, who, *amount, &mut call);
        sum = sum.saturating_add(*amount);
    }

    let hash = blake2_256(&call);
    RefundBatch { call, hash, sum, transfers: ledger.len() }
}

pub fn preimage_path(dir: &Path, chain: &str, batch: &RefundBatch) -> PathBuf {
    dir.join(format!("{chain}-preimage-{}.bin", batch.hash_hex()))
}

/// Writes the preimage hex, as the democracy `note_preimage` tooling expects it.
pub fn write_preimage(dir: &Path, chain: &str, batch: &RefundBatch) -> Result<PathBuf> {
    let path = preimage_path(dir, chain, batch);
    fs::write(&path, batch.preimage_hex())
        .with_context(|| format!("failed to write preimage {}", path.display()))?;
    Ok(path)
}

/// `democracy.note_preimage(batch)` as an unsigned v4 extrinsic, for fee and weight queries.
pub fn note_preimage_extrinsic(batch: &RefundBatch, params: &NetworkParams) -> Vec<u8> {
    let mut body = vec![0x04, params.democracy_pallet_index, params.note_preimage_call_index];
    batch.call.encode_to(&mut body);
    let mut xt = Vec::with_capacity(body.len() + 5);
    Compact(body.len() as u32).encode_to(&mut xt);
    xt.extend_from_slice(&body);
    xt
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::chain::mock::{acc, hash};
    use crate::consts::{Network, network_params};
    use crate::schemas::Slash;

    #[test]
    fn treasury_matches_known_addresses() {
        for network in [Network::Polkadot, Network::Kusama] {
            let params = network_params(network);
            assert_eq!(treasury_account().to_ss58(params.ss58_prefix), params.treasury_address);
        }
    }

    #[test]
    fn single_transfer_layout() {
        let params = network_params(Network::Polkadot);
        let mut ledger = RefundLedger::default();
        ledger.credit(Slash { who: acc(9), amount: 1, at: hash(0) });

        let batch = build_refund_batch(&ledger, &params, AddressFormat::MultiAddress);
        let t = treasury_account();
        let mut expected = vec![26, 0, 0x04, 5, 2, 0x00];
        expected.extend_from_slice(t.as_bytes());
        expected.push(0x00);
        expected.extend_from_slice(&[9u8; 32]);
        expected.push(0x04); // compact(1)
        assert_eq!(batch.call, expected);
        assert_eq!(batch.hash, blake2_256(&expected));
        assert_eq!(batch.sum, 1);
        assert_eq!(batch.transfers, 1);
    }

    #[test]
    fn address_formats_and_sum() {
        let params = network_params(Network::Kusama);
        let mut ledger = RefundLedger::default();
        ledger.credit(Slash { who: acc(2), amount: 100, at: hash(0) });
        ledger.credit(Slash { who: acc(1), amount: 50, at: hash(0) });
        ledger.credit(Slash { who: acc(2), amount: 25, at: hash(1) });

        let bare = build_refund_batch(&ledger, &params, AddressFormat::AccountId);
        let indices = build_refund_batch(&ledger, &params, AddressFormat::Indices);
        assert_eq!(bare.sum, 175);
        assert_eq!(bare.transfers, 2);
        // two extra tag bytes per transfer
        assert_eq!(indices.call.len(), bare.call.len() + 4);
        assert_eq!(&indices.call[..5], &[24, 0, 0x08, 4, 2]);
        assert_eq!(indices.call[5], 0xff);
        assert_ne!(bare.hash, indices.hash);
    }

    #[test]
    fn preimage_file_name() {
        let params = network_params(Network::Polkadot);
        let batch = build_refund_batch(&RefundLedger::default(), &params, params.address_format);
        let path = preimage_path(Path::new("out"), "polkadot", &batch);
        assert_eq!(
            path,
            PathBuf::from(format!("out/polkadot-preimage-0x{}.bin", hex::encode(batch.hash)))
        );
        assert_eq!(batch.preimage_hex(), "0x1a0000");
    }

    #[test]
    fn note_preimage_wraps_the_batch() {
        let params = network_params(Network::Kusama);
        let batch = build_refund_batch(&RefundLedger::default(), &params, params.address_format);
        let xt = note_preimage_extrinsic(&batch, &params);
        // len 7: version, democracy, note_preimage, compact(3), 24 00 00
        assert_eq!(xt, vec![0x1c, 0x04, 13, 14, 0x0c, 24, 0, 0]);

        let polkadot = network_params(Network::Polkadot);
        let xt = note_preimage_extrinsic(&batch, &polkadot);
        assert_eq!(&xt[2..4], &[14, 14]);
    }
}
