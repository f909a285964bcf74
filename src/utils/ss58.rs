// src/utils/ss58.rs

use anyhow::{Result, anyhow};
use sp_core::crypto::{AccountId32, Ss58AddressFormat, Ss58Codec};

/// Encode a 32-byte public key as an SS58 address for the given network prefix.
pub fn encode(public: &[u8; 32], format: u16) -> String {
    AccountId32::from(*public).to_ss58check_with_version(Ss58AddressFormat::custom(format))
}

/// Decode an SS58 address of any network into `(network prefix, public key)`.
pub fn decode(address: &str) -> Result<(u16, [u8; 32])> {
    let (account, format) = AccountId32::from_ss58check_with_version(address)
        .map_err(|e| anyhow!("invalid ss58 address {address}: {e:?}"))?;
    Ok((u16::from(format), account.into()))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn known_polkadot_treasury_address() {
        // "modl" ++ "py/trsry" zero padded
        let mut raw = [0u8; 32];
        raw[..4].copy_from_slice(b"modl");
        raw[4..12].copy_from_slice(b"py/trsry");
        let addr = encode(&raw, 0);
        assert_eq!(addr, "13UVJyLnbVp9RBZYFwFGyDvVd1y27Tt8tkntv6Q7JVPhFsTB");
        let (prefix, back) = decode(&addr).expect("decode");
        assert_eq!(prefix, 0);
        assert_eq!(back, raw);
    }

    #[test]
    fn round_trips_two_byte_prefix() {
        let raw = [7u8; 32];
        let addr = encode(&raw, 1284);
        let (prefix, back) = decode(&addr).expect("decode");
        assert_eq!(prefix, 1284);
        assert_eq!(back, raw);
    }

    #[test]
    fn rejects_corrupted_checksum() {
        // last base58 digit lands in the checksum bytes
        assert!(decode("13UVJyLnbVp9RBZYFwFGyDvVd1y27Tt8tkntv6Q7JVPhFsTC").is_err());
        assert!(decode("not-an-address").is_err());
    }
}
