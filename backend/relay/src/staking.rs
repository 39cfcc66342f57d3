//! Account stake view: the validators an account nominates and the
//! nomination pool it belongs to.
//!
//! Both come straight from storage (`Staking.Nominators` and
//! `NominationPools.PoolMembers`, each keyed by `Twox64Concat(account)`).
//! Only the leading fields of each value are decoded.

use std::fmt;

use async_trait::async_trait;
use blake2::{Blake2b512, Digest};
use codec::Decode;
use sp_crypto_hashing::{twox_128, twox_64};

use crate::errors::{RelayError, Result};

const SS58_CHECKSUM_PREFIX: &[u8] = b"SS58PRE";
const CHECKSUM_LEN: usize = 2;

// ─────────────────────────────────────────────────────────
// Accounts
// ─────────────────────────────────────────────────────────

#[derive(Clone, Copy, PartialEq, Eq, Hash, Decode)]
pub struct AccountId(pub [u8; 32]);

impl AccountId {
    /// Parse an SS58 address on any network, or a `0x`-hex public key.
    pub fn parse(address: &str) -> Result<Self> {
        let address = address.trim();
        let mut key = [0u8; 32];

        if let Some(raw) = address.strip_prefix("0x") {
            hex::decode_to_slice(raw, &mut key)?;
            return Ok(AccountId(key));
        }

        let invalid = |why: &str| RelayError::Address(format!("{address}: {why}"));
        let raw = bs58::decode(address)
            .into_vec()
            .map_err(|e| invalid(&e.to_string()))?;
        let prefix_len = match raw.first() {
            Some(b) if *b < 64 => 1,
            Some(b) if *b < 128 => 2,
            _ => return Err(invalid("unsupported prefix")),
        };
        if raw.len() != prefix_len + key.len() + CHECKSUM_LEN {
            return Err(invalid("wrong length"));
        }

        let (body, checksum) = raw.split_at(raw.len() - CHECKSUM_LEN);
        if checksum != &ss58_hash(body)[..CHECKSUM_LEN] {
            return Err(invalid("bad checksum"));
        }
        key.copy_from_slice(&body[prefix_len..]);
        Ok(AccountId(key))
    }

    /// SS58 address of this account under `prefix`.
    pub fn to_ss58(&self, prefix: u16) -> String {
        let mut body = Vec::with_capacity(36);
        if prefix < 64 {
            body.push(prefix as u8);
        } else {
            let ident = prefix & 0b0011_1111_1111_1111;
            let first = ((ident & 0b0000_0000_1111_1100) as u8) >> 2;
            let second = ((ident >> 8) as u8) | (((ident & 0b0000_0000_0000_0011) as u8) << 6);
            body.push(first | 0b0100_0000);
            body.push(second);
        }
        body.extend_from_slice(&self.0);
        let checksum = ss58_hash(&body);
        body.extend_from_slice(&checksum[..CHECKSUM_LEN]);
        bs58::encode(body).into_string()
    }
}

impl fmt::Debug for AccountId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "0x{}", hex::encode(self.0))
    }
}

fn ss58_hash(body: &[u8]) -> Vec<u8> {
    let mut hasher = Blake2b512::new();
    hasher.update(SS58_CHECKSUM_PREFIX);
    hasher.update(body);
    hasher.finalize().to_vec()
}

// ─────────────────────────────────────────────────────────
// Storage
// ─────────────────────────────────────────────────────────

/// `twox128(pallet) ++ twox128(item)`.
pub fn storage_prefix(pallet: &str, item: &str) -> Vec<u8> {
    let mut key = twox_128(pallet.as_bytes()).to_vec();
    key.extend_from_slice(&twox_128(item.as_bytes()));
    key
}

fn account_map_key(pallet: &str, item: &str, account: &AccountId) -> Vec<u8> {
    let mut key = storage_prefix(pallet, item);
    key.extend_from_slice(&twox_64(&account.0));
    key.extend_from_slice(&account.0);
    key
}

pub fn nominators_key(account: &AccountId) -> Vec<u8> {
    account_map_key("Staking", "Nominators", account)
}

pub fn pool_member_key(account: &AccountId) -> Vec<u8> {
    account_map_key("NominationPools", "PoolMembers", account)
}

/// Leading field of `pallet_staking::Nominations`.
#[derive(Decode)]
struct Nominations {
    targets: Vec<AccountId>,
}

/// Leading field of `pallet_nomination_pools::PoolMember`.
#[derive(Decode)]
struct PoolMember {
    pool_id: u32,
}

pub fn decode_nominations(bytes: &[u8]) -> Result<Vec<AccountId>> {
    Ok(Nominations::decode(&mut &bytes[..])?.targets)
}

pub fn decode_pool_id(bytes: &[u8]) -> Result<u32> {
    Ok(PoolMember::decode(&mut &bytes[..])?.pool_id)
}

// ─────────────────────────────────────────────────────────
// Reader
// ─────────────────────────────────────────────────────────

#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct AccountStake {
    /// Validators nominated directly; empty when not nominating.
    pub nominators: Vec<AccountId>,
    /// Nomination pool the account is a member of.
    pub pool: Option<u32>,
}

#[async_trait]
pub trait StakingReader: Send + Sync {
    async fn account_stake(&self, account: &AccountId) -> Result<AccountStake>;
}

/// Reader that answers every account the same way.
#[cfg(test)]
pub struct FixedStake(pub std::result::Result<AccountStake, String>);

#[cfg(test)]
impl Default for FixedStake {
    fn default() -> Self {
        FixedStake(Ok(AccountStake::default()))
    }
}

#[cfg(test)]
#[async_trait]
impl StakingReader for FixedStake {
    async fn account_stake(&self, _account: &AccountId) -> Result<AccountStake> {
        self.0.clone().map_err(RelayError::Protocol)
    }
}
