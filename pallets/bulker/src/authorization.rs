//! Signature-authenticated grants
//!
//! The executor never verifies a signer and never tracks nonces. It only rejects
//! signatures that cannot be valid secp256k1 signatures and deadlines that have passed,
//! then forwards the signature to the collaborator that owns the nonce.

use crate::{Config, Error, Pallet};
use codec::{Decode, DecodeWithMemTracking, Encode, MaxEncodedLen};
use frame::prelude::*;
use polkadot_sdk::sp_io::{crypto::secp256k1_ecdsa_recover_compressed, hashing::blake2_256};
use scale_info::TypeInfo;

pub const MANAGER_AUTHORIZATION_DOMAIN: &[u8] = b"bulker:manager-authorization";
pub const TRANSFER_PERMIT_DOMAIN: &[u8] = b"bulker:transfer-permit";

/// secp256k1 group order divided by two. Signatures with a larger `s` are malleable.
const SECP256K1_HALF_ORDER: [u8; 32] = [
  0x7f, 0xff, 0xff, 0xff, 0xff, 0xff, 0xff, 0xff, 0xff, 0xff, 0xff, 0xff, 0xff, 0xff, 0xff, 0xff,
  0x5d, 0x57, 0x6e, 0x73, 0x57, 0xa4, 0x50, 0x1d, 0xdf, 0xe9, 0x2f, 0x46, 0x68, 0x1b, 0x20, 0xa0,
];

/// Recoverable ECDSA signature in `(v, r, s)` form.
#[derive(
  Clone,
  Copy,
  Debug,
  Decode,
  DecodeWithMemTracking,
  Encode,
  Eq,
  PartialEq,
  TypeInfo,
  MaxEncodedLen,
)]
pub struct Signature {
  pub v: u8,
  pub r: [u8; 32],
  pub s: [u8; 32],
}

impl Signature {
  /// Both raw (`0`/`1`) and offset (`27`/`28`) recovery ids are accepted.
  pub fn recovery_id(&self) -> Option<u8> {
    match self.v {
      0 | 1 => Some(self.v),
      27 | 28 => Some(self.v - 27),
      _ => None,
    }
  }

  pub fn is_well_formed(&self) -> bool {
    self.recovery_id().is_some()
      && self.r != [0u8; 32]
      && self.s != [0u8; 32]
      && self.s <= SECP256K1_HALF_ORDER
  }

  /// `r || s || recovery_id`, the layout host recovery functions expect.
  pub fn to_raw(&self) -> Option<[u8; 65]> {
    let recovery_id = self.recovery_id()?;
    let mut raw = [0u8; 65];
    raw[..32].copy_from_slice(&self.r);
    raw[32..64].copy_from_slice(&self.s);
    raw[64] = recovery_id;
    Some(raw)
  }

  /// Compressed public key that produced this signature over `digest`.
  pub fn recover_signer(&self, digest: &[u8; 32]) -> Option<[u8; 33]> {
    if !self.is_well_formed() {
      return None;
    }
    let raw = self.to_raw()?;
    secp256k1_ecdsa_recover_compressed(&raw, digest).ok()
  }

  /// Split a 65-byte `r || s || recovery_id` signature.
  pub fn from_raw(raw: &[u8; 65]) -> Self {
    let mut r = [0u8; 32];
    let mut s = [0u8; 32];
    r.copy_from_slice(&raw[..32]);
    s.copy_from_slice(&raw[32..64]);
    Self { v: raw[64].saturating_add(27), r, s }
  }
}

/// Message an owner signs to grant or revoke a manager on the lending ledger.
#[derive(Clone, Debug, Decode, Encode, Eq, PartialEq, TypeInfo)]
pub struct ManagerAuthorization<AccountId, BlockNumber> {
  pub authorizer: AccountId,
  pub authorized: AccountId,
  pub is_authorized: bool,
  pub nonce: u64,
  pub deadline: BlockNumber,
}

impl<AccountId: Encode, BlockNumber: Encode> ManagerAuthorization<AccountId, BlockNumber> {
  pub fn signing_digest(&self) -> [u8; 32] {
    blake2_256(&(MANAGER_AUTHORIZATION_DOMAIN, self).encode())
  }
}

/// Message an owner signs to give `spender` an allowance without a prior transaction.
#[derive(Clone, Debug, Decode, Encode, Eq, PartialEq, TypeInfo)]
pub struct TransferPermit<AccountId, AssetId, Balance, BlockNumber> {
  pub asset: AssetId,
  pub owner: AccountId,
  pub spender: AccountId,
  pub amount: Balance,
  pub nonce: u64,
  pub deadline: BlockNumber,
}

impl<AccountId, AssetId, Balance, BlockNumber> TransferPermit<AccountId, AssetId, Balance, BlockNumber>
where
  AccountId: Encode,
  AssetId: Encode,
  Balance: Encode,
  BlockNumber: Encode,
{
  pub fn signing_digest(&self) -> [u8; 32] {
    blake2_256(&(TRANSFER_PERMIT_DOMAIN, self).encode())
  }
}

impl<T: Config> Pallet<T> {
  /// Pre-flight checks for a signed grant: the deadline (inclusive) has not passed and
  /// the signature is structurally valid.
  pub(crate) fn ensure_authorizable(
    deadline: BlockNumberFor<T>,
    signature: &Signature,
  ) -> DispatchResult {
    ensure!(
      frame_system::Pallet::<T>::block_number() <= deadline,
      Error::<T>::DeadlineExpired
    );
    ensure!(signature.is_well_formed(), Error::<T>::InvalidSignature);
    Ok(())
  }
}
