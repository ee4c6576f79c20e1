//! Ecosystem Constants for the Bulker
//!
//! System-level constants shared by the bulker pallet, the runtime wiring it and the
//! collaborators it talks to (lending ledger, flash providers).

/// Balance type alias for consistency across ecosystem
pub type Balance = u128;

/// Pallet identifiers for deriving pallet-owned accounts.
///
/// Used by Polkadot SDK's `PalletId::into_account_truncating()` to derive the account
/// that holds funds between actions of a batch.
pub mod pallet_ids {
  /// Bulker pallet ID (batched action executor)
  pub const BULKER_PALLET_ID: &[u8; 8] = b"bulker00";
}

/// Parameters shared between the executor and its flash counterparties.
pub mod params {
  /// Basis point denominator.
  pub const BPS_DENOMINATOR: u32 = 10_000;

  /// Flash-swap fee charged by dual-asset pools (0.3% = 30 bps).
  ///
  /// The bulker grants a pool `principal * BPS_DENOMINATOR / FLASH_SWAP_FEE_BPS` after a
  /// flash-swap callback; the pool then collects principal plus fee itself.
  pub const FLASH_SWAP_FEE_BPS: u32 = 30;

  /// Premium charged by single-asset lenders (0.09% = 9 bps).
  pub const FLASH_LOAN_PREMIUM_BPS: u32 = 9;

  /// Upper bound for actions in one batch. Must stay below 256: batch lengths are
  /// reported in single-byte error fields.
  pub const MAX_BATCH_ACTIONS: u32 = 32;

  /// Upper bound for a single encoded action payload (bytes).
  pub const MAX_ACTION_PAYLOAD: u32 = 4_096;

  /// Upper bound for assets requested in one single-asset flash loan.
  pub const MAX_FLASH_ASSETS: u32 = 8;
}
