use codec::{Decode, DecodeWithMemTracking, Encode, MaxEncodedLen};
use scale_info::TypeInfo;
use sp_arithmetic::Perbill;

/// Descriptor of a lending position family on the ledger.
///
/// Equality is structural: two descriptors with the same fields address the same
/// market, and the ledger derives its market identifier from the encoded form.
/// The bulker never stores a market; callers pass one with every position action.
#[derive(
  Clone,
  Copy,
  Debug,
  Decode,
  DecodeWithMemTracking,
  Encode,
  Eq,
  MaxEncodedLen,
  PartialEq,
  TypeInfo,
)]
pub struct MarketParams<AssetId, AccountId> {
  /// Asset lent and borrowed in this market
  pub loan_asset: AssetId,
  /// Asset posted as collateral against borrows
  pub collateral_asset: AssetId,
  /// Price feed consulted by the ledger
  pub oracle: AccountId,
  /// Interest rate model consulted by the ledger
  pub irm: AccountId,
  /// Liquidation loan-to-value
  pub lltv: Perbill,
}
