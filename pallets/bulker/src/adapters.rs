//! Adapter traits for the bulker pallet
//!
//! Every external protocol the executor talks to is reached through one of these traits,
//! keeping the pallet independent of how a runtime implements tokens, the lending ledger
//! or flash liquidity. All calls are expected to be atomic and to fail with a
//! `DispatchError` on invalid input; the executor propagates those errors unchanged.

use crate::authorization::{ManagerAuthorization, Signature};
use core::marker::PhantomData;
use frame::prelude::*;
use polkadot_sdk::frame_support::traits::{
  fungibles::{self, approvals},
  tokens::Preservation,
};
use primitives::MarketParams;

/// Token transfer primitive.
///
/// Balances, plain transfers and the standing-allowance model (`approve` +
/// `transfer_from`) the executor uses to let the ledger and flash providers pull funds.
pub trait TokenOps<AccountId, AssetId, Balance> {
  fn balance(asset: AssetId, who: &AccountId) -> Balance;

  fn transfer(asset: AssetId, from: &AccountId, to: &AccountId, amount: Balance) -> DispatchResult;

  fn allowance(asset: AssetId, owner: &AccountId, spender: &AccountId) -> Balance;

  /// Raise the allowance of `spender` over `owner`'s funds by `amount`.
  fn approve(
    asset: AssetId,
    owner: &AccountId,
    spender: &AccountId,
    amount: Balance,
  ) -> DispatchResult;

  /// Move `amount` from `owner` to `dest`, spending `spender`'s allowance.
  fn transfer_from(
    asset: AssetId,
    owner: &AccountId,
    spender: &AccountId,
    dest: &AccountId,
    amount: Balance,
  ) -> DispatchResult;
}

/// `TokenOps` over any `fungibles` implementation with approvals (e.g. `pallet-assets`).
///
/// `pallet-assets` reserves an approval deposit in native currency from the owner, so
/// the pallet account needs free native balance before its first approval of each
/// asset. Genesis mints `Config::ApprovalFunds` for that.
pub struct FungiblesTokenOps<F>(PhantomData<F>);

impl<AccountId, F>
  TokenOps<
    AccountId,
    <F as fungibles::Inspect<AccountId>>::AssetId,
    <F as fungibles::Inspect<AccountId>>::Balance,
  > for FungiblesTokenOps<F>
where
  AccountId: Eq,
  F: fungibles::Mutate<AccountId> + approvals::Mutate<AccountId>,
{
  fn balance(
    asset: <F as fungibles::Inspect<AccountId>>::AssetId,
    who: &AccountId,
  ) -> <F as fungibles::Inspect<AccountId>>::Balance {
    <F as fungibles::Inspect<AccountId>>::balance(asset, who)
  }

  fn transfer(
    asset: <F as fungibles::Inspect<AccountId>>::AssetId,
    from: &AccountId,
    to: &AccountId,
    amount: <F as fungibles::Inspect<AccountId>>::Balance,
  ) -> DispatchResult {
    <F as fungibles::Mutate<AccountId>>::transfer(asset, from, to, amount, Preservation::Expendable)
      .map(|_| ())
  }

  fn allowance(
    asset: <F as fungibles::Inspect<AccountId>>::AssetId,
    owner: &AccountId,
    spender: &AccountId,
  ) -> <F as fungibles::Inspect<AccountId>>::Balance {
    <F as approvals::Inspect<AccountId>>::allowance(asset, owner, spender)
  }

  fn approve(
    asset: <F as fungibles::Inspect<AccountId>>::AssetId,
    owner: &AccountId,
    spender: &AccountId,
    amount: <F as fungibles::Inspect<AccountId>>::Balance,
  ) -> DispatchResult {
    <F as approvals::Mutate<AccountId>>::approve(asset, owner, spender, amount)
  }

  fn transfer_from(
    asset: <F as fungibles::Inspect<AccountId>>::AssetId,
    owner: &AccountId,
    spender: &AccountId,
    dest: &AccountId,
    amount: <F as fungibles::Inspect<AccountId>>::Balance,
  ) -> DispatchResult {
    <F as approvals::Mutate<AccountId>>::transfer_from(asset, owner, spender, dest, amount)
  }
}

/// Signature-authenticated allowance registry (permit-style).
///
/// `permit` records an allowance the owner signed off-chain; the registry owns nonce
/// bookkeeping and signer verification. `transfer_from` spends that allowance.
pub trait PermitOps<AccountId, AssetId, Balance, BlockNumber> {
  fn permit(
    asset: AssetId,
    owner: &AccountId,
    spender: &AccountId,
    amount: Balance,
    deadline: BlockNumber,
    signature: &Signature,
  ) -> DispatchResult;

  fn transfer_from(
    asset: AssetId,
    owner: &AccountId,
    spender: &AccountId,
    amount: Balance,
  ) -> DispatchResult;
}

/// Permits disabled: every authenticated path fails.
impl<AccountId, AssetId, Balance, BlockNumber> PermitOps<AccountId, AssetId, Balance, BlockNumber>
  for ()
{
  fn permit(
    _: AssetId,
    _: &AccountId,
    _: &AccountId,
    _: Balance,
    _: BlockNumber,
    _: &Signature,
  ) -> DispatchResult {
    Err(DispatchError::Other("PermitOps not configured"))
  }

  fn transfer_from(_: AssetId, _: &AccountId, _: &AccountId, _: Balance) -> DispatchResult {
    Err(DispatchError::Other("PermitOps not configured"))
  }
}

/// Lending ledger the bulker manages positions on.
///
/// `caller` is always the bulker account. Supply-side calls pull funds from `caller`
/// through the allowance it granted to `account()`. Withdraw-side calls act for
/// `on_behalf` and require the ledger to consider `caller` an authorized manager.
pub trait LendingLedger<AccountId, AssetId, Balance, BlockNumber> {
  /// Account that pulls supplied funds and pays out borrows.
  fn account() -> AccountId;

  fn supply(
    caller: &AccountId,
    market: &MarketParams<AssetId, AccountId>,
    assets: Balance,
    on_behalf: &AccountId,
  ) -> DispatchResult;

  fn supply_collateral(
    caller: &AccountId,
    market: &MarketParams<AssetId, AccountId>,
    assets: Balance,
    on_behalf: &AccountId,
  ) -> DispatchResult;

  fn borrow(
    caller: &AccountId,
    market: &MarketParams<AssetId, AccountId>,
    assets: Balance,
    on_behalf: &AccountId,
    receiver: &AccountId,
  ) -> DispatchResult;

  fn repay(
    caller: &AccountId,
    market: &MarketParams<AssetId, AccountId>,
    assets: Balance,
    on_behalf: &AccountId,
  ) -> DispatchResult;

  fn withdraw(
    caller: &AccountId,
    market: &MarketParams<AssetId, AccountId>,
    assets: Balance,
    on_behalf: &AccountId,
    receiver: &AccountId,
  ) -> DispatchResult;

  fn withdraw_collateral(
    caller: &AccountId,
    market: &MarketParams<AssetId, AccountId>,
    assets: Balance,
    on_behalf: &AccountId,
    receiver: &AccountId,
  ) -> DispatchResult;

  /// Grant or revoke a manager using an off-chain signature of the authorizer.
  /// Nonce, deadline and signer checks belong to the ledger.
  fn set_authorization_with_sig(
    authorization: &ManagerAuthorization<AccountId, BlockNumber>,
    signature: &Signature,
  ) -> DispatchResult;
}

/// Single-asset flash lender (Aave-style).
///
/// `flash_loan` transfers `amounts` to `receiver`, calls
/// [`FlashLoanReceiver::execute_operation`] and then pulls principal plus premium back
/// through the allowance the receiver granted to `account()`.
pub trait FlashLender<AccountId, AssetId, Balance> {
  fn account() -> AccountId;

  fn flash_loan(
    receiver: &AccountId,
    assets: &[AssetId],
    amounts: &[Balance],
    params: &[u8],
  ) -> DispatchResult;
}

/// Dual-asset flash-swap pools (Uniswap-V2-style).
pub trait SwapPairs<AccountId, AssetId, Balance> {
  /// Pool account for a pair of assets given in ascending order, if the pool exists.
  fn pair_for(token0: AssetId, token1: AssetId) -> Option<AccountId>;

  /// Optimistically send `amount0`/`amount1` to `to`, call
  /// [`FlashSwapCallee::flash_swap_call`] and collect repayment plus fee.
  fn swap(
    pair: &AccountId,
    amount0: Balance,
    amount1: Balance,
    to: &AccountId,
    data: &[u8],
  ) -> DispatchResult;
}

/// Flash swaps disabled: no pool exists.
impl<AccountId, AssetId, Balance> SwapPairs<AccountId, AssetId, Balance> for () {
  fn pair_for(_: AssetId, _: AssetId) -> Option<AccountId> {
    None
  }

  fn swap(_: &AccountId, _: Balance, _: Balance, _: &AccountId, _: &[u8]) -> DispatchResult {
    Err(DispatchError::Other("SwapPairs not configured"))
  }
}

/// Callback a single-asset lender invokes on the borrower mid-loan.
pub trait FlashLoanReceiver<AccountId, AssetId, Balance> {
  fn execute_operation(
    lender: &AccountId,
    assets: &[AssetId],
    amounts: &[Balance],
    premiums: &[Balance],
    initiator: &AccountId,
    params: &[u8],
  ) -> DispatchResult;
}

/// Callback a flash-swap pool invokes on the recipient mid-swap.
pub trait FlashSwapCallee<AccountId, Balance> {
  fn flash_swap_call(
    pair: &AccountId,
    sender: &AccountId,
    amount0: Balance,
    amount1: Balance,
    data: &[u8],
  ) -> DispatchResult;
}
