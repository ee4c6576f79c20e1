//! Flash settlement
//!
//! A flash request hands control to an external provider, which calls back into the
//! pallet before it returns. The callback runs the caller's inner batch and grants the
//! provider an allowance to collect repayment. Progress is tracked in [`ActiveFlash`]:
//!
//! `Idle -> LoanRequested -> CallbackReceived -> RepaymentGranted -> Idle`
//!
//! `Idle` is the absence of a stored context, so nothing survives the extrinsic. Only one
//! flash operation may be in flight; a request from inside a callback fails.

use crate::{
  ActiveFlash, Batch, Config, Error, Event, FlashLender, FlashLoanReceiver, FlashSwapCallee,
  LOG_TARGET, Pallet, SwapPairs, TokenOps,
};
use alloc::vec::Vec;
use codec::{Decode, DecodeAll, DecodeWithMemTracking, Encode, MaxEncodedLen};
use frame::prelude::*;
use polkadot_sdk::sp_runtime::traits::{AtLeast32BitUnsigned, SaturatedConversion, Saturating, Zero};
use primitives::ecosystem::params::{BPS_DENOMINATOR, FLASH_SWAP_FEE_BPS};
use scale_info::TypeInfo;

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
pub enum FlashPhase {
  Idle,
  LoanRequested,
  CallbackReceived,
  RepaymentGranted,
}

#[derive(
  Clone,
  Debug,
  Decode,
  DecodeWithMemTracking,
  Encode,
  Eq,
  PartialEq,
  TypeInfo,
  MaxEncodedLen,
)]
pub struct FlashContext<AccountId> {
  pub phase: FlashPhase,
  /// Caller whose inner batch runs inside the callback
  pub initiator: AccountId,
  /// Lender or pool expected to call back
  pub counterparty: AccountId,
}

/// Data the pallet hands a pool with a flash swap; the pool passes it back untouched.
#[derive(Clone, Debug, Decode, Encode, Eq, PartialEq, TypeInfo)]
pub struct FlashSwapEnvelope<AssetId> {
  pub token0: AssetId,
  pub token1: AssetId,
  pub batch: Vec<u8>,
}

/// Allowance granted to a pool per borrowed `principal`: principal plus the 0.3% fee,
/// expressed as `principal * 10000 / 30`. Split into quotient and remainder so only the
/// result saturates, never the product.
pub fn flash_swap_allowance<Balance: AtLeast32BitUnsigned + Copy>(principal: Balance) -> Balance {
  let scale: Balance = BPS_DENOMINATOR.into();
  let fee: Balance = FLASH_SWAP_FEE_BPS.into();
  (principal / fee)
    .saturating_mul(scale)
    .saturating_add(principal % fee * scale / fee)
}

impl<T: Config> Pallet<T> {
  pub fn flash_phase() -> FlashPhase {
    ActiveFlash::<T>::get().map_or(FlashPhase::Idle, |context| context.phase)
  }

  pub(crate) fn do_flash_loan(
    initiator: &T::AccountId,
    assets: &[T::AssetId],
    amounts: &[T::Balance],
    data: &[u8],
  ) -> DispatchResult {
    ensure!(assets.len() == amounts.len(), Error::<T>::FlashLengthMismatch);
    ensure!(!assets.is_empty(), Error::<T>::EmptyFlashLoan);
    ensure!(
      assets.len() <= T::MaxFlashAssets::get() as usize,
      Error::<T>::TooManyFlashAssets
    );
    ensure!(amounts.iter().all(|amount| !amount.is_zero()), Error::<T>::AmountIsZero);

    let lender = T::FlashLender::account();
    Self::open_flash(initiator, &lender)?;
    T::FlashLender::flash_loan(&Self::account_id(), assets, amounts, data)?;
    Self::close_flash()?;

    Self::deposit_event(Event::FlashLoanSettled {
      initiator: initiator.clone(),
      lender,
      assets: assets.len().saturated_into(),
    });
    Ok(())
  }

  pub(crate) fn do_flash_swap(
    initiator: &T::AccountId,
    token0: T::AssetId,
    token1: T::AssetId,
    amount0: T::Balance,
    amount1: T::Balance,
    data: &[u8],
  ) -> DispatchResult {
    ensure!(token0 != token1, Error::<T>::IdenticalAssets);
    ensure!(!amount0.is_zero() || !amount1.is_zero(), Error::<T>::AmountIsZero);

    let ((token0, amount0), (token1, amount1)) = if token0 < token1 {
      ((token0, amount0), (token1, amount1))
    } else {
      ((token1, amount1), (token0, amount0))
    };
    let pair = T::SwapPairs::pair_for(token0, token1).ok_or(Error::<T>::PairNotFound)?;
    let envelope = FlashSwapEnvelope {
      token0,
      token1,
      batch: data.to_vec(),
    };

    Self::open_flash(initiator, &pair)?;
    T::SwapPairs::swap(&pair, amount0, amount1, &Self::account_id(), &envelope.encode())?;
    Self::close_flash()?;

    Self::deposit_event(Event::FlashSwapSettled {
      initiator: initiator.clone(),
      pair,
      amount0,
      amount1,
    });
    Ok(())
  }

  fn open_flash(initiator: &T::AccountId, counterparty: &T::AccountId) -> DispatchResult {
    ensure!(ActiveFlash::<T>::get().is_none(), Error::<T>::FlashLoanInProgress);
    ActiveFlash::<T>::put(FlashContext {
      phase: FlashPhase::LoanRequested,
      initiator: initiator.clone(),
      counterparty: counterparty.clone(),
    });
    log::trace!(target: LOG_TARGET, "flash requested from {:?}", counterparty);
    Ok(())
  }

  /// Move `LoanRequested -> CallbackReceived` for a callback from `caller`.
  fn accept_callback(caller: &T::AccountId) -> Result<FlashContext<T::AccountId>, DispatchError> {
    ActiveFlash::<T>::try_mutate(|maybe_context| -> Result<_, DispatchError> {
      let context = maybe_context
        .as_mut()
        .ok_or(Error::<T>::UnexpectedFlashCallback)?;
      ensure!(
        context.phase == FlashPhase::LoanRequested && context.counterparty == *caller,
        Error::<T>::UnexpectedFlashCallback
      );
      context.phase = FlashPhase::CallbackReceived;
      log::trace!(target: LOG_TARGET, "flash callback from {:?}", caller);
      Ok(context.clone())
    })
  }

  fn grant_repayment() -> DispatchResult {
    ActiveFlash::<T>::try_mutate(|maybe_context| -> DispatchResult {
      let context = maybe_context
        .as_mut()
        .ok_or(Error::<T>::UnexpectedFlashCallback)?;
      ensure!(
        context.phase == FlashPhase::CallbackReceived,
        Error::<T>::UnexpectedFlashCallback
      );
      context.phase = FlashPhase::RepaymentGranted;
      log::trace!(target: LOG_TARGET, "flash repayment granted");
      Ok(())
    })
  }

  /// Back to `Idle`. Fails unless the provider called back and repayment was granted.
  fn close_flash() -> DispatchResult {
    let context = ActiveFlash::<T>::take().ok_or(Error::<T>::FlashCallbackMissing)?;
    ensure!(
      context.phase == FlashPhase::RepaymentGranted,
      Error::<T>::FlashCallbackMissing
    );
    log::trace!(target: LOG_TARGET, "flash settled with {:?}", context.counterparty);
    Ok(())
  }

  /// Run an encoded [`Batch`] as `initiator`. Empty data runs nothing.
  fn run_inner_batch(initiator: &T::AccountId, data: &[u8]) -> DispatchResult {
    if data.is_empty() {
      return Ok(());
    }
    let batch = Batch::decode_all(&mut &data[..])
      .map_err(|_| Error::<T>::DecodeError { index: u8::MAX })?;
    ensure!(
      batch.len() <= T::MaxActions::get() as usize,
      Error::<T>::TooManyActions
    );
    Self::do_execute(initiator, &batch.actions, &batch.data)
  }
}

impl<T: Config> FlashLoanReceiver<T::AccountId, T::AssetId, T::Balance> for Pallet<T> {
  fn execute_operation(
    lender: &T::AccountId,
    assets: &[T::AssetId],
    amounts: &[T::Balance],
    premiums: &[T::Balance],
    initiator: &T::AccountId,
    params: &[u8],
  ) -> DispatchResult {
    let context = Self::accept_callback(lender)?;
    let bulker = Self::account_id();
    ensure!(*initiator == bulker, Error::<T>::UnexpectedFlashCallback);
    ensure!(
      assets.len() == amounts.len() && amounts.len() == premiums.len(),
      Error::<T>::FlashLengthMismatch
    );

    Self::run_inner_batch(&context.initiator, params)?;

    for ((asset, amount), premium) in assets.iter().zip(amounts).zip(premiums) {
      T::Tokens::approve(*asset, &bulker, lender, amount.saturating_add(*premium))?;
    }
    Self::grant_repayment()
  }
}

impl<T: Config> FlashSwapCallee<T::AccountId, T::Balance> for Pallet<T> {
  fn flash_swap_call(
    pair: &T::AccountId,
    sender: &T::AccountId,
    amount0: T::Balance,
    amount1: T::Balance,
    data: &[u8],
  ) -> DispatchResult {
    let context = Self::accept_callback(pair)?;
    let bulker = Self::account_id();
    ensure!(*sender == bulker, Error::<T>::UnexpectedFlashCallback);

    let envelope = FlashSwapEnvelope::<T::AssetId>::decode_all(&mut &data[..])
      .map_err(|_| Error::<T>::DecodeError { index: u8::MAX })?;
    ensure!(
      T::SwapPairs::pair_for(envelope.token0, envelope.token1).as_ref() == Some(pair),
      Error::<T>::UnexpectedFlashCallback
    );

    Self::run_inner_batch(&context.initiator, &envelope.batch)?;

    for (asset, principal) in [(envelope.token0, amount0), (envelope.token1, amount1)] {
      if !principal.is_zero() {
        T::Tokens::approve(asset, &bulker, pair, flash_swap_allowance(principal))?;
      }
    }
    Self::grant_repayment()
  }
}
