#![cfg(feature = "runtime-benchmarks")]

use crate::*;
use crate::actions::{Action, SkimPayload, TransferInPayload};
use alloc::vec;
use alloc::vec::Vec;
use frame::prelude::*;
use polkadot_sdk::frame_benchmarking::v2::*;
use polkadot_sdk::frame_system::RawOrigin;
use polkadot_sdk::sp_runtime::traits::Saturating;
use primitives::ecosystem::params::{MAX_BATCH_ACTIONS, MAX_FLASH_ASSETS};

#[benchmarks]
mod benches {
  use super::*;

  fn funded_asset<T: Config>(seed: u32, caller: &T::AccountId) -> T::AssetId {
    let amount: T::Balance = 1_000_000_000u32.into();
    T::BenchmarkHelper::create_asset(
      seed,
      &[caller.clone(), Pallet::<T>::account_id()],
      amount,
    )
  }

  fn bounded_batch<T: Config>(
    actions: &[ActionOf<T>],
  ) -> (
    BoundedVec<u8, T::MaxActions>,
    BoundedVec<BoundedVec<u8, T::MaxPayloadLen>, T::MaxActions>,
  ) {
    let batch = Batch::from_actions(actions);
    let data: Vec<BoundedVec<u8, T::MaxPayloadLen>> = batch
      .data
      .into_iter()
      .map(|payload| payload.try_into().unwrap_or_default())
      .collect();
    (
      batch.actions.try_into().unwrap_or_default(),
      data.try_into().unwrap_or_default(),
    )
  }

  // Every action pulls from the caller into the pallet account; a trailing skim
  // returns the funds so no balance is left behind.
  #[benchmark]
  fn execute(n: Linear<1, { MAX_BATCH_ACTIONS }>) {
    let caller: T::AccountId = whitelisted_caller();
    let asset = funded_asset::<T>(1, &caller);
    let pull: T::Balance = 1_000u32.into();
    T::Tokens::approve(
      asset,
      &caller,
      &Pallet::<T>::account_id(),
      pull.saturating_mul(n.into()),
    )
    .unwrap();

    let mut actions: Vec<ActionOf<T>> = (1..n)
      .map(|_| Action::TransferIn(TransferInPayload { asset, amount: pull }))
      .collect();
    actions.push(Action::Skim(SkimPayload {
      asset,
      receiver: caller.clone(),
    }));
    let (tags, data) = bounded_batch::<T>(&actions);

    #[extrinsic_call]
    _(RawOrigin::Signed(caller.clone()), tags, data);

    assert!(Pallet::<T>::flash_phase() == FlashPhase::Idle);
  }

  #[benchmark]
  fn flash_loan(n: Linear<1, { MAX_FLASH_ASSETS }>) {
    let caller: T::AccountId = whitelisted_caller();
    let amount: T::Balance = 1_000_000u32.into();
    // The pallet account holds enough of every asset to cover the premium.
    let assets: Vec<T::AssetId> = (0..n)
      .map(|i| funded_asset::<T>(10 + i, &caller))
      .collect();
    let amounts: Vec<T::Balance> = vec![amount; n as usize];

    #[extrinsic_call]
    _(
      RawOrigin::Signed(caller),
      assets.try_into().unwrap_or_default(),
      amounts.try_into().unwrap_or_default(),
      BoundedVec::default(),
    );

    assert!(ActiveFlash::<T>::get().is_none());
  }

  #[benchmark]
  fn flash_swap() {
    let caller: T::AccountId = whitelisted_caller();
    let liquidity: T::Balance = 1_000_000_000u32.into();
    let token0 = funded_asset::<T>(50, &caller);
    let token1 = funded_asset::<T>(51, &caller);
    T::BenchmarkHelper::create_pair(token0, token1, liquidity);
    let amount: T::Balance = 1_000_000u32.into();

    #[extrinsic_call]
    _(
      RawOrigin::Signed(caller),
      token0,
      token1,
      amount,
      amount,
      BoundedVec::default(),
    );

    assert!(ActiveFlash::<T>::get().is_none());
  }

  #[cfg(test)]
  use crate::mock::{Test, new_test_ext};
  #[cfg(test)]
  impl_benchmark_test_suite!(Pallet, new_test_ext(), Test);
}

