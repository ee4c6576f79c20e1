#![cfg_attr(rustfmt, rustfmt_skip)]
#![allow(unused_parens)]
#![allow(unused_imports)]
#![allow(missing_docs)]

use core::marker::PhantomData;
use polkadot_sdk::frame_support::{
  traits::Get,
  weights::{constants::RocksDbWeight, Weight},
};

pub trait WeightInfo {
  fn execute(n: u32) -> Weight;
  fn flash_loan(n: u32) -> Weight;
  fn flash_swap() -> Weight;
}

/// Per action: two balance reads, one allowance read, two collaborator writes.
pub struct SubstrateWeight<T>(PhantomData<T>);
impl<T: polkadot_sdk::frame_system::Config> WeightInfo for SubstrateWeight<T> {
  fn execute(n: u32) -> Weight {
    Weight::from_parts(10_000_000, 1000)
      .saturating_add(Weight::from_parts(45_000_000, 3600).saturating_mul(n.into()))
      .saturating_add(T::DbWeight::get().reads((3_u64).saturating_mul(n.into())))
      .saturating_add(T::DbWeight::get().writes((2_u64).saturating_mul(n.into())))
      .saturating_add(T::DbWeight::get().writes(1))
  }

  fn flash_loan(n: u32) -> Weight {
    Weight::from_parts(30_000_000, 2500)
      .saturating_add(Weight::from_parts(40_000_000, 3600).saturating_mul(n.into()))
      .saturating_add(T::DbWeight::get().reads((4_u64).saturating_mul(n.into())))
      .saturating_add(T::DbWeight::get().writes((4_u64).saturating_mul(n.into())))
      .saturating_add(T::DbWeight::get().reads(1))
      .saturating_add(T::DbWeight::get().writes(3))
  }

  fn flash_swap() -> Weight {
    Weight::from_parts(90_000_000, 7200)
      .saturating_add(T::DbWeight::get().reads(7))
      .saturating_add(T::DbWeight::get().writes(9))
  }
}

impl WeightInfo for () {
  fn execute(n: u32) -> Weight {
    Weight::from_parts(10_000_000, 1000)
      .saturating_add(Weight::from_parts(45_000_000, 3600).saturating_mul(n.into()))
      .saturating_add(RocksDbWeight::get().reads((3_u64).saturating_mul(n.into())))
      .saturating_add(RocksDbWeight::get().writes((2_u64).saturating_mul(n.into())))
      .saturating_add(RocksDbWeight::get().writes(1))
  }
  fn flash_loan(n: u32) -> Weight {
    Weight::from_parts(30_000_000, 2500)
      .saturating_add(Weight::from_parts(40_000_000, 3600).saturating_mul(n.into()))
      .saturating_add(RocksDbWeight::get().reads((4_u64).saturating_mul(n.into())))
      .saturating_add(RocksDbWeight::get().writes((4_u64).saturating_mul(n.into())))
      .saturating_add(RocksDbWeight::get().reads(1))
      .saturating_add(RocksDbWeight::get().writes(3))
  }
  fn flash_swap() -> Weight {
    Weight::from_parts(90_000_000, 7200)
      .saturating_add(RocksDbWeight::get().reads(7))
      .saturating_add(RocksDbWeight::get().writes(9))
  }
}
