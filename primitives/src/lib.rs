#![cfg_attr(not(feature = "std"), no_std)]

pub mod ecosystem;
pub mod market;

pub use ecosystem::*;
pub use market::*;
