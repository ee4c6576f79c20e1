//! Bulker Pallet
//!
//! Batched action executor for a lending ledger. A caller submits an ordered list of
//! tagged actions (token pulls, signed grants, position changes, flash liquidity) that
//! run atomically through the pallet account, so a multi-step position change lands in
//! one extrinsic or not at all.

#![cfg_attr(not(feature = "std"), no_std)]

extern crate alloc;

pub use pallet::*;

pub mod actions;
pub mod adapters;
pub mod authorization;
pub mod flash;

pub use actions::{Action, ActionTag, Batch};
pub use adapters::{
  FlashLender, FlashLoanReceiver, FlashSwapCallee, FungiblesTokenOps, LendingLedger, PermitOps,
  SwapPairs, TokenOps,
};
pub use authorization::{ManagerAuthorization, Signature, TransferPermit};
pub use flash::{FlashContext, FlashPhase};

#[cfg(test)]
mod mock;

#[cfg(feature = "runtime-benchmarks")]
mod benchmarking;

pub mod weights;
pub use weights::WeightInfo;

pub const LOG_TARGET: &str = "runtime::bulker";

/// Benchmark setup the runtime provides for its concrete collaborators.
#[cfg(feature = "runtime-benchmarks")]
pub trait BenchmarkHelper<AccountId, AssetId, Balance> {
  /// Create asset number `seed` and credit `amount` of it to each of `holders` and to
  /// the flash lender.
  fn create_asset(seed: u32, holders: &[AccountId], amount: Balance) -> AssetId;
  /// Make a flash-swap pool for the pair available, holding `amount` of both assets.
  fn create_pair(token0: AssetId, token1: AssetId, amount: Balance);
}

#[frame::pallet]
pub mod pallet {
  use super::*;
  use frame::prelude::*;
  use crate::actions::{
    ApproveTransferPayload, ManagerPermissionPayload, SkimPayload, SupplyPayload,
    TransferInPayload,
  };
  use alloc::vec::Vec;
  use polkadot_sdk::frame_support::traits::fungible::{
    Inspect as NativeInspect, Mutate as NativeMutate,
  };
  use polkadot_sdk::sp_runtime::traits::{
    AccountIdConversion, AtLeast32BitUnsigned, Bounded, SaturatedConversion, TrailingZeroInput,
    Zero,
  };
  use primitives::MarketParams;

  pub type ActionOf<T> = Action<
    <T as frame_system::Config>::AccountId,
    <T as Config>::AssetId,
    <T as Config>::Balance,
    BlockNumberFor<T>,
  >;
  pub type MarketOf<T> = MarketParams<<T as Config>::AssetId, <T as frame_system::Config>::AccountId>;

  pub type NativeBalanceOf<T> =
    <<T as Config>::Currency as NativeInspect<<T as frame_system::Config>::AccountId>>::Balance;

  type LedgerPush<T> = fn(
    &<T as frame_system::Config>::AccountId,
    &MarketOf<T>,
    <T as Config>::Balance,
    &<T as frame_system::Config>::AccountId,
  ) -> DispatchResult;

  #[pallet::config]
  pub trait Config: frame_system::Config {
    /// Asset identifier shared by tokens, markets and flash providers
    type AssetId: Parameter + Member + Copy + Ord + MaxEncodedLen;

    type Balance: Parameter + Member + AtLeast32BitUnsigned + Default + Copy + MaxEncodedLen;

    /// Token transfers and standing allowances
    type Tokens: TokenOps<Self::AccountId, Self::AssetId, Self::Balance>;

    /// Signature-authenticated allowances
    type Permits: PermitOps<Self::AccountId, Self::AssetId, Self::Balance, BlockNumberFor<Self>>;

    /// Lending ledger the positions live on
    type Ledger: LendingLedger<Self::AccountId, Self::AssetId, Self::Balance, BlockNumberFor<Self>>;

    /// Single-asset flash lender
    type FlashLender: FlashLender<Self::AccountId, Self::AssetId, Self::Balance>;

    /// Dual-asset flash-swap pools
    type SwapPairs: SwapPairs<Self::AccountId, Self::AssetId, Self::Balance>;

    /// Pallet ID for account derivation
    #[pallet::constant]
    type PalletId: Get<frame::deps::frame_support::PalletId>;

    /// Maximum actions per batch; at most 255
    #[pallet::constant]
    type MaxActions: Get<u32>;

    /// Maximum encoded size of one action payload
    #[pallet::constant]
    type MaxPayloadLen: Get<u32>;

    /// Maximum assets in one single-asset flash loan
    #[pallet::constant]
    type MaxFlashAssets: Get<u32>;

    /// Native currency, used to fund approval deposits of the pallet account
    type Currency: NativeMutate<Self::AccountId>;

    /// Native balance minted into the pallet account at genesis
    #[pallet::constant]
    type ApprovalFunds: Get<NativeBalanceOf<Self>>;

    /// Weight information
    type WeightInfo: WeightInfo;

    /// Helper for benchmarking
    #[cfg(feature = "runtime-benchmarks")]
    type BenchmarkHelper: crate::BenchmarkHelper<Self::AccountId, Self::AssetId, Self::Balance>;
  }

  #[pallet::pallet]
  pub struct Pallet<T>(PhantomData<T>);

  /// Flash operation in flight. Present only between a flash request and its settlement
  /// inside a single extrinsic.
  #[pallet::storage]
  pub type ActiveFlash<T: Config> = StorageValue<_, FlashContext<T::AccountId>, OptionQuery>;

  #[pallet::event]
  #[pallet::generate_deposit(pub(super) fn deposit_event)]
  pub enum Event<T: Config> {
    /// One action of a batch completed
    ActionExecuted {
      who: T::AccountId,
      index: u32,
      tag: ActionTag,
    },
    /// Every action of a batch completed
    BatchExecuted { who: T::AccountId, actions: u32 },
    /// Ledger allowance over the pallet account raised to the maximum
    LedgerAllowanceRaised { asset: T::AssetId },
    /// Residual pallet balance swept out
    Skimmed {
      asset: T::AssetId,
      receiver: T::AccountId,
      amount: T::Balance,
    },
    FlashLoanSettled {
      initiator: T::AccountId,
      lender: T::AccountId,
      assets: u32,
    },
    FlashSwapSettled {
      initiator: T::AccountId,
      pair: T::AccountId,
      amount0: T::Balance,
      amount1: T::Balance,
    },
  }

  #[pallet::error]
  pub enum Error<T> {
    /// Tag and payload sequences differ in length
    MalformedBatch { actions: u8, payloads: u8 },
    /// Payload at `index` does not match its tag's shape
    DecodeError { index: u8 },
    /// Tag outside the known action set
    UnsupportedAction { tag: u8 },
    /// Inner batch exceeds the action limit
    TooManyActions,
    /// Amount is zero
    AmountIsZero,
    /// Receiver is the zero account
    AddressIsZero,
    /// Beneficiary or receiver is the pallet account
    AddressIsBulker,
    /// Flash swap over a single asset
    IdenticalAssets,
    /// Flash loan assets and amounts differ in length
    FlashLengthMismatch,
    /// Flash loan without assets
    EmptyFlashLoan,
    /// Flash loan over more assets than `MaxFlashAssets`
    TooManyFlashAssets,
    /// No flash-swap pool for the pair
    PairNotFound,
    /// Signed grant past its deadline
    DeadlineExpired,
    /// Signature cannot be a valid low-s secp256k1 signature
    InvalidSignature,
    /// A flash operation is already in flight
    FlashLoanInProgress,
    /// Callback outside a pending flash request or from the wrong counterparty
    UnexpectedFlashCallback,
    /// Provider returned without calling back
    FlashCallbackMissing,
  }

  #[pallet::hooks]
  impl<T: Config> Hooks<BlockNumberFor<T>> for Pallet<T> {
    #[cfg(feature = "try-runtime")]
    fn try_state(_n: BlockNumberFor<T>) -> Result<(), polkadot_sdk::sp_runtime::TryRuntimeError> {
      ensure!(
        ActiveFlash::<T>::get().is_none(),
        "flash context survived its extrinsic"
      );
      Ok(())
    }
  }

  #[pallet::call]
  impl<T: Config> Pallet<T> {
    /// Execute a batch of actions in order, atomically
    #[pallet::call_index(0)]
    #[pallet::weight(Pallet::<T>::batch_weight(actions))]
    pub fn execute(
      origin: OriginFor<T>,
      actions: BoundedVec<u8, T::MaxActions>,
      data: BoundedVec<BoundedVec<u8, T::MaxPayloadLen>, T::MaxActions>,
    ) -> DispatchResult {
      let who = ensure_signed(origin)?;
      let data: Vec<Vec<u8>> = data.into_iter().map(BoundedVec::into_inner).collect();
      Self::do_execute(&who, &actions, &data)
    }

    /// Take a single-asset flash loan and run `data` (an encoded batch) inside it
    #[pallet::call_index(1)]
    #[pallet::weight(
      T::WeightInfo::flash_loan(assets.len() as u32)
        .saturating_add(T::WeightInfo::execute(T::MaxActions::get()))
    )]
    pub fn flash_loan(
      origin: OriginFor<T>,
      assets: BoundedVec<T::AssetId, T::MaxFlashAssets>,
      amounts: BoundedVec<T::Balance, T::MaxFlashAssets>,
      data: BoundedVec<u8, T::MaxPayloadLen>,
    ) -> DispatchResult {
      let who = ensure_signed(origin)?;
      Self::do_flash_loan(&who, &assets, &amounts, &data)
    }

    /// Take a dual-asset flash swap and run `data` (an encoded batch) inside it
    #[pallet::call_index(2)]
    #[pallet::weight(
      T::WeightInfo::flash_swap().saturating_add(T::WeightInfo::execute(T::MaxActions::get()))
    )]
    pub fn flash_swap(
      origin: OriginFor<T>,
      token0: T::AssetId,
      token1: T::AssetId,
      amount0: T::Balance,
      amount1: T::Balance,
      data: BoundedVec<u8, T::MaxPayloadLen>,
    ) -> DispatchResult {
      let who = ensure_signed(origin)?;
      Self::do_flash_swap(&who, token0, token1, amount0, amount1, &data)
    }
  }

  impl<T: Config> Pallet<T> {
    /// Account that holds funds between the actions of a batch
    pub fn account_id() -> T::AccountId {
      T::PalletId::get().into_account_truncating()
    }

    /// Ledger identifier of a market
    pub fn market_id(market: &MarketOf<T>) -> [u8; 32] {
      polkadot_sdk::sp_io::hashing::blake2_256(&market.encode())
    }

    /// Flat per-action cost plus, for every flash action, the loan and its inner batch.
    pub fn batch_weight(actions: &[u8]) -> Weight {
      let flash_actions = actions
        .iter()
        .filter(|tag| {
          matches!(
            ActionTag::try_from(**tag),
            Ok(ActionTag::FlashLoan | ActionTag::FlashSwap)
          )
        })
        .count() as u64;
      let inner = T::WeightInfo::flash_loan(T::MaxFlashAssets::get())
        .max(T::WeightInfo::flash_swap())
        .saturating_add(T::WeightInfo::execute(T::MaxActions::get()));
      T::WeightInfo::execute(actions.len() as u32).saturating_add(inner.saturating_mul(flash_actions))
    }

    /// Decode every payload against its tag. Nothing runs unless the whole batch decodes.
    pub fn decode_batch(actions: &[u8], data: &[Vec<u8>]) -> Result<Vec<ActionOf<T>>, DispatchError> {
      ensure!(
        actions.len() == data.len(),
        Error::<T>::MalformedBatch {
          actions: actions.len().saturated_into(),
          payloads: data.len().saturated_into(),
        }
      );
      actions
        .iter()
        .zip(data)
        .enumerate()
        .map(|(index, (tag, payload))| -> Result<ActionOf<T>, DispatchError> {
          let tag = ActionTag::try_from(*tag).map_err(|tag| Error::<T>::UnsupportedAction { tag })?;
          ActionOf::<T>::decode_payload(tag, payload).map_err(|_| {
            Error::<T>::DecodeError {
              index: index.saturated_into(),
            }
            .into()
          })
        })
        .collect()
    }

    pub(crate) fn do_execute(
      who: &T::AccountId,
      actions: &[u8],
      data: &[Vec<u8>],
    ) -> DispatchResult {
      let decoded = Self::decode_batch(actions, data)?;
      log::debug!(
        target: LOG_TARGET,
        "batch of {} actions for {:?}",
        decoded.len(),
        who
      );
      let count = decoded.len();
      for (index, action) in decoded.into_iter().enumerate() {
        let tag = action.tag();
        log::trace!(target: LOG_TARGET, "action {} {:?}", index, tag);
        Self::dispatch_action(who, action)?;
        Self::deposit_event(Event::ActionExecuted {
          who: who.clone(),
          index: index.saturated_into(),
          tag,
        });
      }
      Self::deposit_event(Event::BatchExecuted {
        who: who.clone(),
        actions: count.saturated_into(),
      });
      log::debug!(target: LOG_TARGET, "batch for {:?} done", who);
      Ok(())
    }

    fn dispatch_action(who: &T::AccountId, action: ActionOf<T>) -> DispatchResult {
      let bulker = Self::account_id();
      match action {
        Action::ApproveTransfer(payload) => Self::approve_transfer(who, &bulker, payload),
        Action::TransferIn(payload) => Self::transfer_in(who, &bulker, payload),
        Action::GrantManagerPermission(payload) => {
          Self::grant_manager_permission(who, &bulker, payload)
        }
        Action::Supply(payload) => {
          let asset = payload.market.loan_asset;
          Self::push_to_ledger(&bulker, asset, payload, T::Ledger::supply)
        }
        Action::SupplyCollateral(payload) => {
          let asset = payload.market.collateral_asset;
          Self::push_to_ledger(&bulker, asset, payload, T::Ledger::supply_collateral)
        }
        Action::Repay(payload) => {
          let asset = payload.market.loan_asset;
          Self::push_to_ledger(&bulker, asset, payload, T::Ledger::repay)
        }
        // Outflows always settle to the caller.
        Action::Borrow(payload) => {
          T::Ledger::borrow(&bulker, &payload.market, payload.amount, who, who)
        }
        Action::Withdraw(payload) => {
          T::Ledger::withdraw(&bulker, &payload.market, payload.amount, who, who)
        }
        Action::WithdrawCollateral(payload) => {
          T::Ledger::withdraw_collateral(&bulker, &payload.market, payload.amount, who, who)
        }
        Action::Skim(payload) => Self::skim(&bulker, payload),
        Action::FlashLoan(payload) => {
          Self::do_flash_loan(who, &payload.assets, &payload.amounts, &payload.data)
        }
        Action::FlashSwap(payload) => Self::do_flash_swap(
          who,
          payload.token0,
          payload.token1,
          payload.amount0,
          payload.amount1,
          &payload.data,
        ),
      }
    }

    fn approve_transfer(
      who: &T::AccountId,
      bulker: &T::AccountId,
      payload: ApproveTransferPayload<T::AssetId, T::Balance, BlockNumberFor<T>>,
    ) -> DispatchResult {
      ensure!(!payload.amount.is_zero(), Error::<T>::AmountIsZero);
      Self::ensure_authorizable(payload.deadline, &payload.signature)?;
      T::Permits::permit(
        payload.asset,
        who,
        bulker,
        payload.amount,
        payload.deadline,
        &payload.signature,
      )
    }

    /// Standard allowance first; the signed allowance covers callers without one.
    fn transfer_in(
      who: &T::AccountId,
      bulker: &T::AccountId,
      payload: TransferInPayload<T::AssetId, T::Balance>,
    ) -> DispatchResult {
      let TransferInPayload { asset, amount } = payload;
      ensure!(!amount.is_zero(), Error::<T>::AmountIsZero);
      if T::Tokens::allowance(asset, who, bulker) >= amount {
        T::Tokens::transfer_from(asset, who, bulker, bulker, amount)
      } else {
        T::Permits::transfer_from(asset, who, bulker, amount)
      }
    }

    fn grant_manager_permission(
      who: &T::AccountId,
      bulker: &T::AccountId,
      payload: ManagerPermissionPayload<BlockNumberFor<T>>,
    ) -> DispatchResult {
      Self::ensure_authorizable(payload.deadline, &payload.signature)?;
      let authorization = ManagerAuthorization {
        authorizer: who.clone(),
        authorized: bulker.clone(),
        is_authorized: payload.is_authorized,
        nonce: payload.nonce,
        deadline: payload.deadline,
      };
      T::Ledger::set_authorization_with_sig(&authorization, &payload.signature)
    }

    /// Clamp to what the pallet account holds, make sure the ledger may pull it, then
    /// hand it over on behalf of the beneficiary.
    fn push_to_ledger(
      bulker: &T::AccountId,
      asset: T::AssetId,
      payload: SupplyPayload<T::AccountId, T::AssetId, T::Balance>,
      ledger_call: LedgerPush<T>,
    ) -> DispatchResult {
      ensure!(payload.on_behalf != *bulker, Error::<T>::AddressIsBulker);
      let amount = payload.amount.min(T::Tokens::balance(asset, bulker));
      ensure!(!amount.is_zero(), Error::<T>::AmountIsZero);
      Self::ensure_ledger_allowance(asset, bulker)?;
      ledger_call(bulker, &payload.market, amount, &payload.on_behalf)
    }

    /// Approve the ledger for the maximum amount of `asset` unless an allowance remains.
    pub(crate) fn ensure_ledger_allowance(asset: T::AssetId, bulker: &T::AccountId) -> DispatchResult {
      let ledger = T::Ledger::account();
      if T::Tokens::allowance(asset, bulker, &ledger).is_zero() {
        T::Tokens::approve(asset, bulker, &ledger, T::Balance::max_value())?;
        log::debug!(target: LOG_TARGET, "ledger allowance raised for {:?}", asset);
        Self::deposit_event(Event::LedgerAllowanceRaised { asset });
      }
      Ok(())
    }

    fn skim(
      bulker: &T::AccountId,
      payload: SkimPayload<T::AccountId, T::AssetId>,
    ) -> DispatchResult {
      let SkimPayload { asset, receiver } = payload;
      ensure!(receiver != *bulker, Error::<T>::AddressIsBulker);
      ensure!(!Self::is_zero_account(&receiver), Error::<T>::AddressIsZero);
      let amount = T::Tokens::balance(asset, bulker);
      if !amount.is_zero() {
        T::Tokens::transfer(asset, bulker, &receiver, amount)?;
        Self::deposit_event(Event::Skimmed { asset, receiver, amount });
      }
      Ok(())
    }

    /// Whether `who` is the account decoded from an all-zero byte stream.
    pub fn is_zero_account(who: &T::AccountId) -> bool {
      T::AccountId::decode(&mut TrailingZeroInput::zeroes())
        .map(|zero| zero == *who)
        .unwrap_or(false)
    }
  }

  /// Genesis configuration: the pallet account gets a provider reference and the native
  /// funds its approval deposits draw on
  #[pallet::genesis_config]
  #[derive(frame::prelude::DefaultNoBound)]
  pub struct GenesisConfig<T: Config> {
    #[serde(skip)]
    pub _marker: core::marker::PhantomData<T>,
  }

  #[pallet::genesis_build]
  impl<T: Config> BuildGenesisConfig for GenesisConfig<T> {
    fn build(&self) {
      let account = Pallet::<T>::account_id();
      frame_system::Pallet::<T>::inc_providers(&account);
      let funds = T::ApprovalFunds::get();
      if !funds.is_zero() {
        if let Err(e) = T::Currency::mint_into(&account, funds) {
          log::error!(target: LOG_TARGET, "failed to fund approval deposits: {:?}", e);
        }
      }
    }
  }
}
