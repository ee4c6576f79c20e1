use crate as pallet_bulker;

use crate::{
  FlashLender, FlashLoanReceiver, FlashSwapCallee, FungiblesTokenOps, LendingLedger,
  ManagerAuthorization, PermitOps, Signature, SwapPairs, TransferPermit,
};
use polkadot_sdk::frame_support::traits::fungibles::{Mutate as FungiblesMutate, approvals};
use polkadot_sdk::frame_support::traits::tokens::Preservation;
use polkadot_sdk::frame_support::{
  Blake2_128Concat, PalletId, construct_runtime, derive_impl, parameter_types,
  pallet_prelude::{OptionQuery, ValueQuery},
  storage_alias,
  traits::{ConstU32, ConstU128, Currency},
};
use polkadot_sdk::frame_system;
use polkadot_sdk::sp_core::{Pair as PairT, ecdsa};
use polkadot_sdk::sp_runtime::{
  BuildStorage, DispatchError, DispatchResult, Perbill,
  testing::H256,
  traits::{BlakeTwo256, IdentityLookup},
};
use primitives::ecosystem::params::{
  BPS_DENOMINATOR, FLASH_LOAN_PREMIUM_BPS, MAX_ACTION_PAYLOAD, MAX_BATCH_ACTIONS, MAX_FLASH_ASSETS,
};
use primitives::MarketParams;
use std::cell::{Cell, RefCell};

pub type AccountId = u64;
pub type AssetId = u32;
pub type Balance = u128;
pub type BlockNumber = u64;

pub const ALICE: AccountId = 1;
pub const BOB: AccountId = 2;
pub const CHARLIE: AccountId = 3;
pub const LEDGER: AccountId = 100;
pub const LENDER: AccountId = 200;
pub const ORACLE: AccountId = 300;
pub const IRM: AccountId = 301;

pub const LOAN: AssetId = 1;
pub const COLLATERAL: AssetId = 2;
pub const OTHER: AssetId = 3;

pub const INITIAL_BALANCE: Balance = 1_000_000;
pub const PROVIDER_LIQUIDITY: Balance = 10_000_000;

thread_local! {
  // Providers return without calling back when set
  pub static SKIP_CALLBACK: Cell<bool> = const { Cell::new(false) };
  // Account providers call back as, instead of their own
  pub static CALLBACK_AS: Cell<Option<AccountId>> = const { Cell::new(None) };
  // Data pools hand back instead of what they were given
  pub static SWAP_DATA: RefCell<Option<Vec<u8>>> = const { RefCell::new(None) };
}

pub fn skip_flash_callback(skip: bool) {
  SKIP_CALLBACK.with(|flag| flag.set(skip));
}

pub fn callback_as(who: Option<AccountId>) {
  CALLBACK_AS.with(|caller| caller.set(who));
}

pub fn replace_swap_data(data: Option<Vec<u8>>) {
  SWAP_DATA.with(|slot| *slot.borrow_mut() = data);
}

type Block = frame_system::mocking::MockBlock<Test>;

construct_runtime!(
  pub struct Test {
    System: frame_system,
    Balances: polkadot_sdk::pallet_balances,
    Assets: polkadot_sdk::pallet_assets,
    Bulker: pallet_bulker,
  }
);

#[derive_impl(frame_system::config_preludes::TestDefaultConfig)]
impl frame_system::Config for Test {
  type Block = Block;
  type AccountId = AccountId;
  type Lookup = IdentityLookup<Self::AccountId>;
  type Hash = H256;
  type Hashing = BlakeTwo256;
  type AccountData = polkadot_sdk::pallet_balances::AccountData<Balance>;
}

impl polkadot_sdk::pallet_balances::Config for Test {
  type MaxLocks = ();
  type MaxReserves = ();
  type ReserveIdentifier = [u8; 8];
  type Balance = Balance;
  type DustRemoval = ();
  type RuntimeEvent = RuntimeEvent;
  type ExistentialDeposit = ConstU128<1>;
  type AccountStore = System;
  type WeightInfo = ();
  type FreezeIdentifier = ();
  type MaxFreezes = ();
  type RuntimeHoldReason = ();
  type RuntimeFreezeReason = ();
  type DoneSlashHandler = ();
}

impl polkadot_sdk::pallet_assets::Config for Test {
  type RuntimeEvent = RuntimeEvent;
  type Balance = Balance;
  type AssetId = AssetId;
  type AssetIdParameter = AssetId;
  type Currency = Balances;
  type CreateOrigin = polkadot_sdk::frame_support::traits::AsEnsureOriginWithArg<
    frame_system::EnsureSigned<Self::AccountId>,
  >;
  type ForceOrigin = frame_system::EnsureRoot<Self::AccountId>;
  type AssetDeposit = ConstU128<1>;
  type AssetAccountDeposit = ConstU128<1>;
  type MetadataDepositBase = ConstU128<1>;
  type MetadataDepositPerByte = ConstU128<1>;
  type ApprovalDeposit = ConstU128<1>;
  type StringLimit = ConstU32<50>;
  type Freezer = ();
  type Extra = ();
  type ReserveData = ();
  type CallbackHandle = ();
  type WeightInfo = ();
  type RemoveItemsLimit = ConstU32<5>;
  type Holder = ();
  #[cfg(feature = "runtime-benchmarks")]
  type BenchmarkHelper = AssetBenchmarkHelper;
}

#[cfg(feature = "runtime-benchmarks")]
pub struct AssetBenchmarkHelper;

#[cfg(feature = "runtime-benchmarks")]
impl polkadot_sdk::pallet_assets::BenchmarkHelper<AssetId, ()> for AssetBenchmarkHelper {
  fn create_asset_id_parameter(id: u32) -> AssetId {
    id
  }
  fn create_reserve_id_parameter(_id: u32) -> () {
    ()
  }
}

parameter_types! {
  pub const BulkerPalletId: PalletId = PalletId(*primitives::ecosystem::pallet_ids::BULKER_PALLET_ID);
}

impl pallet_bulker::Config for Test {
  type AssetId = AssetId;
  type Balance = Balance;
  type Tokens = FungiblesTokenOps<Assets>;
  type Permits = MockPermits;
  type Ledger = MockLedger;
  type FlashLender = MockFlashLender;
  type SwapPairs = MockPairs;
  type PalletId = BulkerPalletId;
  type MaxActions = ConstU32<MAX_BATCH_ACTIONS>;
  type MaxPayloadLen = ConstU32<MAX_ACTION_PAYLOAD>;
  type MaxFlashAssets = ConstU32<MAX_FLASH_ASSETS>;
  type Currency = Balances;
  type ApprovalFunds = ConstU128<1_000>;
  type WeightInfo = ();
  #[cfg(feature = "runtime-benchmarks")]
  type BenchmarkHelper = MockBenchmarkHelper;
}

// Collaborator state lives in storage so failed extrinsics roll it back.

#[storage_alias(verbatim)]
pub type LedgerSupply =
  StorageMap<MockLedger, Blake2_128Concat, ([u8; 32], AccountId), Balance, ValueQuery>;

#[storage_alias(verbatim)]
pub type LedgerCollateral =
  StorageMap<MockLedger, Blake2_128Concat, ([u8; 32], AccountId), Balance, ValueQuery>;

#[storage_alias(verbatim)]
pub type LedgerDebt =
  StorageMap<MockLedger, Blake2_128Concat, ([u8; 32], AccountId), Balance, ValueQuery>;

#[storage_alias(verbatim)]
pub type LedgerManagers =
  StorageMap<MockLedger, Blake2_128Concat, (AccountId, AccountId), bool, ValueQuery>;

#[storage_alias(verbatim)]
pub type LedgerNonces = StorageMap<MockLedger, Blake2_128Concat, AccountId, u64, ValueQuery>;

#[storage_alias(verbatim)]
pub type PermitNonces = StorageMap<MockPermits, Blake2_128Concat, AccountId, u64, ValueQuery>;

#[storage_alias(verbatim)]
pub type PermitAllowances =
  StorageMap<MockPermits, Blake2_128Concat, (AssetId, AccountId, AccountId), Balance, ValueQuery>;

#[storage_alias(verbatim)]
pub type Pools = StorageMap<MockPairs, Blake2_128Concat, (AssetId, AssetId), AccountId, OptionQuery>;

#[storage_alias(verbatim)]
pub type PoolTokens =
  StorageMap<MockPairs, Blake2_128Concat, AccountId, (AssetId, AssetId), OptionQuery>;

fn pay(asset: AssetId, from: &AccountId, to: &AccountId, amount: Balance) -> DispatchResult {
  <Assets as FungiblesMutate<AccountId>>::transfer(asset, from, to, amount, Preservation::Expendable)
    .map(|_| ())
}

/// Spend `collector`'s allowance over `owner` to move `amount` to `collector`.
fn collect(asset: AssetId, owner: &AccountId, collector: &AccountId, amount: Balance) -> DispatchResult {
  <Assets as approvals::Mutate<AccountId>>::transfer_from(asset, owner, collector, collector, amount)
}

/// Deterministic secp256k1 key of a test account.
pub fn signer(who: AccountId) -> ecdsa::Pair {
  let mut seed = [0u8; 32];
  seed[24..].copy_from_slice(&who.to_be_bytes());
  seed[0] = 0x42;
  ecdsa::Pair::from_seed(&seed)
}

pub fn sign(who: AccountId, digest: &[u8; 32]) -> Signature {
  let signature = signer(who).sign_prehashed(digest);
  let bytes: &[u8] = signature.as_ref();
  let mut raw = [0u8; 65];
  raw.copy_from_slice(bytes);
  Signature::from_raw(&raw)
}

pub fn signed_by(signature: &Signature, digest: &[u8; 32], who: AccountId) -> bool {
  signature
    .recover_signer(digest)
    .map(ecdsa::Public::from_raw)
    == Some(signer(who).public())
}

pub fn market() -> MarketParams<AssetId, AccountId> {
  MarketParams {
    loan_asset: LOAN,
    collateral_asset: COLLATERAL,
    oracle: ORACLE,
    irm: IRM,
    lltv: Perbill::from_percent(80),
  }
}

/// Single-market-per-key ledger with 1:1 pricing: debt may not exceed `lltv * collateral`.
pub struct MockLedger;

impl MockLedger {
  fn ensure_manager(caller: &AccountId, on_behalf: &AccountId) -> DispatchResult {
    if caller == on_behalf || LedgerManagers::get((*on_behalf, *caller)) {
      Ok(())
    } else {
      Err(DispatchError::Other("unauthorized"))
    }
  }

  fn ensure_healthy(market: &MarketParams<AssetId, AccountId>, key: &([u8; 32], AccountId)) -> DispatchResult {
    if LedgerDebt::get(key) > market.lltv * LedgerCollateral::get(key) {
      return Err(DispatchError::Other("insufficient collateral"));
    }
    Ok(())
  }

  pub fn supplied(who: AccountId) -> Balance {
    LedgerSupply::get((Bulker::market_id(&market()), who))
  }

  pub fn collateral(who: AccountId) -> Balance {
    LedgerCollateral::get((Bulker::market_id(&market()), who))
  }

  pub fn debt(who: AccountId) -> Balance {
    LedgerDebt::get((Bulker::market_id(&market()), who))
  }
}

impl LendingLedger<AccountId, AssetId, Balance, BlockNumber> for MockLedger {
  fn account() -> AccountId {
    LEDGER
  }

  fn supply(
    caller: &AccountId,
    market: &MarketParams<AssetId, AccountId>,
    assets: Balance,
    on_behalf: &AccountId,
  ) -> DispatchResult {
    collect(market.loan_asset, caller, &LEDGER, assets)?;
    LedgerSupply::mutate((Bulker::market_id(market), *on_behalf), |supplied| *supplied += assets);
    Ok(())
  }

  fn supply_collateral(
    caller: &AccountId,
    market: &MarketParams<AssetId, AccountId>,
    assets: Balance,
    on_behalf: &AccountId,
  ) -> DispatchResult {
    collect(market.collateral_asset, caller, &LEDGER, assets)?;
    LedgerCollateral::mutate((Bulker::market_id(market), *on_behalf), |collateral| {
      *collateral += assets
    });
    Ok(())
  }

  fn borrow(
    caller: &AccountId,
    market: &MarketParams<AssetId, AccountId>,
    assets: Balance,
    on_behalf: &AccountId,
    receiver: &AccountId,
  ) -> DispatchResult {
    Self::ensure_manager(caller, on_behalf)?;
    let key = (Bulker::market_id(market), *on_behalf);
    LedgerDebt::mutate(&key, |debt| *debt += assets);
    Self::ensure_healthy(market, &key)?;
    pay(market.loan_asset, &LEDGER, receiver, assets)
  }

  fn repay(
    caller: &AccountId,
    market: &MarketParams<AssetId, AccountId>,
    assets: Balance,
    on_behalf: &AccountId,
  ) -> DispatchResult {
    let key = (Bulker::market_id(market), *on_behalf);
    let debt = LedgerDebt::get(&key)
      .checked_sub(assets)
      .ok_or(DispatchError::Other("repay exceeds debt"))?;
    collect(market.loan_asset, caller, &LEDGER, assets)?;
    LedgerDebt::insert(&key, debt);
    Ok(())
  }

  fn withdraw(
    caller: &AccountId,
    market: &MarketParams<AssetId, AccountId>,
    assets: Balance,
    on_behalf: &AccountId,
    receiver: &AccountId,
  ) -> DispatchResult {
    Self::ensure_manager(caller, on_behalf)?;
    let key = (Bulker::market_id(market), *on_behalf);
    let supplied = LedgerSupply::get(&key)
      .checked_sub(assets)
      .ok_or(DispatchError::Other("withdraw exceeds supply"))?;
    LedgerSupply::insert(&key, supplied);
    pay(market.loan_asset, &LEDGER, receiver, assets)
  }

  fn withdraw_collateral(
    caller: &AccountId,
    market: &MarketParams<AssetId, AccountId>,
    assets: Balance,
    on_behalf: &AccountId,
    receiver: &AccountId,
  ) -> DispatchResult {
    Self::ensure_manager(caller, on_behalf)?;
    let key = (Bulker::market_id(market), *on_behalf);
    let collateral = LedgerCollateral::get(&key)
      .checked_sub(assets)
      .ok_or(DispatchError::Other("withdraw exceeds collateral"))?;
    LedgerCollateral::insert(&key, collateral);
    Self::ensure_healthy(market, &key)?;
    pay(market.collateral_asset, &LEDGER, receiver, assets)
  }

  fn set_authorization_with_sig(
    authorization: &ManagerAuthorization<AccountId, BlockNumber>,
    signature: &Signature,
  ) -> DispatchResult {
    if System::block_number() > authorization.deadline {
      return Err(DispatchError::Other("signature expired"));
    }
    let nonce = LedgerNonces::get(authorization.authorizer);
    if authorization.nonce != nonce {
      return Err(DispatchError::Other("invalid nonce"));
    }
    if !signed_by(signature, &authorization.signing_digest(), authorization.authorizer) {
      return Err(DispatchError::Other("invalid signer"));
    }
    LedgerNonces::insert(authorization.authorizer, nonce + 1);
    LedgerManagers::insert(
      (authorization.authorizer, authorization.authorized),
      authorization.is_authorized,
    );
    Ok(())
  }
}

/// Permit registry: one signed allowance per (asset, owner, spender), nonce per owner.
pub struct MockPermits;

impl MockPermits {
  pub fn permit_digest(
    asset: AssetId,
    owner: AccountId,
    spender: AccountId,
    amount: Balance,
    deadline: BlockNumber,
  ) -> [u8; 32] {
    TransferPermit {
      asset,
      owner,
      spender,
      amount,
      nonce: PermitNonces::get(owner),
      deadline,
    }
    .signing_digest()
  }
}

impl PermitOps<AccountId, AssetId, Balance, BlockNumber> for MockPermits {
  fn permit(
    asset: AssetId,
    owner: &AccountId,
    spender: &AccountId,
    amount: Balance,
    deadline: BlockNumber,
    signature: &Signature,
  ) -> DispatchResult {
    let digest = Self::permit_digest(asset, *owner, *spender, amount, deadline);
    if !signed_by(signature, &digest, *owner) {
      return Err(DispatchError::Other("invalid permit signature"));
    }
    PermitNonces::mutate(owner, |nonce| *nonce += 1);
    PermitAllowances::insert((asset, *owner, *spender), amount);
    Ok(())
  }

  fn transfer_from(
    asset: AssetId,
    owner: &AccountId,
    spender: &AccountId,
    amount: Balance,
  ) -> DispatchResult {
    let key = (asset, *owner, *spender);
    let remaining = PermitAllowances::get(key)
      .checked_sub(amount)
      .ok_or(DispatchError::Other("permit allowance exceeded"))?;
    PermitAllowances::insert(key, remaining);
    pay(asset, owner, spender, amount)
  }
}

/// Aave-style lender charging `FLASH_LOAN_PREMIUM_BPS`.
pub struct MockFlashLender;

impl MockFlashLender {
  pub fn premium(amount: Balance) -> Balance {
    amount * Balance::from(FLASH_LOAN_PREMIUM_BPS) / Balance::from(BPS_DENOMINATOR)
  }
}

impl FlashLender<AccountId, AssetId, Balance> for MockFlashLender {
  fn account() -> AccountId {
    LENDER
  }

  fn flash_loan(
    receiver: &AccountId,
    assets: &[AssetId],
    amounts: &[Balance],
    params: &[u8],
  ) -> DispatchResult {
    if SKIP_CALLBACK.with(Cell::get) {
      return Ok(());
    }
    let premiums: Vec<Balance> = amounts.iter().map(|amount| Self::premium(*amount)).collect();
    for (asset, amount) in assets.iter().zip(amounts) {
      pay(*asset, &LENDER, receiver, *amount)?;
    }
    let caller = CALLBACK_AS.with(Cell::get).unwrap_or(LENDER);
    Bulker::execute_operation(&caller, assets, amounts, &premiums, receiver, params)?;
    for ((asset, amount), premium) in assets.iter().zip(amounts).zip(&premiums) {
      collect(*asset, receiver, &LENDER, amount + premium)?;
    }
    Ok(())
  }
}

/// Uniswap-V2-style pools charging 0.3%: repayment is `amount * 1000 / 997 + 1`.
pub struct MockPairs;

impl MockPairs {
  pub fn repayment(amount: Balance) -> Balance {
    amount * 1_000 / 997 + 1
  }
}

/// Register a pool for two assets and fund it with both.
pub fn create_pair(token_a: AssetId, token_b: AssetId, liquidity: Balance) -> AccountId {
  let (token0, token1) = if token_a < token_b { (token_a, token_b) } else { (token_b, token_a) };
  let pair = 1_000 + AccountId::from(token0) * 10 + AccountId::from(token1);
  Pools::insert((token0, token1), pair);
  PoolTokens::insert(pair, (token0, token1));
  let _ = Balances::deposit_creating(&pair, 1_000);
  assert!(Assets::mint_into(token0, &pair, liquidity).is_ok());
  assert!(Assets::mint_into(token1, &pair, liquidity).is_ok());
  pair
}

impl SwapPairs<AccountId, AssetId, Balance> for MockPairs {
  fn pair_for(token0: AssetId, token1: AssetId) -> Option<AccountId> {
    Pools::get((token0, token1))
  }

  fn swap(
    pair: &AccountId,
    amount0: Balance,
    amount1: Balance,
    to: &AccountId,
    data: &[u8],
  ) -> DispatchResult {
    let (token0, token1) = PoolTokens::get(pair).ok_or(DispatchError::Other("no pool"))?;
    if SKIP_CALLBACK.with(Cell::get) {
      return Ok(());
    }
    let legs = [(token0, amount0), (token1, amount1)];
    for (token, amount) in legs {
      if amount > 0 {
        pay(token, pair, to, amount)?;
      }
    }
    let caller = CALLBACK_AS.with(Cell::get).unwrap_or(*pair);
    let data = SWAP_DATA.with(|slot| slot.borrow().clone()).unwrap_or_else(|| data.to_vec());
    Bulker::flash_swap_call(&caller, to, amount0, amount1, &data)?;
    for (token, amount) in legs {
      if amount > 0 {
        collect(token, to, pair, Self::repayment(amount))?;
      }
    }
    Ok(())
  }
}

#[cfg(feature = "runtime-benchmarks")]
pub struct MockBenchmarkHelper;

#[cfg(feature = "runtime-benchmarks")]
impl pallet_bulker::BenchmarkHelper<AccountId, AssetId, Balance> for MockBenchmarkHelper {
  fn create_asset(seed: u32, holders: &[AccountId], amount: Balance) -> AssetId {
    let asset = 100 + seed;
    let _ = Assets::force_create(RuntimeOrigin::root(), asset, ALICE, true, 1);
    for who in holders.iter().chain([LEDGER, LENDER].iter()) {
      let _ = Balances::deposit_creating(who, 1_000);
      let _ = Assets::mint_into(asset, who, amount);
    }
    asset
  }

  fn create_pair(token0: AssetId, token1: AssetId, amount: Balance) {
    create_pair(token0, token1, amount);
  }
}

pub fn asset_balance(asset: AssetId, who: AccountId) -> Balance {
  Assets::balance(asset, who)
}

pub fn new_test_ext() -> polkadot_sdk::sp_io::TestExternalities {
  let storage = RuntimeGenesisConfig::default().build_storage().unwrap();
  let mut ext: polkadot_sdk::sp_io::TestExternalities = storage.into();

  skip_flash_callback(false);
  callback_as(None);
  replace_swap_data(None);

  ext.execute_with(|| {
    System::set_block_number(1);

    // Native funds cover approval deposits; the pallet account is funded at genesis
    for who in [ALICE, BOB, CHARLIE, LEDGER, LENDER] {
      let _ = Balances::deposit_creating(&who, 1_000);
    }

    for asset in [LOAN, COLLATERAL, OTHER] {
      assert!(Assets::force_create(RuntimeOrigin::root(), asset, ALICE, true, 1).is_ok());
      for who in [ALICE, BOB, CHARLIE] {
        assert!(Assets::mint_into(asset, &who, INITIAL_BALANCE).is_ok());
      }
      assert!(Assets::mint_into(asset, &LEDGER, PROVIDER_LIQUIDITY).is_ok());
      assert!(Assets::mint_into(asset, &LENDER, PROVIDER_LIQUIDITY).is_ok());
    }

    create_pair(LOAN, COLLATERAL, PROVIDER_LIQUIDITY);
  });
  ext
}
