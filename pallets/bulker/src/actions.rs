//! Action wire format
//!
//! A batch travels as two parallel sequences: one tag byte per action and one
//! SCALE-encoded payload per action. Tags map to payload shapes in exactly one place,
//! [`Action::decode_payload`].

use crate::authorization::Signature;
use alloc::vec::Vec;
use codec::{Decode, DecodeAll, DecodeWithMemTracking, Encode, MaxEncodedLen};
use primitives::MarketParams;
use scale_info::TypeInfo;

#[repr(u8)]
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
pub enum ActionTag {
  ApproveTransfer = 0,
  TransferIn = 1,
  GrantManagerPermission = 2,
  Supply = 3,
  SupplyCollateral = 4,
  Borrow = 5,
  Repay = 6,
  Withdraw = 7,
  WithdrawCollateral = 8,
  Skim = 9,
  FlashLoan = 10,
  FlashSwap = 11,
}

impl TryFrom<u8> for ActionTag {
  type Error = u8;

  fn try_from(tag: u8) -> Result<Self, u8> {
    Ok(match tag {
      0 => Self::ApproveTransfer,
      1 => Self::TransferIn,
      2 => Self::GrantManagerPermission,
      3 => Self::Supply,
      4 => Self::SupplyCollateral,
      5 => Self::Borrow,
      6 => Self::Repay,
      7 => Self::Withdraw,
      8 => Self::WithdrawCollateral,
      9 => Self::Skim,
      10 => Self::FlashLoan,
      11 => Self::FlashSwap,
      unknown => return Err(unknown),
    })
  }
}

impl From<ActionTag> for u8 {
  fn from(tag: ActionTag) -> u8 {
    tag as u8
  }
}

/// Signature-authenticated allowance from the caller to the bulker.
#[derive(Clone, Debug, Decode, Encode, Eq, PartialEq, TypeInfo)]
pub struct ApproveTransferPayload<AssetId, Balance, BlockNumber> {
  pub asset: AssetId,
  pub amount: Balance,
  pub deadline: BlockNumber,
  pub signature: Signature,
}

#[derive(Clone, Debug, Decode, Encode, Eq, PartialEq, TypeInfo)]
pub struct TransferInPayload<AssetId, Balance> {
  pub asset: AssetId,
  pub amount: Balance,
}

/// Grants (or revokes) the bulker as manager of the caller's ledger position.
#[derive(Clone, Debug, Decode, Encode, Eq, PartialEq, TypeInfo)]
pub struct ManagerPermissionPayload<BlockNumber> {
  pub is_authorized: bool,
  pub nonce: u64,
  pub deadline: BlockNumber,
  pub signature: Signature,
}

/// Funds flowing from the bulker into the ledger: `Supply`, `SupplyCollateral`, `Repay`.
#[derive(Clone, Debug, Decode, Encode, Eq, PartialEq, TypeInfo)]
pub struct SupplyPayload<AccountId, AssetId, Balance> {
  pub market: MarketParams<AssetId, AccountId>,
  pub amount: Balance,
  pub on_behalf: AccountId,
}

/// Funds flowing out of the ledger: `Borrow`, `Withdraw`, `WithdrawCollateral`.
///
/// `receiver` is part of the wire shape but funds are always paid to the caller.
#[derive(Clone, Debug, Decode, Encode, Eq, PartialEq, TypeInfo)]
pub struct WithdrawPayload<AccountId, AssetId, Balance> {
  pub market: MarketParams<AssetId, AccountId>,
  pub amount: Balance,
  pub receiver: AccountId,
}

#[derive(Clone, Debug, Decode, Encode, Eq, PartialEq, TypeInfo)]
pub struct SkimPayload<AccountId, AssetId> {
  pub asset: AssetId,
  pub receiver: AccountId,
}

/// `data` is an encoded [`Batch`] run inside the lender callback.
#[derive(Clone, Debug, Decode, Encode, Eq, PartialEq, TypeInfo)]
pub struct FlashLoanPayload<AssetId, Balance> {
  pub assets: Vec<AssetId>,
  pub amounts: Vec<Balance>,
  pub data: Vec<u8>,
}

/// `data` is an encoded [`Batch`] run inside the pool callback.
#[derive(Clone, Debug, Decode, Encode, Eq, PartialEq, TypeInfo)]
pub struct FlashSwapPayload<AssetId, Balance> {
  pub token0: AssetId,
  pub token1: AssetId,
  pub amount0: Balance,
  pub amount1: Balance,
  pub data: Vec<u8>,
}

/// A decoded action. Immutable once decoded.
#[derive(Clone, Debug, Eq, PartialEq)]
pub enum Action<AccountId, AssetId, Balance, BlockNumber> {
  ApproveTransfer(ApproveTransferPayload<AssetId, Balance, BlockNumber>),
  TransferIn(TransferInPayload<AssetId, Balance>),
  GrantManagerPermission(ManagerPermissionPayload<BlockNumber>),
  Supply(SupplyPayload<AccountId, AssetId, Balance>),
  SupplyCollateral(SupplyPayload<AccountId, AssetId, Balance>),
  Borrow(WithdrawPayload<AccountId, AssetId, Balance>),
  Repay(SupplyPayload<AccountId, AssetId, Balance>),
  Withdraw(WithdrawPayload<AccountId, AssetId, Balance>),
  WithdrawCollateral(WithdrawPayload<AccountId, AssetId, Balance>),
  Skim(SkimPayload<AccountId, AssetId>),
  FlashLoan(FlashLoanPayload<AssetId, Balance>),
  FlashSwap(FlashSwapPayload<AssetId, Balance>),
}

impl<AccountId, AssetId, Balance, BlockNumber> Action<AccountId, AssetId, Balance, BlockNumber>
where
  AccountId: Decode,
  AssetId: Decode,
  Balance: Decode,
  BlockNumber: Decode,
{
  /// Decode `payload` as the shape `tag` selects. Trailing bytes are rejected.
  pub fn decode_payload(tag: ActionTag, payload: &[u8]) -> Result<Self, codec::Error> {
    let input = &mut &payload[..];
    Ok(match tag {
      ActionTag::ApproveTransfer => Self::ApproveTransfer(DecodeAll::decode_all(input)?),
      ActionTag::TransferIn => Self::TransferIn(DecodeAll::decode_all(input)?),
      ActionTag::GrantManagerPermission => {
        Self::GrantManagerPermission(DecodeAll::decode_all(input)?)
      }
      ActionTag::Supply => Self::Supply(DecodeAll::decode_all(input)?),
      ActionTag::SupplyCollateral => Self::SupplyCollateral(DecodeAll::decode_all(input)?),
      ActionTag::Borrow => Self::Borrow(DecodeAll::decode_all(input)?),
      ActionTag::Repay => Self::Repay(DecodeAll::decode_all(input)?),
      ActionTag::Withdraw => Self::Withdraw(DecodeAll::decode_all(input)?),
      ActionTag::WithdrawCollateral => Self::WithdrawCollateral(DecodeAll::decode_all(input)?),
      ActionTag::Skim => Self::Skim(DecodeAll::decode_all(input)?),
      ActionTag::FlashLoan => Self::FlashLoan(DecodeAll::decode_all(input)?),
      ActionTag::FlashSwap => Self::FlashSwap(DecodeAll::decode_all(input)?),
    })
  }
}

impl<AccountId, AssetId, Balance, BlockNumber> Action<AccountId, AssetId, Balance, BlockNumber> {
  pub fn tag(&self) -> ActionTag {
    match self {
      Self::ApproveTransfer(_) => ActionTag::ApproveTransfer,
      Self::TransferIn(_) => ActionTag::TransferIn,
      Self::GrantManagerPermission(_) => ActionTag::GrantManagerPermission,
      Self::Supply(_) => ActionTag::Supply,
      Self::SupplyCollateral(_) => ActionTag::SupplyCollateral,
      Self::Borrow(_) => ActionTag::Borrow,
      Self::Repay(_) => ActionTag::Repay,
      Self::Withdraw(_) => ActionTag::Withdraw,
      Self::WithdrawCollateral(_) => ActionTag::WithdrawCollateral,
      Self::Skim(_) => ActionTag::Skim,
      Self::FlashLoan(_) => ActionTag::FlashLoan,
      Self::FlashSwap(_) => ActionTag::FlashSwap,
    }
  }
}

impl<AccountId, AssetId, Balance, BlockNumber> Action<AccountId, AssetId, Balance, BlockNumber>
where
  AccountId: Encode,
  AssetId: Encode,
  Balance: Encode,
  BlockNumber: Encode,
{
  pub fn encode_payload(&self) -> Vec<u8> {
    match self {
      Self::ApproveTransfer(p) => p.encode(),
      Self::TransferIn(p) => p.encode(),
      Self::GrantManagerPermission(p) => p.encode(),
      Self::Supply(p) | Self::SupplyCollateral(p) | Self::Repay(p) => p.encode(),
      Self::Borrow(p) | Self::Withdraw(p) | Self::WithdrawCollateral(p) => p.encode(),
      Self::Skim(p) => p.encode(),
      Self::FlashLoan(p) => p.encode(),
      Self::FlashSwap(p) => p.encode(),
    }
  }
}

/// Tag and payload sequences of one batch; the encoded form of a flash inner batch.
#[derive(Clone, Debug, Decode, Default, Encode, Eq, PartialEq, TypeInfo)]
pub struct Batch {
  pub actions: Vec<u8>,
  pub data: Vec<Vec<u8>>,
}

impl Batch {
  pub fn from_actions<AccountId, AssetId, Balance, BlockNumber>(
    actions: &[Action<AccountId, AssetId, Balance, BlockNumber>],
  ) -> Self
  where
    AccountId: Encode,
    AssetId: Encode,
    Balance: Encode,
    BlockNumber: Encode,
  {
    Self {
      actions: actions.iter().map(|action| action.tag().into()).collect(),
      data: actions.iter().map(Action::encode_payload).collect(),
    }
  }

  pub fn len(&self) -> usize {
    self.actions.len()
  }

  pub fn is_empty(&self) -> bool {
    self.actions.is_empty()
  }
}
