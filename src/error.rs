use super::roles::Role;
use super::types::{AccountId, Amount, ItemState, LedgerKind, ProductCode};

/// Every way a transition or administrative call can be refused.
///
/// A returned error always means nothing was mutated and no event was emitted.
#[derive(thiserror::Error, Debug)]
pub enum LedgerError {
    #[error("{caller} is not a member of the {role} role")]
    NotAuthorized { role: Role, caller: AccountId },
    #[error("{ledger} item {code} is {actual}, expected {expected}")]
    WrongState {
        ledger: LedgerKind,
        code: ProductCode,
        expected: ItemState,
        actual: ItemState,
    },
    #[error("{caller} does not hold custody of {ledger} item {code}")]
    NotOwner {
        ledger: LedgerKind,
        code: ProductCode,
        caller: AccountId,
    },
    #[error("{0} item {1} does not exist")]
    NotFound(LedgerKind, ProductCode),
    #[error("{0} item {1} already exists")]
    AlreadyExists(LedgerKind, ProductCode),
    #[error("payment of {payment} does not cover the price of {price}")]
    InsufficientPayment { price: Amount, payment: Amount },
    #[error("{account} holds {available}, cannot pay {required}")]
    InsufficientFunds {
        account: AccountId,
        required: Amount,
        available: Amount,
    },
    #[error("invalid payload: {0}")]
    InvalidPayload(String),
    #[error("storage failure: {0}")]
    Storage(#[from] sled::Error),
    #[error("cbor codec failure: {0}")]
    Codec(String),
}

impl From<minicbor::decode::Error> for LedgerError {
    fn from(value: minicbor::decode::Error) -> Self {
        LedgerError::Codec(value.to_string())
    }
}

pub type Result<T> = std::result::Result<T, LedgerError>;
