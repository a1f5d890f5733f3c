//! Identities, codes and the CBOR-encodable primitives shared by both ledgers
use super::derived::DerivedState;
use super::raw::RawState;
use super::utils::new_uuid_to_bech32;
use chrono::{DateTime, TimeZone, Utc};
use std::fmt;

/// Unique identifier of one physical lot within a single ledger's key space.
pub type ProductCode = u64;

/// Funds are whole units; there is no fractional currency.
pub type Amount = u64;

/// An external caller identity. Opaque to the core beyond equality.
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct AccountId(String);

impl AccountId {
    pub fn new(id: impl Into<String>) -> Self {
        Self(id.into())
    }
    /// Mint a fresh bech32m encoded uuid7 identity under the given prefix.
    pub fn generate(hrp: &str) -> anyhow::Result<Self> {
        Ok(Self(new_uuid_to_bech32(hrp)?))
    }
    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl From<&str> for AccountId {
    fn from(value: &str) -> Self {
        Self(value.to_string())
    }
}

impl fmt::Display for AccountId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

#[derive(Debug, PartialEq, Eq, PartialOrd, Ord, Clone)]
pub struct TimeStamp<T: TimeZone>(DateTime<T>);

impl TimeStamp<Utc> {
    pub fn new() -> Self {
        Self(Utc::now())
    }
}

impl Default for TimeStamp<Utc> {
    fn default() -> Self {
        Self::new()
    }
}

impl<T: TimeZone> From<DateTime<T>> for TimeStamp<T> {
    fn from(value: DateTime<T>) -> Self {
        TimeStamp(value)
    }
}

/// Which of the two ledgers a code or event belongs to.
#[derive(minicbor::Encode, minicbor::Decode, Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum LedgerKind {
    #[n(0)]
    Raw,
    #[n(1)]
    Derived,
}

impl fmt::Display for LedgerKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            LedgerKind::Raw => f.write_str("olives"),
            LedgerKind::Derived => f.write_str("olive oil"),
        }
    }
}

/// The state of an item in either ledger.
#[derive(minicbor::Encode, minicbor::Decode, Debug, Clone, Copy, PartialEq, Eq)]
pub enum ItemState {
    #[n(0)]
    Raw(#[n(0)] RawState),
    #[n(1)]
    Derived(#[n(0)] DerivedState),
}

impl ItemState {
    pub fn ledger(&self) -> LedgerKind {
        match self {
            ItemState::Raw(_) => LedgerKind::Raw,
            ItemState::Derived(_) => LedgerKind::Derived,
        }
    }
}

impl From<RawState> for ItemState {
    fn from(value: RawState) -> Self {
        ItemState::Raw(value)
    }
}

impl From<DerivedState> for ItemState {
    fn from(value: DerivedState) -> Self {
        ItemState::Derived(value)
    }
}

impl fmt::Display for ItemState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ItemState::Raw(state) => write!(f, "{state:?}"),
            ItemState::Derived(state) => write!(f, "{state:?}"),
        }
    }
}

impl<C> minicbor::Encode<C> for AccountId {
    fn encode<W: minicbor::encode::Write>(
        &self,
        e: &mut minicbor::Encoder<W>,
        _: &mut C,
    ) -> Result<(), minicbor::encode::Error<W::Error>> {
        e.str(&self.0)?.ok()
    }
}

impl<'b, C> minicbor::Decode<'b, C> for AccountId {
    fn decode(d: &mut minicbor::Decoder<'b>, _: &mut C) -> Result<Self, minicbor::decode::Error> {
        Ok(AccountId(d.str()?.to_string()))
    }
}

impl<C> minicbor::Encode<C> for TimeStamp<Utc> {
    fn encode<W: minicbor::encode::Write>(
        &self,
        e: &mut minicbor::Encoder<W>,
        _: &mut C,
    ) -> Result<(), minicbor::encode::Error<W::Error>> {
        if let Some(nsec) = self.0.timestamp_nanos_opt() {
            return e.i64(nsec)?.ok();
        }

        Err(minicbor::encode::Error::message(
            "failed to encode timestamp. timestamp_nanos_opt returned None",
        ))
    }
}

impl<'b, C> minicbor::Decode<'b, C> for TimeStamp<Utc> {
    fn decode(d: &mut minicbor::Decoder<'b>, _: &mut C) -> Result<Self, minicbor::decode::Error> {
        let nsecs = d.i64()?;

        Ok(TimeStamp(DateTime::from_timestamp_nanos(nsecs)))
    }
}
