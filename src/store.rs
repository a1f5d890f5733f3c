//! sled-backed persistence for ledgers, grants, balances and events
use super::derived::DerivedItem;
use super::error::{LedgerError, Result};
use super::events::TransitionEvent;
use super::raw::RawItem;
use super::roles::Role;
use super::types::{AccountId, Amount};
use sled::Batch;
use std::sync::Arc;
use tracing::debug;

const RAW_PREFIX: &str = "raw/";
const DERIVED_PREFIX: &str = "oil/";
const ROLE_PREFIX: &str = "role/";
const BALANCE_PREFIX: &str = "balance/";
const EVENT_PREFIX: &str = "event/";
const EVENT_ID_PREFIX: &str = "event_id/";
const NEXT_SEQUENCE_KEY: &str = "meta/next_sequence";

#[derive(Debug, Clone, PartialEq, Eq, minicbor::Encode, minicbor::Decode)]
pub struct Grant {
    #[n(0)]
    pub role: Role,
    #[n(1)]
    pub account: AccountId,
}

impl Grant {
    fn key(&self) -> String {
        format!("{ROLE_PREFIX}{}/{}", self.role, self.account)
    }
}

#[derive(Debug, Clone, PartialEq, Eq, minicbor::Encode, minicbor::Decode)]
struct BalanceEntry {
    #[n(0)]
    account: AccountId,
    #[n(1)]
    amount: Amount,
}

/// An event in the form it is written: its id (the sha256 of `cbor`), its
/// sequence number and the CBOR itself.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct EncodedEvent {
    pub id: String,
    pub sequence: u64,
    pub cbor: Vec<u8>,
}

impl EncodedEvent {
    pub fn encode(event: &TransitionEvent) -> Result<Self> {
        let (id, cbor) = event.build()?;
        Ok(Self {
            id,
            sequence: event.sequence,
            cbor,
        })
    }
}

/// Everything one transition (or grant, or deposit) writes. Applied as a
/// single sled batch.
#[derive(Debug, Default)]
pub struct Commit {
    pub raw: Option<RawItem>,
    pub derived: Option<DerivedItem>,
    pub grant: Option<Grant>,
    pub balances: Vec<(AccountId, Amount)>,
    pub event: Option<EncodedEvent>,
    pub next_sequence: Option<u64>, // set by every transition, recorded or not
}

/// State recovered from an existing database.
#[derive(Debug, Default)]
pub struct Snapshot {
    pub raw: Vec<RawItem>,
    pub derived: Vec<DerivedItem>,
    pub grants: Vec<Grant>,
    pub balances: Vec<(AccountId, Amount)>,
    pub next_sequence: u64,
}

/// Where the service writes its commits. [`LedgerStore`] is the sled
/// implementation.
pub trait CommitStore: Send + Sync {
    /// Write every part of `commit` or none of it.
    fn apply(&self, commit: &Commit) -> Result<()>;

    /// Undo a grant written by [`CommitStore::apply`].
    fn forget_grant(&self, grant: &Grant) -> Result<()>;

    fn load(&self) -> Result<Snapshot>;

    /// Every persisted event, oldest first.
    fn events(&self) -> Result<Vec<TransitionEvent>>;

    /// A persisted event looked up by its id.
    fn event_by_id(&self, id: &str) -> Result<Option<TransitionEvent>>;
}

pub struct LedgerStore {
    instance: Arc<sled::Db>,
}

impl LedgerStore {
    pub fn new(instance: Arc<sled::Db>) -> Self {
        Self { instance }
    }

    fn next_sequence(&self) -> Result<u64> {
        match self.instance.get(NEXT_SEQUENCE_KEY.as_bytes())? {
            Some(value) => Ok(minicbor::decode(&value)?),
            None => Ok(0),
        }
    }

    fn scan<T>(&self, prefix: &str) -> Result<Vec<T>>
    where
        T: for<'b> minicbor::Decode<'b, ()>,
    {
        let mut out = vec![];
        for entry in self.instance.scan_prefix(prefix.as_bytes()) {
            let (_, value) = entry?;
            out.push(minicbor::decode(&value)?);
        }
        Ok(out)
    }
}

impl CommitStore for LedgerStore {
    fn apply(&self, commit: &Commit) -> Result<()> {
        let mut batch = Batch::default();

        if let Some(item) = &commit.raw {
            let key = format!("{RAW_PREFIX}{:020}", item.code);
            batch.insert(key.as_bytes(), minicbor::to_vec(item).map_err(codec)?);
        }
        if let Some(item) = &commit.derived {
            let key = format!("{DERIVED_PREFIX}{:020}", item.code);
            batch.insert(key.as_bytes(), minicbor::to_vec(item).map_err(codec)?);
        }
        if let Some(grant) = &commit.grant {
            batch.insert(grant.key().as_bytes(), minicbor::to_vec(grant).map_err(codec)?);
        }
        for (account, amount) in &commit.balances {
            let key = format!("{BALANCE_PREFIX}{account}");
            let entry = BalanceEntry {
                account: account.clone(),
                amount: *amount,
            };
            batch.insert(key.as_bytes(), minicbor::to_vec(&entry).map_err(codec)?);
        }
        if let Some(event) = &commit.event {
            let key = format!("{EVENT_PREFIX}{:020}", event.sequence);
            batch.insert(key.as_bytes(), event.cbor.clone());
            let index = format!("{EVENT_ID_PREFIX}{}", event.id);
            batch.insert(
                index.as_bytes(),
                minicbor::to_vec(event.sequence).map_err(codec)?,
            );
        }
        if let Some(next) = commit.next_sequence {
            batch.insert(
                NEXT_SEQUENCE_KEY.as_bytes(),
                minicbor::to_vec(next).map_err(codec)?,
            );
        }

        self.instance.apply_batch(batch)?;
        debug!(
            raw = commit.raw.as_ref().map(|item| item.code),
            derived = commit.derived.as_ref().map(|item| item.code),
            balances = commit.balances.len(),
            event = commit.event.as_ref().map(|event| event.id.as_str()),
            "committed batch"
        );

        Ok(())
    }

    fn forget_grant(&self, grant: &Grant) -> Result<()> {
        self.instance.remove(grant.key().as_bytes())?;
        debug!(role = %grant.role, account = %grant.account, "grant withdrawn");
        Ok(())
    }

    fn load(&self) -> Result<Snapshot> {
        let snapshot = Snapshot {
            raw: self.scan(RAW_PREFIX)?,
            derived: self.scan(DERIVED_PREFIX)?,
            grants: self.scan(ROLE_PREFIX)?,
            balances: self
                .scan::<BalanceEntry>(BALANCE_PREFIX)?
                .into_iter()
                .map(|entry| (entry.account, entry.amount))
                .collect(),
            next_sequence: self.next_sequence()?,
        };
        debug!(
            raw = snapshot.raw.len(),
            derived = snapshot.derived.len(),
            grants = snapshot.grants.len(),
            next_sequence = snapshot.next_sequence,
            "loaded snapshot"
        );

        Ok(snapshot)
    }

    fn events(&self) -> Result<Vec<TransitionEvent>> {
        let mut events: Vec<TransitionEvent> = self.scan(EVENT_PREFIX)?;
        events.sort_by_key(|event| event.sequence);
        Ok(events)
    }

    fn event_by_id(&self, id: &str) -> Result<Option<TransitionEvent>> {
        let index = format!("{EVENT_ID_PREFIX}{id}");
        let Some(value) = self.instance.get(index.as_bytes())? else {
            return Ok(None);
        };
        let sequence: u64 = minicbor::decode(&value)?;
        let key = format!("{EVENT_PREFIX}{sequence:020}");
        match self.instance.get(key.as_bytes())? {
            Some(value) => Ok(Some(minicbor::decode(&value)?)),
            None => Ok(None),
        }
    }
}

fn codec<E: std::fmt::Display>(err: E) -> LedgerError {
    LedgerError::Codec(err.to_string())
}
