//! Olive lots: planted, harvested, audited and processed
use super::action::Transition;
use super::config::ChainConfig;
use super::error::{LedgerError, Result};
use super::guard::{AccessGuard, Custody};
use super::roles::RoleRegistry;
use super::types::{AccountId, LedgerKind, ProductCode};
use std::collections::BTreeMap;

#[derive(minicbor::Encode, minicbor::Decode, Debug, Clone, Copy, Eq, Ord, PartialEq, PartialOrd)]
pub enum RawState {
    #[n(0)]
    Planted,
    #[n(1)]
    Harvested,
    #[n(2)]
    Audited,
    #[n(3)]
    Processed,
}

/// Where a lot was grown. Recorded once at planting.
#[derive(minicbor::Encode, minicbor::Decode, Debug, Clone, Default, Eq, PartialEq)]
pub struct FarmProvenance {
    #[n(0)]
    pub name: String,
    #[n(1)]
    pub information: String,
    #[n(2)]
    pub latitude: String,
    #[n(3)]
    pub longitude: String,
}

#[derive(minicbor::Encode, minicbor::Decode, Debug, Clone, Eq, PartialEq)]
pub struct RawItem {
    #[n(0)]
    pub code: ProductCode,
    #[n(1)]
    pub owner: AccountId,
    #[n(2)]
    pub origin_farmer: AccountId,
    #[n(3)]
    pub origin: FarmProvenance,
    #[n(4)]
    pub harvest_notes: String, // empty until harvested
    #[n(5)]
    pub audit_notes: String, // empty until audited
    #[n(6)]
    pub state: RawState,
}

impl Custody for RawItem {
    type State = RawState;
    const LEDGER: LedgerKind = LedgerKind::Raw;

    fn owner(&self) -> &AccountId {
        &self.owner
    }
    fn state(&self) -> RawState {
        self.state
    }
}

/// Read-only view of the olive ledger handed to anything that must inspect
/// lots without owning them.
pub trait RawLookup {
    fn find_raw(&self, code: ProductCode) -> Option<&RawItem>;
}

/// Transitions compute the next version of a record without touching the
/// ledger; the caller stores it with [`RawItemLedger::commit`] once every
/// other effect of the transition has succeeded.
#[derive(Debug, Clone, Default)]
pub struct RawItemLedger {
    items: BTreeMap<ProductCode, RawItem>,
    config: ChainConfig,
}

impl RawItemLedger {
    pub fn new(config: ChainConfig) -> Self {
        Self {
            items: BTreeMap::new(),
            config,
        }
    }

    pub fn get(&self, code: ProductCode) -> Option<&RawItem> {
        self.items.get(&code)
    }

    pub fn fetch(&self, code: ProductCode) -> Result<RawItem> {
        self.get(code)
            .cloned()
            .ok_or(LedgerError::NotFound(LedgerKind::Raw, code))
    }

    pub fn codes(&self) -> Vec<ProductCode> {
        self.items.keys().copied().collect()
    }

    pub fn len(&self) -> usize {
        self.items.len()
    }

    pub fn is_empty(&self) -> bool {
        self.items.is_empty()
    }

    pub fn plant<R: RoleRegistry + ?Sized>(
        &self,
        guard: &AccessGuard<'_, R>,
        caller: &AccountId,
        code: ProductCode,
        origin: FarmProvenance,
    ) -> Result<RawItem> {
        guard.admit(Transition::Plant, caller)?;

        if self.items.contains_key(&code) {
            return Err(LedgerError::AlreadyExists(LedgerKind::Raw, code));
        }

        self.config.check_text("farm name", &origin.name)?;
        self.config.check_text("farm information", &origin.information)?;
        self.config.check_text("farm latitude", &origin.latitude)?;
        self.config.check_text("farm longitude", &origin.longitude)?;

        Ok(RawItem {
            code,
            owner: caller.clone(),
            origin_farmer: caller.clone(),
            origin,
            harvest_notes: String::new(),
            audit_notes: String::new(),
            state: RawState::Planted,
        })
    }

    pub fn harvest<R: RoleRegistry + ?Sized>(
        &self,
        guard: &AccessGuard<'_, R>,
        caller: &AccountId,
        code: ProductCode,
        notes: String,
    ) -> Result<RawItem> {
        let item = guard.check(
            Transition::Harvest,
            caller,
            code,
            self.get(code),
            RawState::Planted,
        )?;
        self.config.check_text("harvest notes", &notes)?;

        Ok(RawItem {
            harvest_notes: notes,
            state: RawState::Harvested,
            ..item.clone()
        })
    }

    pub fn audit<R: RoleRegistry + ?Sized>(
        &self,
        guard: &AccessGuard<'_, R>,
        caller: &AccountId,
        code: ProductCode,
        notes: String,
    ) -> Result<RawItem> {
        let item = guard.check(
            Transition::Audit,
            caller,
            code,
            self.get(code),
            RawState::Harvested,
        )?;
        self.config.check_text("audit notes", &notes)?;

        Ok(RawItem {
            audit_notes: notes,
            state: RawState::Audited,
            ..item.clone()
        })
    }

    pub fn process<R: RoleRegistry + ?Sized>(
        &self,
        guard: &AccessGuard<'_, R>,
        caller: &AccountId,
        code: ProductCode,
    ) -> Result<RawItem> {
        let item = guard.check(
            Transition::Process,
            caller,
            code,
            self.get(code),
            RawState::Audited,
        )?;

        Ok(RawItem {
            state: RawState::Processed,
            ..item.clone()
        })
    }

    /// Store a record produced by one of the transitions above.
    pub fn commit(&mut self, item: RawItem) {
        self.items.insert(item.code, item);
    }
}

impl RawLookup for RawItemLedger {
    fn find_raw(&self, code: ProductCode) -> Option<&RawItem> {
        self.get(code)
    }
}
