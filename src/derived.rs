//! Olive oil batches: blended from processed olives, certified, packed and sold
use super::action::Transition;
use super::config::ChainConfig;
use super::error::{LedgerError, Result};
use super::funds::{Balances, Settlement};
use super::guard::{AccessGuard, Custody};
use super::raw::{RawLookup, RawState};
use super::roles::RoleRegistry;
use super::types::{AccountId, Amount, LedgerKind, ProductCode};
use std::collections::{BTreeMap, BTreeSet};

#[derive(minicbor::Encode, minicbor::Decode, Debug, Clone, Copy, Eq, Ord, PartialEq, PartialOrd)]
pub enum DerivedState {
    #[n(0)]
    Created,
    #[n(1)]
    Blended,
    #[n(2)]
    Produced,
    #[n(3)]
    Certified,
    #[n(4)]
    Packed,
    #[n(5)]
    ForSale,
    #[n(6)]
    Sold,
}

#[derive(minicbor::Encode, minicbor::Decode, Debug, Clone, Eq, PartialEq)]
pub struct DerivedItem {
    #[n(0)]
    pub code: ProductCode,
    #[n(1)]
    pub owner: AccountId,
    #[n(2)]
    pub product_id: u64,
    #[n(3)]
    pub consumed_raw_codes: Vec<ProductCode>, // olive lots, in blend order
    #[n(4)]
    pub product_notes: String,
    #[n(5)]
    pub product_price: Amount,
    #[n(6)]
    pub certify_notes: String,
    #[n(7)]
    pub state: DerivedState,
}

impl Custody for DerivedItem {
    type State = DerivedState;
    const LEDGER: LedgerKind = LedgerKind::Derived;

    fn owner(&self) -> &AccountId {
        &self.owner
    }
    fn state(&self) -> DerivedState {
        self.state
    }
}

/// Same commit discipline as the olive ledger: transitions return the next
/// record and leave the ledger untouched.
#[derive(Debug, Clone, Default)]
pub struct DerivedItemLedger {
    items: BTreeMap<ProductCode, DerivedItem>,
    config: ChainConfig,
}

impl DerivedItemLedger {
    pub fn new(config: ChainConfig) -> Self {
        Self {
            items: BTreeMap::new(),
            config,
        }
    }

    pub fn get(&self, code: ProductCode) -> Option<&DerivedItem> {
        self.items.get(&code)
    }

    pub fn fetch(&self, code: ProductCode) -> Result<DerivedItem> {
        self.get(code)
            .cloned()
            .ok_or(LedgerError::NotFound(LedgerKind::Derived, code))
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

    pub fn create<R: RoleRegistry + ?Sized>(
        &self,
        guard: &AccessGuard<'_, R>,
        caller: &AccountId,
        code: ProductCode,
        product_id: u64,
    ) -> Result<DerivedItem> {
        guard.admit(Transition::Create, caller)?;

        if self.items.contains_key(&code) {
            return Err(LedgerError::AlreadyExists(LedgerKind::Derived, code));
        }

        Ok(DerivedItem {
            code,
            owner: caller.clone(),
            product_id,
            consumed_raw_codes: vec![],
            product_notes: String::new(),
            product_price: 0,
            certify_notes: String::new(),
            state: DerivedState::Created,
        })
    }

    /// Consume one or more processed olive lots. Every referenced lot must
    /// exist in `olives` and have reached [`RawState::Processed`].
    pub fn blend<R: RoleRegistry + ?Sized, L: RawLookup + ?Sized>(
        &self,
        guard: &AccessGuard<'_, R>,
        olives: &L,
        caller: &AccountId,
        code: ProductCode,
        raw_codes: Vec<ProductCode>,
    ) -> Result<DerivedItem> {
        let item = guard.check(
            Transition::Blend,
            caller,
            code,
            self.get(code),
            DerivedState::Created,
        )?;

        if raw_codes.is_empty() {
            return Err(LedgerError::InvalidPayload(
                "a blend needs at least one olive lot".into(),
            ));
        }
        if raw_codes.len() > self.config.max_blend_inputs {
            return Err(LedgerError::InvalidPayload(format!(
                "a blend takes at most {} olive lots, got {}",
                self.config.max_blend_inputs,
                raw_codes.len()
            )));
        }
        let mut seen = BTreeSet::new();
        if let Some(dup) = raw_codes.iter().find(|c| !seen.insert(**c)) {
            return Err(LedgerError::InvalidPayload(format!(
                "olive lot {dup} listed twice"
            )));
        }

        for raw_code in &raw_codes {
            let lot = olives
                .find_raw(*raw_code)
                .ok_or(LedgerError::NotFound(LedgerKind::Raw, *raw_code))?;
            if lot.state != RawState::Processed {
                return Err(LedgerError::WrongState {
                    ledger: LedgerKind::Raw,
                    code: *raw_code,
                    expected: RawState::Processed.into(),
                    actual: lot.state.into(),
                });
            }
        }

        let mut consumed_raw_codes = item.consumed_raw_codes.clone();
        consumed_raw_codes.extend(raw_codes);

        Ok(DerivedItem {
            consumed_raw_codes,
            state: DerivedState::Blended,
            ..item.clone()
        })
    }

    pub fn produce<R: RoleRegistry + ?Sized>(
        &self,
        guard: &AccessGuard<'_, R>,
        caller: &AccountId,
        code: ProductCode,
        notes: String,
        price: i64,
    ) -> Result<DerivedItem> {
        let item = guard.check(
            Transition::Produce,
            caller,
            code,
            self.get(code),
            DerivedState::Blended,
        )?;
        self.config.check_text("product notes", &notes)?;
        let price = Amount::try_from(price)
            .map_err(|_| LedgerError::InvalidPayload(format!("negative price {price}")))?;

        Ok(DerivedItem {
            product_notes: notes,
            product_price: price,
            state: DerivedState::Produced,
            ..item.clone()
        })
    }

    pub fn certify<R: RoleRegistry + ?Sized>(
        &self,
        guard: &AccessGuard<'_, R>,
        caller: &AccountId,
        code: ProductCode,
        notes: String,
    ) -> Result<DerivedItem> {
        let item = guard.check(
            Transition::Certify,
            caller,
            code,
            self.get(code),
            DerivedState::Produced,
        )?;
        self.config.check_text("certify notes", &notes)?;

        Ok(DerivedItem {
            certify_notes: notes,
            state: DerivedState::Certified,
            ..item.clone()
        })
    }

    pub fn pack<R: RoleRegistry + ?Sized>(
        &self,
        guard: &AccessGuard<'_, R>,
        caller: &AccountId,
        code: ProductCode,
    ) -> Result<DerivedItem> {
        let item = guard.check(
            Transition::Pack,
            caller,
            code,
            self.get(code),
            DerivedState::Certified,
        )?;

        Ok(DerivedItem {
            state: DerivedState::Packed,
            ..item.clone()
        })
    }

    /// List a packed batch. Custody stays with the producer until it is bought.
    pub fn sell<R: RoleRegistry + ?Sized>(
        &self,
        guard: &AccessGuard<'_, R>,
        caller: &AccountId,
        code: ProductCode,
    ) -> Result<DerivedItem> {
        let item = guard.check(
            Transition::Sell,
            caller,
            code,
            self.get(code),
            DerivedState::Packed,
        )?;

        Ok(DerivedItem {
            state: DerivedState::ForSale,
            ..item.clone()
        })
    }

    /// The only transition that moves custody. Returns the sold record and
    /// the settlement to apply to `balances` alongside it.
    pub fn buy<R: RoleRegistry + ?Sized>(
        &self,
        guard: &AccessGuard<'_, R>,
        balances: &Balances,
        caller: &AccountId,
        code: ProductCode,
        payment: Amount,
    ) -> Result<(DerivedItem, Settlement)> {
        let item = guard.check(
            Transition::Buy,
            caller,
            code,
            self.get(code),
            DerivedState::ForSale,
        )?;

        let settlement =
            balances.plan_purchase(caller, &item.owner, item.product_price, payment)?;

        let sold = DerivedItem {
            owner: caller.clone(),
            state: DerivedState::Sold,
            ..item.clone()
        };

        Ok((sold, settlement))
    }

    pub fn commit(&mut self, item: DerivedItem) {
        self.items.insert(item.code, item);
    }
}
