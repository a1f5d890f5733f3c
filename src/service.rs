//! Service layer API: the single entry point through which callers advance items
use super::action::Action;
use super::config::ChainConfig;
use super::derived::{DerivedItem, DerivedItemLedger};
use super::error::{LedgerError, Result};
use super::events::{EventSink, TransitionEvent};
use super::funds::{Balances, Settlement};
use super::guard::AccessGuard;
use super::raw::{RawItem, RawItemLedger};
use super::roles::{Role, RoleBook, RoleRegistry};
use super::store::{Commit, CommitStore, EncodedEvent, Grant};
use super::types::{AccountId, Amount, ItemState, ProductCode};
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};
use tracing::{debug, info, instrument, warn};

/// Outcome of a committed transition.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Receipt {
    pub event: TransitionEvent,
    pub event_id: String, // sha256 of the event's CBOR
    pub settlement: Option<Settlement>, // only set by a purchase
}

impl Receipt {
    /// Funds handed back to the buyer. Zero for every other transition.
    pub fn change(&self) -> Amount {
        self.settlement.as_ref().map_or(0, |s| s.change)
    }
}

struct ChainState<R> {
    roles: R,
    olives: RawItemLedger,
    oil: DerivedItemLedger,
    balances: Balances,
    next_sequence: u64,
}

/// Owns both ledgers, the role registry and the balance book behind one lock,
/// so every call is applied in full before the next one is looked at.
pub struct SupplyChainService<R: RoleRegistry = RoleBook> {
    config: ChainConfig,
    state: Mutex<ChainState<R>>,
    store: Option<Box<dyn CommitStore>>,
    sinks: Vec<Arc<dyn EventSink>>,
}

impl<R: RoleRegistry> SupplyChainService<R> {
    /// In-memory service with empty ledgers.
    pub fn new(config: ChainConfig, roles: R) -> Self {
        Self {
            state: Mutex::new(ChainState {
                roles,
                olives: RawItemLedger::new(config.clone()),
                oil: DerivedItemLedger::new(config.clone()),
                balances: Balances::new(),
                next_sequence: 0,
            }),
            config,
            store: None,
            sinks: vec![],
        }
    }

    /// Service that writes through to `store`, starting from whatever the
    /// store already holds.
    pub fn open(config: ChainConfig, roles: R, store: impl CommitStore + 'static) -> Result<Self> {
        let snapshot = store.load()?;
        let mut service = Self::new(config, roles);

        {
            let state = service.state.get_mut().unwrap_or_else(PoisonError::into_inner);
            let admin = state.roles.administrator().clone();
            for grant in snapshot.grants {
                state.roles.grant(&admin, grant.role, grant.account)?;
            }
            for item in snapshot.raw {
                state.olives.commit(item);
            }
            for item in snapshot.derived {
                state.oil.commit(item);
            }
            for (account, amount) in snapshot.balances {
                state.balances.set_balance(account, amount);
            }
            state.next_sequence = snapshot.next_sequence;
            info!(
                olives = state.olives.len(),
                oil = state.oil.len(),
                next_sequence = state.next_sequence,
                "restored supply chain from store"
            );
        }

        service.store = Some(Box::new(store));
        Ok(service)
    }

    /// Register an observer for committed transitions.
    pub fn subscribe(&mut self, sink: Arc<dyn EventSink>) {
        self.sinks.push(sink);
    }

    fn lock(&self) -> MutexGuard<'_, ChainState<R>> {
        // commits happen after every fallible step, so a poisoned state is still whole
        self.state.lock().unwrap_or_else(PoisonError::into_inner)
    }

    /// Add `identity` to `role`. Only the registry's administrator may call
    /// this; granting an existing membership is a no-op returning `false`.
    /// A grant the registry refuses is withdrawn from the store again.
    pub fn grant(&self, caller: &AccountId, role: Role, identity: AccountId) -> Result<bool> {
        let mut state = self.lock();

        if caller != state.roles.administrator() {
            warn!(%caller, %role, "grant refused");
            return Err(LedgerError::NotAuthorized {
                role,
                caller: caller.clone(),
            });
        }
        if state.roles.is_member(role, &identity) {
            debug!(%identity, %role, "already a member");
            return Ok(false);
        }

        let grant = Grant {
            role,
            account: identity.clone(),
        };
        if let Some(store) = &self.store {
            store.apply(&Commit {
                grant: Some(grant.clone()),
                ..Default::default()
            })?;
        }

        match state.roles.grant(caller, role, identity) {
            Ok(added) => {
                info!(identity = %grant.account, %role, "role granted");
                Ok(added)
            }
            Err(err) => {
                if let Some(store) = &self.store {
                    store.forget_grant(&grant)?;
                }
                warn!(identity = %grant.account, %role, error = %err, "registry refused grant");
                Err(err)
            }
        }
    }

    pub fn is_member(&self, role: Role, identity: &AccountId) -> bool {
        self.lock().roles.is_member(role, identity)
    }

    /// Credit external funds to an account. Returns the new balance.
    pub fn fund_account(&self, account: &AccountId, amount: Amount) -> Result<Amount> {
        let mut state = self.lock();
        let balance = state.balances.credited(account, amount)?;

        if let Some(store) = &self.store {
            store.apply(&Commit {
                balances: vec![(account.clone(), balance)],
                ..Default::default()
            })?;
        }
        state.balances.set_balance(account.clone(), balance);
        info!(%account, amount, balance, "account funded");

        Ok(balance)
    }

    pub fn balance_of(&self, account: &AccountId) -> Amount {
        self.lock().balances.balance_of(account)
    }

    pub fn fetch_raw(&self, code: ProductCode) -> Result<RawItem> {
        self.lock().olives.fetch(code)
    }

    pub fn fetch_derived(&self, code: ProductCode) -> Result<DerivedItem> {
        self.lock().oil.fetch(code)
    }

    pub fn raw_codes(&self) -> Vec<ProductCode> {
        self.lock().olives.codes()
    }

    pub fn derived_codes(&self) -> Vec<ProductCode> {
        self.lock().oil.codes()
    }

    /// Events persisted by the store, oldest first. Empty without a store.
    pub fn stored_events(&self) -> Result<Vec<TransitionEvent>> {
        match &self.store {
            Some(store) => store.events(),
            None => Ok(vec![]),
        }
    }

    /// A persisted event by the id handed out in its [`Receipt`].
    pub fn stored_event(&self, event_id: &str) -> Result<Option<TransitionEvent>> {
        match &self.store {
            Some(store) => store.event_by_id(event_id),
            None => Ok(None),
        }
    }

    /// Apply `action` to the item `code` on behalf of `caller`.
    ///
    /// On success the record is updated, the change is persisted (when a store
    /// is attached) and every subscribed sink is notified exactly once. On
    /// failure nothing changes and no sink is called.
    #[instrument(skip(self, action), fields(transition = %action.transition()))]
    pub fn invoke(&self, caller: &AccountId, code: ProductCode, action: Action) -> Result<Receipt> {
        let mut state = self.lock();

        match self.apply(&mut state, caller, code, action) {
            Ok(receipt) => {
                info!(
                    ledger = %receipt.event.ledger,
                    code,
                    new_state = %receipt.event.new_state,
                    "transition committed"
                );
                Ok(receipt)
            }
            Err(err) => {
                warn!(code, error = %err, "transition rejected");
                Err(err)
            }
        }
    }

    fn apply(
        &self,
        state: &mut ChainState<R>,
        caller: &AccountId,
        code: ProductCode,
        action: Action,
    ) -> Result<Receipt> {
        let transition = action.transition();
        let guard = AccessGuard::new(&state.roles);
        let mut commit = Commit::default();
        let mut settlement = None;

        let new_state: ItemState = match action {
            Action::Plant { origin } => {
                let item = state.olives.plant(&guard, caller, code, origin)?;
                stage_raw(&mut commit, item)
            }
            Action::Harvest { notes } => {
                let item = state.olives.harvest(&guard, caller, code, notes)?;
                stage_raw(&mut commit, item)
            }
            Action::Audit { notes } => {
                let item = state.olives.audit(&guard, caller, code, notes)?;
                stage_raw(&mut commit, item)
            }
            Action::Process => {
                let item = state.olives.process(&guard, caller, code)?;
                stage_raw(&mut commit, item)
            }
            Action::Create { product_id } => {
                let item = state.oil.create(&guard, caller, code, product_id)?;
                stage_derived(&mut commit, item)
            }
            Action::Blend { raw_codes } => {
                let item = state
                    .oil
                    .blend(&guard, &state.olives, caller, code, raw_codes)?;
                stage_derived(&mut commit, item)
            }
            Action::Produce { notes, price } => {
                let item = state.oil.produce(&guard, caller, code, notes, price)?;
                stage_derived(&mut commit, item)
            }
            Action::Certify { notes } => {
                let item = state.oil.certify(&guard, caller, code, notes)?;
                stage_derived(&mut commit, item)
            }
            Action::Pack => {
                let item = state.oil.pack(&guard, caller, code)?;
                stage_derived(&mut commit, item)
            }
            Action::Sell => {
                let item = state.oil.sell(&guard, caller, code)?;
                stage_derived(&mut commit, item)
            }
            Action::Buy { payment } => {
                let (item, purchase) =
                    state.oil.buy(&guard, &state.balances, caller, code, payment)?;
                commit.balances = state.balances.after(&purchase);
                settlement = Some(purchase);
                stage_derived(&mut commit, item)
            }
        };

        let event = TransitionEvent::new(
            state.next_sequence,
            code,
            transition,
            new_state,
            caller.clone(),
        );
        let encoded = EncodedEvent::encode(&event)?;
        let event_id = encoded.id.clone();
        if self.config.record_events {
            commit.event = Some(encoded);
        }
        commit.next_sequence = Some(state.next_sequence + 1);

        if let Some(store) = &self.store {
            store.apply(&commit)?;
        }

        // past this point nothing can fail
        if let Some(item) = commit.raw {
            state.olives.commit(item);
        }
        if let Some(item) = commit.derived {
            state.oil.commit(item);
        }
        if let Some(purchase) = &settlement {
            state.balances.settle(purchase);
        }
        state.next_sequence += 1;
        for sink in &self.sinks {
            sink.notify(&event);
        }

        Ok(Receipt {
            event,
            event_id,
            settlement,
        })
    }
}

fn stage_raw(commit: &mut Commit, item: RawItem) -> ItemState {
    let state = item.state.into();
    commit.raw = Some(item);
    state
}

fn stage_derived(commit: &mut Commit, item: DerivedItem) -> ItemState {
    let state = item.state.into();
    commit.derived = Some(item);
    state
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::events::EventLog;
    use crate::raw::{FarmProvenance, RawState};

    #[test]
    fn failed_transition_notifies_nobody() {
        let admin = AccountId::from("admin");
        let farmer = AccountId::from("farmer");
        let log = Arc::new(EventLog::new());
        let mut service = SupplyChainService::new(ChainConfig::default(), RoleBook::new(admin.clone()));
        service.subscribe(log.clone());
        service.grant(&admin, Role::Farmer, farmer.clone()).unwrap();

        let res = service.invoke(&farmer, 1, Action::Harvest { notes: "early".into() });
        assert!(matches!(res, Err(LedgerError::NotFound(..))));
        assert!(log.is_empty());

        let receipt = service
            .invoke(
                &farmer,
                1,
                Action::Plant {
                    origin: FarmProvenance::default(),
                },
            )
            .unwrap();
        assert_eq!(receipt.event.new_state, ItemState::Raw(RawState::Planted));
        assert_eq!(receipt.change(), 0);
        assert_eq!(receipt.event_id, receipt.event.build().unwrap().0);
        assert_eq!(log.len(), 1);
    }

    #[test]
    fn only_the_administrator_grants_through_the_service() {
        let admin = AccountId::from("admin");
        let farmer = AccountId::from("farmer");
        let service = SupplyChainService::new(ChainConfig::default(), RoleBook::new(admin.clone()));

        let res = service.grant(&farmer, Role::Farmer, farmer.clone());
        assert!(matches!(res, Err(LedgerError::NotAuthorized { .. })));
        assert!(!service.is_member(Role::Farmer, &farmer));

        assert!(service.grant(&admin, Role::Farmer, farmer.clone()).unwrap());
        assert!(!service.grant(&admin, Role::Farmer, farmer.clone()).unwrap());
        assert!(service.is_member(Role::Farmer, &farmer));
    }
}
