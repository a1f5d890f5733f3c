//! Property-based tests for the two state machines
//!
//! Random sequences of actions from random callers are fired at the service.
//! Whatever the sequence, states only move forward one step at a time, custody
//! only changes on a sale, and every success produces exactly one event.

use olive_supplychain::{
    Action, ChainConfig, LedgerError, Role, RoleBook, SupplyChainService, Transition,
    derived::DerivedItem,
    events::EventLog,
    raw::{FarmProvenance, RawItem},
    types::{AccountId, ItemState, ProductCode},
};
use proptest::prelude::*;
use std::sync::Arc;

const CALLERS: [&str; 6] = [
    "farmer",
    "producer",
    "inspector",
    "distributor",
    "consumer",
    "stranger",
];

fn service_with_roles() -> (SupplyChainService, Arc<EventLog>) {
    let admin = AccountId::from("admin");
    let log = Arc::new(EventLog::new());
    let mut service = SupplyChainService::new(ChainConfig::default(), RoleBook::new(admin.clone()));
    service.subscribe(log.clone());

    let roles = [
        Role::Farmer,
        Role::Producer,
        Role::Inspector,
        Role::Distributor,
        Role::Consumer,
    ];
    for (role, name) in roles.into_iter().zip(CALLERS) {
        service.grant(&admin, role, AccountId::from(name)).unwrap();
    }
    service
        .fund_account(&AccountId::from("consumer"), 1_000)
        .unwrap();

    (service, log)
}

/// Strategy to generate an action with a small payload
fn action_strategy() -> impl Strategy<Value = Action> {
    let olives = prop_oneof![
        Just(Action::Plant {
            origin: FarmProvenance::default()
        }),
        "[a-z ]{0,12}".prop_map(|notes| Action::Harvest { notes }),
        "[a-z ]{0,12}".prop_map(|notes| Action::Audit { notes }),
        Just(Action::Process),
    ];
    let oil = prop_oneof![
        (0u64..5000).prop_map(|product_id| Action::Create { product_id }),
        prop::collection::vec(0u64..3, 0..3).prop_map(|raw_codes| Action::Blend { raw_codes }),
        ("[a-z ]{0,12}", -5i64..60).prop_map(|(notes, price)| Action::Produce { notes, price }),
        "[a-z ]{0,12}".prop_map(|notes| Action::Certify { notes }),
        Just(Action::Pack),
        Just(Action::Sell),
        (0u64..80).prop_map(|payment| Action::Buy { payment }),
    ];
    prop_oneof![olives, oil]
}

/// Strategy to generate a (caller, code, action) step against codes 0..3
fn step_strategy() -> impl Strategy<Value = (usize, ProductCode, Action)> {
    (0..CALLERS.len(), 0u64..3, action_strategy())
}

fn snapshot(service: &SupplyChainService, code: ProductCode) -> (Option<RawItem>, Option<DerivedItem>) {
    (service.fetch_raw(code).ok(), service.fetch_derived(code).ok())
}

proptest! {
    /// Property: a failed step changes nothing; a successful step advances
    /// exactly one record by exactly one state and emits exactly one event.
    #[test]
    fn prop_steps_are_atomic_and_forward_only(
        steps in prop::collection::vec(step_strategy(), 1..40)
    ) {
        let (service, log) = service_with_roles();

        for (caller_idx, code, action) in steps {
            let caller = AccountId::from(CALLERS[caller_idx]);
            let transition = action.transition();
            let before = snapshot(&service, code);
            let events_before = log.len();
            let balance_before = service.balance_of(&caller);

            match service.invoke(&caller, code, action) {
                Ok(receipt) => {
                    prop_assert_eq!(log.len(), events_before + 1);
                    prop_assert_eq!(receipt.event.code, code);
                    prop_assert_eq!(&receipt.event.caller, &caller);
                    prop_assert_eq!(receipt.event.transition, transition);

                    match receipt.event.new_state {
                        ItemState::Raw(state) => {
                            let after = service.fetch_raw(code).unwrap();
                            prop_assert_eq!(after.state, state);
                            match before.0 {
                                None => prop_assert_eq!(transition, Transition::Plant),
                                Some(prev) => {
                                    prop_assert_eq!(prev.state as u8 + 1, state as u8);
                                    prop_assert_eq!(prev.owner, after.owner);
                                    prop_assert_eq!(prev.origin_farmer, after.origin_farmer);
                                }
                            }
                        }
                        ItemState::Derived(state) => {
                            let after = service.fetch_derived(code).unwrap();
                            prop_assert_eq!(after.state, state);
                            match before.1 {
                                None => prop_assert_eq!(transition, Transition::Create),
                                Some(prev) => {
                                    prop_assert_eq!(prev.state as u8 + 1, state as u8);
                                    if transition == Transition::Buy {
                                        prop_assert_eq!(&after.owner, &caller);
                                    } else {
                                        prop_assert_eq!(prev.owner, after.owner);
                                    }
                                    if transition != Transition::Blend {
                                        prop_assert_eq!(prev.consumed_raw_codes, after.consumed_raw_codes);
                                    } else {
                                        prop_assert!(!after.consumed_raw_codes.is_empty());
                                    }
                                }
                            }
                        }
                    }
                }
                Err(err) => {
                    prop_assert_eq!(log.len(), events_before);
                    prop_assert_eq!(snapshot(&service, code), before);
                    prop_assert_eq!(service.balance_of(&caller), balance_before);
                    let is_named = matches!(
                        err,
                        LedgerError::NotAuthorized { .. }
                            | LedgerError::WrongState { .. }
                            | LedgerError::NotOwner { .. }
                            | LedgerError::NotFound(..)
                            | LedgerError::AlreadyExists(..)
                            | LedgerError::InsufficientPayment { .. }
                            | LedgerError::InsufficientFunds { .. }
                            | LedgerError::InvalidPayload(_)
                    );
                    prop_assert!(is_named, "unexpected error {:?}", err);
                }
            }
        }
    }

    /// Property: callers outside the required role are always refused with
    /// NotAuthorized, whatever state the record is in.
    #[test]
    fn prop_wrong_role_is_always_not_authorized(
        code in 0u64..3,
        action in action_strategy()
    ) {
        let (service, _) = service_with_roles();
        let transition = action.transition();
        let required = transition.required_role();

        for (role, name) in [
            (Role::Farmer, "farmer"),
            (Role::Producer, "producer"),
            (Role::Inspector, "inspector"),
            (Role::Distributor, "distributor"),
            (Role::Consumer, "consumer"),
        ] {
            if role == required {
                continue;
            }
            let res = service.invoke(&AccountId::from(name), code, action.clone());
            let refused = matches!(res, Err(LedgerError::NotAuthorized { role, .. }) if role == required);
            prop_assert!(refused);
        }
    }

    /// Property: a successful purchase moves exactly the price and returns
    /// the rest as change.
    #[test]
    fn prop_purchase_moves_exactly_the_price(price in 0i64..500, extra in 0u64..1200) {
        let (service, _) = service_with_roles();
        let farmer = AccountId::from("farmer");
        let producer = AccountId::from("producer");
        let inspector = AccountId::from("inspector");
        let distributor = AccountId::from("distributor");
        let consumer = AccountId::from("consumer");

        service.invoke(&farmer, 1, Action::Plant { origin: FarmProvenance::default() }).unwrap();
        service.invoke(&farmer, 1, Action::Harvest { notes: String::new() }).unwrap();
        service.invoke(&inspector, 1, Action::Audit { notes: String::new() }).unwrap();
        service.invoke(&farmer, 1, Action::Process).unwrap();
        service.invoke(&producer, 1, Action::Create { product_id: 1 }).unwrap();
        service.invoke(&producer, 1, Action::Blend { raw_codes: vec![1] }).unwrap();
        service.invoke(&producer, 1, Action::Produce { notes: String::new(), price }).unwrap();
        service.invoke(&inspector, 1, Action::Certify { notes: String::new() }).unwrap();
        service.invoke(&producer, 1, Action::Pack).unwrap();
        service.invoke(&distributor, 1, Action::Sell).unwrap();

        let price = price as u64;
        let payment = price + extra;
        let res = service.invoke(&consumer, 1, Action::Buy { payment });

        if payment > 1_000 {
            let insufficient = matches!(res, Err(LedgerError::InsufficientFunds { .. }));
            prop_assert!(insufficient);
            prop_assert_eq!(service.balance_of(&consumer), 1_000);
        } else {
            let receipt = res.unwrap();
            prop_assert_eq!(receipt.change(), extra);
            prop_assert_eq!(service.balance_of(&consumer), 1_000 - price);
            prop_assert_eq!(service.balance_of(&producer), price);
        }
    }
}
