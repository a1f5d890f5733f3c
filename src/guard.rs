//! Admission checks run before any ledger mutation
use super::action::Transition;
use super::error::{LedgerError, Result};
use super::roles::RoleRegistry;
use super::types::{AccountId, ItemState, LedgerKind, ProductCode};

/// A record whose custody and progress the guard can inspect.
pub trait Custody {
    type State: Copy + PartialEq + Into<ItemState>;

    const LEDGER: LedgerKind;

    fn owner(&self) -> &AccountId;
    fn state(&self) -> Self::State;
}

/// Validates a caller against a record. Checks run in a fixed order (role,
/// existence, state, ownership) and the first failure is returned. The role
/// and the ownership rule come from the [`Transition`] being attempted.
pub struct AccessGuard<'a, R: RoleRegistry + ?Sized> {
    roles: &'a R,
}

impl<'a, R: RoleRegistry + ?Sized> AccessGuard<'a, R> {
    pub fn new(roles: &'a R) -> Self {
        Self { roles }
    }

    /// Role check alone, used by transitions that create a record.
    pub fn admit(&self, transition: Transition, caller: &AccountId) -> Result<()> {
        let required_role = transition.required_role();
        if !self.roles.is_member(required_role, caller) {
            return Err(LedgerError::NotAuthorized {
                role: required_role,
                caller: caller.clone(),
            });
        }
        Ok(())
    }

    pub fn check<'r, T: Custody>(
        &self,
        transition: Transition,
        caller: &AccountId,
        code: ProductCode,
        record: Option<&'r T>,
        required_state: T::State,
    ) -> Result<&'r T> {
        self.admit(transition, caller)?;

        let record = record.ok_or(LedgerError::NotFound(T::LEDGER, code))?;

        if record.state() != required_state {
            return Err(LedgerError::WrongState {
                ledger: T::LEDGER,
                code,
                expected: required_state.into(),
                actual: record.state().into(),
            });
        }

        if transition.owner_only() && record.owner() != caller {
            return Err(LedgerError::NotOwner {
                ledger: T::LEDGER,
                code,
                caller: caller.clone(),
            });
        }

        Ok(record)
    }
}
