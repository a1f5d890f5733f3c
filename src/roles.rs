//! Role membership and the administrator who hands it out
use super::error::{LedgerError, Result};
use super::types::AccountId;
use std::collections::{BTreeMap, BTreeSet};
use std::fmt;
use std::str::FromStr;

#[derive(minicbor::Encode, minicbor::Decode, Debug, Clone, Copy, Eq, Hash, Ord, PartialEq, PartialOrd)]
pub enum Role {
    #[n(0)]
    Farmer,
    #[n(1)]
    Producer,
    #[n(2)]
    Inspector,
    #[n(3)]
    Distributor,
    #[n(4)]
    Consumer,
}

impl Role {
    pub const ALL: [Role; 5] = [
        Role::Farmer,
        Role::Producer,
        Role::Inspector,
        Role::Distributor,
        Role::Consumer,
    ];

    pub fn as_str(&self) -> &'static str {
        match self {
            Role::Farmer => "farmer",
            Role::Producer => "producer",
            Role::Inspector => "inspector",
            Role::Distributor => "distributor",
            Role::Consumer => "consumer",
        }
    }
}

impl fmt::Display for Role {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for Role {
    type Err = LedgerError;

    fn from_str(s: &str) -> Result<Self> {
        Role::ALL
            .into_iter()
            .find(|role| role.as_str().eq_ignore_ascii_case(s))
            .ok_or_else(|| LedgerError::InvalidPayload(format!("unknown role '{s}'")))
    }
}

/// Capability the ledgers consult for membership, and the service uses to grant it.
pub trait RoleRegistry: Send {
    /// The identity allowed to grant roles. Fixed for the registry's lifetime.
    fn administrator(&self) -> &AccountId;

    fn is_member(&self, role: Role, identity: &AccountId) -> bool;

    /// Add `identity` to `role`. Returns `false` when it was already a member.
    fn grant(&mut self, caller: &AccountId, role: Role, identity: AccountId) -> Result<bool>;
}

/// In-memory registry. An identity may hold several roles at once.
#[derive(Debug, Clone)]
pub struct RoleBook {
    administrator: AccountId,
    members: BTreeMap<Role, BTreeSet<AccountId>>,
}

impl RoleBook {
    pub fn new(administrator: AccountId) -> Self {
        Self {
            administrator,
            members: BTreeMap::new(),
        }
    }
}

impl RoleRegistry for RoleBook {
    fn administrator(&self) -> &AccountId {
        &self.administrator
    }

    fn is_member(&self, role: Role, identity: &AccountId) -> bool {
        self.members
            .get(&role)
            .is_some_and(|set| set.contains(identity))
    }

    fn grant(&mut self, caller: &AccountId, role: Role, identity: AccountId) -> Result<bool> {
        if *caller != self.administrator {
            return Err(LedgerError::NotAuthorized {
                role,
                caller: caller.clone(),
            });
        }

        Ok(self.members.entry(role).or_default().insert(identity))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn grant_is_idempotent() {
        let admin = AccountId::from("admin");
        let farmer = AccountId::from("farmer");
        let mut book = RoleBook::new(admin.clone());

        assert!(book.grant(&admin, Role::Farmer, farmer.clone()).unwrap());
        assert!(!book.grant(&admin, Role::Farmer, farmer.clone()).unwrap());
        assert!(book.is_member(Role::Farmer, &farmer));
    }

    #[test]
    fn only_the_administrator_grants() {
        let admin = AccountId::from("admin");
        let intruder = AccountId::from("intruder");
        let mut book = RoleBook::new(admin);

        let res = book.grant(&intruder, Role::Inspector, intruder.clone());

        assert!(matches!(res, Err(LedgerError::NotAuthorized { .. })));
        assert!(!book.is_member(Role::Inspector, &intruder));
    }

    #[test]
    fn roles_are_independent_sets() {
        let admin = AccountId::from("admin");
        let someone = AccountId::from("someone");
        let mut book = RoleBook::new(admin.clone());

        book.grant(&admin, Role::Producer, someone.clone()).unwrap();
        book.grant(&admin, Role::Consumer, someone.clone()).unwrap();

        assert!(book.is_member(Role::Producer, &someone));
        assert!(book.is_member(Role::Consumer, &someone));
        assert!(!book.is_member(Role::Farmer, &someone));
    }

    #[test]
    fn role_names_parse() {
        assert_eq!("Inspector".parse::<Role>().unwrap(), Role::Inspector);
        assert!("miller".parse::<Role>().is_err());
    }
}
