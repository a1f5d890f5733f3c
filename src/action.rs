//! Named transitions and the payload each one carries
use super::error::{LedgerError, Result};
use super::raw::FarmProvenance;
use super::roles::Role;
use super::types::{Amount, LedgerKind, ProductCode};
use std::fmt;
use std::str::FromStr;

#[derive(minicbor::Encode, minicbor::Decode, Debug, Clone, Copy, Eq, Hash, PartialEq)]
pub enum Transition {
    #[n(0)]
    Plant,
    #[n(1)]
    Harvest,
    #[n(2)]
    Audit,
    #[n(3)]
    Process,
    #[n(4)]
    Create,
    #[n(5)]
    Blend,
    #[n(6)]
    Produce,
    #[n(7)]
    Certify,
    #[n(8)]
    Pack,
    #[n(9)]
    Sell,
    #[n(10)]
    Buy,
}

impl Transition {
    pub const ALL: [Transition; 11] = [
        Transition::Plant,
        Transition::Harvest,
        Transition::Audit,
        Transition::Process,
        Transition::Create,
        Transition::Blend,
        Transition::Produce,
        Transition::Certify,
        Transition::Pack,
        Transition::Sell,
        Transition::Buy,
    ];

    pub fn name(&self) -> &'static str {
        match self {
            Transition::Plant => "plant",
            Transition::Harvest => "harvest",
            Transition::Audit => "audit",
            Transition::Process => "process",
            Transition::Create => "create",
            Transition::Blend => "blend",
            Transition::Produce => "produce",
            Transition::Certify => "certify",
            Transition::Pack => "pack",
            Transition::Sell => "sell",
            Transition::Buy => "buy",
        }
    }

    pub fn ledger(&self) -> LedgerKind {
        match self {
            Transition::Plant | Transition::Harvest | Transition::Audit | Transition::Process => {
                LedgerKind::Raw
            }
            _ => LedgerKind::Derived,
        }
    }

    pub fn required_role(&self) -> Role {
        match self {
            Transition::Plant | Transition::Harvest | Transition::Process => Role::Farmer,
            Transition::Audit | Transition::Certify => Role::Inspector,
            Transition::Create | Transition::Blend | Transition::Produce | Transition::Pack => {
                Role::Producer
            }
            Transition::Sell => Role::Distributor,
            Transition::Buy => Role::Consumer,
        }
    }

    /// Transitions reserved for the record's current custodian.
    pub fn owner_only(&self) -> bool {
        matches!(
            self,
            Transition::Harvest
                | Transition::Process
                | Transition::Blend
                | Transition::Produce
                | Transition::Pack
        )
    }
}

impl fmt::Display for Transition {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

impl FromStr for Transition {
    type Err = LedgerError;

    fn from_str(s: &str) -> Result<Self> {
        Transition::ALL
            .into_iter()
            .find(|t| t.name().eq_ignore_ascii_case(s))
            .ok_or_else(|| LedgerError::InvalidPayload(format!("unknown transition '{s}'")))
    }
}

/// A transition together with its payload, as submitted by a caller.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Action {
    Plant { origin: FarmProvenance },
    Harvest { notes: String },
    Audit { notes: String },
    Process,
    Create { product_id: u64 },
    Blend { raw_codes: Vec<ProductCode> },
    Produce { notes: String, price: i64 },
    Certify { notes: String },
    Pack,
    Sell,
    Buy { payment: Amount },
}

impl Action {
    pub fn transition(&self) -> Transition {
        match self {
            Action::Plant { .. } => Transition::Plant,
            Action::Harvest { .. } => Transition::Harvest,
            Action::Audit { .. } => Transition::Audit,
            Action::Process => Transition::Process,
            Action::Create { .. } => Transition::Create,
            Action::Blend { .. } => Transition::Blend,
            Action::Produce { .. } => Transition::Produce,
            Action::Certify { .. } => Transition::Certify,
            Action::Pack => Transition::Pack,
            Action::Sell => Transition::Sell,
            Action::Buy { .. } => Transition::Buy,
        }
    }

    /// Payload-free actions can be built from a transition name alone.
    pub fn bare(transition: Transition) -> Result<Self> {
        match transition {
            Transition::Process => Ok(Action::Process),
            Transition::Pack => Ok(Action::Pack),
            Transition::Sell => Ok(Action::Sell),
            other => Err(LedgerError::InvalidPayload(format!(
                "{other} requires a payload"
            ))),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn names_round_trip() {
        for transition in Transition::ALL {
            assert_eq!(transition.name().parse::<Transition>().unwrap(), transition);
        }
        assert!("press".parse::<Transition>().is_err());
    }

    #[test]
    fn actions_name_their_transition() {
        assert_eq!(Action::Buy { payment: 1 }.transition(), Transition::Buy);
        assert_eq!(Action::bare(Transition::Pack).unwrap(), Action::Pack);
        assert!(Action::bare(Transition::Harvest).is_err());
    }

    #[test]
    fn roles_follow_the_tables() {
        assert_eq!(Transition::Audit.required_role(), Role::Inspector);
        assert_eq!(Transition::Sell.required_role(), Role::Distributor);
        assert_eq!(Transition::Process.ledger(), LedgerKind::Raw);
        assert!(Transition::Blend.owner_only());
        assert!(!Transition::Certify.owner_only());
    }
}
