//! Account balances moved by the purchase of olive oil
use super::error::{LedgerError, Result};
use super::types::{AccountId, Amount};
use std::collections::BTreeMap;

/// The money side of a purchase, computed before anything is moved.
#[derive(minicbor::Encode, minicbor::Decode, Debug, Clone, PartialEq, Eq)]
pub struct Settlement {
    #[n(0)]
    pub buyer: AccountId,
    #[n(1)]
    pub seller: AccountId,
    #[n(2)]
    pub price: Amount,
    #[n(3)]
    pub payment: Amount,
    #[n(4)]
    pub change: Amount, // payment - price, returned to the buyer
}

#[derive(Debug, Clone, Default)]
pub struct Balances {
    accounts: BTreeMap<AccountId, Amount>,
}

impl Balances {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn balance_of(&self, account: &AccountId) -> Amount {
        self.accounts.get(account).copied().unwrap_or(0)
    }

    /// Balance `account` would hold after receiving `amount`.
    pub fn credited(&self, account: &AccountId, amount: Amount) -> Result<Amount> {
        self.balance_of(account).checked_add(amount).ok_or_else(|| {
            LedgerError::InvalidPayload(format!("balance of {account} would overflow"))
        })
    }

    pub fn set_balance(&mut self, account: AccountId, amount: Amount) {
        self.accounts.insert(account, amount);
    }

    /// Validate a purchase. Nothing moves until [`Balances::settle`].
    pub fn plan_purchase(
        &self,
        buyer: &AccountId,
        seller: &AccountId,
        price: Amount,
        payment: Amount,
    ) -> Result<Settlement> {
        if payment < price {
            return Err(LedgerError::InsufficientPayment { price, payment });
        }

        let available = self.balance_of(buyer);
        if available < payment {
            return Err(LedgerError::InsufficientFunds {
                account: buyer.clone(),
                required: payment,
                available,
            });
        }

        if buyer != seller {
            self.credited(seller, price)?;
        }

        Ok(Settlement {
            buyer: buyer.clone(),
            seller: seller.clone(),
            price,
            payment,
            change: payment - price,
        })
    }

    /// Balances of the accounts a settlement touches, after it is applied.
    pub fn after(&self, settlement: &Settlement) -> Vec<(AccountId, Amount)> {
        if settlement.buyer == settlement.seller {
            return vec![(
                settlement.buyer.clone(),
                self.balance_of(&settlement.buyer),
            )];
        }

        vec![
            (
                settlement.buyer.clone(),
                self.balance_of(&settlement.buyer)
                    .saturating_sub(settlement.price),
            ),
            (
                settlement.seller.clone(),
                self.balance_of(&settlement.seller)
                    .saturating_add(settlement.price),
            ),
        ]
    }

    pub fn settle(&mut self, settlement: &Settlement) {
        for (account, amount) in self.after(settlement) {
            self.set_balance(account, amount);
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn overpayment_returns_change_and_moves_only_the_price() {
        let buyer = AccountId::from("consumer");
        let seller = AccountId::from("producer");
        let mut balances = Balances::new();
        balances.set_balance(buyer.clone(), 100);

        let settlement = balances.plan_purchase(&buyer, &seller, 26, 40).unwrap();
        assert_eq!(settlement.change, 14);

        balances.settle(&settlement);
        assert_eq!(balances.balance_of(&buyer), 74);
        assert_eq!(balances.balance_of(&seller), 26);
    }

    #[test]
    fn underpayment_is_refused_before_funds_are_checked() {
        let buyer = AccountId::from("consumer");
        let seller = AccountId::from("producer");
        let balances = Balances::new();

        let res = balances.plan_purchase(&buyer, &seller, 26, 25);

        assert!(matches!(
            res,
            Err(LedgerError::InsufficientPayment {
                price: 26,
                payment: 25
            })
        ));
    }

    #[test]
    fn payment_must_be_backed_by_funds() {
        let buyer = AccountId::from("consumer");
        let seller = AccountId::from("producer");
        let mut balances = Balances::new();
        balances.set_balance(buyer.clone(), 10);

        let res = balances.plan_purchase(&buyer, &seller, 5, 20);

        assert!(matches!(res, Err(LedgerError::InsufficientFunds { .. })));
    }

    #[test]
    fn buying_from_yourself_changes_nothing() {
        let both = AccountId::from("both");
        let mut balances = Balances::new();
        balances.set_balance(both.clone(), 50);

        let settlement = balances.plan_purchase(&both, &both, 30, 30).unwrap();
        balances.settle(&settlement);

        assert_eq!(balances.balance_of(&both), 50);
    }
}
