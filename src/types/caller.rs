//! Caller identity passed explicitly into every mutating engine call

use super::account::{Account, OwnerId};
use super::error::TxError;

/// Who is submitting a request
///
/// Authentication happens outside the ledger; the engine only checks that an
/// owner debits accounts it owns.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Caller {
    /// An authenticated account owner
    Owner(OwnerId),

    /// Trusted internal caller (batch replay, back office)
    System,
}

impl Caller {
    /// Owner id recorded on transactions this caller submits
    pub fn owner_id(&self) -> Option<OwnerId> {
        match self {
            Caller::Owner(owner) => Some(*owner),
            Caller::System => None,
        }
    }

    /// Check that this caller may move funds out of `account`
    ///
    /// # Errors
    ///
    /// Returns `TxError::Unauthorized` when an owner targets someone else's account
    pub fn authorize_debit(&self, account: &Account) -> Result<(), TxError> {
        match self {
            Caller::Owner(owner) if *owner != account.owner_id => {
                Err(TxError::unauthorized(*owner, account.id))
            }
            Caller::Owner(_) | Caller::System => Ok(()),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use rstest::rstest;
    use rust_decimal::Decimal;

    #[rstest]
    #[case::owner_of_account(Caller::Owner(1), true)]
    #[case::other_owner(Caller::Owner(2), false)]
    #[case::system(Caller::System, true)]
    fn test_authorize_debit(#[case] caller: Caller, #[case] allowed: bool) {
        let account = Account::new(10, "ACC-10", 1, Decimal::ZERO);
        assert_eq!(caller.authorize_debit(&account).is_ok(), allowed);
    }

    #[test]
    fn test_authorize_debit_names_owner_and_account() {
        let account = Account::new(10, "ACC-10", 1, Decimal::ZERO);
        assert_eq!(
            Caller::Owner(2).authorize_debit(&account),
            Err(TxError::unauthorized(2, 10))
        );
    }

    #[test]
    fn test_owner_id() {
        assert_eq!(Caller::Owner(5).owner_id(), Some(5));
        assert_eq!(Caller::System.owner_id(), None);
    }
}
