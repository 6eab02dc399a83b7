use std::collections::HashMap;

use crate::schemas::{Expense, Member};

/// Tolerance band, in currency units, inside which a balance counts as
/// settled. Shared by balance classification and the settlement sweep so the
/// two checks cannot drift apart.
pub const TOLERANCE: f64 = 0.01;

pub type Balances = HashMap<String, f64>;

/// Net position per member: amounts paid as payer minus amounts owed as a
/// share beneficiary. Positive = creditor, negative = debtor.
///
/// Only members carrying a non-empty id get an entry. Payer or share
/// references that do not resolve to a known member are skipped, not raised:
/// a group can still hold expenses referencing users that were since removed
/// from it, and the computation must stay usable on such partial data. The
/// skipped contribution may leave the ledger sum off zero; that is the
/// documented behavior, not an error.
pub fn compute_balances(expenses: &[Expense], members: &[Member]) -> Balances {
    let mut balances = Balances::new();
    for member in members {
        if !member.id.is_empty() {
            balances.insert(member.id.clone(), 0.0);
        }
    }

    for expense in expenses {
        if let Some(balance) = balances.get_mut(expense.paid_by.id()) {
            *balance += expense.amount;
        }
        for share in &expense.shares {
            if let Some(balance) = balances.get_mut(&share.member) {
                *balance -= share.amount;
            }
        }
    }

    balances
}
