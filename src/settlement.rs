use serde::{Deserialize, Serialize};

use crate::balance::{compute_balances, TOLERANCE};
use crate::schemas::{Expense, Member, MemberId};

/// A recommended payment: `from` pays `to` this amount to move both balances
/// toward zero.
#[derive(Clone, Debug, PartialEq, Deserialize, Serialize)]
pub struct Transfer {
    pub from: MemberId,
    pub to: MemberId,
    pub amount: f64,
}

#[derive(Clone, Debug)]
struct PersonalBalance {
    id: MemberId,
    balance: f64,
}

/// Computes the settlement plan for a group: the ordered list of transfers
/// that drives every member's balance to within [`TOLERANCE`] of zero.
///
/// Pure and deterministic: the same `expenses` and `members` order always
/// yields the same transfer list. Malformed input (empty slices, unknown
/// payer or share references, members without an id) degrades to fewer
/// recognized balances or an empty plan; this function never fails.
///
/// The matching is greedy: debtors are walked from most negative, creditors
/// from largest, and each step settles min(|debt|, credit). This keeps the
/// transfer count low for typical group sizes but is not guaranteed to be
/// the graph-optimal minimum.
pub fn compute_settlements(expenses: &[Expense], members: &[Member]) -> Vec<Transfer> {
    let mut balances = compute_balances(expenses, members);

    // Partition in member order, not map order, so the stable sorts below
    // see a reproducible sequence. Removing the entry also makes duplicate
    // member rows harmless.
    let mut debtors = Vec::new();
    let mut creditors = Vec::new();
    for member in members {
        let Some(balance) = balances.remove(&member.id) else {
            continue;
        };
        let person = PersonalBalance {
            id: member.id.clone(),
            balance,
        };
        if balance < -TOLERANCE {
            debtors.push(person);
        } else if balance > TOLERANCE {
            creditors.push(person);
        }
    }

    debtors.sort_by(|a, b| a.balance.total_cmp(&b.balance));
    creditors.sort_by(|a, b| b.balance.total_cmp(&a.balance));

    let mut transfers = Vec::new();
    let mut i = 0;
    let mut j = 0;

    while i < debtors.len() && j < creditors.len() {
        let amount = round_to_2_decimals(debtors[i].balance.abs().min(creditors[j].balance));

        if amount > 0.0 {
            transfers.push(Transfer {
                from: debtors[i].id.clone(),
                to: creditors[j].id.clone(),
                amount,
            });
        }

        // Rounding happens once per emitted transfer; the running balances
        // absorb the rounded value so the error never compounds.
        debtors[i].balance += amount;
        creditors[j].balance -= amount;

        if debtors[i].balance.abs() < TOLERANCE {
            i += 1;
        }
        if creditors[j].balance < TOLERANCE {
            j += 1;
        }
    }

    transfers
}

fn round_to_2_decimals(n: f64) -> f64 {
    (n * 100.0).round() / 100.0
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::schemas::{ExpenseKind, PayerRef, Share, SplitMethod};

    fn member(id: &str) -> Member {
        Member {
            id: id.to_string(),
            name: id.to_uppercase(),
            email: None,
        }
    }

    fn expense(payer: &str, amount: f64, shares: &[(&str, f64)]) -> Expense {
        Expense::new(
            "test expense",
            amount,
            PayerRef::Id(payer.to_string()),
            SplitMethod::Custom,
            ExpenseKind::Payment,
            shares
                .iter()
                .map(|(m, a)| Share {
                    member: m.to_string(),
                    amount: *a,
                })
                .collect(),
        )
    }

    fn assert_close(left: f64, right: f64) {
        assert!((left - right).abs() < 1e-9, "{left} != {right}");
    }

    #[test]
    fn equal_three_way_split_settles_to_the_payer() {
        let members = vec![member("a"), member("b"), member("c")];
        let expenses = vec![expense("a", 300.0, &[("a", 100.0), ("b", 100.0), ("c", 100.0)])];

        let transfers = compute_settlements(&expenses, &members);

        assert_eq!(transfers.len(), 2);
        assert_eq!(transfers[0].from, "b");
        assert_eq!(transfers[0].to, "a");
        assert_close(transfers[0].amount, 100.0);
        assert_eq!(transfers[1].from, "c");
        assert_eq!(transfers[1].to, "a");
        assert_close(transfers[1].amount, 100.0);
    }

    #[test]
    fn recorded_settlement_zeroes_the_pair() {
        let members = vec![member("a"), member("b")];
        let expenses = vec![
            expense("a", 50.0, &[("b", 50.0)]),
            expense("b", 50.0, &[("a", 50.0)]),
        ];

        assert!(compute_settlements(&expenses, &members).is_empty());
    }

    #[test]
    fn no_expenses_yields_no_transfers() {
        let members = vec![member("a"), member("b"), member("c")];
        assert!(compute_settlements(&[], &members).is_empty());
        assert!(compute_settlements(&[], &[]).is_empty());
    }

    #[test]
    fn unknown_payer_is_dropped_without_error() {
        // The payer was removed from the group; their credit disappears but
        // the remaining shares still count. The plan has no creditor left to
        // pay, so it comes out empty.
        let members = vec![member("b"), member("c")];
        let expenses = vec![expense("ghost", 200.0, &[("b", 100.0), ("c", 100.0)])];

        assert!(compute_settlements(&expenses, &members).is_empty());
    }

    #[test]
    fn embedded_payer_object_matches_bare_id() {
        let members = vec![member("a"), member("b")];
        let bare = vec![expense("a", 60.0, &[("b", 60.0)])];
        let mut embedded = bare.clone();
        embedded[0].paid_by = PayerRef::Member(member("a"));

        assert_eq!(
            compute_settlements(&bare, &members),
            compute_settlements(&embedded, &members)
        );
    }

    #[test]
    fn near_zero_balances_are_treated_as_settled() {
        let members = vec![member("a"), member("b")];
        let expenses = vec![expense("a", 0.01, &[("b", 0.01)])];

        assert!(compute_settlements(&expenses, &members).is_empty());
    }

    #[test]
    fn transfers_zero_out_all_balances() {
        let members = vec![member("a"), member("b"), member("c"), member("d")];
        let expenses = vec![
            expense("a", 120.0, &[("a", 30.0), ("b", 30.0), ("c", 30.0), ("d", 30.0)]),
            expense("b", 75.5, &[("a", 25.0), ("c", 25.25), ("d", 25.25)]),
            expense("c", 10.0, &[("d", 10.0)]),
        ];

        let mut balances = compute_balances(&expenses, &members);
        let transfers = compute_settlements(&expenses, &members);

        for transfer in &transfers {
            assert_ne!(transfer.from, transfer.to);
            assert!(transfer.amount > 0.0);
            *balances.get_mut(&transfer.from).unwrap() += transfer.amount;
            *balances.get_mut(&transfer.to).unwrap() -= transfer.amount;
        }
        for balance in balances.values() {
            assert!(balance.abs() <= TOLERANCE);
        }
    }

    #[test]
    fn uneven_split_rounds_each_transfer_once() {
        let third = 100.0 / 3.0;
        let members = vec![member("a"), member("b"), member("c")];
        let expenses = vec![expense("a", 100.0, &[("a", third), ("b", third), ("c", third)])];

        let transfers = compute_settlements(&expenses, &members);

        assert_eq!(transfers.len(), 2);
        assert_close(transfers[0].amount, 33.33);
        assert_close(transfers[1].amount, 33.33);
    }

    #[test]
    fn same_input_gives_identical_plans() {
        let members = vec![member("a"), member("b"), member("c"), member("d")];
        let expenses = vec![
            expense("a", 80.0, &[("b", 40.0), ("c", 40.0)]),
            expense("d", 35.0, &[("a", 20.0), ("b", 15.0)]),
        ];

        let first = compute_settlements(&expenses, &members);
        let second = compute_settlements(&expenses, &members);
        assert_eq!(first, second);
    }

    #[test]
    fn feeding_the_plan_back_as_settlements_empties_it() {
        let members = vec![member("a"), member("b"), member("c")];
        let mut expenses = vec![
            expense("a", 300.0, &[("a", 100.0), ("b", 100.0), ("c", 100.0)]),
            expense("b", 30.0, &[("c", 30.0)]),
        ];

        let transfers = compute_settlements(&expenses, &members);
        assert!(!transfers.is_empty());

        for transfer in transfers {
            expenses.push(Expense::settlement(transfer.from, transfer.to, transfer.amount));
        }

        assert!(compute_settlements(&expenses, &members).is_empty());
    }

    #[test]
    fn largest_creditor_is_paid_first() {
        let members = vec![member("a"), member("b"), member("c"), member("d")];
        // a is owed 90, b is owed 10; c owes 60, d owes 40.
        let expenses = vec![
            expense("a", 90.0, &[("c", 54.0), ("d", 36.0)]),
            expense("b", 10.0, &[("c", 6.0), ("d", 4.0)]),
        ];

        let transfers = compute_settlements(&expenses, &members);

        assert_eq!(
            transfers,
            vec![
                Transfer { from: "c".into(), to: "a".into(), amount: 60.0 },
                Transfer { from: "d".into(), to: "a".into(), amount: 30.0 },
                Transfer { from: "d".into(), to: "b".into(), amount: 10.0 },
            ]
        );
    }
}
