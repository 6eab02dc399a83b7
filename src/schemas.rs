use bson::oid::ObjectId;
use serde::{Deserialize, Serialize};

pub type MemberId = String;

/// A registered account. Only the auth layer reads the password hash; group
/// documents carry `Member` snapshots instead of references into this
/// collection.
#[derive(Clone, Debug, Deserialize, Serialize)]
pub struct User {
    #[serde(rename = "_id")]
    pub id: ObjectId,
    pub name: String,
    pub email: String,
    pub password_hash: String,
    pub created_at: bson::DateTime,
}

/// A group participant. The id is the member's user id in hex form, or a
/// synthetic key in manual-calculator mode. Members are snapshots taken at
/// join time and are never mutated afterwards.
#[derive(Clone, Debug, PartialEq, Deserialize, Serialize)]
pub struct Member {
    #[serde(rename = "_id")]
    pub id: MemberId,
    #[serde(default)]
    pub name: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub email: Option<String>,
}

/// A payer reference as it appears in stored or client-supplied expenses:
/// either a bare member id, or a denormalized member object carrying the id
/// (the shape a populated query returns).
#[derive(Clone, Debug, PartialEq, Deserialize, Serialize)]
#[serde(untagged)]
pub enum PayerRef {
    Id(MemberId),
    Member(Member),
}

impl PayerRef {
    /// The member id, whichever representation was given.
    pub fn id(&self) -> &str {
        match self {
            PayerRef::Id(id) => id,
            PayerRef::Member(member) => &member.id,
        }
    }
}

#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Deserialize, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum SplitMethod {
    #[default]
    Equal,
    Custom,
}

/// Distinguishes ordinary expenses from recorded settlement payments.
/// Dispatch happens on this tag, never on the description text.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Deserialize, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum ExpenseKind {
    #[default]
    Payment,
    Settlement,
}

/// One member's owed portion of an expense. Shares are expected to sum to
/// the expense amount; that is checked with a tolerance at entry time, not
/// re-validated here.
#[derive(Clone, Debug, PartialEq, Deserialize, Serialize)]
pub struct Share {
    pub member: MemberId,
    pub amount: f64,
}

#[derive(Clone, Debug, PartialEq, Deserialize, Serialize)]
pub struct Expense {
    #[serde(rename = "_id")]
    pub id: String,
    pub description: String,
    pub amount: f64,
    pub paid_by: PayerRef,
    #[serde(default)]
    pub split_method: SplitMethod,
    #[serde(default)]
    pub kind: ExpenseKind,
    #[serde(default)]
    pub shares: Vec<Share>,
    #[serde(default = "bson::DateTime::now")]
    pub created_at: bson::DateTime,
}

impl Expense {
    pub fn new(
        description: impl Into<String>,
        amount: f64,
        paid_by: PayerRef,
        split_method: SplitMethod,
        kind: ExpenseKind,
        shares: Vec<Share>,
    ) -> Self {
        Self {
            id: ObjectId::new().to_hex(),
            description: description.into(),
            amount,
            paid_by,
            split_method,
            kind,
            shares,
            created_at: bson::DateTime::now(),
        }
    }

    /// A settlement payment recorded back into the ledger: paid by the
    /// debtor, credited in full to the creditor. On the next computation the
    /// pair's balance returns to zero.
    pub fn settlement(from: MemberId, to: MemberId, amount: f64) -> Self {
        Self::new(
            "Settlement Payment",
            amount,
            PayerRef::Id(from),
            SplitMethod::Custom,
            ExpenseKind::Settlement,
            vec![Share { member: to, amount }],
        )
    }
}

#[derive(Clone, Debug, PartialEq, Deserialize, Serialize)]
pub struct Group {
    pub id: String,
    pub name: String,
    pub creator: MemberId,
    #[serde(default)]
    pub members: Vec<Member>,
    #[serde(default)]
    pub expenses: Vec<Expense>,
    #[serde(default = "default_currency")]
    pub currency: String,
    pub created_at: bson::DateTime,
    pub updated_at: bson::DateTime,
}

fn default_currency() -> String {
    "INR".to_string()
}

impl Group {
    pub fn is_member(&self, member_id: &str) -> bool {
        self.members.iter().any(|m| m.id == member_id)
    }
}

/// A saved manual-calculator run. The data blob holds whatever the
/// calculator produced (members, settlements, total) and is stored opaquely.
#[derive(Clone, Debug, Deserialize, Serialize)]
pub struct ManualReport {
    pub id: String,
    pub user: MemberId,
    pub name: String,
    pub data: serde_json::Value,
    pub created_at: bson::DateTime,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn payer_ref_accepts_bare_id() {
        let expense: Expense = serde_json::from_str(
            r#"{
                "_id": "e1",
                "description": "taxi",
                "amount": 40.0,
                "paid_by": "alice",
                "shares": [{ "member": "bob", "amount": 40.0 }]
            }"#,
        )
        .unwrap();
        assert_eq!(expense.paid_by.id(), "alice");
        assert_eq!(expense.kind, ExpenseKind::Payment);
        assert_eq!(expense.split_method, SplitMethod::Equal);
    }

    #[test]
    fn payer_ref_accepts_embedded_member() {
        let expense: Expense = serde_json::from_str(
            r#"{
                "_id": "e2",
                "description": "hotel",
                "amount": 90.0,
                "paid_by": { "_id": "carol", "name": "Carol" }
            }"#,
        )
        .unwrap();
        assert_eq!(expense.paid_by.id(), "carol");
        assert!(expense.shares.is_empty());
    }

    #[test]
    fn settlement_constructor_tags_and_credits_the_creditor() {
        let expense = Expense::settlement("bob".into(), "alice".into(), 25.5);
        assert_eq!(expense.kind, ExpenseKind::Settlement);
        assert_eq!(expense.paid_by.id(), "bob");
        assert_eq!(
            expense.shares,
            vec![Share { member: "alice".into(), amount: 25.5 }]
        );
    }
}
