use actix_web::{delete, post, put, web, HttpResponse};
use bson::{doc, Document};
use mongodb::options::UpdateOptions;
use mongodb::Client;
use serde::Deserialize;

use crate::auth::AuthUser;
use crate::error::{ApiError, ApiResult};
use crate::groups::{find_group, groups_collection, require_member};
use crate::schemas::{Expense, ExpenseKind, PayerRef, Share, SplitMethod};

#[derive(Deserialize)]
struct NewExpenseJson {
    description: String,
    amount: f64,
    #[serde(default)]
    split_method: SplitMethod,
    #[serde(default)]
    shares: Vec<Share>,
}

#[post("/groups/{id}/expenses")]
pub(crate) async fn add_expense(
    client: web::Data<Client>,
    user: AuthUser,
    id: web::Path<String>,
    json: web::Json<NewExpenseJson>,
) -> ApiResult<HttpResponse> {
    let id = id.into_inner();
    let json = json.into_inner();
    let group = find_group(&client, &id).await?;
    require_member(&group, &user.id)?;

    if json.amount <= 0.0 {
        return Err(ApiError::BadRequest("amount must be positive".to_string()));
    }

    // An equal split with no explicit shares is filled in across the whole
    // group; custom splits are stored as given. Share sums are the entry
    // form's concern, the ledger does not re-check them.
    let shares = if json.shares.is_empty() {
        let per_member = json.amount / group.members.len() as f64;
        group
            .members
            .iter()
            .map(|m| Share {
                member: m.id.clone(),
                amount: per_member,
            })
            .collect()
    } else {
        json.shares
    };

    let expense = Expense::new(
        json.description,
        json.amount,
        PayerRef::Id(user.id),
        json.split_method,
        ExpenseKind::Payment,
        shares,
    );
    groups_collection(&client)
        .update_one(
            doc! { "id": &id },
            doc! {
                "$push": { "expenses": bson::to_bson(&expense)? },
                "$set": { "updated_at": bson::DateTime::now() },
            },
            None,
        )
        .await?;

    Ok(HttpResponse::Created().json(expense))
}

#[derive(Deserialize)]
struct UpdateExpenseJson {
    description: Option<String>,
    amount: Option<f64>,
}

/// Edits an expense's description or amount. Shares are immutable once an
/// expense exists; re-splitting means deleting and re-adding it.
#[put("/expenses/{group_id}/{expense_id}")]
pub(crate) async fn update_expense(
    client: web::Data<Client>,
    user: AuthUser,
    path: web::Path<(String, String)>,
    json: web::Json<UpdateExpenseJson>,
) -> ApiResult<HttpResponse> {
    let (group_id, expense_id) = path.into_inner();
    let UpdateExpenseJson { description, amount } = json.into_inner();
    let group = find_group(&client, &group_id).await?;
    let expense = owned_expense(&group.expenses, &expense_id, &user.id)?;

    if let Some(amount) = amount {
        if amount <= 0.0 {
            return Err(ApiError::BadRequest("amount must be positive".to_string()));
        }
    }

    let mut set = Document::new();
    if let Some(description) = &description {
        set.insert("expenses.$[e].description", description);
    }
    if let Some(amount) = amount {
        set.insert("expenses.$[e].amount", amount);
    }
    set.insert("updated_at", bson::DateTime::now());

    let options = UpdateOptions::builder()
        .array_filters(vec![doc! { "e._id": &expense_id }])
        .build();
    groups_collection(&client)
        .update_one(doc! { "id": &group_id }, doc! { "$set": set }, options)
        .await?;

    let mut updated = expense.clone();
    if let Some(description) = description {
        updated.description = description;
    }
    if let Some(amount) = amount {
        updated.amount = amount;
    }
    Ok(HttpResponse::Ok().json(updated))
}

#[delete("/expenses/{group_id}/{expense_id}")]
pub(crate) async fn delete_expense(
    client: web::Data<Client>,
    user: AuthUser,
    path: web::Path<(String, String)>,
) -> ApiResult<HttpResponse> {
    let (group_id, expense_id) = path.into_inner();
    let group = find_group(&client, &group_id).await?;
    owned_expense(&group.expenses, &expense_id, &user.id)?;

    groups_collection(&client)
        .update_one(
            doc! { "id": &group_id },
            doc! {
                "$pull": { "expenses": { "_id": &expense_id } },
                "$set": { "updated_at": bson::DateTime::now() },
            },
            None,
        )
        .await?;

    Ok(HttpResponse::Ok().json(serde_json::json!({ "message": "Expense removed" })))
}

fn owned_expense<'a>(
    expenses: &'a [Expense],
    expense_id: &str,
    user_id: &str,
) -> Result<&'a Expense, ApiError> {
    let expense = expenses
        .iter()
        .find(|e| e.id == expense_id)
        .ok_or_else(|| ApiError::NotFound("Expense not found".to_string()))?;
    if expense.paid_by.id() != user_id {
        return Err(ApiError::Forbidden("Not authorized to modify this expense".to_string()));
    }
    Ok(expense)
}
