use actix_web::{get, post, put, web, HttpResponse};
use bson::{doc, oid::ObjectId};
use futures::TryStreamExt;
use mongodb::options::FindOptions;
use mongodb::Client;
use serde::{Deserialize, Serialize};

use crate::auth::AuthUser;
use crate::balance::compute_balances;
use crate::error::{ApiError, ApiResult};
use crate::schemas::{Expense, Group, Member};
use crate::settlement::{compute_settlements, Transfer};

pub(crate) fn groups_collection(client: &Client) -> mongodb::Collection<Group> {
    client.database(crate::DB_NAME).collection("Groups")
}

pub(crate) async fn find_group(client: &Client, id: &str) -> ApiResult<Group> {
    groups_collection(client)
        .find_one(doc! { "id": id }, None)
        .await?
        .ok_or_else(|| ApiError::NotFound("Couldn't find the desired group".to_string()))
}

pub(crate) fn require_member(group: &Group, member_id: &str) -> Result<(), ApiError> {
    if group.is_member(member_id) {
        Ok(())
    } else {
        Err(ApiError::Forbidden("not a member of this group".to_string()))
    }
}

#[derive(Deserialize)]
struct NewGroupJson {
    name: String,
    #[serde(default)]
    member_emails: Vec<String>,
}

#[post("/groups")]
pub(crate) async fn add_group(
    client: web::Data<Client>,
    user: AuthUser,
    json: web::Json<NewGroupJson>,
) -> ApiResult<HttpResponse> {
    let json = json.into_inner();
    if json.name.trim().is_empty() {
        return Err(ApiError::BadRequest("group name is required".to_string()));
    }

    // Resolve invited emails to registered users; unknown addresses are
    // dropped rather than rejected, matching the invite flow.
    let users = client
        .database(crate::DB_NAME)
        .collection::<crate::schemas::User>("Users");
    let mut members: Vec<Member> = users
        .find(doc! { "email": { "$in": json.member_emails } }, None)
        .await?
        .try_collect::<Vec<_>>()
        .await?
        .into_iter()
        .map(|invited| Member {
            id: invited.id.to_hex(),
            name: invited.name,
            email: Some(invited.email),
        })
        .collect();
    if !members.iter().any(|m| m.id == user.id) {
        members.push(Member {
            id: user.id.clone(),
            name: user.name.clone(),
            email: Some(user.email.clone()),
        });
    }

    let now = bson::DateTime::now();
    let group = Group {
        id: ObjectId::new().to_hex(),
        name: json.name,
        creator: user.id,
        members,
        expenses: vec![],
        currency: "INR".to_string(),
        created_at: now,
        updated_at: now,
    };
    groups_collection(&client).insert_one(&group, None).await?;
    tracing::info!(group = %group.id, "group created");

    Ok(HttpResponse::Created().json(group))
}

#[get("/groups")]
pub(crate) async fn get_user_groups(client: web::Data<Client>, user: AuthUser) -> ApiResult<HttpResponse> {
    let options = FindOptions::builder().sort(doc! { "updated_at": -1 }).build();
    let groups: Vec<Group> = groups_collection(&client)
        .find(doc! { "members._id": &user.id }, options)
        .await?
        .try_collect()
        .await?;
    Ok(HttpResponse::Ok().json(groups))
}

#[derive(Serialize)]
struct ActivityItem {
    group_id: String,
    group_name: String,
    expense: Expense,
}

/// The 20 newest expenses across every group the caller belongs to.
#[get("/groups/activity")]
pub(crate) async fn get_activity(client: web::Data<Client>, user: AuthUser) -> ApiResult<HttpResponse> {
    let groups: Vec<Group> = groups_collection(&client)
        .find(doc! { "members._id": &user.id }, None)
        .await?
        .try_collect()
        .await?;

    let mut items: Vec<ActivityItem> = groups
        .into_iter()
        .flat_map(|group| {
            let (id, name) = (group.id, group.name);
            group.expenses.into_iter().map(move |expense| ActivityItem {
                group_id: id.clone(),
                group_name: name.clone(),
                expense,
            })
        })
        .collect();
    items.sort_by(|a, b| b.expense.created_at.cmp(&a.expense.created_at));
    items.truncate(20);

    Ok(HttpResponse::Ok().json(items))
}

#[get("/groups/{id}")]
pub(crate) async fn get_group_details(
    client: web::Data<Client>,
    user: AuthUser,
    id: web::Path<String>,
) -> ApiResult<HttpResponse> {
    let mut group = find_group(&client, &id).await?;
    require_member(&group, &user.id)?;
    group.expenses.sort_by(|a, b| b.created_at.cmp(&a.created_at));
    Ok(HttpResponse::Ok().json(group))
}

#[derive(Deserialize)]
struct AddMemberJson {
    email: String,
}

#[put("/groups/{id}/members")]
pub(crate) async fn add_member(
    client: web::Data<Client>,
    user: AuthUser,
    id: web::Path<String>,
    json: web::Json<AddMemberJson>,
) -> ApiResult<HttpResponse> {
    let id = id.into_inner();
    let group = find_group(&client, &id).await?;
    require_member(&group, &user.id)?;

    let users = client
        .database(crate::DB_NAME)
        .collection::<crate::schemas::User>("Users");
    let invited = users
        .find_one(doc! { "email": &json.email }, None)
        .await?
        .ok_or_else(|| ApiError::NotFound("User not found with this email".to_string()))?;
    if group.is_member(&invited.id.to_hex()) {
        return Err(ApiError::BadRequest("User already in the group".to_string()));
    }

    let member = Member {
        id: invited.id.to_hex(),
        name: invited.name,
        email: Some(invited.email),
    };
    groups_collection(&client)
        .update_one(
            doc! { "id": &id },
            doc! {
                "$push": { "members": bson::to_bson(&member)? },
                "$set": { "updated_at": bson::DateTime::now() },
            },
            None,
        )
        .await?;

    let updated = find_group(&client, &id).await?;
    Ok(HttpResponse::Ok().json(updated))
}

#[get("/groups/{id}/balance")]
pub(crate) async fn get_balance(
    client: web::Data<Client>,
    user: AuthUser,
    id: web::Path<String>,
) -> ApiResult<HttpResponse> {
    let group = find_group(&client, &id).await?;
    require_member(&group, &user.id)?;
    Ok(HttpResponse::Ok().json(compute_balances(&group.expenses, &group.members)))
}

#[get("/groups/{id}/settlements")]
pub(crate) async fn get_settlements(
    client: web::Data<Client>,
    user: AuthUser,
    id: web::Path<String>,
) -> ApiResult<HttpResponse> {
    let group = find_group(&client, &id).await?;
    require_member(&group, &user.id)?;
    Ok(HttpResponse::Ok().json(compute_settlements(&group.expenses, &group.members)))
}

/// Records a confirmed transfer as a settlement expense: the debtor pays,
/// the creditor receives the full amount as the only share.
#[post("/groups/{id}/settlements")]
pub(crate) async fn record_settlement(
    client: web::Data<Client>,
    user: AuthUser,
    id: web::Path<String>,
    json: web::Json<Transfer>,
) -> ApiResult<HttpResponse> {
    let id = id.into_inner();
    let transfer = json.into_inner();
    let group = find_group(&client, &id).await?;
    require_member(&group, &user.id)?;

    if transfer.from != user.id {
        return Err(ApiError::Forbidden("only the debtor can settle this payment".to_string()));
    }
    if !group.is_member(&transfer.to) {
        return Err(ApiError::BadRequest("receiver is not in the group".to_string()));
    }
    if transfer.amount <= 0.0 {
        return Err(ApiError::BadRequest("amount must be positive".to_string()));
    }

    let expense = Expense::settlement(transfer.from, transfer.to, transfer.amount);
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
    tracing::info!(group = %id, amount = expense.amount, "settlement recorded");

    Ok(HttpResponse::Created().json(expense))
}
