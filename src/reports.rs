use actix_web::{get, post, web, HttpResponse};
use bson::{doc, oid::ObjectId};
use futures::TryStreamExt;
use mongodb::options::FindOptions;
use mongodb::Client;
use serde::{Deserialize, Serialize};

use crate::auth::AuthUser;
use crate::error::{ApiError, ApiResult};
use crate::schemas::{Expense, ExpenseKind, ManualReport, Member, PayerRef, Share, SplitMethod};
use crate::settlement::{compute_settlements, Transfer};

#[derive(Deserialize)]
struct CalculatorPerson {
    name: String,
    #[serde(default)]
    amount: f64,
}

#[derive(Deserialize)]
struct CalculateJson {
    name: String,
    people: Vec<CalculatorPerson>,
}

#[derive(Serialize)]
struct CalculateResponse {
    name: String,
    total: f64,
    members: Vec<Member>,
    settlements: Vec<Transfer>,
}

/// Manual-calculator mode: free-form names and paid amounts, split equally
/// across everyone, fed through the same settlement engine as group data.
/// Nothing is persisted; saving the result is a separate call.
#[post("/reports/calculate")]
pub(crate) async fn calculate(_user: AuthUser, json: web::Json<CalculateJson>) -> ApiResult<HttpResponse> {
    let json = json.into_inner();

    let members: Vec<Member> = json
        .people
        .iter()
        .filter(|p| !p.name.trim().is_empty())
        .enumerate()
        .map(|(index, person)| Member {
            id: format!("p{index}"),
            name: person.name.trim().to_string(),
            email: None,
        })
        .collect();
    if members.is_empty() {
        return Err(ApiError::BadRequest("at least one name is required".to_string()));
    }

    let per_head = 1.0 / members.len() as f64;
    let expenses: Vec<Expense> = json
        .people
        .iter()
        .filter(|p| !p.name.trim().is_empty())
        .enumerate()
        .filter(|(_, person)| person.amount > 0.0)
        .map(|(index, person)| {
            Expense::new(
                format!("Paid by {}", person.name.trim()),
                person.amount,
                PayerRef::Id(format!("p{index}")),
                SplitMethod::Equal,
                ExpenseKind::Payment,
                members
                    .iter()
                    .map(|m| Share {
                        member: m.id.clone(),
                        amount: person.amount * per_head,
                    })
                    .collect(),
            )
        })
        .collect();

    let total: f64 = expenses.iter().map(|e| e.amount).sum();
    let settlements = compute_settlements(&expenses, &members);

    Ok(HttpResponse::Ok().json(CalculateResponse {
        name: json.name,
        total,
        members,
        settlements,
    }))
}

#[derive(Deserialize)]
struct SaveReportJson {
    name: String,
    data: serde_json::Value,
}

#[post("/reports")]
pub(crate) async fn save_report(
    client: web::Data<Client>,
    user: AuthUser,
    json: web::Json<SaveReportJson>,
) -> ApiResult<HttpResponse> {
    let json = json.into_inner();
    let report = ManualReport {
        id: ObjectId::new().to_hex(),
        user: user.id,
        name: json.name,
        data: json.data,
        created_at: bson::DateTime::now(),
    };
    client
        .database(crate::DB_NAME)
        .collection::<ManualReport>("ManualReports")
        .insert_one(&report, None)
        .await?;
    Ok(HttpResponse::Created().json(report))
}

#[get("/reports")]
pub(crate) async fn get_reports(client: web::Data<Client>, user: AuthUser) -> ApiResult<HttpResponse> {
    let options = FindOptions::builder().sort(doc! { "created_at": -1 }).build();
    let reports: Vec<ManualReport> = client
        .database(crate::DB_NAME)
        .collection::<ManualReport>("ManualReports")
        .find(doc! { "user": &user.id }, options)
        .await?
        .try_collect()
        .await?;
    Ok(HttpResponse::Ok().json(reports))
}
