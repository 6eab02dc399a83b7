use actix_cors::Cors;
use actix_web::{web, App, HttpServer};
use mongodb::Client;
use tracing_subscriber::EnvFilter;

mod auth;
mod balance;
mod config;
mod error;
mod expenses;
mod groups;
mod reports;
mod schemas;
mod settlement;

pub const DB_NAME: &str = "SplitPay";

#[actix_web::main]
async fn main() -> std::io::Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")),
        )
        .init();

    let config = config::Config::from_env();
    let client = Client::with_uri_str(&config.mongodb_uri)
        .await
        .expect("failed to connect");
    tracing::info!(addr = %config.bind_addr, "connected, starting server");

    let bind_addr = config.bind_addr.clone();
    HttpServer::new(move || {
        App::new()
            .wrap(Cors::permissive())
            .app_data(web::Data::new(client.clone()))
            .app_data(web::Data::new(config.clone()))
            .service(auth::register)
            .service(auth::login)
            // `/groups/activity` must be registered before `/groups/{id}`.
            .service(groups::get_activity)
            .service(groups::add_group)
            .service(groups::get_user_groups)
            .service(groups::get_group_details)
            .service(groups::add_member)
            .service(groups::get_balance)
            .service(groups::get_settlements)
            .service(groups::record_settlement)
            .service(expenses::add_expense)
            .service(expenses::update_expense)
            .service(expenses::delete_expense)
            .service(reports::calculate)
            .service(reports::save_report)
            .service(reports::get_reports)
    })
    .bind(bind_addr)?
    .run()
    .await
}
