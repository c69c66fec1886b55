//! HTTP front-end: a single route that runs the configured category scrapes
//! and relays the combined record list as JSON. No parameters, no other
//! routes; anything unexpected becomes a generic 500.

use crate::config::AppConfig;
use crate::pipeline::{self, Pipeline};
use actix_web::{App, HttpResponse, HttpServer, Responder, get, web};
use anyhow::Result;
use tracing::{error, info};

#[get("/")]
async fn index(config: web::Data<AppConfig>) -> impl Responder {
    info!("Starting property scrape for HTTP request");

    match Pipeline::new(config.get_ref().clone()).run().await {
        Ok((results, stats)) => {
            let records = pipeline::flatten(results);
            info!(
                records = records.len(),
                page_errors = stats.page_errors,
                "Scrape finished"
            );
            HttpResponse::Ok().json(records)
        }
        Err(e) => {
            error!("Scrape failed: {e:#}");
            HttpResponse::InternalServerError()
                .json(serde_json::json!({ "error": "Internal Server Error" }))
        }
    }
}

pub async fn serve(config: AppConfig) -> Result<()> {
    let bind = config.server.bind.clone();
    info!(%bind, "Starting HTTP front-end");

    let data = web::Data::new(config);
    HttpServer::new(move || App::new().app_data(data.clone()).service(index))
        .bind(&bind)?
        .run()
        .await?;

    Ok(())
}
