mod auth;
mod classifier;
mod config;
mod db;
mod error;
mod history;
mod pipeline;
mod preprocess;
mod routes;
mod session;
mod storage;
#[cfg(test)]
mod test_support;
mod validator;

use actix_cors::Cors;
use actix_web::{web, App, HttpServer};
use auth::jwt::JwtService;
use auth::middleware::AuthMiddleware;
use aws_config::BehaviorVersion;
use aws_sdk_dynamodb::Client as DynamoDbClient;
use aws_sdk_s3::Client as S3Client;
use classifier::ClassifierClient;
use config::AppConfig;
use db::history_repository::HistoryRepository;
use history::DynamoHistoryRecorder;
use pipeline::DetectionPipeline;
use routes::configure_routes;
use session::SessionStore;
use std::sync::Arc;
use storage::s3_service::S3Service;
use validator::ValidatorClient;

fn startup_error(context: &str, err: impl std::fmt::Display) -> std::io::Error {
    log::error!("{}: {}", context, err);
    std::io::Error::other(format!("{}: {}", context, err))
}

#[actix_web::main]
async fn main() -> std::io::Result<()> {
    dotenv::dotenv().ok();
    env_logger::init_from_env(env_logger::Env::new().default_filter_or("info"));

    let config = AppConfig::from_env().map_err(|e| startup_error("Invalid configuration", e))?;
    log::info!(
        "Pipeline config v{}: max edge {}px, JPEG quality {}",
        config.pipeline.version,
        config.pipeline.image.max_edge,
        config.pipeline.image.jpeg_quality
    );

    // Initialize AWS configuration
    let aws_config = aws_config::defaults(BehaviorVersion::latest()).load().await;
    let dynamodb_client = DynamoDbClient::new(&aws_config);
    let s3_client = S3Client::new(&aws_config);

    let recorder = DynamoHistoryRecorder::new(
        HistoryRepository::new(dynamodb_client, config.history_table.clone()),
        S3Service::new(s3_client, config.s3_bucket.clone()),
    );

    let validator = ValidatorClient::new(
        config.validator_url.clone(),
        config.validator_api_key.clone(),
        &config.pipeline.validator,
    )
    .map_err(|e| startup_error("Failed to build validator client", e))?;
    if validator.is_configured() {
        log::info!("Image validator: {}", config.validator_url);
    } else {
        log::warn!("VALIDATOR_API_KEY is not set; every image will be rejected as not retinal");
    }

    let classifier = ClassifierClient::new(
        config.classifier_url.clone(),
        config.classifier_api_key.clone(),
        &config.pipeline.classifier,
    )
    .map_err(|e| startup_error("Failed to build classifier client", e))?;
    log::info!("Disease classifier: {}", config.classifier_url);

    let pipeline = DetectionPipeline::new(
        SessionStore::new(),
        validator,
        classifier,
        Arc::new(recorder),
        config.pipeline.image.clone(),
    );

    let jwt_service = JwtService::new(&config.jwt_secret, &config.jwt_audience);
    let auth_middleware = AuthMiddleware::new(jwt_service);

    let bind_address = format!("0.0.0.0:{}", config.port);
    log::info!("Starting server on {}", bind_address);

    HttpServer::new(move || {
        App::new()
            .wrap(
                Cors::default()
                    .allow_any_origin()
                    .allowed_methods(vec!["GET", "POST", "DELETE", "OPTIONS"])
                    .allowed_headers(vec![
                        actix_web::http::header::AUTHORIZATION,
                        actix_web::http::header::ACCEPT,
                        actix_web::http::header::CONTENT_TYPE,
                    ])
                    .max_age(3600),
            )
            .app_data(web::Data::new(pipeline.clone()))
            .configure(|cfg| configure_routes(cfg, auth_middleware.clone()))
    })
    .bind(&bind_address)?
    .run()
    .await
}
