use actix_multipart::Multipart;
use actix_web::{web, HttpResponse};
use futures::{StreamExt, TryStreamExt};
use log::info;
use shared::{DiseaseSlug, HealthResponse, RunId, SymptomAnswers};
use std::str::FromStr;
use uuid::Uuid;

use crate::auth::middleware::{AuthMiddleware, AuthenticatedUser};
use crate::error::ApiError;
use crate::pipeline::DetectionPipeline;
use crate::preprocess::{PreprocessError, UploadedImage};

const IMAGE_FIELD: &str = "image";

pub fn configure_routes(cfg: &mut web::ServiceConfig, auth_middleware: AuthMiddleware) {
    cfg.app_data(
        web::JsonConfig::default()
            .error_handler(|err, _| ApiError::BadRequest(err.to_string()).into()),
    )
    .app_data(
        web::PathConfig::default()
            .error_handler(|err, _| ApiError::BadRequest(err.to_string()).into()),
    )
    .service(web::resource("/api/health").route(web::get().to(health)))
    .service(web::resource("/api/diseases").route(web::get().to(list_diseases)))
    .service(web::resource("/api/diseases/{slug}").route(web::get().to(get_disease)))
    .service(
        web::scope("/api")
            .wrap(auth_middleware)
            .service(
                web::resource("/detect")
                    .route(web::post().to(detect))
                    .route(web::delete().to(reset)),
            )
            .service(web::resource("/detect/{run_id}").route(web::get().to(run_status)))
            .service(
                web::resource("/detect/{run_id}/classify")
                    .route(web::post().to(retry_classification)),
            )
            .service(web::resource("/detect/{run_id}/diagnosis").route(web::post().to(diagnose)))
            .service(web::resource("/history").route(web::get().to(list_history)))
            .service(
                web::resource("/history/{record_id}").route(web::delete().to(delete_history)),
            ),
    );
}

async fn health(pipeline: web::Data<DetectionPipeline>) -> HttpResponse {
    HttpResponse::Ok().json(HealthResponse {
        status: "ok".to_string(),
        validator_configured: pipeline.validator_configured(),
    })
}

async fn list_diseases() -> HttpResponse {
    HttpResponse::Ok().json(DiseaseSlug::catalog())
}

async fn get_disease(slug: web::Path<String>) -> Result<HttpResponse, ApiError> {
    let slug = DiseaseSlug::from_str(&slug)
        .map_err(|_| ApiError::NotFound(format!("disease '{}'", slug)))?;
    Ok(HttpResponse::Ok().json(slug.info()))
}

/// Reads the `image` field, refusing to buffer more than `limit` bytes.
async fn read_image_field(mut payload: Multipart, limit: usize) -> Result<UploadedImage, ApiError> {
    while let Some(mut field) = payload
        .try_next()
        .await
        .map_err(|e| ApiError::BadRequest(e.to_string()))?
    {
        if field.name() != Some(IMAGE_FIELD) {
            continue;
        }

        let mime_type = field
            .content_type()
            .map(|mime| mime.essence_str().to_string())
            .unwrap_or_else(|| "application/octet-stream".to_string());
        let file_name = field
            .content_disposition()
            .and_then(|cd| cd.get_filename())
            .map(str::to_string);

        let mut bytes = Vec::new();
        while let Some(chunk) = field.next().await {
            let chunk = chunk.map_err(|e| ApiError::BadRequest(e.to_string()))?;
            if bytes.len() + chunk.len() > limit {
                return Err(PreprocessError::TooLarge {
                    size: bytes.len() + chunk.len(),
                    limit,
                }
                .into());
            }
            bytes.extend_from_slice(&chunk);
        }

        return Ok(UploadedImage {
            bytes,
            mime_type,
            file_name,
        });
    }

    Err(ApiError::BadRequest(format!(
        "multipart field '{}' is required",
        IMAGE_FIELD
    )))
}

async fn detect(
    user: AuthenticatedUser,
    pipeline: web::Data<DetectionPipeline>,
    payload: Multipart,
) -> Result<HttpResponse, ApiError> {
    let upload = read_image_field(payload, pipeline.upload_limit()).await?;
    info!(
        "Detection upload from user {}: {:?} ({})",
        user.0, upload.file_name, upload.mime_type
    );
    let response = pipeline.start(user.0, upload).await?;
    Ok(HttpResponse::Ok().json(response))
}

async fn retry_classification(
    user: AuthenticatedUser,
    pipeline: web::Data<DetectionPipeline>,
    run_id: web::Path<RunId>,
) -> Result<HttpResponse, ApiError> {
    let response = pipeline
        .retry_classification(user.0, run_id.into_inner())
        .await?;
    Ok(HttpResponse::Ok().json(response))
}

async fn diagnose(
    user: AuthenticatedUser,
    pipeline: web::Data<DetectionPipeline>,
    run_id: web::Path<RunId>,
    answers: web::Json<SymptomAnswers>,
) -> Result<HttpResponse, ApiError> {
    let response = pipeline.diagnose(user.0, run_id.into_inner(), answers.into_inner())?;
    Ok(HttpResponse::Ok().json(response))
}

async fn run_status(
    user: AuthenticatedUser,
    pipeline: web::Data<DetectionPipeline>,
    run_id: web::Path<RunId>,
) -> Result<HttpResponse, ApiError> {
    let state = pipeline.status(user.0, run_id.into_inner())?;
    Ok(HttpResponse::Ok().json(state))
}

async fn reset(user: AuthenticatedUser, pipeline: web::Data<DetectionPipeline>) -> HttpResponse {
    pipeline.reset(user.0);
    HttpResponse::NoContent().finish()
}

async fn list_history(
    user: AuthenticatedUser,
    pipeline: web::Data<DetectionPipeline>,
) -> Result<HttpResponse, ApiError> {
    let records = pipeline.recorder().list(user.0).await?;
    Ok(HttpResponse::Ok().json(records))
}

async fn delete_history(
    user: AuthenticatedUser,
    pipeline: web::Data<DetectionPipeline>,
    record_id: web::Path<Uuid>,
) -> Result<HttpResponse, ApiError> {
    let record_id = record_id.into_inner();
    if pipeline.recorder().delete(user.0, record_id).await? {
        info!("User {} deleted history record {}", user.0, record_id);
        Ok(HttpResponse::NoContent().finish())
    } else {
        Err(ApiError::NotFound(format!("history record {}", record_id)))
    }
}
