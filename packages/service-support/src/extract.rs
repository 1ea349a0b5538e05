//! Extractor configuration that keeps malformed input in problem-details form.

use actix_web::error::{JsonPayloadError, PathError, QueryPayloadError};
use actix_web::{web, HttpRequest};

use crate::error::AppError;
use crate::error_code::ErrorCode;

fn json_error(err: JsonPayloadError, _req: &HttpRequest) -> actix_web::Error {
    AppError::invalid(ErrorCode::BadRequest, format!("invalid JSON body: {err}")).into()
}

fn path_error(err: PathError, _req: &HttpRequest) -> actix_web::Error {
    AppError::invalid(ErrorCode::BadRequest, format!("invalid path parameter: {err}")).into()
}

fn query_error(err: QueryPayloadError, _req: &HttpRequest) -> actix_web::Error {
    AppError::invalid(ErrorCode::BadRequest, format!("invalid query string: {err}")).into()
}

/// Registers JSON, path and query extractor configs on `cfg`.
pub fn configure_extractors(cfg: &mut web::ServiceConfig) {
    cfg.app_data(web::JsonConfig::default().error_handler(json_error))
        .app_data(web::PathConfig::default().error_handler(path_error))
        .app_data(web::QueryConfig::default().error_handler(query_error));
}
