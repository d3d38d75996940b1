pub mod session;
pub mod ticket;
pub mod draw;

use crate::error::{AppError, AppResult};
use crate::models::{ApiResponse, HostRequest};
use actix_web::{HttpResponse, ResponseError, Result, web};
use serde::Serialize;

/// 统一包装为 `{"success": true, "data": ...}`，错误交给 `AppError` 渲染
pub(crate) fn respond<T: Serialize>(result: AppResult<T>) -> Result<HttpResponse> {
    match result {
        Ok(data) => Ok(HttpResponse::Ok().json(ApiResponse::success(data))),
        Err(e) => Ok(e.error_response()),
    }
}

/// 主持人操作的请求体可以省略
pub(crate) fn passcode_of(body: &Option<web::Json<HostRequest>>) -> Option<&str> {
    body.as_ref().and_then(|b| b.passcode.as_deref())
}

/// 请求体解析失败统一返回 400
pub fn json_config() -> web::JsonConfig {
    web::JsonConfig::default()
        .limit(16 * 1024)
        .error_handler(|err, _req| {
            AppError::ValidationError(format!("Invalid request body: {err}")).into()
        })
}

pub fn session_config(cfg: &mut web::ServiceConfig) {
    cfg.service(
        web::scope("/session")
            .route("", web::post().to(session::create_session))
            .route("/{session_id}", web::get().to(session::get_session))
            .route("/{session_id}/dashboard", web::get().to(session::get_dashboard))
            .route("/{session_id}/verify-pin", web::post().to(session::verify_pin))
            .route(
                "/{session_id}/verify-passcode",
                web::post().to(session::verify_passcode),
            )
            .route("/{session_id}/batch", web::post().to(ticket::create_batch))
            .route("/{session_id}/claim", web::post().to(ticket::claim_batch))
            .route("/{session_id}/verify", web::post().to(ticket::verify_ticket))
            .route("/{session_id}/mark-claimed", web::post().to(ticket::mark_claimed))
            .route("/{session_id}/lock", web::post().to(draw::lock))
            .route("/{session_id}/reopen", web::post().to(draw::reopen))
            .route("/{session_id}/draw", web::post().to(draw::draw))
            .route("/{session_id}/redraw", web::post().to(draw::redraw))
            .route("/{session_id}/confirm-claim", web::post().to(draw::confirm_claim))
            .route("/{session_id}/close", web::post().to(draw::close)),
    );
}
