use super::respond;
use crate::models::*;
use crate::services::SessionRegistry;
use actix_web::{HttpResponse, Result, web};

#[utoipa::path(
    post,
    path = "/session",
    tag = "session",
    request_body = CreateSessionRequest,
    responses(
        (status = 200, description = "创建场次成功，返回 6 位场次号（同时作为 PIN）", body = CreateSessionResponse),
        (status = 400, description = "请求参数错误")
    )
)]
pub async fn create_session(
    registry: web::Data<SessionRegistry>,
    request: web::Json<CreateSessionRequest>,
) -> Result<HttpResponse> {
    respond(registry.create_session(request.into_inner()).await)
}

#[utoipa::path(
    get,
    path = "/session/{session_id}",
    tag = "session",
    params(("session_id" = String, Path, description = "6 位场次号")),
    responses(
        (status = 200, description = "获取场次状态成功", body = SessionStatusResponse),
        (status = 404, description = "场次不存在")
    )
)]
pub async fn get_session(
    registry: web::Data<SessionRegistry>,
    path: web::Path<String>,
) -> Result<HttpResponse> {
    let result = async {
        let mut session = registry.acquire(&path).await?;
        session.status().await
    }
    .await;
    respond(result)
}

#[utoipa::path(
    get,
    path = "/session/{session_id}/dashboard",
    tag = "session",
    params(("session_id" = String, Path, description = "6 位场次号")),
    responses(
        (status = 200, description = "获取主持人看板成功", body = DashboardResponse),
        (status = 404, description = "场次不存在")
    )
)]
/// 主持人看板：场次状态 + 全部批次 + 中奖记录
pub async fn get_dashboard(
    registry: web::Data<SessionRegistry>,
    path: web::Path<String>,
) -> Result<HttpResponse> {
    let result = async {
        let mut session = registry.acquire(&path).await?;
        session.dashboard().await
    }
    .await;
    respond(result)
}

#[utoipa::path(
    post,
    path = "/session/{session_id}/verify-pin",
    tag = "session",
    params(("session_id" = String, Path, description = "6 位场次号")),
    request_body = VerifyPinRequest,
    responses(
        (status = 200, description = "校验结果", body = ValidResponse),
        (status = 404, description = "场次不存在")
    )
)]
pub async fn verify_pin(
    registry: web::Data<SessionRegistry>,
    path: web::Path<String>,
    request: web::Json<VerifyPinRequest>,
) -> Result<HttpResponse> {
    let result = async {
        let mut session = registry.acquire(&path).await?;
        session.verify_pin(&request.pin).await
    }
    .await;
    respond(result)
}

#[utoipa::path(
    post,
    path = "/session/{session_id}/verify-passcode",
    tag = "session",
    params(("session_id" = String, Path, description = "6 位场次号")),
    request_body = VerifyPasscodeRequest,
    responses(
        (status = 200, description = "校验结果；未设置口令时恒为 true", body = ValidResponse),
        (status = 404, description = "场次不存在")
    )
)]
pub async fn verify_passcode(
    registry: web::Data<SessionRegistry>,
    path: web::Path<String>,
    request: web::Json<VerifyPasscodeRequest>,
) -> Result<HttpResponse> {
    let result = async {
        let mut session = registry.acquire(&path).await?;
        session.verify_passcode(&request.passcode).await
    }
    .await;
    respond(result)
}
