use super::{passcode_of, respond};
use crate::models::*;
use crate::services::SessionRegistry;
use actix_web::{HttpResponse, Result, web};

#[utoipa::path(
    post,
    path = "/session/{session_id}/lock",
    tag = "draw",
    params(("session_id" = String, Path, description = "6 位场次号")),
    request_body(content = HostRequest, description = "设置了口令的场次需携带口令"),
    responses(
        (status = 200, description = "已截止报名", body = StateChangeResponse),
        (status = 401, description = "主持人口令错误"),
        (status = 409, description = "当前状态不允许")
    )
)]
pub async fn lock(
    registry: web::Data<SessionRegistry>,
    path: web::Path<String>,
    body: Option<web::Json<HostRequest>>,
) -> Result<HttpResponse> {
    let result = async {
        let mut session = registry.acquire(&path).await?;
        session.lock(passcode_of(&body)).await
    }
    .await;
    respond(result)
}

#[utoipa::path(
    post,
    path = "/session/{session_id}/reopen",
    tag = "draw",
    params(("session_id" = String, Path, description = "6 位场次号")),
    request_body(content = HostRequest, description = "设置了口令的场次需携带口令"),
    responses(
        (status = 200, description = "重新开放报名", body = StateChangeResponse),
        (status = 401, description = "主持人口令错误"),
        (status = 409, description = "只有已截止的场次可以重新开放")
    )
)]
pub async fn reopen(
    registry: web::Data<SessionRegistry>,
    path: web::Path<String>,
    body: Option<web::Json<HostRequest>>,
) -> Result<HttpResponse> {
    let result = async {
        let mut session = registry.acquire(&path).await?;
        session.reopen(passcode_of(&body)).await
    }
    .await;
    respond(result)
}

#[utoipa::path(
    post,
    path = "/session/{session_id}/draw",
    tag = "draw",
    params(("session_id" = String, Path, description = "6 位场次号")),
    request_body(content = HostRequest, description = "设置了口令的场次需携带口令"),
    responses(
        (status = 200, description = "抽出中奖票，开始领奖倒计时", body = DrawResponse),
        (status = 401, description = "主持人口令错误"),
        (status = 409, description = "未截止报名或没有可抽票据")
    )
)]
pub async fn draw(
    registry: web::Data<SessionRegistry>,
    path: web::Path<String>,
    body: Option<web::Json<HostRequest>>,
) -> Result<HttpResponse> {
    let result = async {
        let mut session = registry.acquire(&path).await?;
        session.draw(passcode_of(&body)).await
    }
    .await;
    respond(result)
}

#[utoipa::path(
    post,
    path = "/session/{session_id}/redraw",
    tag = "draw",
    params(("session_id" = String, Path, description = "6 位场次号")),
    request_body(content = HostRequest, description = "设置了口令的场次需携带口令"),
    responses(
        (status = 200, description = "当前中奖者未领奖，重新抽取", body = DrawResponse),
        (status = 401, description = "主持人口令错误"),
        (status = 409, description = "没有进行中的抽奖或没有可抽票据")
    )
)]
pub async fn redraw(
    registry: web::Data<SessionRegistry>,
    path: web::Path<String>,
    body: Option<web::Json<HostRequest>>,
) -> Result<HttpResponse> {
    let result = async {
        let mut session = registry.acquire(&path).await?;
        session.redraw(passcode_of(&body)).await
    }
    .await;
    respond(result)
}

#[utoipa::path(
    post,
    path = "/session/{session_id}/confirm-claim",
    tag = "draw",
    params(("session_id" = String, Path, description = "6 位场次号")),
    request_body(content = HostRequest, description = "设置了口令的场次需携带口令"),
    responses(
        (status = 200, description = "确认领奖，回到截止报名状态", body = SuccessResponse),
        (status = 401, description = "主持人口令错误"),
        (status = 409, description = "没有待确认的中奖者")
    )
)]
pub async fn confirm_claim(
    registry: web::Data<SessionRegistry>,
    path: web::Path<String>,
    body: Option<web::Json<HostRequest>>,
) -> Result<HttpResponse> {
    let result = async {
        let mut session = registry.acquire(&path).await?;
        session.confirm_claim(passcode_of(&body)).await
    }
    .await;
    respond(result)
}

#[utoipa::path(
    post,
    path = "/session/{session_id}/close",
    tag = "draw",
    params(("session_id" = String, Path, description = "6 位场次号")),
    request_body(content = HostRequest, description = "设置了口令的场次需携带口令"),
    responses(
        (status = 200, description = "场次已关闭（不可恢复）", body = StateChangeResponse),
        (status = 401, description = "主持人口令错误")
    )
)]
pub async fn close(
    registry: web::Data<SessionRegistry>,
    path: web::Path<String>,
    body: Option<web::Json<HostRequest>>,
) -> Result<HttpResponse> {
    let result = async {
        let mut session = registry.acquire(&path).await?;
        session.close(passcode_of(&body)).await
    }
    .await;
    respond(result)
}
