use super::respond;
use crate::models::*;
use crate::services::SessionRegistry;
use actix_web::{HttpResponse, Result, web};

#[utoipa::path(
    post,
    path = "/session/{session_id}/batch",
    tag = "ticket",
    params(("session_id" = String, Path, description = "6 位场次号")),
    request_body = CreateBatchRequest,
    responses(
        (status = 200, description = "发放批次成功，返回二维码载荷", body = CreateBatchResponse),
        (status = 400, description = "票数或标签不合法"),
        (status = 401, description = "主持人口令错误"),
        (status = 409, description = "报名已截止")
    )
)]
pub async fn create_batch(
    registry: web::Data<SessionRegistry>,
    path: web::Path<String>,
    request: web::Json<CreateBatchRequest>,
) -> Result<HttpResponse> {
    let CreateBatchRequest {
        ticket_count,
        label,
        passcode,
    } = request.into_inner();

    let result = async {
        let mut session = registry.acquire(&path).await?;
        session
            .create_batch(ticket_count, label, passcode.as_deref())
            .await
    }
    .await;
    respond(result)
}

#[utoipa::path(
    post,
    path = "/session/{session_id}/claim",
    tag = "ticket",
    params(("session_id" = String, Path, description = "6 位场次号")),
    request_body = ClaimBatchRequest,
    responses(
        (status = 200, description = "领取成功，返回票号及单票凭证", body = ClaimBatchResponse),
        (status = 401, description = "签名无效"),
        (status = 404, description = "批次不存在"),
        (status = 409, description = "批次已被领取")
    )
)]
/// 参与者扫描批次二维码后领取全部票据（每个批次只能领取一次）
pub async fn claim_batch(
    registry: web::Data<SessionRegistry>,
    path: web::Path<String>,
    request: web::Json<ClaimBatchRequest>,
) -> Result<HttpResponse> {
    let result = async {
        let mut session = registry.acquire(&path).await?;
        session.claim_batch(&request.batch_id, &request.sig).await
    }
    .await;
    respond(result)
}

#[utoipa::path(
    post,
    path = "/session/{session_id}/verify",
    tag = "ticket",
    params(("session_id" = String, Path, description = "6 位场次号")),
    request_body = VerifyTicketRequest,
    responses(
        (status = 200, description = "验票结论: valid / notWinner / wrongEvent / alreadyClaimed / invalid", body = VerifyTicketResponse),
        (status = 404, description = "场次不存在")
    )
)]
pub async fn verify_ticket(
    registry: web::Data<SessionRegistry>,
    path: web::Path<String>,
    request: web::Json<VerifyTicketRequest>,
) -> Result<HttpResponse> {
    let result = async {
        let mut session = registry.acquire(&path).await?;
        session.verify_ticket(&request).await
    }
    .await;
    respond(result)
}

#[utoipa::path(
    post,
    path = "/session/{session_id}/mark-claimed",
    tag = "ticket",
    params(("session_id" = String, Path, description = "6 位场次号")),
    request_body = MarkClaimedRequest,
    responses(
        (status = 200, description = "登记领奖成功", body = SuccessResponse),
        (status = 400, description = "不是中奖票"),
        (status = 401, description = "主持人口令错误"),
        (status = 409, description = "已领奖")
    )
)]
pub async fn mark_claimed(
    registry: web::Data<SessionRegistry>,
    path: web::Path<String>,
    request: web::Json<MarkClaimedRequest>,
) -> Result<HttpResponse> {
    let result = async {
        let mut session = registry.acquire(&path).await?;
        session
            .mark_claimed(&request.ticket_id, request.passcode.as_deref())
            .await
    }
    .await;
    respond(result)
}
