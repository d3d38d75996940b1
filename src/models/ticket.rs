use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use utoipa::ToSchema;

use super::{QrPayload, TicketCredential};

/// 每个批次的票数范围
pub const MIN_TICKETS_PER_BATCH: i64 = 1;
pub const MAX_TICKETS_PER_BATCH: i64 = 20;

#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, ToSchema)]
#[serde(rename_all = "lowercase")]
pub enum BatchStatus {
    Unclaimed,
    Claimed,
}

/// 票据批次：一张二维码发给一位参与者，可包含多张票
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "camelCase")]
pub struct TicketBatch {
    pub batch_id: String,
    pub ticket_count: u32,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub label: Option<String>,
    pub status: BatchStatus,
    #[serde(with = "chrono::serde::ts_milliseconds")]
    pub created_at: DateTime<Utc>,
    #[serde(
        default,
        with = "chrono::serde::ts_milliseconds_option",
        skip_serializing_if = "Option::is_none"
    )]
    pub claimed_at: Option<DateTime<Utc>>,
}

/// 单张抽奖票
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "camelCase")]
pub struct Ticket {
    /// `<batchId>-<两位序号>`
    pub ticket_id: String,
    pub batch_id: String,
    /// 批次内序号，从 1 开始
    pub index: u32,
    pub is_winner: bool,
    /// 重抽时被作废（仅在场次关闭了"放回奖池"时出现）
    #[serde(default)]
    pub forfeited: bool,
    /// 奖品已实际发放的时间
    #[serde(
        default,
        with = "chrono::serde::ts_milliseconds_option",
        skip_serializing_if = "Option::is_none"
    )]
    pub claimed_at: Option<DateTime<Utc>>,
}

impl Ticket {
    pub fn ticket_id_for(batch_id: &str, index: u32) -> String {
        format!("{batch_id}-{index:02}")
    }
}

// -----------------------------
// 请求 / 响应
// -----------------------------

#[derive(Debug, Clone, Serialize, Deserialize, ToSchema)]
#[serde(rename_all = "camelCase")]
pub struct CreateBatchRequest {
    #[schema(example = 3)]
    pub ticket_count: i64,
    #[schema(example = "Table 7")]
    pub label: Option<String>,
    pub passcode: Option<String>,
}

#[derive(Debug, Clone, Serialize, Deserialize, ToSchema)]
#[serde(rename_all = "camelCase")]
pub struct CreateBatchResponse {
    pub batch_id: String,
    pub ticket_count: u32,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub label: Option<String>,
    /// 嵌入二维码的签名载荷
    pub qr_payload: QrPayload,
}

#[derive(Debug, Clone, Serialize, Deserialize, ToSchema)]
#[serde(rename_all = "camelCase")]
pub struct ClaimBatchRequest {
    #[schema(example = "K7QX")]
    pub batch_id: String,
    pub sig: String,
}

#[derive(Debug, Clone, Serialize, Deserialize, ToSchema)]
#[serde(rename_all = "camelCase")]
pub struct ClaimBatchResponse {
    pub success: bool,
    pub batch_id: String,
    pub ticket_ids: Vec<String>,
    /// 每张票的签名，用于在参与者设备上渲染单票二维码
    pub ticket_credentials: Vec<TicketCredential>,
}

#[derive(Debug, Clone, Serialize, Deserialize, ToSchema)]
#[serde(rename_all = "camelCase")]
pub struct DrawResponse {
    pub ticket_id: String,
    pub batch_id: String,
    pub ticket_index: u32,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub batch_label: Option<String>,
    #[serde(with = "chrono::serde::ts_milliseconds")]
    #[schema(value_type = i64)]
    pub claim_deadline: DateTime<Utc>,
}

#[derive(Debug, Clone, Serialize, Deserialize, ToSchema)]
#[serde(rename_all = "camelCase")]
pub struct MarkClaimedRequest {
    pub ticket_id: String,
    pub passcode: Option<String>,
}

/// 看板中的批次信息
#[derive(Debug, Clone, Serialize, Deserialize, ToSchema)]
#[serde(rename_all = "camelCase")]
pub struct BatchSummary {
    pub batch_id: String,
    pub ticket_count: u32,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub label: Option<String>,
    pub status: BatchStatus,
    #[serde(with = "chrono::serde::ts_milliseconds")]
    #[schema(value_type = i64)]
    pub created_at: DateTime<Utc>,
    #[serde(
        default,
        with = "chrono::serde::ts_milliseconds_option",
        skip_serializing_if = "Option::is_none"
    )]
    #[schema(value_type = Option<i64>)]
    pub claimed_at: Option<DateTime<Utc>>,
}

impl From<&TicketBatch> for BatchSummary {
    fn from(b: &TicketBatch) -> Self {
        BatchSummary {
            batch_id: b.batch_id.clone(),
            ticket_count: b.ticket_count,
            label: b.label.clone(),
            status: b.status,
            created_at: b.created_at,
            claimed_at: b.claimed_at,
        }
    }
}

/// 看板中的中奖记录
#[derive(Debug, Clone, Serialize, Deserialize, ToSchema)]
#[serde(rename_all = "camelCase")]
pub struct WinnerSummary {
    pub ticket_id: String,
    pub batch_id: String,
    pub ticket_index: u32,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub batch_label: Option<String>,
    pub forfeited: bool,
    #[serde(
        default,
        with = "chrono::serde::ts_milliseconds_option",
        skip_serializing_if = "Option::is_none"
    )]
    #[schema(value_type = Option<i64>)]
    pub claimed_at: Option<DateTime<Utc>>,
}
