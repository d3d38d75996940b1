use serde::{Deserialize, Serialize};
use utoipa::ToSchema;

/// 凭证类型，防止批次凭证被当作单票凭证重放（反之亦然）
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, ToSchema)]
#[serde(rename_all = "lowercase")]
pub enum CredentialKind {
    Batch,
    Ticket,
}

/// 参与签名的载荷
///
/// 字段顺序固定，序列化后的 JSON 即为签名原文；缺省字段不输出。
#[derive(Debug, Clone, Serialize, PartialEq, Eq)]
pub struct CredentialPayload {
    pub session: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub batch: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub ticket: Option<String>,
    pub kind: CredentialKind,
}

impl CredentialPayload {
    pub fn batch(session: &str, batch_id: &str) -> Self {
        Self {
            session: session.to_string(),
            batch: Some(batch_id.to_string()),
            ticket: None,
            kind: CredentialKind::Batch,
        }
    }

    pub fn ticket(session: &str, ticket_id: &str) -> Self {
        Self {
            session: session.to_string(),
            batch: None,
            ticket: Some(ticket_id.to_string()),
            kind: CredentialKind::Ticket,
        }
    }
}

/// 批次二维码内容
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq, ToSchema)]
pub struct QrPayload {
    #[schema(example = "482913")]
    pub session: String,
    #[schema(example = "K7QX")]
    pub batch: String,
    pub kind: CredentialKind,
    pub sig: String,
}

/// 单票二维码签名
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq, ToSchema)]
#[serde(rename_all = "camelCase")]
pub struct TicketCredential {
    #[schema(example = "K7QX-01")]
    pub ticket_id: String,
    pub sig: String,
}

/// 扫码验票结果
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, ToSchema)]
#[serde(rename_all = "camelCase")]
pub enum VerifyResult {
    Valid,
    NotWinner,
    WrongEvent,
    AlreadyClaimed,
    Invalid,
}

#[derive(Debug, Clone, Serialize, Deserialize, ToSchema)]
#[serde(rename_all = "camelCase")]
pub struct VerifyTicketRequest {
    /// 为空时按批次凭证验票
    pub ticket_id: Option<String>,
    pub batch_id: String,
    pub sig: String,
    /// 二维码中携带的场次号
    pub session_id: String,
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq, ToSchema)]
#[serde(rename_all = "camelCase")]
pub struct VerifyTicketResponse {
    pub result: VerifyResult,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub ticket_id: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub batch_id: Option<String>,
}

impl VerifyTicketResponse {
    pub fn outcome(result: VerifyResult) -> Self {
        Self {
            result,
            ticket_id: None,
            batch_id: None,
        }
    }

    pub fn valid(ticket_id: &str, batch_id: &str) -> Self {
        Self {
            result: VerifyResult::Valid,
            ticket_id: Some(ticket_id.to_string()),
            batch_id: Some(batch_id.to_string()),
        }
    }
}
