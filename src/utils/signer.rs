use crate::error::AppResult;
use crate::models::{CredentialPayload, QrPayload, TicketCredential};
use jsonwebtoken::{Algorithm, DecodingKey, EncodingKey, crypto};

/// 凭证校验结论（不区分"签名错误"的具体原因）
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CredentialCheck {
    Valid,
    /// 凭证中的场次号与当前场次不一致
    WrongEvent,
    Invalid,
}

/// 票据 / 批次凭证签名器
///
/// HMAC-SHA256 作用于载荷的 JSON 编码，输出为无填充的 URL-safe base64。
/// 持有同一密钥的任何一方都可以离线验证凭证。
#[derive(Clone)]
pub struct TicketSigner {
    encoding_key: EncodingKey,
    decoding_key: DecodingKey,
}

impl TicketSigner {
    pub fn new(secret: &str) -> Self {
        Self {
            encoding_key: EncodingKey::from_secret(secret.as_bytes()),
            decoding_key: DecodingKey::from_secret(secret.as_bytes()),
        }
    }

    pub fn sign(&self, payload: &CredentialPayload) -> AppResult<String> {
        let message = serde_json::to_vec(payload)?;
        Ok(crypto::sign(&message, &self.encoding_key, Algorithm::HS256)?)
    }

    /// 重新计算签名并比较；格式错误的签名一律视为不通过
    pub fn verify(&self, payload: &CredentialPayload, signature: &str) -> bool {
        let Ok(message) = serde_json::to_vec(payload) else {
            return false;
        };
        crypto::verify(signature, &message, &self.decoding_key, Algorithm::HS256).unwrap_or(false)
    }

    /// 先比对场次号，再验签
    pub fn check(
        &self,
        expected_session: &str,
        payload: &CredentialPayload,
        signature: &str,
    ) -> CredentialCheck {
        if payload.session != expected_session {
            return CredentialCheck::WrongEvent;
        }
        if self.verify(payload, signature) {
            CredentialCheck::Valid
        } else {
            CredentialCheck::Invalid
        }
    }

    /// 生成批次二维码载荷
    pub fn batch_qr_payload(&self, session_id: &str, batch_id: &str) -> AppResult<QrPayload> {
        let payload = CredentialPayload::batch(session_id, batch_id);
        let sig = self.sign(&payload)?;
        Ok(QrPayload {
            session: payload.session,
            batch: batch_id.to_string(),
            kind: payload.kind,
            sig,
        })
    }

    /// 生成单票凭证
    pub fn ticket_credential(
        &self,
        session_id: &str,
        ticket_id: &str,
    ) -> AppResult<TicketCredential> {
        let sig = self.sign(&CredentialPayload::ticket(session_id, ticket_id))?;
        Ok(TicketCredential {
            ticket_id: ticket_id.to_string(),
            sig,
        })
    }
}
