use crate::error::{AppError, AppResult};
use bcrypt::{hash, verify};
use regex::Regex;
use std::sync::LazyLock;

static PIN_RE: LazyLock<Regex> = LazyLock::new(|| Regex::new(r"^[0-9]{6}$").unwrap());
static PASSCODE_RE: LazyLock<Regex> = LazyLock::new(|| Regex::new(r"^[0-9]{4}$").unwrap());

/// 验证 PIN 格式（6 位数字，与场次号相同）
pub fn validate_pin(pin: &str) -> AppResult<()> {
    if !PIN_RE.is_match(pin) {
        return Err(AppError::ValidationError(
            "PIN must be exactly 6 digits".to_string(),
        ));
    }
    Ok(())
}

/// 验证主持人口令格式（4 位数字）
pub fn validate_passcode(passcode: &str) -> AppResult<()> {
    if !PASSCODE_RE.is_match(passcode) {
        return Err(AppError::ValidationError(
            "Passcode must be exactly 4 digits".to_string(),
        ));
    }
    Ok(())
}

/// 对 PIN / 口令进行哈希
pub fn hash_secret(value: &str, cost: u32) -> AppResult<String> {
    hash(value, cost).map_err(|e| AppError::InternalError(format!("Failed to hash secret: {e}")))
}

/// 校验 PIN / 口令
pub fn verify_secret(value: &str, hashed: &str) -> AppResult<bool> {
    verify(value, hashed)
        .map_err(|e| AppError::InternalError(format!("Failed to verify secret: {e}")))
}
