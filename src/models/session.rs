use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use utoipa::ToSchema;

use super::{BatchSummary, WinnerSummary};

/// 场次状态机
///
/// OPEN -> LOCKED -> DRAWING -> LOCKED ... -> CLOSED
/// 前端使用的 CLAIMING 不是存储状态，由 `display_state` 推导
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, ToSchema)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum SessionState {
    Open,
    Locked,
    Drawing,
    Closed,
}

impl std::fmt::Display for SessionState {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            SessionState::Open => write!(f, "OPEN"),
            SessionState::Locked => write!(f, "LOCKED"),
            SessionState::Drawing => write!(f, "DRAWING"),
            SessionState::Closed => write!(f, "CLOSED"),
        }
    }
}

#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Default, ToSchema)]
pub enum Language {
    #[default]
    #[serde(rename = "en")]
    En,
    #[serde(rename = "zh-TW")]
    ZhTw,
    #[serde(rename = "ja")]
    Ja,
}

#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Default, ToSchema)]
#[serde(rename_all = "kebab-case")]
pub enum Theme {
    #[default]
    Default,
    Ocean,
    Sunset,
    Forest,
    Purple,
    Gold,
    Rose,
    Light,
    // 节日主题
    ChineseNewYear,
    Halloween,
    Christmas,
    Valentines,
    Spring,
    Summer,
}

/// 当前待确认的中奖者，仅在 DRAWING 状态下存在
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq, ToSchema)]
#[serde(rename_all = "camelCase")]
pub struct CurrentWinner {
    pub ticket_id: String,
    pub batch_id: String,
    #[serde(with = "chrono::serde::ts_milliseconds")]
    #[schema(value_type = i64)]
    pub drawn_at: DateTime<Utc>,
    /// 领奖截止时间（仅用于前端倒计时，服务端不强制过期）
    #[serde(with = "chrono::serde::ts_milliseconds")]
    #[schema(value_type = i64)]
    pub claim_deadline: DateTime<Utc>,
}

/// 场次记录（持久化结构，不直接对外输出）
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "camelCase")]
pub struct SessionRecord {
    pub session_id: String,
    pub event_name: String,
    pub language: Language,
    pub theme: Theme,
    /// PIN 的 bcrypt 哈希，永不出现在任何响应中
    pub pin_hash: String,
    /// 主持人口令（4 位）的 bcrypt 哈希，未设置时主持人操作无需口令
    #[serde(default)]
    pub passcode_hash: Option<String>,
    /// 重抽时未领奖的票据是否放回奖池
    #[serde(default = "default_true")]
    pub redraw_return_to_pool: bool,
    pub state: SessionState,
    #[serde(default)]
    pub current_winner: Option<CurrentWinner>,
    #[serde(with = "chrono::serde::ts_milliseconds")]
    pub created_at: DateTime<Utc>,
    #[serde(with = "chrono::serde::ts_milliseconds")]
    pub last_active_at: DateTime<Utc>,
}

fn default_true() -> bool {
    true
}

impl SessionRecord {
    /// 展示状态：DRAWING 且存在待确认中奖者时显示为 CLAIMING
    pub fn display_state(&self) -> String {
        if self.state == SessionState::Drawing && self.current_winner.is_some() {
            "CLAIMING".to_string()
        } else {
            self.state.to_string()
        }
    }
}

// -----------------------------
// 请求 / 响应
// -----------------------------

#[derive(Debug, Clone, Serialize, Deserialize, ToSchema)]
#[serde(rename_all = "camelCase")]
pub struct CreateSessionRequest {
    #[schema(example = "Spring Gala 2026")]
    pub event_name: String,
    pub language: Option<Language>,
    pub theme: Option<Theme>,
    /// 可选的 4 位主持人口令
    #[schema(example = "2468")]
    pub passcode: Option<String>,
    pub redraw_return_to_pool: Option<bool>,
}

/// 场次创建命令（PIN 由调度层生成，等于场次号）
#[derive(Debug, Clone)]
pub struct CreateSessionCommand {
    pub event_name: String,
    pub language: Language,
    pub theme: Theme,
    pub pin: String,
    pub passcode: Option<String>,
    pub redraw_return_to_pool: bool,
}

#[derive(Debug, Clone, Serialize, Deserialize, ToSchema)]
#[serde(rename_all = "camelCase")]
pub struct CreateSessionResponse {
    #[schema(example = "482913")]
    pub session_id: String,
}

#[derive(Debug, Clone, Serialize, Deserialize, ToSchema)]
#[serde(rename_all = "camelCase")]
pub struct SessionStatusResponse {
    pub session_id: String,
    pub event_name: String,
    pub language: Language,
    pub theme: Theme,
    pub state: SessionState,
    /// OPEN / LOCKED / DRAWING / CLAIMING / CLOSED
    pub display_state: String,
    pub ticket_count: usize,
    /// 当前可参与抽奖的票数
    pub available_tickets: usize,
    pub batch_count: usize,
    pub claimed_batches: usize,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub current_winner: Option<CurrentWinner>,
}

/// 主持人看板
#[derive(Debug, Clone, Serialize, Deserialize, ToSchema)]
#[serde(rename_all = "camelCase")]
pub struct DashboardResponse {
    #[serde(flatten)]
    pub status: SessionStatusResponse,
    pub batches: Vec<BatchSummary>,
    pub winners: Vec<WinnerSummary>,
}

#[derive(Debug, Clone, Serialize, Deserialize, ToSchema)]
pub struct VerifyPinRequest {
    #[schema(example = "482913")]
    pub pin: String,
}

#[derive(Debug, Clone, Serialize, Deserialize, ToSchema)]
pub struct VerifyPasscodeRequest {
    #[schema(example = "2468")]
    pub passcode: String,
}

#[derive(Debug, Clone, Serialize, Deserialize, ToSchema)]
pub struct ValidResponse {
    pub valid: bool,
}

/// 主持人操作的公共请求体
#[derive(Debug, Clone, Default, Serialize, Deserialize, ToSchema)]
pub struct HostRequest {
    pub passcode: Option<String>,
}

#[derive(Debug, Clone, Serialize, Deserialize, ToSchema)]
pub struct StateChangeResponse {
    pub success: bool,
    pub state: SessionState,
}

#[derive(Debug, Clone, Serialize, Deserialize, ToSchema)]
pub struct SuccessResponse {
    pub success: bool,
}
