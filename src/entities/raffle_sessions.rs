use chrono::{DateTime, Utc};
use sea_orm::entity::prelude::*;
use serde::{Deserialize, Serialize};

/// 抽奖场次实体
/// 说明:
/// - 每个场次一行, data 为完整快照 (场次信息 + batches + tickets)
/// - 每次变更整行覆盖写入 (upsert)，不做局部更新
/// - state / last_active_at 与 data 中的值保持一致，仅用于查询
#[derive(Clone, Debug, PartialEq, DeriveEntityModel, Eq, Serialize, Deserialize)]
#[sea_orm(table_name = "raffle_sessions")]
pub struct Model {
    /// 场次号 (6 位数字)
    #[sea_orm(primary_key, auto_increment = false)]
    pub session_id: String,
    /// OPEN / LOCKED / DRAWING / CLOSED
    pub state: String,
    /// 场次快照 JSON
    #[sea_orm(column_type = "Json")]
    pub data: Json,
    pub created_at: DateTime<Utc>,
    pub last_active_at: DateTime<Utc>,
}

#[derive(Copy, Clone, Debug, EnumIter, DeriveRelation)]
pub enum Relation {}

impl ActiveModelBehavior for ActiveModel {}
