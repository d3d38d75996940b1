use crate::entities::raffle_session_entity as sessions;
use crate::error::{AppError, AppResult};
use crate::models::SessionRecord;
use crate::services::SessionStorage;
use async_trait::async_trait;
use sea_orm::sea_query::OnConflict;
use sea_orm::{DatabaseConnection, EntityTrait, PaginatorTrait, Set};
use std::collections::HashMap;
use tokio::sync::RwLock;

/// 场次快照存储
///
/// 每次 `save` 都是整条记录的原子覆盖；实现方不得重试写入。
#[async_trait]
pub trait SessionStore: Send + Sync {
    async fn load(&self, session_id: &str) -> AppResult<Option<SessionStorage>>;

    async fn save(&self, storage: &SessionStorage) -> AppResult<()>;

    async fn exists(&self, session_id: &str) -> AppResult<bool>;
}

fn record_of(storage: &SessionStorage) -> AppResult<&SessionRecord> {
    storage.session.as_ref().ok_or_else(|| {
        AppError::InternalError("Cannot persist a session without a record".to_string())
    })
}

/// 数据库存储 (Postgres / SQLite)
#[derive(Clone)]
pub struct DbSessionStore {
    pool: DatabaseConnection,
}

impl DbSessionStore {
    pub fn new(pool: DatabaseConnection) -> Self {
        Self { pool }
    }
}

#[async_trait]
impl SessionStore for DbSessionStore {
    async fn load(&self, session_id: &str) -> AppResult<Option<SessionStorage>> {
        let model = sessions::Entity::find_by_id(session_id.to_string())
            .one(&self.pool)
            .await?;

        match model {
            Some(m) => Ok(Some(serde_json::from_value(m.data)?)),
            None => Ok(None),
        }
    }

    async fn save(&self, storage: &SessionStorage) -> AppResult<()> {
        let record = record_of(storage)?;

        let model = sessions::ActiveModel {
            session_id: Set(record.session_id.clone()),
            state: Set(record.state.to_string()),
            data: Set(serde_json::to_value(storage)?),
            created_at: Set(record.created_at),
            last_active_at: Set(record.last_active_at),
        };

        // 单条 upsert 语句，整行覆盖
        sessions::Entity::insert(model)
            .on_conflict(
                OnConflict::column(sessions::Column::SessionId)
                    .update_columns([
                        sessions::Column::State,
                        sessions::Column::Data,
                        sessions::Column::LastActiveAt,
                    ])
                    .to_owned(),
            )
            .exec_without_returning(&self.pool)
            .await?;

        Ok(())
    }

    async fn exists(&self, session_id: &str) -> AppResult<bool> {
        let count = sessions::Entity::find_by_id(session_id.to_string())
            .count(&self.pool)
            .await?;
        Ok(count > 0)
    }
}

/// 进程内存储（本地调试与测试使用）
///
/// 与数据库存储一样保存序列化后的 JSON，读写路径一致。
#[derive(Default)]
pub struct MemorySessionStore {
    records: RwLock<HashMap<String, serde_json::Value>>,
}

impl MemorySessionStore {
    pub fn new() -> Self {
        Self::default()
    }

    pub async fn record_count(&self) -> usize {
        self.records.read().await.len()
    }
}

#[async_trait]
impl SessionStore for MemorySessionStore {
    async fn load(&self, session_id: &str) -> AppResult<Option<SessionStorage>> {
        match self.records.read().await.get(session_id) {
            Some(value) => Ok(Some(serde_json::from_value(value.clone())?)),
            None => Ok(None),
        }
    }

    async fn save(&self, storage: &SessionStorage) -> AppResult<()> {
        let session_id = record_of(storage)?.session_id.clone();
        let value = serde_json::to_value(storage)?;
        self.records.write().await.insert(session_id, value);
        Ok(())
    }

    async fn exists(&self, session_id: &str) -> AppResult<bool> {
        Ok(self.records.read().await.contains_key(session_id))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::DatabaseConfig;
    use crate::database::{create_pool, run_migrations};
    use crate::models::{Language, SessionState, Theme};
    use chrono::{TimeZone, Utc};
    use rand::SeedableRng;
    use rand::rngs::StdRng;

    fn sample_storage(session_id: &str) -> SessionStorage {
        let now = Utc.timestamp_millis_opt(1_760_000_000_123).unwrap();
        let mut storage = SessionStorage {
            session: Some(SessionRecord {
                session_id: session_id.to_string(),
                event_name: "Spring Gala".into(),
                language: Language::Ja,
                theme: Theme::Halloween,
                pin_hash: "hash".into(),
                passcode_hash: None,
                redraw_return_to_pool: true,
                state: SessionState::Open,
                current_winner: None,
                created_at: now,
                last_active_at: now,
            }),
            ..Default::default()
        };
        let mut rng = StdRng::seed_from_u64(11);
        let batch = storage
            .ledger
            .create_batch(3, Some("Table 7".into()), now, &mut rng);
        storage.ledger.claim_batch(&batch.batch_id, now).unwrap();
        storage
    }

    async fn sqlite_store() -> DbSessionStore {
        let pool = create_pool(&DatabaseConfig {
            url: "sqlite::memory:".to_string(),
            max_connections: 1,
        })
        .await
        .unwrap();
        run_migrations(&pool).await.unwrap();
        DbSessionStore::new(pool)
    }

    #[tokio::test]
    async fn test_db_store_round_trip_and_overwrite() {
        let store = sqlite_store().await;
        assert!(store.load("482913").await.unwrap().is_none());
        assert!(!store.exists("482913").await.unwrap());

        let mut storage = sample_storage("482913");
        store.save(&storage).await.unwrap();
        assert!(store.exists("482913").await.unwrap());
        assert_eq!(store.load("482913").await.unwrap().unwrap(), storage);

        storage.session.as_mut().unwrap().state = SessionState::Locked;
        store.save(&storage).await.unwrap();
        let loaded = store.load("482913").await.unwrap().unwrap();
        assert_eq!(loaded.session.unwrap().state, SessionState::Locked);
        assert_eq!(loaded.ledger, storage.ledger);
    }

    #[tokio::test]
    async fn test_memory_store_round_trip() {
        let store = MemorySessionStore::new();
        let storage = sample_storage("100200");
        store.save(&storage).await.unwrap();

        assert_eq!(store.record_count().await, 1);
        assert!(store.exists("100200").await.unwrap());
        assert_eq!(store.load("100200").await.unwrap().unwrap(), storage);
    }

    #[tokio::test]
    async fn test_save_without_record_is_rejected() {
        let store = MemorySessionStore::new();
        let result = store.save(&SessionStorage::default()).await;
        assert!(matches!(result, Err(AppError::InternalError(_))));
        assert_eq!(store.record_count().await, 0);
    }
}
