use crate::error::{AppError, AppResult};
use crate::models::{CreateSessionCommand, CreateSessionRequest, CreateSessionResponse};
use crate::services::{RaffleSession, SessionStore};
use crate::utils::{TicketSigner, generate_six_digit_code, validate_pin};
use chrono::{Duration, Utc};
use std::collections::HashMap;
use std::sync::Arc;
use tokio::sync::{Mutex, OwnedMutexGuard, RwLock};

/// 生成场次号的最大尝试次数
const MAX_CODE_ATTEMPTS: usize = 20;

pub type SessionHandle = Arc<Mutex<RaffleSession>>;

/// 场次注册表：场次号 -> 场次 Actor
///
/// 外层 `RwLock` 只在查找/插入时短暂持有，命令执行期间只持有对应场次自己的锁。
#[derive(Clone)]
pub struct SessionRegistry {
    sessions: Arc<RwLock<HashMap<String, SessionHandle>>>,
    store: Arc<dyn SessionStore>,
    signer: TicketSigner,
    pin_hash_cost: u32,
}

impl SessionRegistry {
    pub fn new(store: Arc<dyn SessionStore>, signer: TicketSigner, pin_hash_cost: u32) -> Self {
        Self {
            sessions: Arc::new(RwLock::new(HashMap::new())),
            store,
            signer,
            pin_hash_cost,
        }
    }

    /// 获取场次并加锁（首次访问时从存储加载）
    ///
    /// 场次号格式不合法时直接返回 NotFound，不创建实例。
    pub async fn acquire(&self, session_id: &str) -> AppResult<OwnedMutexGuard<RaffleSession>> {
        if validate_pin(session_id).is_err() {
            return Err(AppError::NotFound("Session not found".to_string()));
        }

        let handle = self.handle(session_id).await;
        let mut session = handle.lock_owned().await;
        session.ensure_loaded().await?;
        Ok(session)
    }

    /// 创建新场次，场次号同时作为 PIN
    pub async fn create_session(
        &self,
        request: CreateSessionRequest,
    ) -> AppResult<CreateSessionResponse> {
        for _ in 0..MAX_CODE_ATTEMPTS {
            let code = generate_six_digit_code(&mut rand::thread_rng());

            if self.store.exists(&code).await? {
                log::debug!("Session code {code} already in use, drawing again");
                continue;
            }

            let mut session = self.acquire(&code).await?;
            let result = session
                .create(CreateSessionCommand {
                    event_name: request.event_name.clone(),
                    language: request.language.unwrap_or_default(),
                    theme: request.theme.unwrap_or_default(),
                    pin: code.clone(),
                    passcode: request.passcode.clone(),
                    redraw_return_to_pool: request.redraw_return_to_pool.unwrap_or(true),
                })
                .await;

            // 并发创建抢到了同一个场次号
            if let Err(AppError::Conflict(_)) = result {
                log::debug!("Session code {code} taken concurrently, drawing again");
                continue;
            }
            return result;
        }

        Err(AppError::InternalError(
            "Could not allocate a session code".to_string(),
        ))
    }

    /// 移除空闲实例，返回移除数量
    ///
    /// 只移除没有其他持有者且未被锁定的实例，持久化数据不受影响。
    pub async fn evict_idle(&self, max_idle: Duration) -> usize {
        let now = Utc::now();
        let mut sessions = self.sessions.write().await;
        let before = sessions.len();

        sessions.retain(|_, handle| {
            if Arc::strong_count(handle) > 1 {
                return true;
            }
            match handle.try_lock() {
                Ok(session) => !session.is_idle(now, max_idle),
                Err(_) => true,
            }
        });

        before - sessions.len()
    }

    /// 当前内存中的场次实例数
    pub async fn active_sessions(&self) -> usize {
        self.sessions.read().await.len()
    }

    async fn handle(&self, session_id: &str) -> SessionHandle {
        if let Some(handle) = self.sessions.read().await.get(session_id) {
            return handle.clone();
        }

        let mut sessions = self.sessions.write().await;
        sessions
            .entry(session_id.to_string())
            .or_insert_with(|| {
                Arc::new(Mutex::new(RaffleSession::new(
                    session_id,
                    self.store.clone(),
                    self.signer.clone(),
                    self.pin_hash_cost,
                )))
            })
            .clone()
    }
}
