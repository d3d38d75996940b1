use crate::error::{AppError, AppResult};
use crate::models::*;
use crate::services::{SessionStore, TicketLedger};
use crate::utils::{
    CredentialCheck, TicketSigner, hash_secret, validate_passcode, validate_pin, verify_secret,
};
use chrono::{DateTime, Duration, SubsecRound, Utc};
use rand::SeedableRng;
use rand::rngs::StdRng;
use serde::{Deserialize, Serialize};
use std::sync::Arc;

/// 领奖倒计时（秒）
pub const CLAIM_WINDOW_SECS: i64 = 60;
pub const MAX_EVENT_NAME_LEN: usize = 100;
pub const MAX_LABEL_LEN: usize = 50;

/// 单个场次的完整持久化快照
#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq, Eq)]
pub struct SessionStorage {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub session: Option<SessionRecord>,
    #[serde(flatten)]
    pub ledger: TicketLedger,
}

/// 场次 Actor
///
/// 每个场次一个实例，由 `SessionRegistry` 放在独立的 `Mutex` 后面，
/// 因此同一场次的命令严格串行，不同场次之间完全并行。
///
/// 所有变更命令遵循同一流程：
/// 1. 校验前置条件（失败时状态不变）
/// 2. 在快照副本上修改
/// 3. 整体写入存储一次
/// 4. 写入成功后才替换内存状态
pub struct RaffleSession {
    session_id: String,
    data: SessionStorage,
    loaded: bool,
    store: Arc<dyn SessionStore>,
    signer: TicketSigner,
    rng: StdRng,
    pin_hash_cost: u32,
}

impl RaffleSession {
    pub fn new(
        session_id: &str,
        store: Arc<dyn SessionStore>,
        signer: TicketSigner,
        pin_hash_cost: u32,
    ) -> Self {
        Self {
            session_id: session_id.to_string(),
            data: SessionStorage::default(),
            loaded: false,
            store,
            signer,
            rng: StdRng::from_entropy(),
            pin_hash_cost,
        }
    }

    /// 注入随机源（测试中使用固定种子）
    pub fn with_rng(mut self, rng: StdRng) -> Self {
        self.rng = rng;
        self
    }

    pub fn storage(&self) -> &SessionStorage {
        &self.data
    }

    /// 长时间无活动或没有场次记录的实例可以从内存中移除
    pub fn is_idle(&self, now: DateTime<Utc>, max_idle: Duration) -> bool {
        match &self.data.session {
            None => true,
            Some(record) => now - record.last_active_at > max_idle,
        }
    }

    /// 首次使用时从存储加载
    pub async fn ensure_loaded(&mut self) -> AppResult<()> {
        if self.loaded {
            return Ok(());
        }
        if let Some(stored) = self.store.load(&self.session_id).await? {
            self.data = stored;
        }
        self.loaded = true;
        Ok(())
    }

    // -----------------------------
    // 场次
    // -----------------------------

    pub async fn create(&mut self, command: CreateSessionCommand) -> AppResult<CreateSessionResponse> {
        self.ensure_loaded().await?;
        if self.data.session.is_some() {
            return Err(AppError::Conflict("Session already exists".to_string()));
        }

        let event_name = command.event_name.trim().to_string();
        if event_name.is_empty() {
            return Err(AppError::ValidationError("Missing required fields".to_string()));
        }
        if event_name.chars().count() > MAX_EVENT_NAME_LEN {
            return Err(AppError::ValidationError(format!(
                "Event name must be at most {MAX_EVENT_NAME_LEN} characters"
            )));
        }
        validate_pin(&command.pin)?;
        if let Some(passcode) = &command.passcode {
            validate_passcode(passcode)?;
        }

        let pin_hash = hash_secret(&command.pin, self.pin_hash_cost)?;
        let passcode_hash = match &command.passcode {
            Some(passcode) => Some(hash_secret(passcode, self.pin_hash_cost)?),
            None => None,
        };

        let now = now_millis();
        let next = SessionStorage {
            session: Some(SessionRecord {
                session_id: self.session_id.clone(),
                event_name,
                language: command.language,
                theme: command.theme,
                pin_hash,
                passcode_hash,
                redraw_return_to_pool: command.redraw_return_to_pool,
                state: SessionState::Open,
                current_winner: None,
                created_at: now,
                last_active_at: now,
            }),
            ledger: TicketLedger::default(),
        };
        self.commit(next).await?;

        log::info!("Raffle session {} created", self.session_id);
        Ok(CreateSessionResponse {
            session_id: self.session_id.clone(),
        })
    }

    pub async fn status(&mut self) -> AppResult<SessionStatusResponse> {
        self.ensure_loaded().await?;
        self.touch()?;
        self.build_status()
    }

    pub async fn dashboard(&mut self) -> AppResult<DashboardResponse> {
        self.ensure_loaded().await?;
        self.touch()?;
        let status = self.build_status()?;
        let ledger = &self.data.ledger;

        let batches = ledger.batches.values().map(BatchSummary::from).collect();
        let winners = ledger
            .winners()
            .into_iter()
            .map(|t| WinnerSummary {
                ticket_id: t.ticket_id.clone(),
                batch_id: t.batch_id.clone(),
                ticket_index: t.index,
                batch_label: ledger.batch(&t.batch_id).and_then(|b| b.label.clone()),
                forfeited: t.forfeited,
                claimed_at: t.claimed_at,
            })
            .collect();

        Ok(DashboardResponse {
            status,
            batches,
            winners,
        })
    }

    pub async fn verify_pin(&mut self, pin: &str) -> AppResult<ValidResponse> {
        self.ensure_loaded().await?;
        self.touch()?;
        let record = self.record()?;
        // 格式不对直接判定为无效，不报错
        let valid = validate_pin(pin).is_ok() && verify_secret(pin, &record.pin_hash)?;
        Ok(ValidResponse { valid })
    }

    /// 未设置口令的场次任何输入都视为有效
    pub async fn verify_passcode(&mut self, passcode: &str) -> AppResult<ValidResponse> {
        self.ensure_loaded().await?;
        self.touch()?;
        let record = self.record()?;
        let valid = match &record.passcode_hash {
            None => true,
            Some(hash) => validate_passcode(passcode).is_ok() && verify_secret(passcode, hash)?,
        };
        Ok(ValidResponse { valid })
    }

    // -----------------------------
    // 批次
    // -----------------------------

    pub async fn create_batch(
        &mut self,
        ticket_count: i64,
        label: Option<String>,
        passcode: Option<&str>,
    ) -> AppResult<CreateBatchResponse> {
        self.ensure_loaded().await?;
        let record = self.record()?;
        Self::authorize_host(record, passcode)?;
        if record.state != SessionState::Open {
            return Err(AppError::InvalidState("Registration is closed".to_string()));
        }
        let ticket_count = TicketLedger::validate_ticket_count(ticket_count)?;
        let label = normalize_label(label)?;

        let now = now_millis();
        let mut next = self.data.clone();
        let batch = next
            .ledger
            .create_batch(ticket_count, label, now, &mut self.rng);
        touch_record(&mut next, now);
        let qr_payload = self
            .signer
            .batch_qr_payload(&self.session_id, &batch.batch_id)?;
        self.commit(next).await?;

        log::info!(
            "Session {}: batch {} issued with {} tickets",
            self.session_id,
            batch.batch_id,
            ticket_count
        );
        Ok(CreateBatchResponse {
            batch_id: batch.batch_id,
            ticket_count,
            label: batch.label,
            qr_payload,
        })
    }

    /// 参与者设备领取批次，返回票号及每张票的签名
    pub async fn claim_batch(&mut self, batch_id: &str, sig: &str) -> AppResult<ClaimBatchResponse> {
        self.ensure_loaded().await?;
        let record = self.record()?;
        Self::reject_if_closed(record)?;

        if self.data.ledger.batch(batch_id).is_none() {
            return Err(AppError::NotFound("Batch not found".to_string()));
        }
        let payload = CredentialPayload::batch(&self.session_id, batch_id);
        if !self.signer.verify(&payload, sig) {
            log::warn!("Session {}: rejected batch claim with bad credential", self.session_id);
            return Err(AppError::AuthError("Invalid signature".to_string()));
        }

        let now = now_millis();
        let mut next = self.data.clone();
        let ticket_ids = next.ledger.claim_batch(batch_id, now)?;
        touch_record(&mut next, now);
        let ticket_credentials = ticket_ids
            .iter()
            .map(|id| self.signer.ticket_credential(&self.session_id, id))
            .collect::<AppResult<Vec<_>>>()?;
        self.commit(next).await?;

        log::info!("Session {}: batch {} claimed", self.session_id, batch_id);
        Ok(ClaimBatchResponse {
            success: true,
            batch_id: batch_id.to_string(),
            ticket_ids,
            ticket_credentials,
        })
    }

    // -----------------------------
    // 状态流转
    // -----------------------------

    pub async fn lock(&mut self, passcode: Option<&str>) -> AppResult<StateChangeResponse> {
        self.transition(
            passcode,
            SessionState::Open,
            SessionState::Locked,
            "Cannot lock session in current state",
        )
        .await
    }

    pub async fn reopen(&mut self, passcode: Option<&str>) -> AppResult<StateChangeResponse> {
        self.transition(
            passcode,
            SessionState::Locked,
            SessionState::Open,
            "Can only reopen a locked session",
        )
        .await
    }

    /// 任何状态都可以关闭（单向，不可恢复）
    pub async fn close(&mut self, passcode: Option<&str>) -> AppResult<StateChangeResponse> {
        self.ensure_loaded().await?;
        let record = self.record()?;
        Self::authorize_host(record, passcode)?;
        let from = record.state;

        let now = now_millis();
        let mut next = self.data.clone();
        if let Some(record) = next.session.as_mut() {
            record.state = SessionState::Closed;
            record.current_winner = None;
            record.last_active_at = now;
        }
        self.commit(next).await?;

        log::info!("Session {}: {} -> CLOSED", self.session_id, from);
        Ok(StateChangeResponse {
            success: true,
            state: SessionState::Closed,
        })
    }

    async fn transition(
        &mut self,
        passcode: Option<&str>,
        from: SessionState,
        to: SessionState,
        rejection: &str,
    ) -> AppResult<StateChangeResponse> {
        self.ensure_loaded().await?;
        let record = self.record()?;
        Self::authorize_host(record, passcode)?;
        if record.state != from {
            return Err(AppError::InvalidState(rejection.to_string()));
        }

        let now = now_millis();
        let mut next = self.data.clone();
        if let Some(record) = next.session.as_mut() {
            record.state = to;
            record.last_active_at = now;
        }
        self.commit(next).await?;

        log::info!("Session {}: {} -> {}", self.session_id, from, to);
        Ok(StateChangeResponse {
            success: true,
            state: to,
        })
    }

    // -----------------------------
    // 抽奖
    // -----------------------------

    pub async fn draw(&mut self, passcode: Option<&str>) -> AppResult<DrawResponse> {
        self.ensure_loaded().await?;
        let record = self.record()?;
        Self::authorize_host(record, passcode)?;
        if record.state != SessionState::Locked {
            return Err(AppError::InvalidState(
                "Must lock registration before drawing".to_string(),
            ));
        }

        let mut next = self.data.clone();
        let response = self.select_winner(&mut next, None)?;
        self.commit(next).await?;

        log::info!(
            "Session {}: LOCKED -> DRAWING, ticket {} drawn",
            self.session_id,
            response.ticket_id
        );
        Ok(response)
    }

    /// 重抽：撤销当前中奖者后立即重新抽取
    ///
    /// 被撤销的票默认回到奖池（本轮除外），场次关闭了"放回奖池"时则永久作废。
    pub async fn redraw(&mut self, passcode: Option<&str>) -> AppResult<DrawResponse> {
        self.ensure_loaded().await?;
        let record = self.record()?;
        Self::authorize_host(record, passcode)?;
        let previous = match (&record.state, &record.current_winner) {
            (SessionState::Drawing, Some(winner)) => winner.ticket_id.clone(),
            _ => {
                return Err(AppError::InvalidState(
                    "No active draw to redraw".to_string(),
                ));
            }
        };
        // 已当场兑奖的票不能再被撤销，只能确认领奖
        if self
            .data
            .ledger
            .ticket(&previous)
            .is_some_and(|t| t.claimed_at.is_some())
        {
            return Err(AppError::Conflict("Winner already claimed".to_string()));
        }
        let forfeit = !record.redraw_return_to_pool;

        let mut next = self.data.clone();
        next.ledger.release_winner(&previous, forfeit)?;
        let response = self.select_winner(&mut next, Some(&previous))?;
        self.commit(next).await?;

        log::info!(
            "Session {}: ticket {} missed its claim, ticket {} redrawn",
            self.session_id,
            previous,
            response.ticket_id
        );
        Ok(response)
    }

    /// 主持人确认奖品已发放，回到 LOCKED 准备下一轮
    pub async fn confirm_claim(&mut self, passcode: Option<&str>) -> AppResult<SuccessResponse> {
        self.ensure_loaded().await?;
        let record = self.record()?;
        Self::authorize_host(record, passcode)?;
        let winner = match (&record.state, &record.current_winner) {
            (SessionState::Drawing, Some(winner)) => winner.ticket_id.clone(),
            _ => {
                return Err(AppError::InvalidState(
                    "No active winner to confirm".to_string(),
                ));
            }
        };

        let now = now_millis();
        let mut next = self.data.clone();
        next.ledger.stamp_claimed(&winner, now)?;
        if let Some(record) = next.session.as_mut() {
            record.state = SessionState::Locked;
            record.current_winner = None;
            record.last_active_at = now;
        }
        self.commit(next).await?;

        log::info!(
            "Session {}: DRAWING -> LOCKED, ticket {} claimed",
            self.session_id,
            winner
        );
        Ok(SuccessResponse { success: true })
    }

    fn select_winner(
        &mut self,
        next: &mut SessionStorage,
        exclude: Option<&str>,
    ) -> AppResult<DrawResponse> {
        let winner = next.ledger.draw(&mut self.rng, exclude)?;
        let now = now_millis();
        let claim_deadline = now + Duration::seconds(CLAIM_WINDOW_SECS);
        let batch_label = next
            .ledger
            .batch(&winner.batch_id)
            .and_then(|b| b.label.clone());

        if let Some(record) = next.session.as_mut() {
            record.state = SessionState::Drawing;
            record.current_winner = Some(CurrentWinner {
                ticket_id: winner.ticket_id.clone(),
                batch_id: winner.batch_id.clone(),
                drawn_at: now,
                claim_deadline,
            });
            record.last_active_at = now;
        }

        Ok(DrawResponse {
            ticket_id: winner.ticket_id,
            batch_id: winner.batch_id,
            ticket_index: winner.index,
            batch_label,
            claim_deadline,
        })
    }

    // -----------------------------
    // 验票 / 领奖
    // -----------------------------

    /// 扫码验票，只读不改状态
    pub async fn verify_ticket(&mut self, request: &VerifyTicketRequest) -> AppResult<VerifyTicketResponse> {
        self.ensure_loaded().await?;
        self.touch()?;
        let record = self.record()?;

        let payload = match &request.ticket_id {
            Some(ticket_id) => CredentialPayload::ticket(&request.session_id, ticket_id),
            None => CredentialPayload::batch(&request.session_id, &request.batch_id),
        };
        match self.signer.check(&record.session_id, &payload, &request.sig) {
            CredentialCheck::Valid => {}
            CredentialCheck::WrongEvent => {
                return Ok(VerifyTicketResponse::outcome(VerifyResult::WrongEvent));
            }
            CredentialCheck::Invalid => {
                log::warn!("Session {}: scanned credential failed verification", self.session_id);
                return Ok(VerifyTicketResponse::outcome(VerifyResult::Invalid));
            }
        }

        let ledger = &self.data.ledger;
        let ticket = match &request.ticket_id {
            Some(ticket_id) => match ledger.ticket(ticket_id) {
                Some(ticket) => ticket,
                None => return Ok(VerifyTicketResponse::outcome(VerifyResult::Invalid)),
            },
            None => {
                if ledger.batch(&request.batch_id).is_none() {
                    return Ok(VerifyTicketResponse::outcome(VerifyResult::Invalid));
                }
                match ledger.winning_ticket_in_batch(&request.batch_id) {
                    Some(ticket) => ticket,
                    None => return Ok(VerifyTicketResponse::outcome(VerifyResult::NotWinner)),
                }
            }
        };

        if !ticket.is_winner {
            return Ok(VerifyTicketResponse::outcome(VerifyResult::NotWinner));
        }
        if ticket.claimed_at.is_some() {
            return Ok(VerifyTicketResponse::outcome(VerifyResult::AlreadyClaimed));
        }
        Ok(VerifyTicketResponse::valid(&ticket.ticket_id, &ticket.batch_id))
    }

    /// 扫码确认后登记领奖，不改变场次状态
    pub async fn mark_claimed(&mut self, ticket_id: &str, passcode: Option<&str>) -> AppResult<SuccessResponse> {
        self.ensure_loaded().await?;
        let record = self.record()?;
        Self::authorize_host(record, passcode)?;
        Self::reject_if_closed(record)?;

        let now = now_millis();
        let mut next = self.data.clone();
        next.ledger.mark_claimed(ticket_id, now)?;
        touch_record(&mut next, now);
        self.commit(next).await?;

        log::info!("Session {}: ticket {} marked claimed", self.session_id, ticket_id);
        Ok(SuccessResponse { success: true })
    }

    // -----------------------------
    // 内部辅助方法
    // -----------------------------

    fn record(&self) -> AppResult<&SessionRecord> {
        self.data
            .session
            .as_ref()
            .ok_or_else(|| AppError::NotFound("Session not found".to_string()))
    }

    /// 只读命令只刷新内存中的活跃时间，不写存储
    fn touch(&mut self) -> AppResult<()> {
        let record = self
            .data
            .session
            .as_mut()
            .ok_or_else(|| AppError::NotFound("Session not found".to_string()))?;
        record.last_active_at = now_millis();
        Ok(())
    }

    fn build_status(&self) -> AppResult<SessionStatusResponse> {
        let record = self.record()?;
        let ledger = &self.data.ledger;
        Ok(SessionStatusResponse {
            session_id: record.session_id.clone(),
            event_name: record.event_name.clone(),
            language: record.language,
            theme: record.theme,
            state: record.state,
            display_state: record.display_state(),
            ticket_count: ledger.ticket_count(),
            available_tickets: ledger.available_count(),
            batch_count: ledger.batch_count(),
            claimed_batches: ledger.claimed_batch_count(),
            current_winner: record.current_winner.clone(),
        })
    }

    fn authorize_host(record: &SessionRecord, passcode: Option<&str>) -> AppResult<()> {
        let Some(hash) = &record.passcode_hash else {
            return Ok(());
        };
        match passcode {
            Some(p) if verify_secret(p, hash)? => Ok(()),
            _ => Err(AppError::AuthError("Invalid passcode".to_string())),
        }
    }

    fn reject_if_closed(record: &SessionRecord) -> AppResult<()> {
        if record.state == SessionState::Closed {
            return Err(AppError::InvalidState("Session is closed".to_string()));
        }
        Ok(())
    }

    /// 整体写入一次，成功后才替换内存状态；失败不重试
    async fn commit(&mut self, next: SessionStorage) -> AppResult<()> {
        if let Err(e) = self.store.save(&next).await {
            log::error!("Session {}: failed to persist state: {e}", self.session_id);
            return Err(e);
        }
        self.data = next;
        Ok(())
    }
}

/// 存储层以毫秒精度保存时间，内存中保持一致
fn now_millis() -> DateTime<Utc> {
    Utc::now().trunc_subsecs(3)
}

fn touch_record(storage: &mut SessionStorage, now: DateTime<Utc>) {
    if let Some(record) = storage.session.as_mut() {
        record.last_active_at = now;
    }
}

fn normalize_label(label: Option<String>) -> AppResult<Option<String>> {
    let Some(label) = label else {
        return Ok(None);
    };
    let label = label.trim().to_string();
    if label.is_empty() {
        return Ok(None);
    }
    if label.chars().count() > MAX_LABEL_LEN {
        return Err(AppError::ValidationError(format!(
            "Label must be at most {MAX_LABEL_LEN} characters"
        )));
    }
    Ok(Some(label))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::services::MemorySessionStore;
    use async_trait::async_trait;
    use std::sync::atomic::{AtomicBool, Ordering};

    const SESSION_ID: &str = "482913";

    /// 可以切换为写入失败的存储
    #[derive(Default)]
    struct FlakyStore {
        inner: MemorySessionStore,
        fail_writes: AtomicBool,
    }

    #[async_trait]
    impl SessionStore for FlakyStore {
        async fn load(&self, session_id: &str) -> AppResult<Option<SessionStorage>> {
            self.inner.load(session_id).await
        }

        async fn save(&self, storage: &SessionStorage) -> AppResult<()> {
            if self.fail_writes.load(Ordering::SeqCst) {
                return Err(AppError::DatabaseError(sea_orm::DbErr::Custom(
                    "disk full".to_string(),
                )));
            }
            self.inner.save(storage).await
        }

        async fn exists(&self, session_id: &str) -> AppResult<bool> {
            self.inner.exists(session_id).await
        }
    }

    fn signer() -> TicketSigner {
        TicketSigner::new("session-test-secret")
    }

    fn session_over(store: Arc<dyn SessionStore>) -> RaffleSession {
        RaffleSession::new(SESSION_ID, store, signer(), 4).with_rng(StdRng::seed_from_u64(7))
    }

    fn command(passcode: Option<&str>, redraw_return_to_pool: bool) -> CreateSessionCommand {
        CreateSessionCommand {
            event_name: "  Spring Gala  ".to_string(),
            language: Language::ZhTw,
            theme: Theme::Gold,
            pin: SESSION_ID.to_string(),
            passcode: passcode.map(str::to_string),
            redraw_return_to_pool,
        }
    }

    async fn open_session() -> RaffleSession {
        let mut session = session_over(Arc::new(MemorySessionStore::new()));
        session.create(command(None, true)).await.unwrap();
        session
    }

    /// 发放并领取一个批次
    async fn issue_claimed(session: &mut RaffleSession, count: i64) -> ClaimBatchResponse {
        let batch = session.create_batch(count, None, None).await.unwrap();
        session
            .claim_batch(&batch.batch_id, &batch.qr_payload.sig)
            .await
            .unwrap()
    }

    fn ticket_scan(session_id: &str, credential: &TicketCredential) -> VerifyTicketRequest {
        VerifyTicketRequest {
            ticket_id: Some(credential.ticket_id.clone()),
            batch_id: credential.ticket_id[..4].to_string(),
            sig: credential.sig.clone(),
            session_id: session_id.to_string(),
        }
    }

    #[tokio::test]
    async fn test_full_raffle_round() {
        let mut session = open_session().await;
        let status = session.status().await.unwrap();
        assert_eq!(status.event_name, "Spring Gala");
        assert_eq!(status.state, SessionState::Open);
        assert!(session.verify_pin(SESSION_ID).await.unwrap().valid);

        let batch = session
            .create_batch(3, Some(" Table 7 ".into()), None)
            .await
            .unwrap();
        assert_eq!(batch.label.as_deref(), Some("Table 7"));
        assert_eq!(batch.qr_payload.session, SESSION_ID);

        let claimed = session
            .claim_batch(&batch.batch_id, &batch.qr_payload.sig)
            .await
            .unwrap();
        assert_eq!(claimed.ticket_ids.len(), 3);
        assert_eq!(claimed.ticket_credentials.len(), 3);
        assert_eq!(claimed.ticket_ids[0], format!("{}-01", batch.batch_id));

        let status = session.status().await.unwrap();
        assert_eq!(status.ticket_count, 3);
        assert_eq!(status.available_tickets, 3);
        assert_eq!(status.claimed_batches, 1);

        session.lock(None).await.unwrap();
        let drawn = session.draw(None).await.unwrap();
        assert_eq!(drawn.batch_id, batch.batch_id);
        assert_eq!(drawn.batch_label.as_deref(), Some("Table 7"));

        let status = session.status().await.unwrap();
        assert_eq!(status.state, SessionState::Drawing);
        assert_eq!(status.display_state, "CLAIMING");
        assert_eq!(status.available_tickets, 2);
        let winner = status.current_winner.unwrap();
        assert_eq!(winner.ticket_id, drawn.ticket_id);
        assert_eq!(winner.claim_deadline, drawn.claim_deadline);
        assert_eq!(
            winner.claim_deadline - winner.drawn_at,
            Duration::seconds(CLAIM_WINDOW_SECS)
        );

        let credential = claimed
            .ticket_credentials
            .iter()
            .find(|c| c.ticket_id == drawn.ticket_id)
            .unwrap();
        let scan = ticket_scan(SESSION_ID, credential);
        assert_eq!(
            session.verify_ticket(&scan).await.unwrap(),
            VerifyTicketResponse::valid(&drawn.ticket_id, &drawn.batch_id)
        );

        session.mark_claimed(&drawn.ticket_id, None).await.unwrap();
        // 登记领奖不改变场次状态
        assert_eq!(session.status().await.unwrap().state, SessionState::Drawing);
        assert_eq!(
            session.verify_ticket(&scan).await.unwrap().result,
            VerifyResult::AlreadyClaimed
        );
        assert!(matches!(
            session.mark_claimed(&drawn.ticket_id, None).await,
            Err(AppError::Conflict(_))
        ));

        session.confirm_claim(None).await.unwrap();
        let status = session.status().await.unwrap();
        assert_eq!(status.state, SessionState::Locked);
        assert!(status.current_winner.is_none());

        let dashboard = session.dashboard().await.unwrap();
        assert_eq!(dashboard.batches.len(), 1);
        assert_eq!(dashboard.winners.len(), 1);
        assert!(dashboard.winners[0].claimed_at.is_some());
    }

    #[tokio::test]
    async fn test_create_validates_input() {
        let mut session = session_over(Arc::new(MemorySessionStore::new()));

        let mut blank = command(None, true);
        blank.event_name = "   ".into();
        assert!(matches!(
            session.create(blank).await,
            Err(AppError::ValidationError(_))
        ));

        let mut long = command(None, true);
        long.event_name = "x".repeat(MAX_EVENT_NAME_LEN + 1);
        assert!(matches!(
            session.create(long).await,
            Err(AppError::ValidationError(_))
        ));

        assert!(matches!(
            session.create(command(Some("12ab"), true)).await,
            Err(AppError::ValidationError(_))
        ));
        assert!(session.storage().session.is_none());

        session.create(command(None, true)).await.unwrap();
        assert!(matches!(
            session.create(command(None, true)).await,
            Err(AppError::Conflict(_))
        ));
    }

    #[tokio::test]
    async fn test_commands_before_create_are_not_found() {
        let mut session = session_over(Arc::new(MemorySessionStore::new()));
        assert!(matches!(session.status().await, Err(AppError::NotFound(_))));
        assert!(matches!(session.lock(None).await, Err(AppError::NotFound(_))));
        assert!(matches!(
            session.create_batch(1, None, None).await,
            Err(AppError::NotFound(_))
        ));
    }

    #[tokio::test]
    async fn test_state_machine_rejections_leave_state_unchanged() {
        let mut session = open_session().await;
        issue_claimed(&mut session, 2).await;

        let before = session.storage().clone();
        assert!(matches!(session.draw(None).await, Err(AppError::InvalidState(_))));
        assert!(matches!(session.reopen(None).await, Err(AppError::InvalidState(_))));
        assert!(matches!(session.redraw(None).await, Err(AppError::InvalidState(_))));
        assert!(matches!(
            session.confirm_claim(None).await,
            Err(AppError::InvalidState(_))
        ));
        assert_eq!(session.storage(), &before);

        session.lock(None).await.unwrap();
        assert!(matches!(
            session.create_batch(1, None, None).await,
            Err(AppError::InvalidState(_))
        ));
        assert!(matches!(session.lock(None).await, Err(AppError::InvalidState(_))));

        session.reopen(None).await.unwrap();
        session.create_batch(1, None, None).await.unwrap();
    }

    #[tokio::test]
    async fn test_batch_input_validation() {
        let mut session = open_session().await;
        for count in [0, 21, -3] {
            assert!(matches!(
                session.create_batch(count, None, None).await,
                Err(AppError::ValidationError(_))
            ));
        }
        assert!(matches!(
            session
                .create_batch(2, Some("y".repeat(MAX_LABEL_LEN + 1)), None)
                .await,
            Err(AppError::ValidationError(_))
        ));

        let batch = session
            .create_batch(20, Some("   ".into()), None)
            .await
            .unwrap();
        assert_eq!(batch.ticket_count, 20);
        assert!(batch.label.is_none());
        assert_eq!(session.status().await.unwrap().batch_count, 1);
    }

    #[tokio::test]
    async fn test_tampered_or_repeated_claim_is_rejected() {
        let mut session = open_session().await;
        let batch = session.create_batch(2, None, None).await.unwrap();

        let forged = TicketSigner::new("another-secret")
            .batch_qr_payload(SESSION_ID, &batch.batch_id)
            .unwrap();
        assert!(matches!(
            session.claim_batch(&batch.batch_id, &forged.sig).await,
            Err(AppError::AuthError(_))
        ));
        assert!(matches!(
            session.claim_batch("ZZZZ", &batch.qr_payload.sig).await,
            Err(AppError::NotFound(_))
        ));
        assert_eq!(session.status().await.unwrap().claimed_batches, 0);

        session
            .claim_batch(&batch.batch_id, &batch.qr_payload.sig)
            .await
            .unwrap();
        assert!(matches!(
            session
                .claim_batch(&batch.batch_id, &batch.qr_payload.sig)
                .await,
            Err(AppError::Conflict(_))
        ));
    }

    #[tokio::test]
    async fn test_unclaimed_batches_are_not_drawn() {
        let mut session = open_session().await;
        session.create_batch(5, None, None).await.unwrap();
        session.lock(None).await.unwrap();

        assert_eq!(session.status().await.unwrap().available_tickets, 0);
        assert!(matches!(session.draw(None).await, Err(AppError::Conflict(_))));
        assert_eq!(session.status().await.unwrap().state, SessionState::Locked);
    }

    #[tokio::test]
    async fn test_redraw_returns_missed_ticket_to_pool() {
        let mut session = open_session().await;
        issue_claimed(&mut session, 2).await;
        session.lock(None).await.unwrap();

        let first = session.draw(None).await.unwrap();
        let second = session.redraw(None).await.unwrap();
        assert_ne!(first.ticket_id, second.ticket_id);

        let missed = session.storage().ledger.ticket(&first.ticket_id).unwrap();
        assert!(!missed.is_winner);
        assert!(!missed.forfeited);
        assert_eq!(session.status().await.unwrap().available_tickets, 1);
    }

    #[tokio::test]
    async fn test_redraw_after_handover_is_rejected() {
        let mut session = open_session().await;
        issue_claimed(&mut session, 2).await;
        session.lock(None).await.unwrap();

        let drawn = session.draw(None).await.unwrap();
        session.mark_claimed(&drawn.ticket_id, None).await.unwrap();

        let before = session.storage().clone();
        assert!(matches!(session.redraw(None).await, Err(AppError::Conflict(_))));
        assert_eq!(session.storage(), &before);

        let handed_over = session.storage().ledger.ticket(&drawn.ticket_id).unwrap();
        assert!(handed_over.is_winner);
        assert!(handed_over.claimed_at.is_some());
        assert_eq!(session.dashboard().await.unwrap().winners.len(), 1);

        session.confirm_claim(None).await.unwrap();
        assert_eq!(session.status().await.unwrap().available_tickets, 1);
    }

    #[tokio::test]
    async fn test_redraw_with_single_ticket_draws_it_again() {
        let mut session = open_session().await;
        issue_claimed(&mut session, 1).await;
        session.lock(None).await.unwrap();

        let first = session.draw(None).await.unwrap();
        let second = session.redraw(None).await.unwrap();
        assert_eq!(first.ticket_id, second.ticket_id);
    }

    #[tokio::test]
    async fn test_redraw_forfeits_when_pool_return_disabled() {
        let mut session = session_over(Arc::new(MemorySessionStore::new()));
        session.create(command(None, false)).await.unwrap();
        issue_claimed(&mut session, 2).await;
        session.lock(None).await.unwrap();

        let first = session.draw(None).await.unwrap();
        let second = session.redraw(None).await.unwrap();
        assert_ne!(first.ticket_id, second.ticket_id);
        assert!(session.storage().ledger.ticket(&first.ticket_id).unwrap().forfeited);
        assert_eq!(session.status().await.unwrap().available_tickets, 0);

        // 奖池已空：重抽失败且当前中奖者保持不变
        assert!(matches!(session.redraw(None).await, Err(AppError::Conflict(_))));
        let status = session.status().await.unwrap();
        assert_eq!(status.state, SessionState::Drawing);
        assert_eq!(status.current_winner.unwrap().ticket_id, second.ticket_id);

        let winners = session.dashboard().await.unwrap().winners;
        assert_eq!(winners.len(), 2);
        assert!(winners.iter().any(|w| w.forfeited));
    }

    #[tokio::test]
    async fn test_failed_write_leaves_memory_unchanged() {
        let store = Arc::new(FlakyStore::default());
        let mut session = session_over(store.clone());
        session.create(command(None, true)).await.unwrap();
        issue_claimed(&mut session, 3).await;

        store.fail_writes.store(true, Ordering::SeqCst);
        let before = session.storage().clone();
        assert!(matches!(
            session.lock(None).await,
            Err(AppError::DatabaseError(_))
        ));
        assert!(matches!(
            session.create_batch(2, None, None).await,
            Err(AppError::DatabaseError(_))
        ));
        assert_eq!(session.storage().session, before.session);
        assert_eq!(session.storage().ledger, before.ledger);

        store.fail_writes.store(false, Ordering::SeqCst);
        session.lock(None).await.unwrap();
        assert_eq!(session.status().await.unwrap().state, SessionState::Locked);
    }

    #[tokio::test]
    async fn test_host_commands_require_passcode() {
        let mut session = session_over(Arc::new(MemorySessionStore::new()));
        session.create(command(Some("2468"), true)).await.unwrap();

        assert!(session.verify_passcode("2468").await.unwrap().valid);
        assert!(!session.verify_passcode("1357").await.unwrap().valid);
        assert!(!session.verify_passcode("abc").await.unwrap().valid);

        assert!(matches!(
            session.create_batch(2, None, None).await,
            Err(AppError::AuthError(_))
        ));
        assert!(matches!(
            session.lock(Some("1357")).await,
            Err(AppError::AuthError(_))
        ));
        assert!(matches!(session.close(None).await, Err(AppError::AuthError(_))));

        let batch = session.create_batch(2, None, Some("2468")).await.unwrap();
        // 参与者领取不需要口令
        session
            .claim_batch(&batch.batch_id, &batch.qr_payload.sig)
            .await
            .unwrap();
        session.lock(Some("2468")).await.unwrap();
        session.draw(Some("2468")).await.unwrap();
    }

    #[tokio::test]
    async fn test_without_passcode_any_input_is_accepted() {
        let mut session = open_session().await;
        assert!(session.verify_passcode("0000").await.unwrap().valid);
        session.lock(Some("9999")).await.unwrap();
    }

    #[tokio::test]
    async fn test_closed_session_rejects_participant_actions() {
        let mut session = open_session().await;
        let batch = session.create_batch(2, None, None).await.unwrap();
        let claimed = issue_claimed(&mut session, 1).await;
        session.lock(None).await.unwrap();
        let drawn = session.draw(None).await.unwrap();
        assert_eq!(drawn.ticket_id, claimed.ticket_ids[0]);

        session.close(None).await.unwrap();
        let status = session.status().await.unwrap();
        assert_eq!(status.state, SessionState::Closed);
        assert!(status.current_winner.is_none());

        assert!(matches!(
            session
                .claim_batch(&batch.batch_id, &batch.qr_payload.sig)
                .await,
            Err(AppError::InvalidState(_))
        ));
        assert!(matches!(
            session.mark_claimed(&drawn.ticket_id, None).await,
            Err(AppError::InvalidState(_))
        ));
        assert!(matches!(session.reopen(None).await, Err(AppError::InvalidState(_))));
        assert!(matches!(session.draw(None).await, Err(AppError::InvalidState(_))));

        // 重复关闭
        assert_eq!(session.close(None).await.unwrap().state, SessionState::Closed);
    }

    #[tokio::test]
    async fn test_verify_ticket_outcomes() {
        let mut session = open_session().await;
        let batch = session.create_batch(2, None, None).await.unwrap();
        let claimed = session
            .claim_batch(&batch.batch_id, &batch.qr_payload.sig)
            .await
            .unwrap();
        let credential = &claimed.ticket_credentials[0];

        // 尚未开奖
        assert_eq!(
            session
                .verify_ticket(&ticket_scan(SESSION_ID, credential))
                .await
                .unwrap()
                .result,
            VerifyResult::NotWinner
        );

        // 其他场次的凭证
        let foreign = signer().ticket_credential("111111", &credential.ticket_id).unwrap();
        assert_eq!(
            session
                .verify_ticket(&ticket_scan("111111", &foreign))
                .await
                .unwrap()
                .result,
            VerifyResult::WrongEvent
        );

        // 篡改票号
        let mut tampered = ticket_scan(SESSION_ID, credential);
        tampered.ticket_id = Some(claimed.ticket_ids[1].clone());
        assert_eq!(
            session.verify_ticket(&tampered).await.unwrap().result,
            VerifyResult::Invalid
        );

        // 签名有效但票据不存在
        let ghost = signer().ticket_credential(SESSION_ID, "ZZZZ-01").unwrap();
        assert_eq!(
            session
                .verify_ticket(&ticket_scan(SESSION_ID, &ghost))
                .await
                .unwrap()
                .result,
            VerifyResult::Invalid
        );

        session.lock(None).await.unwrap();
        let drawn = session.draw(None).await.unwrap();

        // 批次二维码也可以验票
        let by_batch = VerifyTicketRequest {
            ticket_id: None,
            batch_id: batch.batch_id.clone(),
            sig: batch.qr_payload.sig.clone(),
            session_id: SESSION_ID.to_string(),
        };
        assert_eq!(
            session.verify_ticket(&by_batch).await.unwrap(),
            VerifyTicketResponse::valid(&drawn.ticket_id, &batch.batch_id)
        );
    }

    #[tokio::test]
    async fn test_mark_claimed_requires_winner() {
        let mut session = open_session().await;
        let claimed = issue_claimed(&mut session, 2).await;
        session.lock(None).await.unwrap();
        let drawn = session.draw(None).await.unwrap();
        let loser = claimed
            .ticket_ids
            .iter()
            .find(|id| **id != drawn.ticket_id)
            .unwrap();

        assert!(matches!(
            session.mark_claimed(loser, None).await,
            Err(AppError::ValidationError(_))
        ));
        assert!(matches!(
            session.mark_claimed("ZZZZ-01", None).await,
            Err(AppError::NotFound(_))
        ));
    }

    #[tokio::test]
    async fn test_state_is_reloaded_from_store() {
        let store: Arc<dyn SessionStore> = Arc::new(MemorySessionStore::new());
        let mut session = session_over(store.clone());
        session.create(command(None, true)).await.unwrap();
        issue_claimed(&mut session, 3).await;
        session.lock(None).await.unwrap();
        let drawn = session.draw(None).await.unwrap();

        let mut reloaded = session_over(store);
        let status = reloaded.status().await.unwrap();
        assert_eq!(status.state, SessionState::Drawing);
        assert_eq!(status.ticket_count, 3);
        assert_eq!(status.current_winner.unwrap().ticket_id, drawn.ticket_id);
        assert_eq!(reloaded.storage().ledger, session.storage().ledger);
    }
}
