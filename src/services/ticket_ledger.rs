use crate::error::{AppError, AppResult};
use crate::models::{
    BatchStatus, MAX_TICKETS_PER_BATCH, MIN_TICKETS_PER_BATCH, Ticket, TicketBatch,
};
use crate::utils::generate_batch_id;
use chrono::{DateTime, Utc};
use rand::Rng;
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;

/// 批次与票据账本
///
/// 两张表都按 id 有序存放，遍历顺序稳定，固定种子的抽奖结果可复现。
/// 账本本身不关心场次状态，状态前置条件由 `RaffleSession` 负责。
#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq, Eq)]
pub struct TicketLedger {
    #[serde(default)]
    pub batches: BTreeMap<String, TicketBatch>,
    #[serde(default)]
    pub tickets: BTreeMap<String, Ticket>,
}

impl TicketLedger {
    /// 票数必须在 [1, 20]
    pub fn validate_ticket_count(count: i64) -> AppResult<u32> {
        if !(MIN_TICKETS_PER_BATCH..=MAX_TICKETS_PER_BATCH).contains(&count) {
            return Err(AppError::ValidationError(format!(
                "Invalid ticket count ({MIN_TICKETS_PER_BATCH}-{MAX_TICKETS_PER_BATCH})"
            )));
        }
        Ok(count as u32)
    }

    /// 新建批次并一次性分配全部票据，批次号冲突时重新生成
    pub fn create_batch<R: Rng + ?Sized>(
        &mut self,
        ticket_count: u32,
        label: Option<String>,
        now: DateTime<Utc>,
        rng: &mut R,
    ) -> TicketBatch {
        let batch_id = loop {
            let candidate = generate_batch_id(rng);
            if !self.batches.contains_key(&candidate) {
                break candidate;
            }
            log::debug!("Batch id collision on {candidate}, drawing again");
        };

        let batch = TicketBatch {
            batch_id: batch_id.clone(),
            ticket_count,
            label,
            status: BatchStatus::Unclaimed,
            created_at: now,
            claimed_at: None,
        };
        self.batches.insert(batch_id.clone(), batch.clone());

        for index in 1..=ticket_count {
            let ticket_id = Ticket::ticket_id_for(&batch_id, index);
            self.tickets.insert(
                ticket_id.clone(),
                Ticket {
                    ticket_id,
                    batch_id: batch_id.clone(),
                    index,
                    is_winner: false,
                    forfeited: false,
                    claimed_at: None,
                },
            );
        }

        batch
    }

    pub fn batch(&self, batch_id: &str) -> Option<&TicketBatch> {
        self.batches.get(batch_id)
    }

    pub fn ticket(&self, ticket_id: &str) -> Option<&Ticket> {
        self.tickets.get(ticket_id)
    }

    /// 批次内全部票号（按序号升序）
    pub fn batch_ticket_ids(&self, batch_id: &str) -> Vec<String> {
        self.tickets
            .values()
            .filter(|t| t.batch_id == batch_id)
            .map(|t| t.ticket_id.clone())
            .collect()
    }

    /// 参与者领取批次：unclaimed -> claimed（单向），返回批次内票号
    pub fn claim_batch(&mut self, batch_id: &str, now: DateTime<Utc>) -> AppResult<Vec<String>> {
        let batch = self
            .batches
            .get_mut(batch_id)
            .ok_or_else(|| AppError::NotFound("Batch not found".to_string()))?;

        if batch.status == BatchStatus::Claimed {
            return Err(AppError::Conflict("Batch already claimed".to_string()));
        }

        batch.status = BatchStatus::Claimed;
        batch.claimed_at = Some(now);

        Ok(self.batch_ticket_ids(batch_id))
    }

    /// 可抽条件：所属批次已领取、尚未中奖、未被作废
    pub fn is_eligible(&self, ticket: &Ticket) -> bool {
        !ticket.is_winner
            && !ticket.forfeited
            && self
                .batches
                .get(&ticket.batch_id)
                .is_some_and(|b| b.status == BatchStatus::Claimed)
    }

    pub fn eligible_tickets(&self) -> Vec<&Ticket> {
        self.tickets.values().filter(|t| self.is_eligible(t)).collect()
    }

    /// 在可抽票据中均匀随机抽取一张并标记为中奖
    ///
    /// `exclude` 指定的票据本轮不参与，除非它是唯一可抽的票据。
    pub fn draw<R: Rng + ?Sized>(&mut self, rng: &mut R, exclude: Option<&str>) -> AppResult<Ticket> {
        let eligible: Vec<String> = self
            .eligible_tickets()
            .into_iter()
            .map(|t| t.ticket_id.clone())
            .collect();

        if eligible.is_empty() {
            return Err(AppError::Conflict("No tickets available".to_string()));
        }

        let mut pool: Vec<&String> = eligible
            .iter()
            .filter(|id| Some(id.as_str()) != exclude)
            .collect();
        if pool.is_empty() {
            pool = eligible.iter().collect();
        }

        // gen_range 内部为拒绝采样，不存在取模偏差
        let picked = pool[rng.gen_range(0..pool.len())].clone();

        let ticket = self
            .tickets
            .get_mut(&picked)
            .ok_or_else(|| AppError::InternalError(format!("Ticket {picked} disappeared")))?;
        ticket.is_winner = true;

        Ok(ticket.clone())
    }

    /// 撤销中奖标记；`forfeit` 为 true 时该票永久退出奖池
    pub fn release_winner(&mut self, ticket_id: &str, forfeit: bool) -> AppResult<()> {
        let ticket = self
            .tickets
            .get_mut(ticket_id)
            .ok_or_else(|| AppError::NotFound("Ticket not found".to_string()))?;
        ticket.is_winner = false;
        if forfeit {
            ticket.forfeited = true;
        }
        Ok(())
    }

    /// 扫码后登记领奖
    pub fn mark_claimed(&mut self, ticket_id: &str, now: DateTime<Utc>) -> AppResult<()> {
        let ticket = self
            .tickets
            .get_mut(ticket_id)
            .ok_or_else(|| AppError::NotFound("Ticket not found".to_string()))?;

        if !ticket.is_winner {
            return Err(AppError::ValidationError(
                "Not a winning ticket".to_string(),
            ));
        }
        if ticket.claimed_at.is_some() {
            return Err(AppError::Conflict("Already claimed".to_string()));
        }

        ticket.claimed_at = Some(now);
        Ok(())
    }

    /// 主持人确认领奖；已由扫码登记过的保留原时间
    pub fn stamp_claimed(&mut self, ticket_id: &str, now: DateTime<Utc>) -> AppResult<()> {
        let ticket = self
            .tickets
            .get_mut(ticket_id)
            .ok_or_else(|| AppError::NotFound("Ticket not found".to_string()))?;
        ticket.claimed_at.get_or_insert(now);
        Ok(())
    }

    /// 批次扫码时对应的中奖票：优先返回尚未领奖的
    pub fn winning_ticket_in_batch(&self, batch_id: &str) -> Option<&Ticket> {
        let mut winners = self
            .tickets
            .values()
            .filter(|t| t.batch_id == batch_id && t.is_winner);
        let first = winners.next()?;
        if first.claimed_at.is_none() {
            return Some(first);
        }
        winners.find(|t| t.claimed_at.is_none()).or(Some(first))
    }

    /// 所有中过奖（含已作废）的票据
    pub fn winners(&self) -> Vec<&Ticket> {
        self.tickets
            .values()
            .filter(|t| t.is_winner || t.forfeited)
            .collect()
    }

    pub fn ticket_count(&self) -> usize {
        self.tickets.len()
    }

    pub fn available_count(&self) -> usize {
        self.tickets.values().filter(|t| self.is_eligible(t)).count()
    }

    pub fn batch_count(&self) -> usize {
        self.batches.len()
    }

    pub fn claimed_batch_count(&self) -> usize {
        self.batches
            .values()
            .filter(|b| b.status == BatchStatus::Claimed)
            .count()
    }
}
