// ==========================================
// 仓储入库收货核心 - 收货单聚合存储
// ==========================================
// 职责: 对单张收货单原子地执行命令
// 流程: 加锁 → 加载 → 在副本上校验并修改 → 重算聚合 → 保存 → 重算 KPI
// 红线: 命令要么整体成功，要么返回具体错误且不留下任何修改
// 红线: 同一收货单的命令串行执行；库位占用先于提交，提交失败则释放
// ==========================================

use crate::config::inbound_config_trait::InboundConfigReader;
use crate::domain::action_log::ActionType;
use crate::domain::kpi::GoodsInKpis;
use crate::domain::receipt::{
    LinePatch, NewReceipt, NewReceiptLine, Receipt, ReceiptFilter, ReceiptLine,
    FLAT_CONSIGNMENT_LABEL,
};
use crate::domain::types::{AllocationStatus, ReceiptStatus, VendorType};
use crate::engine::bin_allocation::{AllocationResult, BinAllocationGate};
use crate::engine::error::{InboundError, InboundResult};
use crate::engine::kpi_projector::KpiProjector;
use crate::engine::lifecycle::{CommandWindow, ReceiptLifecycle, Transition};
use crate::engine::reconciliation::ReconciliationCalculator;
use crate::repository::bin_repo::BinInventory;
use crate::repository::error::RepositoryError;
use crate::repository::receipt_repo::ReceiptRepository;
use chrono::{DateTime, SubsecRound, Utc};
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::sync::{Arc, Mutex};
use tracing::instrument;

// ==========================================
// InboundRepositories - 收货核心协作方集合
// ==========================================
#[derive(Clone)]
pub struct InboundRepositories {
    /// 收货单存储
    pub receipt_repo: Arc<dyn ReceiptRepository>,
    /// 库位库存
    pub bin_inventory: Arc<dyn BinInventory>,
    /// 收货配置
    pub config: Arc<dyn InboundConfigReader>,
}

impl InboundRepositories {
    pub fn new(
        receipt_repo: Arc<dyn ReceiptRepository>,
        bin_inventory: Arc<dyn BinInventory>,
        config: Arc<dyn InboundConfigReader>,
    ) -> Self {
        Self {
            receipt_repo,
            bin_inventory,
            config,
        }
    }
}

// ==========================================
// ReceiptLocks - 单据级互斥锁登记表
// ==========================================
#[derive(Default)]
pub struct ReceiptLocks {
    locks: Mutex<HashMap<String, Arc<Mutex<()>>>>,
}

impl ReceiptLocks {
    /// 获取（必要时创建）收货单对应的锁
    pub fn lock_for(&self, receipt_id: &str) -> InboundResult<Arc<Mutex<()>>> {
        let mut locks = self
            .locks
            .lock()
            .map_err(|e| RepositoryError::LockError(e.to_string()))?;
        Ok(locks
            .entry(receipt_id.to_string())
            .or_insert_with(|| Arc::new(Mutex::new(())))
            .clone())
    }

    /// 归还锁；没有其它持有者时从登记表移除
    ///
    /// 克隆只发生在登记表锁内，因此计数为 1 时不会有线程在等待这把锁
    pub fn release(&self, receipt_id: &str, lock: Arc<Mutex<()>>) {
        match self.locks.lock() {
            Ok(mut locks) => {
                drop(lock);
                let idle = locks
                    .get(receipt_id)
                    .map_or(false, |l| Arc::strong_count(l) == 1);
                if idle {
                    locks.remove(receipt_id);
                }
            }
            Err(e) => tracing::warn!(receipt_id = %receipt_id, error = %e, "锁登记表不可用，跳过清理"),
        }
    }

    /// 当前登记的锁数量
    pub fn len(&self) -> usize {
        self.locks.lock().map(|l| l.len()).unwrap_or(0)
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

// ==========================================
// ReceiptCommand - 收货单命令
// ==========================================
#[derive(Debug, Clone, Serialize, Deserialize)]
pub enum ReceiptCommand {
    Create(NewReceipt),
    SetLineField {
        receipt_id: String,
        line_id: String,
        patch: LinePatch,
    },
    MarkAllReceived {
        receipt_id: String,
    },
    Advance {
        receipt_id: String,
    },
    Cancel {
        receipt_id: String,
    },
    AutoAllocate {
        receipt_id: String,
    },
    Reassign {
        receipt_id: String,
        line_id: String,
    },
    Clear {
        receipt_id: String,
        line_id: String,
    },
}

impl ReceiptCommand {
    /// 目标收货单（Create 无）
    pub fn receipt_id(&self) -> Option<&str> {
        match self {
            ReceiptCommand::Create(_) => None,
            ReceiptCommand::SetLineField { receipt_id, .. }
            | ReceiptCommand::MarkAllReceived { receipt_id }
            | ReceiptCommand::Advance { receipt_id }
            | ReceiptCommand::Cancel { receipt_id }
            | ReceiptCommand::AutoAllocate { receipt_id }
            | ReceiptCommand::Reassign { receipt_id, .. }
            | ReceiptCommand::Clear { receipt_id, .. } => Some(receipt_id),
        }
    }

    /// 目标明细行（行级命令）
    pub fn line_id(&self) -> Option<&str> {
        match self {
            ReceiptCommand::SetLineField { line_id, .. }
            | ReceiptCommand::Reassign { line_id, .. }
            | ReceiptCommand::Clear { line_id, .. } => Some(line_id),
            _ => None,
        }
    }

    /// 对应的审计操作类型
    pub fn action_type(&self) -> ActionType {
        match self {
            ReceiptCommand::Create(_) => ActionType::CreateReceipt,
            ReceiptCommand::SetLineField { .. } => ActionType::UpdateLine,
            ReceiptCommand::MarkAllReceived { .. } => ActionType::MarkAllReceived,
            ReceiptCommand::Advance { .. } => ActionType::Advance,
            ReceiptCommand::Cancel { .. } => ActionType::Cancel,
            ReceiptCommand::AutoAllocate { .. } => ActionType::AutoAllocate,
            ReceiptCommand::Reassign { .. } => ActionType::ReassignBin,
            ReceiptCommand::Clear { .. } => ActionType::ClearBin,
        }
    }
}

/// 命令执行结果
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CommandOutcome {
    pub receipt: Receipt,
    pub transition: Option<Transition>,
    pub allocation: Option<AllocationResult>,
    /// 命令是否改变了收货单（幂等命令可能为 false）
    pub changed: bool,
    /// 提交后重算的仓库 KPI（重算失败时为 None，不影响已提交的命令）
    pub kpis: Option<GoodsInKpis>,
}

impl CommandOutcome {
    fn changed(receipt: Receipt) -> Self {
        Self {
            receipt,
            transition: None,
            allocation: None,
            changed: true,
            kpis: None,
        }
    }

    fn unchanged(receipt: Receipt) -> Self {
        Self {
            changed: false,
            ..Self::changed(receipt)
        }
    }
}

// ==========================================
// ReceiptAggregateStore
// ==========================================
pub struct ReceiptAggregateStore {
    repos: InboundRepositories,
    gate: BinAllocationGate,
    locks: ReceiptLocks,
}

impl ReceiptAggregateStore {
    pub fn new(repos: InboundRepositories) -> Self {
        let gate = BinAllocationGate::new(repos.bin_inventory.clone());
        Self {
            repos,
            gate,
            locks: ReceiptLocks::default(),
        }
    }

    // ==========================================
    // 查询
    // ==========================================

    /// 加载收货单，不存在时返回 NotFound
    pub fn load(&self, receipt_id: &str) -> InboundResult<Receipt> {
        self.repos
            .receipt_repo
            .load_receipt(receipt_id)?
            .ok_or_else(|| InboundError::receipt_not_found(receipt_id))
    }

    pub fn list(&self, filter: &ReceiptFilter) -> InboundResult<Vec<Receipt>> {
        Ok(self.repos.receipt_repo.list_receipts(filter)?)
    }

    /// 明细行 → 收货单ID
    pub fn resolve_line(&self, line_id: &str) -> InboundResult<String> {
        self.repos
            .receipt_repo
            .find_receipt_id_by_line(line_id)?
            .ok_or_else(|| InboundError::line_not_found(line_id))
    }

    /// 按需重算 KPI（warehouse_id 为空则统计全部仓库）
    pub fn compute_kpis(
        &self,
        warehouse_id: Option<&str>,
        now: DateTime<Utc>,
    ) -> InboundResult<GoodsInKpis> {
        let filter = ReceiptFilter {
            warehouse_id: warehouse_id.map(str::to_string),
            ..Default::default()
        };
        let receipts = self.repos.receipt_repo.list_receipts(&filter)?;
        Ok(KpiProjector::project(&receipts, now))
    }

    // ==========================================
    // 命令执行
    // ==========================================

    /// 执行命令
    ///
    /// # 返回
    /// - `Ok(CommandOutcome)`: 已提交（或幂等无变化）的收货单
    /// - `Err(InboundError)`: 命令被拒绝，存储中的收货单保持原状
    #[instrument(skip(self, command), fields(
        command = ?command.action_type(),
        receipt_id = command.receipt_id().unwrap_or("-")
    ))]
    pub fn execute(&self, command: ReceiptCommand, now: DateTime<Utc>) -> InboundResult<CommandOutcome> {
        // 与存储精度（微秒）一致，返回值与重新加载的结果相同
        let now = now.trunc_subsecs(6);
        let action = command.action_type();
        let result = match command.receipt_id().map(str::to_string) {
            None => match command {
                ReceiptCommand::Create(draft) => self.create(draft, now),
                _ => Err(InboundError::receipt_not_found("-")),
            },
            Some(receipt_id) => {
                let lock = self.locks.lock_for(&receipt_id)?;
                let applied = match lock.lock() {
                    Ok(_guard) => self.apply(&receipt_id, command, now),
                    Err(e) => Err(InboundError::from(RepositoryError::LockError(e.to_string()))),
                };
                self.locks.release(&receipt_id, lock);
                applied
            }
        };

        match result {
            Ok(mut outcome) => {
                tracing::info!(
                    action = action.as_str(),
                    receipt_id = %outcome.receipt.id,
                    status = %outcome.receipt.status,
                    changed = outcome.changed,
                    "收货单命令已提交"
                );
                outcome.kpis = self.project_after_commit(&outcome.receipt.warehouse_id, now);
                Ok(outcome)
            }
            Err(e) => {
                tracing::warn!(action = action.as_str(), kind = e.kind(), error = %e, "收货单命令被拒绝");
                Err(e)
            }
        }
    }

    fn apply(
        &self,
        receipt_id: &str,
        command: ReceiptCommand,
        now: DateTime<Utc>,
    ) -> InboundResult<CommandOutcome> {
        let current = self.load(receipt_id)?;

        match command {
            ReceiptCommand::Create(_) => Err(InboundError::CommandNotAllowed {
                receipt_id: receipt_id.to_string(),
                status: current.status,
                command: "CREATE".to_string(),
            }),
            ReceiptCommand::SetLineField { line_id, patch, .. } => {
                self.set_line_field(current, &line_id, &patch, now)
            }
            ReceiptCommand::MarkAllReceived { .. } => self.mark_all_received(current, now),
            ReceiptCommand::Advance { .. } => self.advance(current, now),
            ReceiptCommand::Cancel { .. } => self.cancel(current, now),
            ReceiptCommand::AutoAllocate { .. } => self.auto_allocate(current, now),
            ReceiptCommand::Reassign { line_id, .. } => self.reassign(current, &line_id, now),
            ReceiptCommand::Clear { line_id, .. } => self.clear(current, &line_id, now),
        }
    }

    /// 提交：同步重算聚合后整单保存
    fn commit(&self, receipt: &mut Receipt) -> InboundResult<()> {
        ReconciliationCalculator::refresh_aggregates(receipt);
        self.repos.receipt_repo.save_receipt(receipt)?;
        Ok(())
    }

    fn project_after_commit(&self, warehouse_id: &str, now: DateTime<Utc>) -> Option<GoodsInKpis> {
        match self.compute_kpis(Some(warehouse_id), now) {
            Ok(kpis) => Some(kpis),
            Err(e) => {
                tracing::warn!(warehouse_id = %warehouse_id, error = %e, "KPI 重算失败");
                None
            }
        }
    }

    // ===== Create =====

    fn create(&self, draft: NewReceipt, now: DateTime<Utc>) -> InboundResult<CommandOutcome> {
        let warehouse_id = draft.warehouse_id.trim().to_string();
        let vendor_id = draft.vendor_id.trim().to_string();
        if warehouse_id.is_empty() {
            return Err(InboundError::invalid_line("receipt", "warehouse_id", "仓库不能为空"));
        }
        if vendor_id.is_empty() {
            return Err(InboundError::invalid_line("receipt", "vendor_id", "供应商不能为空"));
        }

        let vendor_type = draft.vendor_type.unwrap_or(VendorType::Sku);
        let receipt_id = uuid::Uuid::new_v4().to_string();

        // 先校验全部明细行，再消费单号
        let lines = draft
            .lines
            .iter()
            .enumerate()
            .map(|(idx, line)| Self::build_line(&receipt_id, idx, vendor_type, line))
            .collect::<InboundResult<Vec<_>>>()?;

        let code = self.repos.config.next_receipt_code(&warehouse_id)?;
        let overs_policy = self.repos.config.overs_policy(&warehouse_id)?;

        let mut receipt = Receipt {
            id: receipt_id,
            code,
            vendor_id,
            vendor_type,
            warehouse_id,
            reference: clean(draft.reference.as_deref()),
            notes: clean(draft.notes.as_deref()),
            planned_arrival: draft.planned_arrival.map(|t| t.trunc_subsecs(6)),
            actual_arrival: None,
            created_at: now,
            updated_at: now,
            status: ReceiptStatus::AwaitingUnloading,
            overs_policy,
            lines,
            exception_count: 0,
            allocation_status: AllocationStatus::NotStarted,
        };
        self.commit(&mut receipt)?;
        Ok(CommandOutcome::changed(receipt))
    }

    /// 明细行规范化
    ///
    /// - SKU 供应商: SKU 优先，无 SKU 时使用品名；两者皆空拒绝
    /// - FLAT 供应商: 固定寄售品名，不记录 SKU
    /// - 客户/公寓至少其一；计划数量 > 0
    fn build_line(
        receipt_id: &str,
        idx: usize,
        vendor_type: VendorType,
        draft: &NewReceiptLine,
    ) -> InboundResult<ReceiptLine> {
        let label = format!("line[{}]", idx);

        let (product_sku, product_name) = match vendor_type {
            VendorType::Sku => {
                let sku = clean(draft.product_sku.as_deref());
                let name = clean(draft.product_name.as_deref());
                match (sku, name) {
                    (Some(sku), _) => (Some(sku), None),
                    (None, Some(name)) => (None, Some(name)),
                    (None, None) => {
                        return Err(InboundError::invalid_line(
                            &label,
                            "product_sku",
                            "SKU 供应商的明细行需要 SKU 或品名",
                        ))
                    }
                }
            }
            VendorType::Flat => (None, Some(FLAT_CONSIGNMENT_LABEL.to_string())),
        };

        let customer_name = clean(draft.customer_name.as_deref());
        let apartment = clean(draft.apartment.as_deref());
        if customer_name.is_none() && apartment.is_none() {
            return Err(InboundError::invalid_line(
                &label,
                "customer_name",
                "客户与公寓至少填写一项",
            ));
        }

        if draft.quantity <= 0 {
            return Err(InboundError::invalid_line(
                &label,
                "quantity",
                format!("计划数量必须大于0: {}", draft.quantity),
            ));
        }

        Ok(ReceiptLine {
            id: uuid::Uuid::new_v4().to_string(),
            receipt_id: receipt_id.to_string(),
            line_no: idx as u32 + 1,
            product_sku,
            product_name,
            customer_name,
            apartment,
            quantity: draft.quantity,
            received_qty: None,
            damaged: 0,
            missing: 0,
            damaged_origin: None,
            ack_diff: false,
            bin_id: None,
            bin_code: None,
            notes: clean(draft.notes.as_deref()),
        })
    }

    // ===== SetLineField / MarkAllReceived =====

    fn set_line_field(
        &self,
        mut receipt: Receipt,
        line_id: &str,
        patch: &LinePatch,
        now: DateTime<Utc>,
    ) -> InboundResult<CommandOutcome> {
        let window = if patch.touches_qc_fields() {
            CommandWindow::QcEdit
        } else {
            CommandWindow::NotesEdit
        };
        ReceiptLifecycle::ensure_command_allowed(&receipt, window)?;

        let line = receipt
            .line_mut(line_id)
            .ok_or_else(|| InboundError::line_not_found(line_id))?;
        if patch.is_empty() {
            return Ok(CommandOutcome::unchanged(receipt));
        }
        Self::apply_patch(line, patch)?;

        receipt.updated_at = now;
        self.commit(&mut receipt)?;
        Ok(CommandOutcome::changed(receipt))
    }

    /// 在副本上应用修改并校验，全部通过才写回
    pub fn apply_patch(line: &mut ReceiptLine, patch: &LinePatch) -> InboundResult<()> {
        let mut next = line.clone();

        if let Some(received) = patch.received_qty {
            non_negative(&line.id, "received_qty", received)?;
            // 实收变更后原确认失效
            if next.received_qty != Some(received) && patch.ack_diff.is_none() {
                next.ack_diff = false;
            }
            next.received_qty = Some(received);
        }
        if let Some(damaged) = patch.damaged {
            non_negative(&line.id, "damaged", damaged)?;
            next.damaged = damaged;
        }
        if let Some(missing) = patch.missing {
            non_negative(&line.id, "missing", missing)?;
            next.missing = missing;
        }
        if let Some(origin) = patch.damaged_origin {
            next.damaged_origin = Some(origin);
        }
        if let Some(ack) = patch.ack_diff {
            next.ack_diff = ack;
        }
        if let Some(notes) = patch.notes.as_deref() {
            next.notes = clean(Some(notes));
        }

        if next.damaged > next.effective_received() {
            return Err(InboundError::invalid_line(
                &line.id,
                "damaged",
                format!(
                    "损坏数量 {} 超过实收数量 {}",
                    next.damaged,
                    next.effective_received()
                ),
            ));
        }
        if next.missing > next.quantity {
            return Err(InboundError::invalid_line(
                &line.id,
                "missing",
                format!("缺失数量 {} 超过计划数量 {}", next.missing, next.quantity),
            ));
        }

        *line = next;
        Ok(())
    }

    fn mark_all_received(&self, mut receipt: Receipt, now: DateTime<Utc>) -> InboundResult<CommandOutcome> {
        ReceiptLifecycle::ensure_command_allowed(&receipt, CommandWindow::QcEdit)?;

        for line in receipt.lines.iter_mut() {
            line.received_qty = Some(line.quantity);
            line.damaged = 0;
            line.missing = 0;
            line.damaged_origin = None;
            line.ack_diff = true;
        }

        receipt.updated_at = now;
        self.commit(&mut receipt)?;
        Ok(CommandOutcome::changed(receipt))
    }

    // ===== Advance / Cancel =====

    fn advance(&self, mut receipt: Receipt, now: DateTime<Utc>) -> InboundResult<CommandOutcome> {
        let transition = ReceiptLifecycle::advance(&mut receipt, now)?;
        self.commit(&mut receipt)?;
        Ok(CommandOutcome {
            transition: Some(transition),
            ..CommandOutcome::changed(receipt)
        })
    }

    fn cancel(&self, mut receipt: Receipt, now: DateTime<Utc>) -> InboundResult<CommandOutcome> {
        let transition = ReceiptLifecycle::cancel(&mut receipt, now)?;
        self.commit(&mut receipt)?;

        // 已提交后释放库位；行上保留库位记录供追溯
        let held = receipt.held_bin_ids();
        if !held.is_empty() {
            tracing::debug!(receipt_id = %receipt.id, bins = held.len(), "取消收货单，释放库位");
            self.gate.release_all(&held);
        }

        Ok(CommandOutcome {
            transition: Some(transition),
            ..CommandOutcome::changed(receipt)
        })
    }

    // ===== 库位命令 =====

    fn auto_allocate(&self, mut receipt: Receipt, now: DateTime<Utc>) -> InboundResult<CommandOutcome> {
        ReceiptLifecycle::ensure_command_allowed(&receipt, CommandWindow::BinAllocation)?;
        let short_code = self.repos.config.short_code(&receipt.warehouse_id)?;

        let allocation = self.gate.auto_allocate(&receipt, short_code.as_deref())?;
        for assignment in &allocation.assignments {
            if let Some(line) = receipt.line_mut(&assignment.line_id) {
                line.bin_id = Some(assignment.bin_id.clone());
                line.bin_code = Some(assignment.bin_code.clone());
            }
        }

        let changed = !allocation.assignments.is_empty();
        if changed {
            receipt.updated_at = now;
            if let Err(e) = self.commit(&mut receipt) {
                self.gate.release_all(&allocation.bin_ids());
                return Err(e);
            }
        }

        Ok(CommandOutcome {
            allocation: Some(allocation),
            changed,
            ..CommandOutcome::changed(receipt)
        })
    }

    fn reassign(&self, mut receipt: Receipt, line_id: &str, now: DateTime<Utc>) -> InboundResult<CommandOutcome> {
        ReceiptLifecycle::ensure_command_allowed(&receipt, CommandWindow::BinAllocation)?;
        let short_code = self.repos.config.short_code(&receipt.warehouse_id)?;

        let line = receipt
            .line(line_id)
            .cloned()
            .ok_or_else(|| InboundError::line_not_found(line_id))?;
        let assignment = self
            .gate
            .reassign(&receipt.warehouse_id, &line, short_code.as_deref())?;

        let previous = line.bin_id.clone().filter(|b| !b.trim().is_empty());
        if let Some(target) = receipt.line_mut(line_id) {
            target.bin_id = Some(assignment.bin_id.clone());
            target.bin_code = Some(assignment.bin_code.clone());
        }

        receipt.updated_at = now;
        if let Err(e) = self.commit(&mut receipt) {
            self.gate.release_all(&[assignment.bin_id]);
            return Err(e);
        }

        // 新库位已提交，再释放旧库位
        if let Some(old) = previous {
            self.gate.release_all(&[old]);
        }

        Ok(CommandOutcome {
            allocation: Some(AllocationResult {
                assignments: vec![assignment],
                unresolved: vec![],
            }),
            ..CommandOutcome::changed(receipt)
        })
    }

    fn clear(&self, mut receipt: Receipt, line_id: &str, now: DateTime<Utc>) -> InboundResult<CommandOutcome> {
        ReceiptLifecycle::ensure_command_allowed(&receipt, CommandWindow::BinAllocation)?;

        let line = receipt
            .line_mut(line_id)
            .ok_or_else(|| InboundError::line_not_found(line_id))?;
        let had_code = line.bin_code.is_some();
        let previous = BinAllocationGate::detach(line);

        if previous.is_none() && !had_code {
            return Ok(CommandOutcome::unchanged(receipt));
        }

        receipt.updated_at = now;
        self.commit(&mut receipt)?;

        if let Some(bin_id) = previous {
            self.gate.release_all(&[bin_id]);
        }
        Ok(CommandOutcome::changed(receipt))
    }
}

/// 去除首尾空白，空串视为未填
fn clean(value: Option<&str>) -> Option<String> {
    value
        .map(str::trim)
        .filter(|s| !s.is_empty())
        .map(str::to_string)
}

fn non_negative(line_id: &str, field: &str, value: i32) -> InboundResult<()> {
    if value < 0 {
        return Err(InboundError::invalid_line(
            line_id,
            field,
            format!("数量不能为负: {}", value),
        ));
    }
    Ok(())
}
