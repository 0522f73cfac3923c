// ==========================================
// 仓储入库收货核心 - 收货 API
// ==========================================
// 职责: 收货单创建、质检、推进、库位分配、看板查询
// 红线: 所有写操作经 ReceiptAggregateStore 原子执行
// 红线: 提交成功的命令记录 ActionLog（记录失败不影响命令结果）
// ==========================================

use std::sync::{Arc, Mutex};

use chrono::Utc;
use rusqlite::Connection;
use serde::{Deserialize, Serialize};
use tracing::{debug, warn};

use crate::api::error::{ApiError, ApiResult};
use crate::config::config_manager::ConfigManager;
use crate::domain::action_log::{ActionLog, ActionType};
use crate::domain::kpi::GoodsInKpis;
use crate::domain::receipt::{LinePatch, NewReceipt, OversPolicy, Receipt, ReceiptFilter, ReceiptLine};
use crate::engine::receipt_store::{
    CommandOutcome, InboundRepositories, ReceiptAggregateStore, ReceiptCommand,
};
use crate::repository::action_log_repo::ActionLogRepository;
use crate::repository::bin_repo::SqliteBinInventory;
use crate::repository::receipt_repo::SqliteReceiptRepository;

// ==========================================
// AutoAllocateResponse - 自动分配响应
// ==========================================
/// 自动分配结果（收货单 + 未能分配的明细行）
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AutoAllocateResponse {
    pub receipt: Receipt,
    pub assigned_count: usize,
    /// 未找到可用库位的明细行（不视为错误，需人工处理）
    pub unresolved_line_ids: Vec<String>,
}

// ==========================================
// InboundApi - 收货 API
// ==========================================

/// 收货API
///
/// 职责：
/// 1. 收货单命令（创建、质检、推进、取消、库位）
/// 2. 列表/详情/看板查询
/// 3. 仓库级配置（超收策略、仓库简码）
/// 4. ActionLog记录
pub struct InboundApi {
    store: Arc<ReceiptAggregateStore>,
    action_log_repo: Arc<ActionLogRepository>,
    config_manager: Arc<ConfigManager>,
}

impl InboundApi {
    /// 创建新的InboundApi实例
    ///
    /// # 参数
    /// - store: 收货单聚合存储
    /// - action_log_repo: 操作日志仓储
    /// - config_manager: 配置管理器
    pub fn new(
        store: Arc<ReceiptAggregateStore>,
        action_log_repo: Arc<ActionLogRepository>,
        config_manager: Arc<ConfigManager>,
    ) -> Self {
        Self {
            store,
            action_log_repo,
            config_manager,
        }
    }

    /// 基于共享连接装配 SQLite 适配器（会确保表结构存在）
    pub fn from_connection(conn: Arc<Mutex<Connection>>) -> ApiResult<Self> {
        {
            let guard = conn
                .lock()
                .map_err(|e| ApiError::DatabaseConnectionError(format!("锁获取失败: {}", e)))?;
            crate::db::ensure_schema(&guard)
                .map_err(|e| ApiError::DatabaseError(format!("初始化表结构失败: {}", e)))?;
        }

        let config_manager = Arc::new(ConfigManager::from_connection(conn.clone())?);
        let repos = InboundRepositories::new(
            Arc::new(SqliteReceiptRepository::new(conn.clone())),
            Arc::new(SqliteBinInventory::new(conn.clone())),
            config_manager.clone(),
        );

        Ok(Self::new(
            Arc::new(ReceiptAggregateStore::new(repos)),
            Arc::new(ActionLogRepository::new(conn)),
            config_manager,
        ))
    }

    /// 打开数据库文件并装配
    pub fn open(db_path: &str) -> ApiResult<Self> {
        let conn = crate::db::open_sqlite_connection(db_path)
            .map_err(|e| ApiError::DatabaseConnectionError(format!("{}: {}", db_path, e)))?;
        Self::from_connection(Arc::new(Mutex::new(conn)))
    }

    // ==========================================
    // 查询接口
    // ==========================================

    /// 查询收货单详情
    pub fn get_receipt(&self, receipt_id: &str) -> ApiResult<Receipt> {
        Ok(self.store.load(receipt_id)?)
    }

    /// 按条件查询收货单（按创建时间倒序）
    pub fn list_receipts(&self, filter: &ReceiptFilter) -> ApiResult<Vec<Receipt>> {
        if let (Some(from), Some(to)) = (filter.date_from, filter.date_to) {
            if from > to {
                return Err(ApiError::InvalidInput(format!(
                    "日期范围无效: {} > {}",
                    from, to
                )));
            }
        }
        Ok(self.store.list(filter)?)
    }

    /// 计算看板指标
    ///
    /// # 参数
    /// - warehouse_id: 仓库ID，None 表示全部仓库
    pub fn compute_kpis(&self, warehouse_id: Option<&str>) -> ApiResult<GoodsInKpis> {
        let warehouse_id = warehouse_id.map(str::trim).filter(|w| !w.is_empty());
        Ok(self.store.compute_kpis(warehouse_id, Utc::now())?)
    }

    /// 查询收货单操作记录（时间正序）
    pub fn list_receipt_actions(&self, receipt_id: &str) -> ApiResult<Vec<ActionLog>> {
        Ok(self.action_log_repo.find_by_receipt(receipt_id)?)
    }

    // ==========================================
    // 收货单命令
    // ==========================================

    /// 创建收货单
    ///
    /// # 参数
    /// - draft: 收货单草稿（明细行按给定顺序编号）
    /// - operator: 操作人
    ///
    /// # 返回
    /// - Ok(Receipt): 已保存的收货单（状态 AWAITING_UNLOADING）
    /// - Err(ApiError::InvalidLineState): 明细行不合法（line_id 为 `line[序号]`）
    pub fn create_receipt(&self, draft: NewReceipt, operator: &str) -> ApiResult<Receipt> {
        Self::ensure_operator(operator)?;
        let line_count = draft.lines.len();
        let outcome = self.store.execute(ReceiptCommand::Create(draft), Utc::now())?;

        let log = ActionLog::new(&outcome.receipt.id, ActionType::CreateReceipt, operator)
            .with_status_after(outcome.receipt.status.as_str())
            .with_payload(&serde_json::json!({
                "code": outcome.receipt.code,
                "vendor_id": outcome.receipt.vendor_id,
                "vendor_type": outcome.receipt.vendor_type.as_str(),
                "warehouse_id": outcome.receipt.warehouse_id,
                "line_count": line_count,
            }));
        self.record(log);

        Ok(outcome.receipt)
    }

    /// 推进收货单到下一状态
    pub fn advance_receipt(&self, receipt_id: &str, operator: &str) -> ApiResult<Receipt> {
        let outcome = self.run(
            ReceiptCommand::Advance {
                receipt_id: receipt_id.to_string(),
            },
            operator,
        )?;
        Ok(outcome.receipt)
    }

    /// 取消收货单（非终态下无条件允许）
    pub fn cancel_receipt(&self, receipt_id: &str, operator: &str) -> ApiResult<Receipt> {
        let outcome = self.run(
            ReceiptCommand::Cancel {
                receipt_id: receipt_id.to_string(),
            },
            operator,
        )?;
        Ok(outcome.receipt)
    }

    /// 修改明细行质检字段/备注
    pub fn update_line(
        &self,
        line_id: &str,
        patch: LinePatch,
        operator: &str,
    ) -> ApiResult<ReceiptLine> {
        let receipt_id = self.store.resolve_line(line_id)?;
        let outcome = self.run(
            ReceiptCommand::SetLineField {
                receipt_id,
                line_id: line_id.to_string(),
                patch,
            },
            operator,
        )?;
        Self::line_of(&outcome, line_id)
    }

    /// 全部明细行按计划数量收货
    pub fn mark_all_received(&self, receipt_id: &str, operator: &str) -> ApiResult<Receipt> {
        let outcome = self.run(
            ReceiptCommand::MarkAllReceived {
                receipt_id: receipt_id.to_string(),
            },
            operator,
        )?;
        Ok(outcome.receipt)
    }

    /// 为未分配的明细行自动分配库位
    pub fn auto_allocate(&self, receipt_id: &str, operator: &str) -> ApiResult<AutoAllocateResponse> {
        let outcome = self.run(
            ReceiptCommand::AutoAllocate {
                receipt_id: receipt_id.to_string(),
            },
            operator,
        )?;

        let (assigned_count, unresolved_line_ids) = outcome
            .allocation
            .as_ref()
            .map(|a| (a.assignments.len(), a.unresolved.clone()))
            .unwrap_or_default();
        if !unresolved_line_ids.is_empty() {
            debug!(
                receipt_id = %receipt_id,
                unresolved = unresolved_line_ids.len(),
                "部分明细行未找到可用库位"
            );
        }

        Ok(AutoAllocateResponse {
            receipt: outcome.receipt,
            assigned_count,
            unresolved_line_ids,
        })
    }

    /// 为明细行重新分配库位（排除当前库位）
    pub fn reassign_line_bin(&self, line_id: &str, operator: &str) -> ApiResult<ReceiptLine> {
        let receipt_id = self.store.resolve_line(line_id)?;
        let outcome = self.run(
            ReceiptCommand::Reassign {
                receipt_id,
                line_id: line_id.to_string(),
            },
            operator,
        )?;
        Self::line_of(&outcome, line_id)
    }

    /// 清除明细行库位（幂等）
    pub fn clear_line_bin(&self, line_id: &str, operator: &str) -> ApiResult<ReceiptLine> {
        let receipt_id = self.store.resolve_line(line_id)?;
        let outcome = self.run(
            ReceiptCommand::Clear {
                receipt_id,
                line_id: line_id.to_string(),
            },
            operator,
        )?;
        Self::line_of(&outcome, line_id)
    }

    // ==========================================
    // 仓库配置
    // ==========================================

    /// 查询仓库生效的超收策略
    pub fn get_overs_policy(&self, warehouse_id: &str) -> ApiResult<OversPolicy> {
        Ok(self.config_manager.get_overs_policy(warehouse_id)?)
    }

    /// 设置超收策略（warehouse_id 为 None 时设置全局默认）
    ///
    /// 只影响之后创建的收货单；hold_days 为 0 表示到货当天处置
    pub fn set_overs_policy(&self, warehouse_id: Option<&str>, policy: OversPolicy) -> ApiResult<()> {
        Ok(self.config_manager.set_overs_policy(warehouse_id, &policy)?)
    }

    /// 设置仓库简码（3位字母数字，仓库间唯一）
    pub fn set_warehouse_short_code(&self, warehouse_id: &str, short_code: &str) -> ApiResult<()> {
        Ok(self.config_manager.set_short_code(warehouse_id, short_code)?)
    }

    // ==========================================
    // 内部方法
    // ==========================================

    /// 执行已存在收货单上的命令并记录操作日志
    fn run(&self, command: ReceiptCommand, operator: &str) -> ApiResult<CommandOutcome> {
        Self::ensure_operator(operator)?;

        let action_type = command.action_type();
        let line_id = command.line_id().map(str::to_string);
        let payload = serde_json::to_value(&command).ok();

        let outcome = self.store.execute(command, Utc::now())?;
        if !outcome.changed {
            debug!(receipt_id = %outcome.receipt.id, action = action_type.as_str(), "命令无变化，跳过操作日志");
            return Ok(outcome);
        }

        let mut log = ActionLog::new(&outcome.receipt.id, action_type, operator)
            .with_status_after(outcome.receipt.status.as_str());
        log.payload_json = payload;
        if let Some(line_id) = line_id.as_deref() {
            log = log.with_line(line_id);
        }
        if let Some(transition) = &outcome.transition {
            log = log.with_detail(format!("{} -> {}", transition.from, transition.to));
        } else if let Some(allocation) = &outcome.allocation {
            log = log.with_detail(format!(
                "assigned={}, unresolved={}",
                allocation.assignments.len(),
                allocation.unresolved.len()
            ));
        }
        self.record(log);

        Ok(outcome)
    }

    fn record(&self, log: ActionLog) {
        if let Err(e) = self.action_log_repo.insert(&log) {
            warn!(error = %e, receipt_id = %log.receipt_id, "记录操作日志失败");
        }
    }

    fn ensure_operator(operator: &str) -> ApiResult<()> {
        if operator.trim().is_empty() {
            return Err(ApiError::InvalidInput("操作人(operator)不能为空".to_string()));
        }
        Ok(())
    }

    fn line_of(outcome: &CommandOutcome, line_id: &str) -> ApiResult<ReceiptLine> {
        outcome
            .receipt
            .line(line_id)
            .cloned()
            .ok_or_else(|| ApiError::NotFound {
                entity: "ReceiptLine".to_string(),
                id: line_id.to_string(),
            })
    }
}
