// ==========================================
// 仓储入库收货核心 - 收货单生命周期状态机
// ==========================================
// 正向: AWAITING_UNLOADING → UNLOADING → MOVED_TO_BAY
//       → ALLOCATED → READY_FOR_PICKING → COMPLETED
// 取消: 任意非终态 → CANCELLED（无守卫）
// 红线: 不可跳步；每次 advance 恰好前进一步
// ==========================================

use crate::domain::receipt::Receipt;
use crate::domain::types::ReceiptStatus;
use crate::engine::error::{InboundError, InboundResult};
use crate::engine::reconciliation::ReconciliationCalculator;
use crate::engine::bin_allocation::BinAllocationGate;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// 一次状态流转
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct Transition {
    pub from: ReceiptStatus,
    pub to: ReceiptStatus,
}

/// 命令可执行的状态窗口
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CommandWindow {
    /// 实收/损坏/缺失/来源/差异确认：QC 完成前
    QcEdit,
    /// 备注：任意非终态
    NotesEdit,
    /// 自动分配/重分配/清除库位：仅 ALLOCATED
    BinAllocation,
}

impl CommandWindow {
    fn label(&self) -> &'static str {
        match self {
            CommandWindow::QcEdit => "QC_EDIT",
            CommandWindow::NotesEdit => "NOTES_EDIT",
            CommandWindow::BinAllocation => "BIN_ALLOCATION",
        }
    }

    fn admits(&self, status: ReceiptStatus) -> bool {
        match self {
            CommandWindow::QcEdit => matches!(
                status,
                ReceiptStatus::AwaitingUnloading
                    | ReceiptStatus::Unloading
                    | ReceiptStatus::MovedToBay
            ),
            CommandWindow::NotesEdit => !status.is_terminal(),
            CommandWindow::BinAllocation => status == ReceiptStatus::Allocated,
        }
    }
}

// ==========================================
// ReceiptLifecycle
// ==========================================
pub struct ReceiptLifecycle;

impl ReceiptLifecycle {
    /// 是否合法流转：正向一步，或非终态 → CANCELLED
    pub fn is_legal_transition(from: ReceiptStatus, to: ReceiptStatus) -> bool {
        if from.is_terminal() {
            return false;
        }
        to == ReceiptStatus::Cancelled || from.next() == Some(to)
    }

    /// 终态检查
    pub fn ensure_not_terminal(receipt: &Receipt) -> InboundResult<()> {
        if receipt.status.is_terminal() {
            return Err(InboundError::TerminalState {
                receipt_id: receipt.id.clone(),
                status: receipt.status,
            });
        }
        Ok(())
    }

    /// 命令窗口检查（终态优先报 TerminalState）
    pub fn ensure_command_allowed(receipt: &Receipt, window: CommandWindow) -> InboundResult<()> {
        Self::ensure_not_terminal(receipt)?;
        if !window.admits(receipt.status) {
            return Err(InboundError::CommandNotAllowed {
                receipt_id: receipt.id.clone(),
                status: receipt.status,
                command: window.label().to_string(),
            });
        }
        Ok(())
    }

    /// 校验 advance，返回目标状态（不修改收货单）
    ///
    /// 守卫:
    /// - MOVED_TO_BAY → ALLOCATED: 差异已确认 且 损坏来源已填，两类问题一并报告
    /// - ALLOCATED → READY_FOR_PICKING: 所有行已绑定库位
    pub fn validate_advance(receipt: &Receipt) -> InboundResult<ReceiptStatus> {
        Self::ensure_not_terminal(receipt)?;
        let next = receipt.status.next().ok_or_else(|| InboundError::TerminalState {
            receipt_id: receipt.id.clone(),
            status: receipt.status,
        })?;

        match (receipt.status, next) {
            (ReceiptStatus::MovedToBay, ReceiptStatus::Allocated) => {
                let lines_needing_ack = ReconciliationCalculator::lines_needing_ack(&receipt.lines);
                let lines_needing_origin =
                    ReconciliationCalculator::lines_needing_origin(&receipt.lines);
                if !lines_needing_ack.is_empty() || !lines_needing_origin.is_empty() {
                    return Err(InboundError::QcIncomplete {
                        receipt_id: receipt.id.clone(),
                        lines_needing_ack,
                        lines_needing_origin,
                    });
                }
            }
            (ReceiptStatus::Allocated, ReceiptStatus::ReadyForPicking) => {
                let line_ids = BinAllocationGate::unassigned_line_ids(&receipt.lines);
                if !line_ids.is_empty() {
                    return Err(InboundError::UnallocatedLines {
                        receipt_id: receipt.id.clone(),
                        line_ids,
                    });
                }
            }
            _ => {}
        }

        Ok(next)
    }

    /// 前进一步（校验通过才修改）
    ///
    /// AWAITING_UNLOADING → UNLOADING 时若未记录实际到货时间则补记
    pub fn advance(receipt: &mut Receipt, now: DateTime<Utc>) -> InboundResult<Transition> {
        let from = receipt.status;
        let to = Self::validate_advance(receipt)?;

        if from == ReceiptStatus::AwaitingUnloading && receipt.actual_arrival.is_none() {
            receipt.actual_arrival = Some(now);
        }
        receipt.status = to;
        receipt.updated_at = now;
        Ok(Transition { from, to })
    }

    /// 取消（非终态无条件允许）
    pub fn cancel(receipt: &mut Receipt, now: DateTime<Utc>) -> InboundResult<Transition> {
        Self::ensure_not_terminal(receipt)?;
        let from = receipt.status;
        receipt.status = ReceiptStatus::Cancelled;
        receipt.updated_at = now;
        Ok(Transition {
            from,
            to: ReceiptStatus::Cancelled,
        })
    }
}
