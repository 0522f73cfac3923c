// ==========================================
// 仓储入库收货核心 - 质检对账计算器
// ==========================================
// 职责: 计算明细行短收/超收/异常，以及收货单分配状态
// 红线: 纯函数，无状态，不访问仓储
// ==========================================

use crate::domain::receipt::{Receipt, ReceiptLine};
use crate::domain::types::AllocationStatus;
use serde::{Deserialize, Serialize};

/// 单行数量差异
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct LineDiff {
    pub short: i32,
    pub over: i32,
}

impl LineDiff {
    pub fn is_zero(&self) -> bool {
        self.short == 0 && self.over == 0
    }
}

// ==========================================
// ReconciliationCalculator
// ==========================================
pub struct ReconciliationCalculator;

impl ReconciliationCalculator {
    /// 短收/超收
    ///
    /// short = max(0, quantity - received), over = max(0, received - quantity)
    /// 两者至多一个为正
    pub fn line_diff(line: &ReceiptLine) -> LineDiff {
        let received = line.effective_received();
        LineDiff {
            short: (line.quantity - received).max(0),
            over: (received - line.quantity).max(0),
        }
    }

    /// 是否异常行（短收/超收/损坏/缺失任一）
    pub fn line_is_exception(line: &ReceiptLine) -> bool {
        let diff = Self::line_diff(line);
        diff.short > 0 || diff.over > 0 || line.damaged > 0 || line.missing > 0
    }

    /// 收货单异常行数
    pub fn receipt_exception_count(receipt: &Receipt) -> usize {
        receipt
            .lines
            .iter()
            .filter(|l| Self::line_is_exception(l))
            .count()
    }

    /// 分配状态
    ///
    /// 零行 → NotStarted；全部有库位 → Allocated；否则 Partial
    pub fn allocation_status(lines: &[ReceiptLine]) -> AllocationStatus {
        let assigned = lines.iter().filter(|l| l.has_bin()).count();
        if assigned == 0 {
            AllocationStatus::NotStarted
        } else if assigned == lines.len() {
            AllocationStatus::Allocated
        } else {
            AllocationStatus::Partial
        }
    }

    /// 需要确认差异的行（实收 ≠ 计划 且未确认）
    pub fn lines_needing_ack(lines: &[ReceiptLine]) -> Vec<String> {
        lines
            .iter()
            .filter(|l| l.effective_received() != l.quantity && !l.ack_diff)
            .map(|l| l.id.clone())
            .collect()
    }

    /// 需要补损坏来源的行（damaged > 0 且未填来源）
    pub fn lines_needing_origin(lines: &[ReceiptLine]) -> Vec<String> {
        lines
            .iter()
            .filter(|l| l.damaged > 0 && l.damaged_origin.is_none())
            .map(|l| l.id.clone())
            .collect()
    }

    /// 超收合计（供超收处置策略使用）
    pub fn total_overs(receipt: &Receipt) -> i32 {
        receipt.lines.iter().map(|l| Self::line_diff(l).over).sum()
    }

    /// 同步重算收货单缓存聚合
    pub fn refresh_aggregates(receipt: &mut Receipt) {
        receipt.exception_count = Self::receipt_exception_count(receipt);
        receipt.allocation_status = Self::allocation_status(&receipt.lines);
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::types::DamageOrigin;

    fn line(id: &str, quantity: i32, received: Option<i32>) -> ReceiptLine {
        ReceiptLine {
            id: id.to_string(),
            receipt_id: "R1".to_string(),
            line_no: 1,
            product_sku: Some("SKU-1".to_string()),
            product_name: None,
            customer_name: Some("Alice".to_string()),
            apartment: None,
            quantity,
            received_qty: received,
            damaged: 0,
            missing: 0,
            damaged_origin: None,
            ack_diff: false,
            bin_id: None,
            bin_code: None,
            notes: None,
        }
    }

    #[test]
    fn test_line_diff_short_over_exclusive() {
        for quantity in 1..6 {
            for received in 0..12 {
                let d = ReconciliationCalculator::line_diff(&line("L", quantity, Some(received)));
                assert!(!(d.short > 0 && d.over > 0));
                assert_eq!(d.over - d.short, received - quantity);
            }
        }
    }

    #[test]
    fn test_uninspected_line_has_no_diff() {
        let l = line("L1", 10, None);
        assert!(ReconciliationCalculator::line_diff(&l).is_zero());
        assert!(!ReconciliationCalculator::line_is_exception(&l));
    }

    #[test]
    fn test_exception_from_damage_or_missing() {
        let mut l = line("L1", 5, Some(5));
        l.damaged = 1;
        assert!(ReconciliationCalculator::line_is_exception(&l));

        let mut l = line("L2", 5, Some(5));
        l.missing = 2;
        assert!(ReconciliationCalculator::line_is_exception(&l));
    }

    #[test]
    fn test_allocation_status_tie_breaks() {
        assert_eq!(
            ReconciliationCalculator::allocation_status(&[]),
            AllocationStatus::NotStarted
        );

        let mut a = line("L1", 1, None);
        let b = line("L2", 1, None);
        a.bin_id = Some("B1".to_string());
        assert_eq!(
            ReconciliationCalculator::allocation_status(&[a.clone(), b.clone()]),
            AllocationStatus::Partial
        );

        let mut c = b.clone();
        c.bin_id = Some("B2".to_string());
        assert_eq!(
            ReconciliationCalculator::allocation_status(&[a, c]),
            AllocationStatus::Allocated
        );

        // 空字符串视为未分配
        let mut d = line("L3", 1, None);
        d.bin_id = Some(" ".to_string());
        assert_eq!(
            ReconciliationCalculator::allocation_status(&[d]),
            AllocationStatus::NotStarted
        );
    }

    #[test]
    fn test_qc_gaps_reported_together() {
        let mut needs_ack = line("L1", 10, Some(8));
        needs_ack.ack_diff = false;
        let mut needs_origin = line("L2", 4, Some(4));
        needs_origin.damaged = 1;
        let mut fine = line("L3", 4, Some(3));
        fine.ack_diff = true;
        fine.damaged = 1;
        fine.damaged_origin = Some(DamageOrigin::Unloading);

        let lines = vec![needs_ack, needs_origin, fine];
        assert_eq!(ReconciliationCalculator::lines_needing_ack(&lines), vec!["L1"]);
        assert_eq!(
            ReconciliationCalculator::lines_needing_origin(&lines),
            vec!["L2"]
        );
    }
}
