// ==========================================
// 仓储入库收货核心 - 收货看板 KPI 投影
// ==========================================
// 红线: 每次从全量收货单重算，不做增量维护
// ==========================================

use crate::domain::kpi::GoodsInKpis;
use crate::domain::receipt::Receipt;
use crate::domain::types::{AllocationStatus, ReceiptStatus, VendorType};
use chrono::{DateTime, Utc};

pub struct KpiProjector;

impl KpiProjector {
    /// 计算看板指标
    ///
    /// # 参数
    /// - `receipts`: 参与统计的收货单（调用方已按仓库过滤）
    /// - `now`: 统计时点，用于"今日完成"与"迟到"判断
    pub fn project(receipts: &[Receipt], now: DateTime<Utc>) -> GoodsInKpis {
        let today = now.date_naive();
        let mut kpis = GoodsInKpis {
            total_receipts: receipts.len(),
            ..Default::default()
        };

        for r in receipts {
            if !r.status.is_terminal() {
                kpis.open_receipts += 1;
            }
            if r.status == ReceiptStatus::AwaitingUnloading {
                kpis.pending += 1;
            }
            if r.status == ReceiptStatus::Completed && r.updated_at.date_naive() == today {
                kpis.completed_today += 1;
            }
            if Self::is_late(r, now) {
                kpis.late_arrivals += 1;
            }
            match r.vendor_type {
                VendorType::Sku => kpis.sku_receipts += 1,
                VendorType::Flat => kpis.flat_receipts += 1,
            }
            if r.allocation_status == AllocationStatus::Allocated {
                kpis.bins_allocated += 1;
            }
            kpis.exception_lines += r.exception_count;
        }

        kpis
    }

    /// 迟到: 计划到货已过、尚未到货、且未终结
    pub fn is_late(receipt: &Receipt, now: DateTime<Utc>) -> bool {
        !receipt.status.is_terminal()
            && receipt.actual_arrival.is_none()
            && receipt.planned_arrival.map_or(false, |planned| planned < now)
    }
}
