// ==========================================
// 仓储入库收货核心 - 收货看板 KPI
// ==========================================

use serde::{Deserialize, Serialize};

/// 收货看板指标（全量重算，不做增量维护）
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct GoodsInKpis {
    pub total_receipts: usize,
    pub open_receipts: usize,    // 非 COMPLETED / CANCELLED
    pub pending: usize,          // AWAITING_UNLOADING
    pub completed_today: usize,  // COMPLETED 且 updated_at 为今天
    pub late_arrivals: usize,    // 计划到货已过且尚未到货
    pub sku_receipts: usize,
    pub flat_receipts: usize,
    pub bins_allocated: usize,   // 全部行已绑定库位
    pub exception_lines: usize,  // 异常行合计
}
