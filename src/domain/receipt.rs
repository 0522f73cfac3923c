// ==========================================
// 仓储入库收货核心 - 收货单领域模型
// ==========================================
// 对齐: inbound_receipts / inbound_receipt_lines 表
// 红线: 收货单独占其明细行，明细行不可单独删除
// ==========================================

use crate::domain::types::{
    AllocationStatus, DamageOrigin, OversDisposal, ReceiptStatus, VendorType,
};
use chrono::{DateTime, Duration, Utc};
use serde::{Deserialize, Serialize};

/// FLAT 供应商明细行使用的固定寄售品名
pub const FLAT_CONSIGNMENT_LABEL: &str = "FLAT CONSIGNMENT";

// ==========================================
// OversPolicy - 超收处置策略
// ==========================================
// 由配置提供，核心只读
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct OversPolicy {
    pub hold_days: u32,
    pub after: OversDisposal,
}

impl Default for OversPolicy {
    fn default() -> Self {
        Self {
            hold_days: 3,
            after: OversDisposal::Dispose,
        }
    }
}

// ==========================================
// Receipt - 收货单
// ==========================================
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Receipt {
    // ===== 标识 =====
    pub id: String,
    pub code: String, // 收货单号 RCPT-XXX-000001
    pub vendor_id: String,
    pub vendor_type: VendorType,
    pub warehouse_id: String,
    pub reference: Option<String>, // PO / ASN
    pub notes: Option<String>,

    // ===== 时间 =====
    pub planned_arrival: Option<DateTime<Utc>>,
    pub actual_arrival: Option<DateTime<Utc>>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,

    // ===== 状态 =====
    pub status: ReceiptStatus,
    pub overs_policy: OversPolicy,

    // ===== 明细（按创建顺序，不重排） =====
    pub lines: Vec<ReceiptLine>,

    // ===== 派生聚合（随每次变更同步重算） =====
    pub exception_count: usize,
    pub allocation_status: AllocationStatus,
}

impl Receipt {
    /// 按ID查找明细行
    pub fn line(&self, line_id: &str) -> Option<&ReceiptLine> {
        self.lines.iter().find(|l| l.id == line_id)
    }

    /// 按ID查找明细行（可变）
    pub fn line_mut(&mut self, line_id: &str) -> Option<&mut ReceiptLine> {
        self.lines.iter_mut().find(|l| l.id == line_id)
    }

    /// 超收货物的保留截止时间
    ///
    /// 以实际到货时间为起点（未到货时取创建时间）
    pub fn overs_hold_until(&self) -> DateTime<Utc> {
        let start = self.actual_arrival.unwrap_or(self.created_at);
        start + Duration::days(i64::from(self.overs_policy.hold_days))
    }

    /// 当前占用的库位ID（去重前，按行顺序）
    pub fn held_bin_ids(&self) -> Vec<String> {
        self.lines.iter().filter_map(|l| l.bin_id.clone()).collect()
    }
}

// ==========================================
// ReceiptLine - 收货明细行
// ==========================================
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ReceiptLine {
    pub id: String,
    pub receipt_id: String,
    pub line_no: u32,

    // ===== 商品 (SKU 与品名二选一) =====
    pub product_sku: Option<String>,
    pub product_name: Option<String>,

    // ===== 目的地 (客户/公寓至少其一) =====
    pub customer_name: Option<String>,
    pub apartment: Option<String>,

    // ===== 数量 =====
    pub quantity: i32,             // 计划数量 (>0)
    pub received_qty: Option<i32>, // 实收数量，质检前视同 quantity
    pub damaged: i32,
    pub missing: i32,
    pub damaged_origin: Option<DamageOrigin>,
    pub ack_diff: bool, // 已确认差异

    // ===== 库位 =====
    pub bin_id: Option<String>,
    pub bin_code: Option<String>,

    pub notes: Option<String>,
}

impl ReceiptLine {
    /// 实收数量（未质检时取计划数量）
    pub fn effective_received(&self) -> i32 {
        self.received_qty.unwrap_or(self.quantity)
    }

    /// 是否已绑定库位
    pub fn has_bin(&self) -> bool {
        self.bin_id.as_deref().map_or(false, |b| !b.trim().is_empty())
    }
}

// ==========================================
// 创建请求
// ==========================================

/// 新建收货单请求
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct NewReceipt {
    pub vendor_id: String,
    pub vendor_type: Option<VendorType>,
    pub warehouse_id: String,
    pub reference: Option<String>,
    pub planned_arrival: Option<DateTime<Utc>>,
    pub notes: Option<String>,
    pub lines: Vec<NewReceiptLine>,
}

/// 新建明细行请求
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct NewReceiptLine {
    pub product_sku: Option<String>,
    pub product_name: Option<String>,
    pub customer_name: Option<String>,
    pub apartment: Option<String>,
    pub quantity: i32,
    pub notes: Option<String>,
}

// ==========================================
// LinePatch - 质检字段修改
// ==========================================
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct LinePatch {
    pub received_qty: Option<i32>,
    pub damaged: Option<i32>,
    pub missing: Option<i32>,
    pub damaged_origin: Option<DamageOrigin>,
    pub ack_diff: Option<bool>,
    pub notes: Option<String>,
}

impl LinePatch {
    /// 是否修改了质检字段（notes 之外）
    pub fn touches_qc_fields(&self) -> bool {
        self.received_qty.is_some()
            || self.damaged.is_some()
            || self.missing.is_some()
            || self.damaged_origin.is_some()
            || self.ack_diff.is_some()
    }

    pub fn is_empty(&self) -> bool {
        !self.touches_qc_fields() && self.notes.is_none()
    }
}

// ==========================================
// ReceiptFilter - 列表查询条件
// ==========================================
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct ReceiptFilter {
    pub warehouse_id: Option<String>,
    pub vendor_type: Option<VendorType>,
    pub status: Option<ReceiptStatus>,
    pub search: Option<String>, // 单号 / 参考号 / SKU / 客户 / 库位
    pub date_from: Option<DateTime<Utc>>,
    pub date_to: Option<DateTime<Utc>>,
}

impl ReceiptFilter {
    pub fn for_warehouse(warehouse_id: &str) -> Self {
        Self {
            warehouse_id: Some(warehouse_id.to_string()),
            ..Default::default()
        }
    }
}
