// ==========================================
// 仓储入库收货核心 - 领域模型层
// ==========================================
// 职责: 定义领域实体、类型
// 红线: 不含数据访问逻辑,不含引擎逻辑
// ==========================================

pub mod action_log;
pub mod bin;
pub mod kpi;
pub mod receipt;
pub mod types;

// 重导出核心类型
pub use action_log::{ActionLog, ActionType};
pub use bin::{build_bin_code, rack_sequence_from_name, BinSlot};
pub use kpi::GoodsInKpis;
pub use receipt::{
    LinePatch, NewReceipt, NewReceiptLine, OversPolicy, Receipt, ReceiptFilter, ReceiptLine,
    FLAT_CONSIGNMENT_LABEL,
};
pub use types::{
    AllocationStatus, BinStatus, DamageOrigin, OversDisposal, RackStatus, ReceiptStatus,
    VendorType,
};
