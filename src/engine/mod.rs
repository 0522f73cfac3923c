// ==========================================
// 仓储入库收货核心 - 引擎层
// ==========================================
// 职责: 实现收货业务规则,不拼 SQL
// 红线: Engine 不拼 SQL, 所有拒绝必须返回结构化错误
// ==========================================

pub mod bin_allocation;
pub mod error;
pub mod kpi_projector;
pub mod lifecycle;
pub mod receipt_store;
pub mod reconciliation;

// 重导出核心引擎
pub use bin_allocation::{AllocationResult, BinAllocationGate, BinAssignment};
pub use error::{InboundError, InboundResult};
pub use kpi_projector::KpiProjector;
pub use lifecycle::{CommandWindow, ReceiptLifecycle, Transition};
pub use receipt_store::{
    CommandOutcome, InboundRepositories, ReceiptAggregateStore, ReceiptCommand, ReceiptLocks,
};
pub use reconciliation::{LineDiff, ReconciliationCalculator};
