// ==========================================
// 仓储入库收货核心 - 导入层
// ==========================================
// 职责: 外部批量数据 → 普通创建请求
// 支持: CSV
// ==========================================

pub mod error;
pub mod receipt_batch;

pub use error::{ImportError, ImportResult};
pub use receipt_batch::{
    ReceiptBatch, ReceiptBatchImporter, ReceiptDraft, RowError, VendorDirectory, VendorRef,
};
