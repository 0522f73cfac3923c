// ==========================================
// 仓储入库收货核心 - 核心库
// ==========================================
// 范围: 收货单生命周期 / 质检对账 / 库位分配 / 收货看板
// 技术栈: Rust + SQLite
// 系统定位: 同步核心，由上层界面调用
// ==========================================

// 初始化国际化系统
rust_i18n::i18n!("locales", fallback = "zh-CN");

// ==========================================
// 模块声明
// ==========================================

// 领域层 - 实体与类型
pub mod domain;

// 数据仓储层 - 数据访问
pub mod repository;

// 引擎层 - 业务规则
pub mod engine;

// 导入层 - 外部数据
pub mod importer;

// 配置层 - 系统配置
pub mod config;

// 数据库基础设施（连接初始化/PRAGMA 统一）
pub mod db;

// 日志系统
pub mod logging;

// 国际化
pub mod i18n;

// API 层 - 业务接口
pub mod api;

// ==========================================
// 重导出核心类型
// ==========================================

// 领域类型
pub use domain::types::{
    AllocationStatus, BinStatus, DamageOrigin, OversDisposal, RackStatus, ReceiptStatus,
    VendorType,
};

// 领域实体
pub use domain::{
    ActionLog, ActionType, BinSlot, GoodsInKpis, LinePatch, NewReceipt, NewReceiptLine,
    OversPolicy, Receipt, ReceiptFilter, ReceiptLine,
};

// 引擎
pub use engine::{
    BinAllocationGate, InboundError, KpiProjector, ReceiptAggregateStore, ReceiptCommand,
    ReceiptLifecycle, ReconciliationCalculator,
};

// API
pub use api::{ApiError, ApiResult, ImportApi, InboundApi};

// ==========================================
// 常量定义
// ==========================================

// 系统版本
pub const VERSION: &str = env!("CARGO_PKG_VERSION");

// 系统名称
pub const APP_NAME: &str = "仓储入库收货核心";

// 默认数据库文件名
pub const DB_FILE_NAME: &str = "wms_goods_in.db";

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_version() {
        assert!(!VERSION.is_empty());
    }

    #[test]
    fn test_db_version_matches_schema() {
        assert_eq!(db::CURRENT_SCHEMA_VERSION, 1);
    }
}
