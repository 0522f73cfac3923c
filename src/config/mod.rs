// ==========================================
// 仓储入库收货核心 - 配置层
// ==========================================
// 职责: 系统配置管理,支持仓库级覆写
// 存储: config_kv 表
// ==========================================

pub mod config_manager;
pub mod inbound_config_trait;

// 重导出核心配置管理器
pub use config_manager::{config_keys, ConfigManager, ConfigScope, DEFAULT_RECEIPT_PREFIX};
pub use inbound_config_trait::InboundConfigReader;
