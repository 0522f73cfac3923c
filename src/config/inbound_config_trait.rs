// ==========================================
// 仓储入库收货核心 - 收货配置读取 Trait
// ==========================================
// 职责: 定义收货核心所需的配置读取接口（不包含实现）
// 红线: 核心只读配置，不写配置（单号序号除外）
// ==========================================

use crate::domain::receipt::OversPolicy;
use crate::repository::error::RepositoryResult;

// ==========================================
// InboundConfigReader Trait
// ==========================================
// 实现者: ConfigManager（从 config_kv 表读取）
pub trait InboundConfigReader: Send + Sync {
    /// 获取仓库生效的超收处置策略
    ///
    /// # 默认值
    /// - {hold_days: 3, after: DISPOSE}
    fn overs_policy(&self, warehouse_id: &str) -> RepositoryResult<OversPolicy>;

    /// 消费一个收货单号
    fn next_receipt_code(&self, warehouse_id: &str) -> RepositoryResult<String>;

    /// 仓库简码（用于库位编码前缀）
    fn short_code(&self, warehouse_id: &str) -> RepositoryResult<Option<String>>;
}
