// ==========================================
// 仓储入库收货核心 - API 层
// ==========================================
// 职责: 提供收货业务接口,供上层界面调用
// ==========================================

pub mod error;
pub mod import_api;
pub mod inbound_api;

// 重导出核心类型
pub use error::{ApiError, ApiResult};
pub use import_api::{ImportApi, ImportReceiptsResponse};
pub use inbound_api::{AutoAllocateResponse, InboundApi};
