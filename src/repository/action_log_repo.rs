// ==========================================
// 仓储入库收货核心 - 操作日志数据仓储
// ==========================================
// 对齐: action_log 表
// 红线: 日志只追加，不修改
// ==========================================

mod core;
mod queries;


pub use core::ActionLogRepository;
