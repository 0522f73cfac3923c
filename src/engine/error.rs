// ==========================================
// 仓储入库收货核心 - 引擎层错误类型
// ==========================================
// 所有错误携带类型 + 相关ID，调用方无需解析字符串
// 工具: thiserror 派生宏
// ==========================================

use crate::domain::types::ReceiptStatus;
use crate::repository::error::RepositoryError;
use thiserror::Error;

/// 收货核心错误类型
#[derive(Error, Debug)]
pub enum InboundError {
    // ===== 生命周期错误 =====
    /// 终态不可再流转（不重试）
    #[error("收货单已处于终态: receipt_id={receipt_id}, status={status}")]
    TerminalState {
        receipt_id: String,
        status: ReceiptStatus,
    },

    /// 质检未完成（补齐差异确认/损坏来源后可重试）
    #[error(
        "质检未完成: receipt_id={receipt_id}, 待确认差异={lines_needing_ack:?}, 待补损坏来源={lines_needing_origin:?}"
    )]
    QcIncomplete {
        receipt_id: String,
        lines_needing_ack: Vec<String>,
        lines_needing_origin: Vec<String>,
    },

    /// 存在未分配库位的明细行
    #[error("存在未分配库位的明细行: receipt_id={receipt_id}, lines={line_ids:?}")]
    UnallocatedLines {
        receipt_id: String,
        line_ids: Vec<String>,
    },

    // ===== 库位错误 =====
    /// 无可用库位（需人工介入，不自动重试）
    #[error("无可用库位: warehouse_id={warehouse_id}, line_id={line_id}")]
    NoBinAvailable {
        warehouse_id: String,
        line_id: String,
    },

    // ===== 命令边界错误 =====
    #[error("明细行状态非法 (line_id={line_id}, field={field}): {reason}")]
    InvalidLineState {
        line_id: String,
        field: String,
        reason: String,
    },

    #[error("当前状态不允许该操作: receipt_id={receipt_id}, status={status}, command={command}")]
    CommandNotAllowed {
        receipt_id: String,
        status: ReceiptStatus,
        command: String,
    },

    #[error("记录未找到: {entity} id={id}")]
    NotFound { entity: String, id: String },

    // ===== 外部协作方错误（原样透传） =====
    #[error(transparent)]
    Repository(#[from] RepositoryError),
}

impl InboundError {
    pub fn receipt_not_found(id: &str) -> Self {
        InboundError::NotFound {
            entity: "Receipt".to_string(),
            id: id.to_string(),
        }
    }

    pub fn line_not_found(id: &str) -> Self {
        InboundError::NotFound {
            entity: "ReceiptLine".to_string(),
            id: id.to_string(),
        }
    }

    pub fn invalid_line(line_id: &str, field: &str, reason: impl Into<String>) -> Self {
        InboundError::InvalidLineState {
            line_id: line_id.to_string(),
            field: field.to_string(),
            reason: reason.into(),
        }
    }

    /// 错误种类编码（供日志/前端使用）
    pub fn kind(&self) -> &'static str {
        match self {
            InboundError::TerminalState { .. } => "TERMINAL_STATE",
            InboundError::QcIncomplete { .. } => "QC_INCOMPLETE",
            InboundError::UnallocatedLines { .. } => "UNALLOCATED_LINES",
            InboundError::NoBinAvailable { .. } => "NO_BIN_AVAILABLE",
            InboundError::InvalidLineState { .. } => "INVALID_LINE_STATE",
            InboundError::CommandNotAllowed { .. } => "COMMAND_NOT_ALLOWED",
            InboundError::NotFound { .. } => "NOT_FOUND",
            InboundError::Repository(_) => "REPOSITORY",
        }
    }

    /// 调用方补齐数据后可重试
    pub fn is_recoverable(&self) -> bool {
        matches!(
            self,
            InboundError::QcIncomplete { .. }
                | InboundError::UnallocatedLines { .. }
                | InboundError::InvalidLineState { .. }
        )
    }
}

/// Result 类型别名
pub type InboundResult<T> = Result<T, InboundError>;
