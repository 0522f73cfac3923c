// ==========================================
// 仓储入库收货核心 - API层错误类型
// ==========================================
// 职责: 定义API层错误类型，转换引擎/仓储错误为前端可渲染的结构化错误
// 红线: 错误必须携带种类与相关ID，前端无需解析字符串
// ==========================================

use crate::engine::error::InboundError;
use crate::i18n::t_with_args;
use crate::importer::error::ImportError;
use crate::repository::error::RepositoryError;
use thiserror::Error;

/// API层错误类型
#[derive(Error, Debug)]
pub enum ApiError {
    // ==========================================
    // 生命周期/库位错误（对应引擎错误种类）
    // ==========================================
    #[error("收货单已处于终态: receipt_id={receipt_id}, status={status}")]
    TerminalState { receipt_id: String, status: String },

    #[error(
        "质检未完成: receipt_id={receipt_id}, 待确认差异={lines_needing_ack:?}, 待补损坏来源={lines_needing_origin:?}"
    )]
    QcIncomplete {
        receipt_id: String,
        lines_needing_ack: Vec<String>,
        lines_needing_origin: Vec<String>,
    },

    #[error("存在未分配库位的明细行: receipt_id={receipt_id}, lines={line_ids:?}")]
    UnallocatedLines {
        receipt_id: String,
        line_ids: Vec<String>,
    },

    #[error("无可用库位: warehouse_id={warehouse_id}, line_id={line_id}")]
    NoBinAvailable {
        warehouse_id: String,
        line_id: String,
    },

    #[error("明细行状态非法 (line_id={line_id}, field={field}): {reason}")]
    InvalidLineState {
        line_id: String,
        field: String,
        reason: String,
    },

    #[error("当前状态不允许该操作: receipt_id={receipt_id}, status={status}, command={command}")]
    CommandNotAllowed {
        receipt_id: String,
        status: String,
        command: String,
    },

    // ==========================================
    // 业务规则错误
    // ==========================================
    #[error("无效输入: {0}")]
    InvalidInput(String),

    #[error("资源未找到: {entity}(id={id})")]
    NotFound { entity: String, id: String },

    #[error("业务规则违反: {0}")]
    BusinessRuleViolation(String),

    // ==========================================
    // 数据访问错误
    // ==========================================
    #[error("数据库错误: {0}")]
    DatabaseError(String),

    #[error("数据库连接失败: {0}")]
    DatabaseConnectionError(String),

    #[error("数据库事务失败: {0}")]
    DatabaseTransactionError(String),

    // ==========================================
    // 导入错误
    // ==========================================
    #[error("文件导入失败: {0}")]
    ImportError(String),

    // ==========================================
    // 通用错误
    // ==========================================
    #[error("内部错误: {0}")]
    InternalError(String),

    #[error(transparent)]
    Other(#[from] anyhow::Error),
}

impl ApiError {
    /// 错误种类编码
    pub fn kind(&self) -> &'static str {
        match self {
            ApiError::TerminalState { .. } => "TERMINAL_STATE",
            ApiError::QcIncomplete { .. } => "QC_INCOMPLETE",
            ApiError::UnallocatedLines { .. } => "UNALLOCATED_LINES",
            ApiError::NoBinAvailable { .. } => "NO_BIN_AVAILABLE",
            ApiError::InvalidLineState { .. } => "INVALID_LINE_STATE",
            ApiError::CommandNotAllowed { .. } => "COMMAND_NOT_ALLOWED",
            ApiError::InvalidInput(_) => "INVALID_INPUT",
            ApiError::NotFound { .. } => "NOT_FOUND",
            ApiError::BusinessRuleViolation(_) => "BUSINESS_RULE_VIOLATION",
            ApiError::DatabaseError(_)
            | ApiError::DatabaseConnectionError(_)
            | ApiError::DatabaseTransactionError(_) => "DATABASE",
            ApiError::ImportError(_) => "IMPORT",
            ApiError::InternalError(_) | ApiError::Other(_) => "INTERNAL",
        }
    }

    /// 按当前语言渲染错误消息
    pub fn localized_message(&self) -> String {
        match self {
            ApiError::TerminalState { receipt_id, status } => t_with_args(
                "error.terminal_state",
                &[("receipt_id", receipt_id), ("status", status)],
            ),
            ApiError::QcIncomplete {
                receipt_id,
                lines_needing_ack,
                lines_needing_origin,
            } => t_with_args(
                "error.qc_incomplete",
                &[
                    ("receipt_id", receipt_id),
                    ("ack", &lines_needing_ack.join(", ")),
                    ("origin", &lines_needing_origin.join(", ")),
                ],
            ),
            ApiError::UnallocatedLines {
                receipt_id,
                line_ids,
            } => t_with_args(
                "error.unallocated_lines",
                &[("receipt_id", receipt_id), ("lines", &line_ids.join(", "))],
            ),
            ApiError::NoBinAvailable {
                warehouse_id,
                line_id,
            } => t_with_args(
                "error.no_bin_available",
                &[("warehouse_id", warehouse_id), ("line_id", line_id)],
            ),
            ApiError::InvalidLineState {
                line_id,
                field,
                reason,
            } => t_with_args(
                "error.invalid_line_state",
                &[("line_id", line_id), ("field", field), ("reason", reason)],
            ),
            ApiError::CommandNotAllowed {
                receipt_id,
                status,
                command,
            } => t_with_args(
                "error.command_not_allowed",
                &[
                    ("receipt_id", receipt_id),
                    ("status", status),
                    ("command", command),
                ],
            ),
            ApiError::NotFound { entity, id } => {
                t_with_args("error.not_found", &[("entity", entity), ("id", id)])
            }
            other => t_with_args("error.generic", &[("message", &other.to_string())]),
        }
    }
}

// ==========================================
// 从 InboundError 转换
// ==========================================
impl From<InboundError> for ApiError {
    fn from(err: InboundError) -> Self {
        match err {
            InboundError::TerminalState { receipt_id, status } => ApiError::TerminalState {
                receipt_id,
                status: status.to_string(),
            },
            InboundError::QcIncomplete {
                receipt_id,
                lines_needing_ack,
                lines_needing_origin,
            } => ApiError::QcIncomplete {
                receipt_id,
                lines_needing_ack,
                lines_needing_origin,
            },
            InboundError::UnallocatedLines {
                receipt_id,
                line_ids,
            } => ApiError::UnallocatedLines {
                receipt_id,
                line_ids,
            },
            InboundError::NoBinAvailable {
                warehouse_id,
                line_id,
            } => ApiError::NoBinAvailable {
                warehouse_id,
                line_id,
            },
            InboundError::InvalidLineState {
                line_id,
                field,
                reason,
            } => ApiError::InvalidLineState {
                line_id,
                field,
                reason,
            },
            InboundError::CommandNotAllowed {
                receipt_id,
                status,
                command,
            } => ApiError::CommandNotAllowed {
                receipt_id,
                status: status.to_string(),
                command,
            },
            InboundError::NotFound { entity, id } => ApiError::NotFound { entity, id },
            InboundError::Repository(e) => e.into(),
        }
    }
}

// ==========================================
// 从 RepositoryError 转换
// 目的: 将Repository层的技术错误转换为用户友好的业务错误
// ==========================================
impl From<RepositoryError> for ApiError {
    fn from(err: RepositoryError) -> Self {
        match err {
            // 数据库错误
            RepositoryError::NotFound { entity, id } => ApiError::NotFound { entity, id },
            RepositoryError::DatabaseConnectionError(msg) => ApiError::DatabaseConnectionError(msg),
            RepositoryError::DatabaseTransactionError(msg) => {
                ApiError::DatabaseTransactionError(msg)
            }
            RepositoryError::LockError(msg) => {
                ApiError::DatabaseConnectionError(format!("数据库锁获取失败: {}", msg))
            }
            RepositoryError::DatabaseQueryError(msg) => ApiError::DatabaseError(msg),
            RepositoryError::UniqueConstraintViolation(msg) => {
                ApiError::BusinessRuleViolation(format!("唯一约束违反: {}", msg))
            }
            RepositoryError::ForeignKeyViolation(msg) => {
                ApiError::BusinessRuleViolation(format!("外键约束违反: {}", msg))
            }

            // 数据质量错误
            RepositoryError::FieldValueError { field, message } => {
                ApiError::InvalidInput(format!("字段{}错误: {}", field, message))
            }
            RepositoryError::ConfigValueError { key, message } => {
                ApiError::InvalidInput(format!("配置{}错误: {}", key, message))
            }

            // 通用错误
            RepositoryError::InternalError(msg) => ApiError::InternalError(msg),
            RepositoryError::Other(err) => ApiError::Other(err),
        }
    }
}

impl From<ImportError> for ApiError {
    fn from(err: ImportError) -> Self {
        match err {
            ImportError::FileNotFound(path) => {
                ApiError::ImportError(t_with_args("import.file_not_found", &[("path", &path)]))
            }
            other => ApiError::ImportError(other.to_string()),
        }
    }
}

/// Result 类型别名
pub type ApiResult<T> = Result<T, ApiError>;
