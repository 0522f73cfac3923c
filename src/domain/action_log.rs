// ==========================================
// 仓储入库收货核心 - 操作日志领域模型
// ==========================================
// 红线: 所有提交成功的收货单命令必须记录
// 对齐: action_log 表
// ==========================================

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use serde_json::Value as JsonValue;

// ==========================================
// ActionLog - 操作日志
// ==========================================
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ActionLog {
    pub action_id: String,
    pub receipt_id: String,
    pub action_type: ActionType,
    pub action_ts: DateTime<Utc>,
    pub actor: String,
    pub line_id: Option<String>,            // 行级命令关联行
    pub status_after: Option<String>,       // 命令提交后的收货单状态
    pub payload_json: Option<JsonValue>,    // 命令参数 / 分配结果
    pub detail: Option<String>,
}

// ==========================================
// ActionType - 操作类型
// ==========================================
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum ActionType {
    CreateReceipt,
    UpdateLine,
    MarkAllReceived,
    Advance,
    Cancel,
    AutoAllocate,
    ReassignBin,
    ClearBin,
}

impl ActionType {
    /// 转换为字符串 (用于数据库存储)
    pub fn as_str(&self) -> &'static str {
        match self {
            ActionType::CreateReceipt => "CreateReceipt",
            ActionType::UpdateLine => "UpdateLine",
            ActionType::MarkAllReceived => "MarkAllReceived",
            ActionType::Advance => "Advance",
            ActionType::Cancel => "Cancel",
            ActionType::AutoAllocate => "AutoAllocate",
            ActionType::ReassignBin => "ReassignBin",
            ActionType::ClearBin => "ClearBin",
        }
    }

    /// 从字符串解析
    pub fn parse(s: &str) -> Option<Self> {
        match s {
            "CreateReceipt" => Some(ActionType::CreateReceipt),
            "UpdateLine" => Some(ActionType::UpdateLine),
            "MarkAllReceived" => Some(ActionType::MarkAllReceived),
            "Advance" => Some(ActionType::Advance),
            "Cancel" => Some(ActionType::Cancel),
            "AutoAllocate" => Some(ActionType::AutoAllocate),
            "ReassignBin" => Some(ActionType::ReassignBin),
            "ClearBin" => Some(ActionType::ClearBin),
            _ => None,
        }
    }
}

impl ActionLog {
    /// 创建新的操作日志
    pub fn new(receipt_id: &str, action_type: ActionType, actor: &str) -> Self {
        Self {
            action_id: uuid::Uuid::new_v4().to_string(),
            receipt_id: receipt_id.to_string(),
            action_type,
            action_ts: Utc::now(),
            actor: actor.to_string(),
            line_id: None,
            status_after: None,
            payload_json: None,
            detail: None,
        }
    }

    /// 设置操作负载 (转换为JSON)
    pub fn with_payload<T: Serialize>(mut self, payload: &T) -> Self {
        self.payload_json = serde_json::to_value(payload).ok();
        self
    }

    pub fn with_line(mut self, line_id: &str) -> Self {
        self.line_id = Some(line_id.to_string());
        self
    }

    pub fn with_status_after(mut self, status: &str) -> Self {
        self.status_after = Some(status.to_string());
        self
    }

    pub fn with_detail(mut self, detail: impl Into<String>) -> Self {
        self.detail = Some(detail.into());
        self
    }
}
