// ==========================================
// 仓储入库收货核心 - 领域类型定义
// ==========================================
// 收货单状态 / 供应商类型 / 损坏来源 / 库位状态等枚举
// 序列化格式: SCREAMING_SNAKE_CASE (与数据库一致)
// ==========================================

use serde::{Deserialize, Serialize};
use std::fmt;

// ==========================================
// 收货单状态 (Receipt Status)
// ==========================================
// 正向顺序: AWAITING_UNLOADING → UNLOADING → MOVED_TO_BAY
//          → ALLOCATED → READY_FOR_PICKING → COMPLETED
// CANCELLED: 任意非终态可达，终态
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum ReceiptStatus {
    AwaitingUnloading, // 待卸货
    Unloading,         // 卸货中
    MovedToBay,        // 已入暂存区(质检)
    Allocated,         // 质检完成,待分配库位
    ReadyForPicking,   // 可拣货
    Completed,         // 已完成
    Cancelled,         // 已取消
}

impl ReceiptStatus {
    /// 正向流转链（不含 CANCELLED）
    pub const FORWARD_CHAIN: [ReceiptStatus; 6] = [
        ReceiptStatus::AwaitingUnloading,
        ReceiptStatus::Unloading,
        ReceiptStatus::MovedToBay,
        ReceiptStatus::Allocated,
        ReceiptStatus::ReadyForPicking,
        ReceiptStatus::Completed,
    ];

    /// 是否终态
    pub fn is_terminal(&self) -> bool {
        matches!(self, ReceiptStatus::Completed | ReceiptStatus::Cancelled)
    }

    /// 正向下一状态（终态返回 None）
    pub fn next(&self) -> Option<ReceiptStatus> {
        match self {
            ReceiptStatus::AwaitingUnloading => Some(ReceiptStatus::Unloading),
            ReceiptStatus::Unloading => Some(ReceiptStatus::MovedToBay),
            ReceiptStatus::MovedToBay => Some(ReceiptStatus::Allocated),
            ReceiptStatus::Allocated => Some(ReceiptStatus::ReadyForPicking),
            ReceiptStatus::ReadyForPicking => Some(ReceiptStatus::Completed),
            ReceiptStatus::Completed | ReceiptStatus::Cancelled => None,
        }
    }

    /// 在正向链中的位置（CANCELLED 返回 None）
    pub fn chain_index(&self) -> Option<usize> {
        Self::FORWARD_CHAIN.iter().position(|s| s == self)
    }

    /// 转换为数据库存储的字符串
    pub fn as_str(&self) -> &'static str {
        match self {
            ReceiptStatus::AwaitingUnloading => "AWAITING_UNLOADING",
            ReceiptStatus::Unloading => "UNLOADING",
            ReceiptStatus::MovedToBay => "MOVED_TO_BAY",
            ReceiptStatus::Allocated => "ALLOCATED",
            ReceiptStatus::ReadyForPicking => "READY_FOR_PICKING",
            ReceiptStatus::Completed => "COMPLETED",
            ReceiptStatus::Cancelled => "CANCELLED",
        }
    }

    /// 从字符串解析状态
    pub fn parse(s: &str) -> Option<Self> {
        match s.trim().to_uppercase().as_str() {
            "AWAITING_UNLOADING" => Some(ReceiptStatus::AwaitingUnloading),
            "UNLOADING" => Some(ReceiptStatus::Unloading),
            "MOVED_TO_BAY" => Some(ReceiptStatus::MovedToBay),
            "ALLOCATED" => Some(ReceiptStatus::Allocated),
            "READY_FOR_PICKING" => Some(ReceiptStatus::ReadyForPicking),
            "COMPLETED" => Some(ReceiptStatus::Completed),
            "CANCELLED" => Some(ReceiptStatus::Cancelled),
            _ => None,
        }
    }
}

impl fmt::Display for ReceiptStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

// ==========================================
// 供应商类型 (Vendor Type)
// ==========================================
// SKU: 按商品编码收货
// FLAT: 按住户/公寓寄售收货
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum VendorType {
    Sku,
    Flat,
}

impl VendorType {
    pub fn as_str(&self) -> &'static str {
        match self {
            VendorType::Sku => "SKU",
            VendorType::Flat => "FLAT",
        }
    }

    pub fn parse(s: &str) -> Option<Self> {
        match s.trim().to_uppercase().as_str() {
            "SKU" => Some(VendorType::Sku),
            "FLAT" => Some(VendorType::Flat),
            _ => None,
        }
    }
}

impl fmt::Display for VendorType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

// ==========================================
// 损坏来源 (Damage Origin)
// ==========================================
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum DamageOrigin {
    Unloading, // 卸货时损坏（供应商/承运商责任）
    Warehouse, // 仓内损坏
}

impl DamageOrigin {
    pub fn as_str(&self) -> &'static str {
        match self {
            DamageOrigin::Unloading => "UNLOADING",
            DamageOrigin::Warehouse => "WAREHOUSE",
        }
    }

    pub fn parse(s: &str) -> Option<Self> {
        match s.trim().to_uppercase().as_str() {
            "UNLOADING" => Some(DamageOrigin::Unloading),
            "WAREHOUSE" => Some(DamageOrigin::Warehouse),
            _ => None,
        }
    }
}

// ==========================================
// 超收处置方式 (Overs Disposal)
// ==========================================
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum OversDisposal {
    Dispose, // 到期销毁
    Charity, // 到期捐赠
}

// ==========================================
// 库位分配状态 (Allocation Status)
// ==========================================
// 零行收货单视为 NotStarted，而非 Allocated
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum AllocationStatus {
    NotStarted,
    Partial,
    Allocated,
}

impl AllocationStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            AllocationStatus::NotStarted => "NOT_STARTED",
            AllocationStatus::Partial => "PARTIAL",
            AllocationStatus::Allocated => "ALLOCATED",
        }
    }

    pub fn parse(s: &str) -> Self {
        match s.trim().to_uppercase().as_str() {
            "PARTIAL" => AllocationStatus::Partial,
            "ALLOCATED" => AllocationStatus::Allocated,
            _ => AllocationStatus::NotStarted,
        }
    }
}

// ==========================================
// 库位状态 (Bin Status)
// ==========================================
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum BinStatus {
    Empty,
    Available,
    Occupied,
    Reserved,
    Maintenance,
    Blocked,
}

impl BinStatus {
    /// 可用于上架分配
    pub fn is_allocatable(&self) -> bool {
        matches!(self, BinStatus::Empty | BinStatus::Available)
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            BinStatus::Empty => "empty",
            BinStatus::Available => "available",
            BinStatus::Occupied => "occupied",
            BinStatus::Reserved => "reserved",
            BinStatus::Maintenance => "maintenance",
            BinStatus::Blocked => "blocked",
        }
    }

    /// 未知值按 blocked 处理，不参与分配
    pub fn parse(s: &str) -> Self {
        match s.trim().to_lowercase().as_str() {
            "empty" => BinStatus::Empty,
            "available" => BinStatus::Available,
            "occupied" => BinStatus::Occupied,
            "reserved" => BinStatus::Reserved,
            "maintenance" => BinStatus::Maintenance,
            _ => BinStatus::Blocked,
        }
    }
}

// ==========================================
// 货架状态 (Rack Status)
// ==========================================
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum RackStatus {
    Active,
    Maintenance,
    Inactive,
}

impl RackStatus {
    /// 维护中/停用的货架不参与分配
    pub fn is_available(&self) -> bool {
        matches!(self, RackStatus::Active)
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            RackStatus::Active => "active",
            RackStatus::Maintenance => "maintenance",
            RackStatus::Inactive => "inactive",
        }
    }

    /// 未识别的状态按停用处理，不参与分配
    pub fn parse(s: &str) -> Self {
        match s.trim().to_lowercase().as_str() {
            "active" => RackStatus::Active,
            "maintenance" => RackStatus::Maintenance,
            _ => RackStatus::Inactive,
        }
    }
}
