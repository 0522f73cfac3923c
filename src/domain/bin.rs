// ==========================================
// 仓储入库收货核心 - 库位快照模型
// ==========================================
// 库位/货架归外部库存存储所有，此处只是只读快照
// ==========================================

use crate::domain::types::{BinStatus, RackStatus};
use serde::{Deserialize, Serialize};
use std::cmp::Ordering;

/// 库位快照行（queryBins 返回）
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct BinSlot {
    pub bin_id: String,
    pub rack_id: String,
    pub rack_name: String,
    pub rack_status: RackStatus,
    pub stack_index: i32, // 层（0 起）
    pub bin_index: i32,   // 列（0 起）
    pub code: Option<String>,
    pub capacity: Option<i32>,
    pub status: BinStatus,
}

impl BinSlot {
    /// 货架序号（货架名称末尾数字，缺省 1）
    pub fn rack_sequence(&self) -> u32 {
        rack_sequence_from_name(&self.rack_name)
    }

    /// 是否可参与分配
    pub fn is_eligible(&self) -> bool {
        self.rack_status.is_available() && self.status.is_allocatable()
    }

    /// 展示用库位编码：优先使用已存储编码
    pub fn display_code(&self, short_code: Option<&str>) -> String {
        match self.code.as_deref().map(str::trim) {
            Some(code) if !code.is_empty() => code.to_string(),
            _ => build_bin_code(
                short_code,
                self.rack_sequence(),
                self.stack_index,
                self.bin_index,
            ),
        }
    }

    /// 扫描顺序 (rack_sequence, stack_index, bin_index, bin_id)
    ///
    /// bin_id 作为最终决胜键，保证全序
    pub fn scan_order(&self, other: &BinSlot) -> Ordering {
        (self.rack_sequence(), self.stack_index, self.bin_index)
            .cmp(&(other.rack_sequence(), other.stack_index, other.bin_index))
            .then_with(|| self.bin_id.cmp(&other.bin_id))
    }
}

/// 从货架名称提取末尾数字序号
///
/// "Rack 12" → 12, "R007" → 7, "Overflow" → 1
pub fn rack_sequence_from_name(name: &str) -> u32 {
    let digits: String = name
        .trim()
        .chars()
        .rev()
        .take_while(|c| c.is_ascii_digit())
        .collect::<Vec<_>>()
        .into_iter()
        .rev()
        .collect();

    digits.parse::<u32>().unwrap_or(1)
}

/// 构造标准库位编码: [SHORT-]R{rack:03}-S{stack+1:03}-B{bin+1:03}
pub fn build_bin_code(
    short_code: Option<&str>,
    rack_sequence: u32,
    stack_index: i32,
    bin_index: i32,
) -> String {
    let core = format!(
        "R{:03}-S{:03}-B{:03}",
        rack_sequence,
        stack_index + 1,
        bin_index + 1
    );
    match short_code.map(|s| s.trim().to_uppercase()) {
        Some(short) if !short.is_empty() => format!("{}-{}", short, core),
        _ => core,
    }
}
