// ==========================================
// 仓储入库收货核心 - 库位分配闸门
// ==========================================
// 职责:
// 1) 找出未绑定库位的明细行
// 2) 按 (货架序号, 层, 列) 升序扫描库位快照，逐行分配首个可用库位
// 3) 对外部库存做"先占用后提交"，占用失败的库位视为已占用并重新规划
// 红线: 同一批次不得把同一库位分给两行；不得分配维护中货架的库位
// 红线: 无随机性，不依赖系统时间
// ==========================================

use crate::domain::bin::BinSlot;
use crate::domain::receipt::{Receipt, ReceiptLine};
use crate::domain::types::BinStatus;
use crate::engine::error::{InboundError, InboundResult};
use crate::repository::bin_repo::BinInventory;
use serde::{Deserialize, Serialize};
use std::collections::HashSet;
use std::sync::Arc;
use tracing::instrument;

/// 单行库位分配结果
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct BinAssignment {
    pub line_id: String,
    pub bin_id: String,
    pub bin_code: String,
}

/// 批量分配结果：部分成功是正常结果，不视为错误
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct AllocationResult {
    pub assignments: Vec<BinAssignment>, // 按明细行顺序
    pub unresolved: Vec<String>,         // 未找到库位的行
}

impl AllocationResult {
    /// 查询某行分到的库位
    pub fn bin_for(&self, line_id: &str) -> Option<&str> {
        self.assignments
            .iter()
            .find(|a| a.line_id == line_id)
            .map(|a| a.bin_id.as_str())
    }

    pub fn bin_ids(&self) -> Vec<String> {
        self.assignments.iter().map(|a| a.bin_id.clone()).collect()
    }
}

// ==========================================
// BinAllocationGate
// ==========================================
pub struct BinAllocationGate {
    inventory: Arc<dyn BinInventory>,
}

impl BinAllocationGate {
    pub fn new(inventory: Arc<dyn BinInventory>) -> Self {
        Self { inventory }
    }

    // ==========================================
    // 纯函数部分
    // ==========================================

    /// 未绑定库位的行ID（保持行顺序）
    pub fn unassigned_line_ids(lines: &[ReceiptLine]) -> Vec<String> {
        lines
            .iter()
            .filter(|l| !l.has_bin())
            .map(|l| l.id.clone())
            .collect()
    }

    /// 可分配候选库位，按扫描顺序排好
    fn candidates(snapshot: &[BinSlot]) -> Vec<&BinSlot> {
        let mut candidates: Vec<&BinSlot> = snapshot.iter().filter(|b| b.is_eligible()).collect();
        candidates.sort_by(|a, b| a.scan_order(b));
        candidates
    }

    /// 在快照上规划自动分配（不触碰外部库存）
    ///
    /// 按行顺序处理未分配行；已分配给本单其它行的库位视为占用；
    /// 每分出一个库位即在本次调用内标记为占用
    pub fn plan_auto_allocation(
        receipt: &Receipt,
        snapshot: &[BinSlot],
        short_code: Option<&str>,
    ) -> AllocationResult {
        let candidates = Self::candidates(snapshot);
        let mut taken: HashSet<&str> = receipt
            .lines
            .iter()
            .filter_map(|l| l.bin_id.as_deref())
            .collect();

        let mut result = AllocationResult::default();
        for line in receipt.lines.iter().filter(|l| !l.has_bin()) {
            match candidates.iter().find(|b| !taken.contains(b.bin_id.as_str())) {
                Some(slot) => {
                    taken.insert(slot.bin_id.as_str());
                    result.assignments.push(BinAssignment {
                        line_id: line.id.clone(),
                        bin_id: slot.bin_id.clone(),
                        bin_code: slot.display_code(short_code),
                    });
                }
                None => result.unresolved.push(line.id.clone()),
            }
        }
        result
    }

    /// 单行检索：首个可用库位（排除指定库位）
    pub fn find_single_bin<'a>(snapshot: &'a [BinSlot], exclude: &HashSet<&str>) -> Option<&'a BinSlot> {
        Self::candidates(snapshot)
            .into_iter()
            .find(|b| !exclude.contains(b.bin_id.as_str()))
    }

    /// 解除行与库位的绑定，返回原库位（幂等：未绑定时返回 None）
    pub fn detach(line: &mut ReceiptLine) -> Option<String> {
        let previous = line.bin_id.take().filter(|b| !b.trim().is_empty());
        line.bin_code = None;
        previous
    }

    // ==========================================
    // 外部库存交互
    // ==========================================

    /// 自动分配：快照 → 规划 → 逐个占用
    ///
    /// 占用失败（被其它收货单抢先）的库位在本地快照中置为占用后重新规划，
    /// 每轮至少排除一个库位，因此必然终止。
    /// 中途仓储出错时释放已占用库位再返回错误。
    #[instrument(skip(self, receipt), fields(
        receipt_id = %receipt.id,
        warehouse_id = %receipt.warehouse_id,
        lines = receipt.lines.len()
    ))]
    pub fn auto_allocate(
        &self,
        receipt: &Receipt,
        short_code: Option<&str>,
    ) -> InboundResult<AllocationResult> {
        let mut snapshot = self.inventory.query_bins(&receipt.warehouse_id)?;
        let mut working = receipt.clone();
        let mut claimed: Vec<BinAssignment> = Vec::new();

        loop {
            let plan = Self::plan_auto_allocation(&working, &snapshot, short_code);
            let mut lost_any = false;

            for assignment in plan.assignments {
                match self.inventory.reserve_bin(&assignment.bin_id) {
                    Ok(true) => {
                        if let Some(line) = working.line_mut(&assignment.line_id) {
                            line.bin_id = Some(assignment.bin_id.clone());
                        }
                        claimed.push(assignment);
                    }
                    Ok(false) => {
                        tracing::debug!(bin_id = %assignment.bin_id, "库位已被占用，重新规划");
                        Self::mark_occupied(&mut snapshot, &assignment.bin_id);
                        lost_any = true;
                    }
                    Err(e) => {
                        self.release_all(&claimed.iter().map(|a| a.bin_id.clone()).collect::<Vec<_>>());
                        return Err(e.into());
                    }
                }
            }

            if !lost_any {
                // 按明细行顺序输出
                let order = |line_id: &str| {
                    receipt
                        .lines
                        .iter()
                        .position(|l| l.id == line_id)
                        .unwrap_or(usize::MAX)
                };
                claimed.sort_by_key(|a| order(&a.line_id));

                tracing::info!(
                    assigned = claimed.len(),
                    unresolved = plan.unresolved.len(),
                    "自动分配库位完成"
                );
                return Ok(AllocationResult {
                    assignments: claimed,
                    unresolved: plan.unresolved,
                });
            }
        }
    }

    /// 重新分配单行库位：排除当前库位，占用新库位
    ///
    /// 旧库位由调用方在提交后释放；找不到库位时返回 NoBinAvailable
    #[instrument(skip(self, line), fields(line_id = %line.id))]
    pub fn reassign(
        &self,
        warehouse_id: &str,
        line: &ReceiptLine,
        short_code: Option<&str>,
    ) -> InboundResult<BinAssignment> {
        let mut snapshot = self.inventory.query_bins(warehouse_id)?;

        loop {
            let mut exclude: HashSet<&str> = HashSet::new();
            if let Some(current) = line.bin_id.as_deref() {
                exclude.insert(current);
            }

            let slot = match Self::find_single_bin(&snapshot, &exclude) {
                Some(slot) => slot.clone(),
                None => {
                    return Err(InboundError::NoBinAvailable {
                        warehouse_id: warehouse_id.to_string(),
                        line_id: line.id.clone(),
                    })
                }
            };

            if self.inventory.reserve_bin(&slot.bin_id)? {
                return Ok(BinAssignment {
                    line_id: line.id.clone(),
                    bin_id: slot.bin_id.clone(),
                    bin_code: slot.display_code(short_code),
                });
            }
            Self::mark_occupied(&mut snapshot, &slot.bin_id);
        }
    }

    /// 释放库位回可用状态
    pub fn release(&self, bin_id: &str) -> InboundResult<()> {
        self.inventory.release_bin(bin_id)?;
        Ok(())
    }

    /// 尽力释放（补偿路径使用，失败只告警）
    pub fn release_all(&self, bin_ids: &[String]) {
        for bin_id in bin_ids {
            if let Err(e) = self.inventory.release_bin(bin_id) {
                tracing::warn!(bin_id = %bin_id, error = %e, "释放库位失败");
            }
        }
    }

    fn mark_occupied(snapshot: &mut [BinSlot], bin_id: &str) {
        for slot in snapshot.iter_mut().filter(|s| s.bin_id == bin_id) {
            slot.status = BinStatus::Occupied;
        }
    }
}
