// ==========================================
// 仓储入库收货核心 - 库位库存仓储
// ==========================================
// 对齐: racks / bins 表
// 红线: 占用必须是条件更新，同一库位不可被两个收货单同时占用
// ==========================================

use crate::domain::bin::{build_bin_code, rack_sequence_from_name, BinSlot};
use crate::domain::types::{BinStatus, RackStatus};
use crate::repository::error::{RepositoryError, RepositoryResult};
use rusqlite::{params, Connection, OptionalExtension, Result as SqliteResult};
use std::sync::{Arc, Mutex};

// ==========================================
// BinInventory - 外部库存协作接口
// ==========================================
pub trait BinInventory: Send + Sync {
    /// 查询仓库全部库位快照（含货架状态）
    fn query_bins(&self, warehouse_id: &str) -> RepositoryResult<Vec<BinSlot>>;

    /// 原子占用库位
    ///
    /// # 返回
    /// - `Ok(true)`: 占用成功
    /// - `Ok(false)`: 库位已非空闲或货架不可用
    fn reserve_bin(&self, bin_id: &str) -> RepositoryResult<bool>;

    /// 释放库位（幂等）
    fn release_bin(&self, bin_id: &str) -> RepositoryResult<()>;
}

// ==========================================
// SqliteBinInventory
// ==========================================
pub struct SqliteBinInventory {
    conn: Arc<Mutex<Connection>>,
}

impl SqliteBinInventory {
    pub fn new(conn: Arc<Mutex<Connection>>) -> Self {
        Self { conn }
    }

    fn get_conn(&self) -> RepositoryResult<std::sync::MutexGuard<Connection>> {
        self.conn
            .lock()
            .map_err(|e| RepositoryError::LockError(e.to_string()))
    }

    // ==========================================
    // 主数据维护（初始化/测试数据）
    // ==========================================

    /// 新增货架
    pub fn insert_rack(
        &self,
        rack_id: &str,
        warehouse_id: &str,
        name: &str,
        status: RackStatus,
    ) -> RepositoryResult<()> {
        let conn = self.get_conn()?;
        conn.execute(
            "INSERT INTO racks (rack_id, warehouse_id, name, status) VALUES (?1, ?2, ?3, ?4)",
            params![rack_id, warehouse_id, name, status.as_str()],
        )?;
        Ok(())
    }

    /// 新增库位
    pub fn insert_bin(
        &self,
        bin_id: &str,
        rack_id: &str,
        stack_index: i32,
        bin_index: i32,
        code: Option<&str>,
        status: BinStatus,
    ) -> RepositoryResult<()> {
        let conn = self.get_conn()?;
        conn.execute(
            r#"
            INSERT INTO bins (bin_id, rack_id, stack_index, bin_index, code, capacity, status)
            VALUES (?1, ?2, ?3, ?4, ?5, 1, ?6)
            "#,
            params![bin_id, rack_id, stack_index, bin_index, code, status.as_str()],
        )?;
        Ok(())
    }

    /// 按层×列生成整架库位，库位编码按标准格式生成
    ///
    /// # 返回
    /// 新建库位ID（按扫描顺序）
    pub fn seed_rack_grid(
        &self,
        warehouse_id: &str,
        rack_name: &str,
        stacks: i32,
        bins_per_stack: i32,
        short_code: Option<&str>,
    ) -> RepositoryResult<Vec<String>> {
        let rack_id = uuid::Uuid::new_v4().to_string();
        let rack_seq = rack_sequence_from_name(rack_name);

        let mut conn = self.get_conn()?;
        let tx = conn.transaction()?;
        tx.execute(
            "INSERT INTO racks (rack_id, warehouse_id, name, status) VALUES (?1, ?2, ?3, 'active')",
            params![rack_id, warehouse_id, rack_name],
        )?;

        let mut bin_ids = Vec::new();
        for stack in 0..stacks {
            for bin in 0..bins_per_stack {
                let bin_id = uuid::Uuid::new_v4().to_string();
                let code = build_bin_code(short_code, rack_seq, stack, bin);
                tx.execute(
                    r#"
                    INSERT INTO bins (bin_id, rack_id, stack_index, bin_index, code, capacity, status)
                    VALUES (?1, ?2, ?3, ?4, ?5, 1, 'empty')
                    "#,
                    params![bin_id, rack_id, stack, bin, code],
                )?;
                bin_ids.push(bin_id);
            }
        }
        tx.commit()?;

        tracing::debug!(rack = rack_name, bins = bin_ids.len(), "货架库位已生成");
        Ok(bin_ids)
    }

    /// 修改货架状态
    pub fn set_rack_status(&self, rack_id: &str, status: RackStatus) -> RepositoryResult<()> {
        let conn = self.get_conn()?;
        let rows = conn.execute(
            "UPDATE racks SET status = ?2 WHERE rack_id = ?1",
            params![rack_id, status.as_str()],
        )?;
        if rows == 0 {
            return Err(RepositoryError::NotFound {
                entity: "Rack".to_string(),
                id: rack_id.to_string(),
            });
        }
        Ok(())
    }

    /// 修改库位状态（人工封存/维护）
    pub fn set_bin_status(&self, bin_id: &str, status: BinStatus) -> RepositoryResult<()> {
        let conn = self.get_conn()?;
        let rows = conn.execute(
            "UPDATE bins SET status = ?2 WHERE bin_id = ?1",
            params![bin_id, status.as_str()],
        )?;
        if rows == 0 {
            return Err(RepositoryError::NotFound {
                entity: "Bin".to_string(),
                id: bin_id.to_string(),
            });
        }
        Ok(())
    }

    /// 查询库位状态
    pub fn bin_status(&self, bin_id: &str) -> RepositoryResult<Option<BinStatus>> {
        let conn = self.get_conn()?;
        let raw: Option<String> = conn
            .query_row(
                "SELECT status FROM bins WHERE bin_id = ?1",
                params![bin_id],
                |row| row.get(0),
            )
            .optional()?;
        Ok(raw.map(|s| BinStatus::parse(&s)))
    }
}

impl BinInventory for SqliteBinInventory {
    fn query_bins(&self, warehouse_id: &str) -> RepositoryResult<Vec<BinSlot>> {
        let conn = self.get_conn()?;
        let mut stmt = conn.prepare(
            r#"
            SELECT b.bin_id, b.rack_id, r.name, r.status,
                   b.stack_index, b.bin_index, b.code, b.capacity, b.status
            FROM bins b
            JOIN racks r ON r.rack_id = b.rack_id
            WHERE r.warehouse_id = ?1
            "#,
        )?;

        let slots = stmt
            .query_map(params![warehouse_id], |row| {
                let rack_status: String = row.get(3)?;
                let status: String = row.get(8)?;
                Ok(BinSlot {
                    bin_id: row.get(0)?,
                    rack_id: row.get(1)?,
                    rack_name: row.get(2)?,
                    rack_status: RackStatus::parse(&rack_status),
                    stack_index: row.get(4)?,
                    bin_index: row.get(5)?,
                    code: row.get(6)?,
                    capacity: row.get(7)?,
                    status: BinStatus::parse(&status),
                })
            })?
            .collect::<SqliteResult<Vec<_>>>()?;

        Ok(slots)
    }

    fn reserve_bin(&self, bin_id: &str) -> RepositoryResult<bool> {
        let conn = self.get_conn()?;
        let rows = conn.execute(
            r#"
            UPDATE bins SET status = 'reserved'
            WHERE bin_id = ?1
              AND status IN ('empty', 'available')
              AND rack_id IN (SELECT rack_id FROM racks WHERE status = 'active')
            "#,
            params![bin_id],
        )?;
        Ok(rows == 1)
    }

    fn release_bin(&self, bin_id: &str) -> RepositoryResult<()> {
        let conn = self.get_conn()?;
        // 只回收本流程占用的库位，人工封存/维护状态不动
        conn.execute(
            "UPDATE bins SET status = 'empty' WHERE bin_id = ?1 AND status = 'reserved'",
            params![bin_id],
        )?;
        Ok(())
    }
}
