// ==========================================
// 仓储入库收货核心 - 收货单数据仓储
// ==========================================
// 对齐: inbound_receipts / inbound_receipt_lines 表
// 红线: Repository 不含业务逻辑；收货单与明细行在同一事务内写入
// ==========================================

use crate::db::{format_ts, parse_opt_ts, parse_ts};
use crate::domain::receipt::{OversPolicy, Receipt, ReceiptFilter, ReceiptLine};
use crate::domain::types::{AllocationStatus, DamageOrigin, ReceiptStatus, VendorType};
use crate::repository::error::{RepositoryError, RepositoryResult};
use rusqlite::types::Type;
use rusqlite::{params, params_from_iter, Connection, OptionalExtension, Result as SqliteResult, Row};
use std::sync::{Arc, Mutex};

// ==========================================
// ReceiptRepository - 收货单存储接口
// ==========================================
pub trait ReceiptRepository: Send + Sync {
    /// 加载收货单（含全部明细行，按行号排序）
    fn load_receipt(&self, receipt_id: &str) -> RepositoryResult<Option<Receipt>>;

    /// 保存收货单（存在则整体覆盖）
    fn save_receipt(&self, receipt: &Receipt) -> RepositoryResult<()>;

    /// 按条件列出收货单（创建时间倒序）
    fn list_receipts(&self, filter: &ReceiptFilter) -> RepositoryResult<Vec<Receipt>>;

    /// 根据明细行ID反查所属收货单
    fn find_receipt_id_by_line(&self, line_id: &str) -> RepositoryResult<Option<String>>;
}

const SELECT_RECEIPT: &str = r#"
    SELECT r.receipt_id, r.code, r.warehouse_id, r.vendor_id, r.vendor_type,
           r.reference, r.notes, r.planned_arrival, r.actual_arrival, r.status,
           r.overs_policy_json, r.exception_count, r.allocation_status,
           r.created_at, r.updated_at
    FROM inbound_receipts r
"#;

// ==========================================
// SqliteReceiptRepository
// ==========================================
pub struct SqliteReceiptRepository {
    conn: Arc<Mutex<Connection>>,
}

impl SqliteReceiptRepository {
    pub fn new(conn: Arc<Mutex<Connection>>) -> Self {
        Self { conn }
    }

    /// 按路径打开独立连接
    pub fn open(db_path: &str) -> RepositoryResult<Self> {
        let conn = crate::db::open_sqlite_connection(db_path)
            .map_err(|e| RepositoryError::DatabaseConnectionError(e.to_string()))?;
        Ok(Self::new(Arc::new(Mutex::new(conn))))
    }

    fn get_conn(&self) -> RepositoryResult<std::sync::MutexGuard<Connection>> {
        self.conn
            .lock()
            .map_err(|e| RepositoryError::LockError(e.to_string()))
    }

    // ==========================================
    // 辅助方法
    // ==========================================

    fn query_receipts(
        conn: &Connection,
        sql: &str,
        values: &[String],
    ) -> RepositoryResult<Vec<Receipt>> {
        let mut stmt = conn.prepare(sql)?;
        let rows = stmt
            .query_map(params_from_iter(values.iter()), |row| ReceiptRow::from_row(row))?
            .collect::<SqliteResult<Vec<_>>>()?;

        let mut receipts = Vec::with_capacity(rows.len());
        for row in rows {
            let lines = Self::load_lines(conn, &row.receipt_id)?;
            receipts.push(row.into_receipt(lines)?);
        }
        Ok(receipts)
    }

    fn load_lines(conn: &Connection, receipt_id: &str) -> RepositoryResult<Vec<ReceiptLine>> {
        let mut stmt = conn.prepare(
            r#"
            SELECT line_id, receipt_id, line_no, product_sku, product_name,
                   customer_name, apartment, quantity, received_qty, damaged,
                   missing, damaged_origin, ack_diff, bin_id, bin_code, notes
            FROM inbound_receipt_lines
            WHERE receipt_id = ?1
            ORDER BY line_no ASC
            "#,
        )?;

        let lines = stmt
            .query_map(params![receipt_id], |row| Self::map_line(row))?
            .collect::<SqliteResult<Vec<_>>>()?;
        Ok(lines)
    }

    fn map_line(row: &Row) -> SqliteResult<ReceiptLine> {
        let origin_raw: Option<String> = row.get(11)?;
        let damaged_origin = match origin_raw {
            Some(raw) => Some(DamageOrigin::parse(&raw).ok_or_else(|| {
                rusqlite::Error::FromSqlConversionFailure(
                    11,
                    Type::Text,
                    format!("未知损坏来源: {}", raw).into(),
                )
            })?),
            None => None,
        };

        Ok(ReceiptLine {
            id: row.get(0)?,
            receipt_id: row.get(1)?,
            line_no: row.get(2)?,
            product_sku: row.get(3)?,
            product_name: row.get(4)?,
            customer_name: row.get(5)?,
            apartment: row.get(6)?,
            quantity: row.get(7)?,
            received_qty: row.get(8)?,
            damaged: row.get(9)?,
            missing: row.get(10)?,
            damaged_origin,
            ack_diff: row.get(12)?,
            bin_id: row.get(13)?,
            bin_code: row.get(14)?,
            notes: row.get(15)?,
        })
    }
}

impl ReceiptRepository for SqliteReceiptRepository {
    fn load_receipt(&self, receipt_id: &str) -> RepositoryResult<Option<Receipt>> {
        let conn = self.get_conn()?;
        let sql = format!("{} WHERE r.receipt_id = ?1", SELECT_RECEIPT);
        let mut receipts = Self::query_receipts(&conn, &sql, &[receipt_id.to_string()])?;
        Ok(receipts.pop())
    }

    fn save_receipt(&self, receipt: &Receipt) -> RepositoryResult<()> {
        let overs_policy_json = serde_json::to_string(&receipt.overs_policy)
            .map_err(|e| RepositoryError::field("overs_policy", e.to_string()))?;

        let mut conn = self.get_conn()?;
        let tx = conn.transaction()?;

        tx.execute(
            r#"
            INSERT INTO inbound_receipts (
                receipt_id, code, warehouse_id, vendor_id, vendor_type,
                reference, notes, planned_arrival, actual_arrival, status,
                overs_policy_json, exception_count, allocation_status,
                created_at, updated_at
            ) VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9, ?10, ?11, ?12, ?13, ?14, ?15)
            ON CONFLICT(receipt_id) DO UPDATE SET
                reference = excluded.reference,
                notes = excluded.notes,
                planned_arrival = excluded.planned_arrival,
                actual_arrival = excluded.actual_arrival,
                status = excluded.status,
                overs_policy_json = excluded.overs_policy_json,
                exception_count = excluded.exception_count,
                allocation_status = excluded.allocation_status,
                updated_at = excluded.updated_at
            "#,
            params![
                receipt.id,
                receipt.code,
                receipt.warehouse_id,
                receipt.vendor_id,
                receipt.vendor_type.as_str(),
                receipt.reference,
                receipt.notes,
                receipt.planned_arrival.as_ref().map(format_ts),
                receipt.actual_arrival.as_ref().map(format_ts),
                receipt.status.as_str(),
                overs_policy_json,
                receipt.exception_count as i64,
                receipt.allocation_status.as_str(),
                format_ts(&receipt.created_at),
                format_ts(&receipt.updated_at),
            ],
        )?;

        for line in &receipt.lines {
            tx.execute(
                r#"
                INSERT INTO inbound_receipt_lines (
                    line_id, receipt_id, line_no, product_sku, product_name,
                    customer_name, apartment, quantity, received_qty, damaged,
                    missing, damaged_origin, ack_diff, bin_id, bin_code, notes
                ) VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9, ?10, ?11, ?12, ?13, ?14, ?15, ?16)
                ON CONFLICT(line_id) DO UPDATE SET
                    received_qty = excluded.received_qty,
                    damaged = excluded.damaged,
                    missing = excluded.missing,
                    damaged_origin = excluded.damaged_origin,
                    ack_diff = excluded.ack_diff,
                    bin_id = excluded.bin_id,
                    bin_code = excluded.bin_code,
                    notes = excluded.notes
                "#,
                params![
                    line.id,
                    receipt.id,
                    line.line_no,
                    line.product_sku,
                    line.product_name,
                    line.customer_name,
                    line.apartment,
                    line.quantity,
                    line.received_qty,
                    line.damaged,
                    line.missing,
                    line.damaged_origin.map(|o| o.as_str()),
                    line.ack_diff,
                    line.bin_id,
                    line.bin_code,
                    line.notes,
                ],
            )?;
        }

        tx.commit()?;
        Ok(())
    }

    fn list_receipts(&self, filter: &ReceiptFilter) -> RepositoryResult<Vec<Receipt>> {
        let mut clauses: Vec<String> = Vec::new();
        let mut values: Vec<String> = Vec::new();

        if let Some(warehouse_id) = &filter.warehouse_id {
            values.push(warehouse_id.clone());
            clauses.push(format!("r.warehouse_id = ?{}", values.len()));
        }
        if let Some(vendor_type) = filter.vendor_type {
            values.push(vendor_type.as_str().to_string());
            clauses.push(format!("r.vendor_type = ?{}", values.len()));
        }
        if let Some(status) = filter.status {
            values.push(status.as_str().to_string());
            clauses.push(format!("r.status = ?{}", values.len()));
        }
        if let Some(date_from) = &filter.date_from {
            values.push(format_ts(date_from));
            clauses.push(format!("r.created_at >= ?{}", values.len()));
        }
        if let Some(date_to) = &filter.date_to {
            values.push(format_ts(date_to));
            clauses.push(format!("r.created_at <= ?{}", values.len()));
        }
        if let Some(search) = filter.search.as_deref().map(str::trim).filter(|s| !s.is_empty()) {
            values.push(contains_pattern(search));
            let p = values.len();
            clauses.push(format!(
                r#"(LOWER(r.code) LIKE ?{p} ESCAPE '\'
                    OR LOWER(COALESCE(r.reference, '')) LIKE ?{p} ESCAPE '\'
                    OR EXISTS (
                        SELECT 1 FROM inbound_receipt_lines l
                        WHERE l.receipt_id = r.receipt_id
                          AND (LOWER(COALESCE(l.product_sku, '')) LIKE ?{p} ESCAPE '\'
                               OR LOWER(COALESCE(l.product_name, '')) LIKE ?{p} ESCAPE '\'
                               OR LOWER(COALESCE(l.customer_name, '')) LIKE ?{p} ESCAPE '\'
                               OR LOWER(COALESCE(l.apartment, '')) LIKE ?{p} ESCAPE '\'
                               OR LOWER(COALESCE(l.bin_code, '')) LIKE ?{p} ESCAPE '\')
                    ))"#
            ));
        }

        let mut sql = SELECT_RECEIPT.to_string();
        if !clauses.is_empty() {
            sql.push_str(" WHERE ");
            sql.push_str(&clauses.join(" AND "));
        }
        sql.push_str(" ORDER BY r.created_at DESC, r.code DESC");

        let conn = self.get_conn()?;
        Self::query_receipts(&conn, &sql, &values)
    }

    fn find_receipt_id_by_line(&self, line_id: &str) -> RepositoryResult<Option<String>> {
        let conn = self.get_conn()?;
        let receipt_id = conn
            .query_row(
                "SELECT receipt_id FROM inbound_receipt_lines WHERE line_id = ?1",
                params![line_id],
                |row| row.get(0),
            )
            .optional()?;
        Ok(receipt_id)
    }
}

/// 关键字转为 LIKE 包含模式；% _ \ 按字面匹配
fn contains_pattern(search: &str) -> String {
    let mut pattern = String::with_capacity(search.len() + 2);
    pattern.push('%');
    for ch in search.to_lowercase().chars() {
        if matches!(ch, '%' | '_' | '\\') {
            pattern.push('\\');
        }
        pattern.push(ch);
    }
    pattern.push('%');
    pattern
}

// ==========================================
// ReceiptRow - 收货单表行（原始列值）
// ==========================================
struct ReceiptRow {
    receipt_id: String,
    code: String,
    warehouse_id: String,
    vendor_id: String,
    vendor_type: String,
    reference: Option<String>,
    notes: Option<String>,
    planned_arrival: Option<String>,
    actual_arrival: Option<String>,
    status: String,
    overs_policy_json: String,
    exception_count: i64,
    allocation_status: String,
    created_at: String,
    updated_at: String,
}

impl ReceiptRow {
    fn from_row(row: &Row) -> SqliteResult<Self> {
        Ok(Self {
            receipt_id: row.get(0)?,
            code: row.get(1)?,
            warehouse_id: row.get(2)?,
            vendor_id: row.get(3)?,
            vendor_type: row.get(4)?,
            reference: row.get(5)?,
            notes: row.get(6)?,
            planned_arrival: row.get(7)?,
            actual_arrival: row.get(8)?,
            status: row.get(9)?,
            overs_policy_json: row.get(10)?,
            exception_count: row.get(11)?,
            allocation_status: row.get(12)?,
            created_at: row.get(13)?,
            updated_at: row.get(14)?,
        })
    }

    fn into_receipt(self, lines: Vec<ReceiptLine>) -> RepositoryResult<Receipt> {
        let vendor_type = VendorType::parse(&self.vendor_type)
            .ok_or_else(|| RepositoryError::field("vendor_type", self.vendor_type.clone()))?;
        let status = ReceiptStatus::parse(&self.status)
            .ok_or_else(|| RepositoryError::field("status", self.status.clone()))?;
        let overs_policy: OversPolicy = serde_json::from_str(&self.overs_policy_json)
            .map_err(|e| RepositoryError::field("overs_policy_json", e.to_string()))?;

        Ok(Receipt {
            id: self.receipt_id,
            code: self.code,
            vendor_id: self.vendor_id,
            vendor_type,
            warehouse_id: self.warehouse_id,
            reference: self.reference,
            notes: self.notes,
            planned_arrival: parse_opt_ts("planned_arrival", self.planned_arrival)?,
            actual_arrival: parse_opt_ts("actual_arrival", self.actual_arrival)?,
            created_at: parse_ts("created_at", &self.created_at)?,
            updated_at: parse_ts("updated_at", &self.updated_at)?,
            status,
            overs_policy,
            lines,
            exception_count: self.exception_count.max(0) as usize,
            allocation_status: AllocationStatus::parse(&self.allocation_status),
        })
    }
}
