// ==========================================
// 仓储入库收货核心 - SQLite 连接初始化
// ==========================================
// 目标:
// - 统一所有 Connection::open 的 PRAGMA 行为
// - 统一 busy_timeout，减少并发写入时的偶发 busy 错误
// - 建表（幂等）
// ==========================================

use crate::repository::error::{RepositoryError, RepositoryResult};
use chrono::{DateTime, SecondsFormat, Utc};
use rusqlite::Connection;
use rusqlite::OptionalExtension;
use std::path::PathBuf;
use std::time::Duration;

/// 默认 busy_timeout（毫秒）
pub const DEFAULT_BUSY_TIMEOUT_MS: u64 = 5_000;

/// 当前代码所期望的 schema_version
pub const CURRENT_SCHEMA_VERSION: i64 = 1;

/// 配置 SQLite 连接的统一 PRAGMA
///
/// 说明：
/// - foreign_keys 需要“每个连接”单独开启
/// - busy_timeout 需要“每个连接”单独配置
pub fn configure_sqlite_connection(conn: &Connection) -> rusqlite::Result<()> {
    conn.execute_batch("PRAGMA foreign_keys = ON;")?;
    conn.busy_timeout(Duration::from_millis(DEFAULT_BUSY_TIMEOUT_MS))?;
    Ok(())
}

/// 打开 SQLite 连接并应用统一配置
pub fn open_sqlite_connection(db_path: &str) -> rusqlite::Result<Connection> {
    let conn = Connection::open(db_path)?;
    configure_sqlite_connection(&conn)?;
    Ok(conn)
}

/// 默认数据库路径
///
/// 优先级: 环境变量 WMS_GOODS_IN_DB_PATH → 用户数据目录 → 当前目录
pub fn default_db_path() -> String {
    if let Ok(path) = std::env::var("WMS_GOODS_IN_DB_PATH") {
        let trimmed = path.trim();
        if !trimmed.is_empty() {
            return trimmed.to_string();
        }
    }

    let mut path = PathBuf::from(format!("./{}", crate::DB_FILE_NAME));
    if let Some(data_dir) = dirs::data_dir() {
        let dir = data_dir.join("wms-goods-in");
        // 目录创建失败时回退到当前目录
        if std::fs::create_dir_all(&dir).is_ok() {
            path = dir.join(crate::DB_FILE_NAME);
        }
    }
    path.to_string_lossy().to_string()
}

/// 建表（幂等）
pub fn ensure_schema(conn: &Connection) -> rusqlite::Result<()> {
    conn.execute_batch(
        r#"
        CREATE TABLE IF NOT EXISTS schema_version (
            version INTEGER PRIMARY KEY,
            applied_at TEXT NOT NULL DEFAULT (datetime('now'))
        );

        CREATE TABLE IF NOT EXISTS config_kv (
            scope_id TEXT NOT NULL,
            key TEXT NOT NULL,
            value TEXT NOT NULL,
            updated_at TEXT NOT NULL DEFAULT (datetime('now')),
            PRIMARY KEY (scope_id, key)
        );

        CREATE TABLE IF NOT EXISTS inbound_receipts (
            receipt_id TEXT PRIMARY KEY,
            code TEXT NOT NULL UNIQUE,
            warehouse_id TEXT NOT NULL,
            vendor_id TEXT NOT NULL,
            vendor_type TEXT NOT NULL,
            reference TEXT,
            notes TEXT,
            planned_arrival TEXT,
            actual_arrival TEXT,
            status TEXT NOT NULL,
            overs_policy_json TEXT NOT NULL,
            exception_count INTEGER NOT NULL DEFAULT 0,
            allocation_status TEXT NOT NULL DEFAULT 'NOT_STARTED',
            created_at TEXT NOT NULL,
            updated_at TEXT NOT NULL
        );
        CREATE INDEX IF NOT EXISTS idx_receipts_warehouse ON inbound_receipts(warehouse_id);
        CREATE INDEX IF NOT EXISTS idx_receipts_status ON inbound_receipts(status);

        CREATE TABLE IF NOT EXISTS inbound_receipt_lines (
            line_id TEXT PRIMARY KEY,
            receipt_id TEXT NOT NULL REFERENCES inbound_receipts(receipt_id) ON DELETE CASCADE,
            line_no INTEGER NOT NULL,
            product_sku TEXT,
            product_name TEXT,
            customer_name TEXT,
            apartment TEXT,
            quantity INTEGER NOT NULL,
            received_qty INTEGER,
            damaged INTEGER NOT NULL DEFAULT 0,
            missing INTEGER NOT NULL DEFAULT 0,
            damaged_origin TEXT,
            ack_diff INTEGER NOT NULL DEFAULT 0,
            bin_id TEXT,
            bin_code TEXT,
            notes TEXT
        );
        CREATE INDEX IF NOT EXISTS idx_lines_receipt ON inbound_receipt_lines(receipt_id);

        CREATE TABLE IF NOT EXISTS racks (
            rack_id TEXT PRIMARY KEY,
            warehouse_id TEXT NOT NULL,
            name TEXT NOT NULL,
            status TEXT NOT NULL DEFAULT 'active'
        );

        CREATE TABLE IF NOT EXISTS bins (
            bin_id TEXT PRIMARY KEY,
            rack_id TEXT NOT NULL REFERENCES racks(rack_id) ON DELETE CASCADE,
            stack_index INTEGER NOT NULL,
            bin_index INTEGER NOT NULL,
            code TEXT,
            capacity INTEGER,
            status TEXT NOT NULL DEFAULT 'empty'
        );
        CREATE INDEX IF NOT EXISTS idx_bins_rack ON bins(rack_id);

        CREATE TABLE IF NOT EXISTS action_log (
            action_id TEXT PRIMARY KEY,
            receipt_id TEXT NOT NULL,
            action_type TEXT NOT NULL,
            action_ts TEXT NOT NULL,
            actor TEXT NOT NULL,
            line_id TEXT,
            status_after TEXT,
            payload_json TEXT,
            detail TEXT
        );
        CREATE INDEX IF NOT EXISTS idx_action_log_receipt ON action_log(receipt_id);
        "#,
    )?;

    conn.execute(
        "INSERT OR IGNORE INTO schema_version (version) VALUES (?1)",
        [CURRENT_SCHEMA_VERSION],
    )?;
    Ok(())
}

/// 读取 schema_version（若表不存在则返回 None）
pub fn read_schema_version(conn: &Connection) -> rusqlite::Result<Option<i64>> {
    let has_table: bool = conn
        .query_row(
            "SELECT 1 FROM sqlite_master WHERE type='table' AND name='schema_version' LIMIT 1",
            [],
            |_row| Ok(true),
        )
        .optional()?
        .unwrap_or(false);

    if !has_table {
        return Ok(None);
    }

    let v: Option<i64> = conn.query_row("SELECT MAX(version) FROM schema_version", [], |row| row.get(0))?;
    Ok(v)
}

// ==========================================
// 时间戳存储格式
// ==========================================
// RFC 3339 + 微秒 + 'Z'，字典序即时间序

pub fn format_ts(ts: &DateTime<Utc>) -> String {
    ts.to_rfc3339_opts(SecondsFormat::Micros, true)
}

pub fn parse_ts(field: &str, raw: &str) -> RepositoryResult<DateTime<Utc>> {
    DateTime::parse_from_rfc3339(raw)
        .map(|dt| dt.with_timezone(&Utc))
        .map_err(|e| RepositoryError::field(field, format!("{} ({})", e, raw)))
}

pub fn parse_opt_ts(field: &str, raw: Option<String>) -> RepositoryResult<Option<DateTime<Utc>>> {
    raw.map(|s| parse_ts(field, &s)).transpose()
}
