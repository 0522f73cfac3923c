// ==========================================
// 仓储入库收货核心 - 配置管理器
// ==========================================
// 职责: 配置加载、查询、覆写管理
// 存储: config_kv 表 (key-value + scope)
// 覆写顺序: warehouse:{id} → global → 内置默认值
// ==========================================

use crate::config::inbound_config_trait::InboundConfigReader;
use crate::db::open_sqlite_connection;
use crate::domain::receipt::OversPolicy;
use crate::repository::error::{RepositoryError, RepositoryResult};
use rusqlite::{params, Connection, OptionalExtension};
use std::collections::HashMap;
use std::sync::{Arc, Mutex};

/// 收货单号默认前缀
pub const DEFAULT_RECEIPT_PREFIX: &str = "RCPT";

// ==========================================
// ConfigManager - 配置管理器
// ==========================================
pub struct ConfigManager {
    conn: Arc<Mutex<Connection>>,
}

impl ConfigManager {
    /// 创建新的 ConfigManager 实例
    ///
    /// # 参数
    /// - db_path: 数据库文件路径
    pub fn new(db_path: &str) -> RepositoryResult<Self> {
        let conn = open_sqlite_connection(db_path)
            .map_err(|e| RepositoryError::DatabaseConnectionError(e.to_string()))?;

        Ok(Self {
            conn: Arc::new(Mutex::new(conn)),
        })
    }

    /// 从已有连接创建 ConfigManager
    ///
    /// 说明：为保证连接行为一致，会对传入连接再次应用统一 PRAGMA（幂等）。
    pub fn from_connection(conn: Arc<Mutex<Connection>>) -> RepositoryResult<Self> {
        {
            let conn_guard = conn
                .lock()
                .map_err(|e| RepositoryError::LockError(e.to_string()))?;
            crate::db::configure_sqlite_connection(&conn_guard)?;
        }

        Ok(Self { conn })
    }

    fn get_conn(&self) -> RepositoryResult<std::sync::MutexGuard<Connection>> {
        self.conn
            .lock()
            .map_err(|e| RepositoryError::LockError(e.to_string()))
    }

    // ==========================================
    // 通用读写
    // ==========================================

    /// 从 config_kv 表读取配置值
    ///
    /// # 返回
    /// - Some(String): 配置值
    /// - None: 配置不存在
    pub fn get_config_value(&self, scope: &ConfigScope, key: &str) -> RepositoryResult<Option<String>> {
        let conn = self.get_conn()?;
        let value = conn
            .query_row(
                "SELECT value FROM config_kv WHERE scope_id = ?1 AND key = ?2",
                params![scope.scope_id(), key],
                |row| row.get::<_, String>(0),
            )
            .optional()?;
        Ok(value)
    }

    /// 写入配置值（UPSERT）
    pub fn set_config_value(&self, scope: &ConfigScope, key: &str, value: &str) -> RepositoryResult<()> {
        let conn = self.get_conn()?;
        conn.execute(
            r#"
            INSERT INTO config_kv (scope_id, key, value, updated_at)
            VALUES (?1, ?2, ?3, datetime('now'))
            ON CONFLICT(scope_id, key) DO UPDATE SET
                value = excluded.value,
                updated_at = excluded.updated_at
            "#,
            params![scope.scope_id(), key, value],
        )?;
        Ok(())
    }

    /// 先读仓库级，再读全局级
    fn get_layered_value(&self, warehouse_id: &str, key: &str) -> RepositoryResult<Option<String>> {
        let warehouse_scope = ConfigScope::warehouse(warehouse_id);
        if let Some(value) = self.get_config_value(&warehouse_scope, key)? {
            return Ok(Some(value));
        }
        self.get_config_value(&ConfigScope::Global, key)
    }

    /// 获取某作用域全部配置
    pub fn get_scope_snapshot(&self, scope: &ConfigScope) -> RepositoryResult<HashMap<String, String>> {
        let conn = self.get_conn()?;
        let mut stmt = conn.prepare("SELECT key, value FROM config_kv WHERE scope_id = ?1 ORDER BY key")?;
        let rows = stmt.query_map(params![scope.scope_id()], |row| {
            Ok((row.get::<_, String>(0)?, row.get::<_, String>(1)?))
        })?;

        let mut map = HashMap::new();
        for row in rows {
            let (key, value) = row?;
            map.insert(key, value);
        }
        Ok(map)
    }

    // ==========================================
    // 入库收货配置
    // ==========================================

    /// 获取超收处置策略
    ///
    /// 配置格式为 JSON: {"hold_days": 3, "after": "DISPOSE"}
    /// 格式错误时告警并回退默认值
    pub fn get_overs_policy(&self, warehouse_id: &str) -> RepositoryResult<OversPolicy> {
        let raw = match self.get_layered_value(warehouse_id, config_keys::INBOUND_OVERS_POLICY)? {
            Some(raw) => raw,
            None => return Ok(OversPolicy::default()),
        };

        let policy = serde_json::from_str::<OversPolicy>(&raw).unwrap_or_else(|_| {
            tracing::warn!(
                config_key = config_keys::INBOUND_OVERS_POLICY,
                warehouse_id = %warehouse_id,
                raw_value = %raw,
                "超收处置策略配置格式错误，使用默认值"
            );
            OversPolicy::default()
        });
        Ok(policy)
    }

    /// 设置超收处置策略（None 表示全局）
    pub fn set_overs_policy(&self, warehouse_id: Option<&str>, policy: &OversPolicy) -> RepositoryResult<()> {
        let scope = warehouse_id.map_or(ConfigScope::Global, ConfigScope::warehouse);
        let raw = serde_json::to_string(policy)
            .map_err(|e| RepositoryError::field("overs_policy", e.to_string()))?;
        self.set_config_value(&scope, config_keys::INBOUND_OVERS_POLICY, &raw)
    }

    /// 获取收货单号前缀（空值回退 RCPT）
    pub fn get_receipt_prefix(&self, warehouse_id: &str) -> RepositoryResult<String> {
        let prefix = self
            .get_layered_value(warehouse_id, config_keys::RECEIPT_PREFIX)?
            .map(|p| p.trim().to_string())
            .filter(|p| !p.is_empty())
            .unwrap_or_else(|| DEFAULT_RECEIPT_PREFIX.to_string());
        Ok(prefix)
    }

    /// 获取仓库简码（仅仓库级）
    pub fn get_short_code(&self, warehouse_id: &str) -> RepositoryResult<Option<String>> {
        let short = self
            .get_config_value(&ConfigScope::warehouse(warehouse_id), config_keys::SHORT_CODE)?
            .map(|s| s.trim().to_uppercase())
            .filter(|s| !s.is_empty());
        Ok(short)
    }

    /// 设置仓库简码
    ///
    /// 约束: 3 位字母数字，且不与其它仓库重复
    pub fn set_short_code(&self, warehouse_id: &str, short_code: &str) -> RepositoryResult<()> {
        let code = short_code.trim().to_uppercase();
        if code.len() != 3 || !code.chars().all(|c| c.is_ascii_alphanumeric()) {
            return Err(RepositoryError::ConfigValueError {
                key: config_keys::SHORT_CODE.to_string(),
                message: format!("仓库简码必须为3位字母数字: {}", short_code),
            });
        }

        let own_scope = ConfigScope::warehouse(warehouse_id).scope_id();
        {
            let conn = self.get_conn()?;
            let taken_by: Option<String> = conn
                .query_row(
                    "SELECT scope_id FROM config_kv WHERE key = ?1 AND UPPER(value) = ?2 AND scope_id != ?3 LIMIT 1",
                    params![config_keys::SHORT_CODE, code, own_scope],
                    |row| row.get(0),
                )
                .optional()?;
            if let Some(scope_id) = taken_by {
                return Err(RepositoryError::ConfigValueError {
                    key: config_keys::SHORT_CODE.to_string(),
                    message: format!("仓库简码 {} 已被 {} 使用", code, scope_id),
                });
            }
        }

        self.set_config_value(&ConfigScope::warehouse(warehouse_id), config_keys::SHORT_CODE, &code)
    }

    /// 生成下一个收货单号
    ///
    /// 格式: PREFIX-SHORT-000001；无简码时为 PREFIX-000001。
    /// 序号挂在简码上而非仓库上：简码转给其它仓库后继续原序号，不会重号。
    /// 无简码的仓库共用全局序号。
    pub fn next_receipt_code(&self, warehouse_id: &str) -> RepositoryResult<String> {
        let prefix = self.get_receipt_prefix(warehouse_id)?;
        let short = self.get_short_code(warehouse_id)?;
        let seq_scope = match short.as_deref() {
            Some(code) => ConfigScope::short_code(code),
            None => ConfigScope::Global,
        };

        let seq = {
            let mut conn = self.get_conn()?;
            let tx = conn.transaction()?;
            let current: Option<String> = tx
                .query_row(
                    "SELECT value FROM config_kv WHERE scope_id = ?1 AND key = ?2",
                    params![seq_scope.scope_id(), config_keys::RECEIPT_SEQ],
                    |row| row.get(0),
                )
                .optional()?;
            let next = current
                .as_deref()
                .and_then(|v| v.trim().parse::<u64>().ok())
                .unwrap_or(0)
                + 1;
            tx.execute(
                r#"
                INSERT INTO config_kv (scope_id, key, value, updated_at)
                VALUES (?1, ?2, ?3, datetime('now'))
                ON CONFLICT(scope_id, key) DO UPDATE SET
                    value = excluded.value,
                    updated_at = excluded.updated_at
                "#,
                params![seq_scope.scope_id(), config_keys::RECEIPT_SEQ, next.to_string()],
            )?;
            tx.commit()?;
            next
        };

        Ok(match short {
            Some(short) => format!("{}-{}-{:06}", prefix, short, seq),
            None => format!("{}-{:06}", prefix, seq),
        })
    }
}

// ==========================================
// InboundConfigReader Trait 实现
// ==========================================
impl InboundConfigReader for ConfigManager {
    fn overs_policy(&self, warehouse_id: &str) -> RepositoryResult<OversPolicy> {
        self.get_overs_policy(warehouse_id)
    }

    fn next_receipt_code(&self, warehouse_id: &str) -> RepositoryResult<String> {
        ConfigManager::next_receipt_code(self, warehouse_id)
    }

    fn short_code(&self, warehouse_id: &str) -> RepositoryResult<Option<String>> {
        self.get_short_code(warehouse_id)
    }
}

// ==========================================
// ConfigScope - 配置作用域
// ==========================================
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ConfigScope {
    Global,                            // 全局
    Warehouse { warehouse_id: String }, // 仓库
    ShortCode { code: String },         // 仓库简码（单号序号）
}

impl ConfigScope {
    pub fn warehouse(warehouse_id: &str) -> Self {
        ConfigScope::Warehouse {
            warehouse_id: warehouse_id.to_string(),
        }
    }

    pub fn short_code(code: &str) -> Self {
        ConfigScope::ShortCode {
            code: code.trim().to_uppercase(),
        }
    }

    /// config_kv.scope_id 取值
    pub fn scope_id(&self) -> String {
        match self {
            ConfigScope::Global => "global".to_string(),
            ConfigScope::Warehouse { warehouse_id } => format!("warehouse:{}", warehouse_id),
            ConfigScope::ShortCode { code } => format!("short:{}", code),
        }
    }
}

// ==========================================
// 配置键常量
// ==========================================
pub mod config_keys {
    // 超收处置策略 (JSON)
    pub const INBOUND_OVERS_POLICY: &str = "inbound_overs_policy";

    // 收货单号
    pub const RECEIPT_PREFIX: &str = "receipt_prefix";
    pub const RECEIPT_SEQ: &str = "receipt_seq";

    // 仓库简码（仅仓库级）
    pub const SHORT_CODE: &str = "short_code";
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::types::OversDisposal;

    fn setup() -> ConfigManager {
        let conn = Connection::open_in_memory().unwrap();
        crate::db::ensure_schema(&conn).unwrap();
        ConfigManager::from_connection(Arc::new(Mutex::new(conn))).unwrap()
    }

    #[test]
    fn test_overs_policy_fallback_chain() {
        let cfg = setup();
        assert_eq!(cfg.get_overs_policy("W1").unwrap(), OversPolicy::default());

        let global = OversPolicy {
            hold_days: 5,
            after: OversDisposal::Charity,
        };
        cfg.set_overs_policy(None, &global).unwrap();
        assert_eq!(cfg.get_overs_policy("W1").unwrap(), global);

        let local = OversPolicy {
            hold_days: 1,
            after: OversDisposal::Dispose,
        };
        cfg.set_overs_policy(Some("W1"), &local).unwrap();
        assert_eq!(cfg.get_overs_policy("W1").unwrap(), local);
        assert_eq!(cfg.get_overs_policy("W2").unwrap(), global);
    }

    #[test]
    fn test_malformed_overs_policy_uses_default() {
        let cfg = setup();
        cfg.set_config_value(&ConfigScope::Global, config_keys::INBOUND_OVERS_POLICY, "not-json")
            .unwrap();
        assert_eq!(cfg.get_overs_policy("W1").unwrap(), OversPolicy::default());
    }

    #[test]
    fn test_receipt_codes_are_sequential() {
        let cfg = setup();
        assert_eq!(cfg.next_receipt_code("W1").unwrap(), "RCPT-000001");
        assert_eq!(cfg.next_receipt_code("W2").unwrap(), "RCPT-000002");

        cfg.set_short_code("W1", "esw").unwrap();
        cfg.set_config_value(&ConfigScope::warehouse("W1"), config_keys::RECEIPT_PREFIX, "IN")
            .unwrap();
        assert_eq!(cfg.next_receipt_code("W1").unwrap(), "IN-ESW-000001");
        assert_eq!(cfg.next_receipt_code("W1").unwrap(), "IN-ESW-000002");
    }

    #[test]
    fn test_short_code_sequence_follows_the_code() {
        let cfg = setup();
        cfg.set_short_code("W1", "ABC").unwrap();
        assert_eq!(cfg.next_receipt_code("W1").unwrap(), "RCPT-ABC-000001");

        cfg.set_short_code("W1", "DEF").unwrap();
        cfg.set_short_code("W2", "ABC").unwrap();
        assert_eq!(cfg.next_receipt_code("W2").unwrap(), "RCPT-ABC-000002");
        assert_eq!(cfg.next_receipt_code("W1").unwrap(), "RCPT-DEF-000001");
        assert_eq!(
            ConfigScope::short_code(" abc ").scope_id(),
            "short:ABC"
        );
    }

    #[test]
    fn test_short_code_validation() {
        let cfg = setup();
        assert!(matches!(
            cfg.set_short_code("W1", "TOOLONG"),
            Err(RepositoryError::ConfigValueError { .. })
        ));
        cfg.set_short_code("W1", "abc").unwrap();
        cfg.set_short_code("W1", "ABC").unwrap();
        assert!(cfg.set_short_code("W2", "abc").is_err());
        assert_eq!(cfg.get_short_code("W1").unwrap().as_deref(), Some("ABC"));
    }
}
