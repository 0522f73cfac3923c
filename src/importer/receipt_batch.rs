// ==========================================
// 仓储入库收货核心 - 收货单 CSV 批量转换
// ==========================================
// 职责: CSV 行 → NewReceipt 草稿（按 供应商+参考号 分组）
// 红线: 只产出普通的创建请求，不直接触碰收货单生命周期
// 红线: 行错误按行号收集，不中断其他分组
// ==========================================

use crate::domain::receipt::{NewReceipt, NewReceiptLine};
use crate::domain::types::VendorType;
use crate::importer::error::{ImportError, ImportResult};
use chrono::{DateTime, NaiveDate, Utc};
use csv::ReaderBuilder;
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::fs::File;
use std::io::Read;
use std::path::Path;
use tracing::{debug, info};

/// 必需列
pub const REQUIRED_COLUMNS: [&str; 2] = ["vendor", "quantity"];

/// 全部可识别列
pub const KNOWN_COLUMNS: [&str; 8] = [
    "vendor",
    "reference",
    "planned_arrival",
    "product_sku",
    "product_name",
    "customer_name",
    "apartment",
    "quantity",
];

// ==========================================
// VendorDirectory - 供应商查询
// ==========================================
/// 已解析的供应商
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct VendorRef {
    pub vendor_id: String,
    pub vendor_type: VendorType,
}

/// CSV 中的供应商名/编码 → 供应商
pub trait VendorDirectory {
    fn resolve(&self, vendor_key: &str) -> Option<VendorRef>;
}

impl VendorDirectory for HashMap<String, VendorRef> {
    fn resolve(&self, vendor_key: &str) -> Option<VendorRef> {
        self.get(vendor_key).cloned()
    }
}

// ==========================================
// 输出
// ==========================================

/// 行级错误（row 为文件行号，表头为第 1 行）
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RowError {
    pub row: usize,
    pub message: String,
}

/// 一张待创建的收货单
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ReceiptDraft {
    /// 组成该收货单的文件行号
    pub rows: Vec<usize>,
    pub receipt: NewReceipt,
}

/// 批量转换结果
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct ReceiptBatch {
    pub total_rows: usize,
    /// 按首次出现顺序
    pub drafts: Vec<ReceiptDraft>,
    pub errors: Vec<RowError>,
}

// ==========================================
// ReceiptBatchImporter
// ==========================================
pub struct ReceiptBatchImporter {
    warehouse_id: String,
}

struct Group {
    rows: Vec<usize>,
    failed: bool,
    receipt: NewReceipt,
}

impl ReceiptBatchImporter {
    pub fn new(warehouse_id: &str) -> Self {
        Self {
            warehouse_id: warehouse_id.trim().to_string(),
        }
    }

    /// 从 CSV 文件转换
    pub fn parse_path(&self, path: &Path, vendors: &dyn VendorDirectory) -> ImportResult<ReceiptBatch> {
        if !path.exists() {
            return Err(ImportError::FileNotFound(path.display().to_string()));
        }
        if let Some(ext) = path.extension() {
            if !ext.eq_ignore_ascii_case("csv") {
                return Err(ImportError::UnsupportedFormat(
                    ext.to_string_lossy().to_string(),
                ));
            }
        }
        let file = File::open(path)?;
        self.parse_reader(file, vendors)
    }

    /// 从任意输入流转换
    ///
    /// # 返回
    /// - Ok(ReceiptBatch): 合法分组的草稿 + 行错误
    /// - Err(ImportError): 表头缺失或 CSV 无法解析
    ///
    /// 分组内任一行出错时整组不产出草稿，避免生成缺行的收货单
    pub fn parse_reader<R: Read>(&self, input: R, vendors: &dyn VendorDirectory) -> ImportResult<ReceiptBatch> {
        let mut reader = ReaderBuilder::new()
            .has_headers(true)
            .flexible(true)
            .trim(csv::Trim::All)
            .from_reader(input);

        let headers: Vec<String> = reader
            .headers()?
            .iter()
            .map(|h| h.trim().to_lowercase())
            .collect();
        for required in REQUIRED_COLUMNS {
            if !headers.iter().any(|h| h == required) {
                return Err(ImportError::MissingColumn(required.to_string()));
            }
        }
        let unknown: Vec<&String> = headers
            .iter()
            .filter(|h| !h.is_empty() && !KNOWN_COLUMNS.contains(&h.as_str()))
            .collect();
        if !unknown.is_empty() {
            debug!(columns = ?unknown, "忽略未识别的列");
        }

        let mut batch = ReceiptBatch::default();
        let mut groups: Vec<Group> = Vec::new();
        let mut index: HashMap<(String, String), usize> = HashMap::new();

        // 行号取记录在文件中的起始行（表头为第 1 行），空行与引号内换行不会造成偏移
        let mut last_row = 1;
        for result in reader.records() {
            let position = match &result {
                Ok(record) => record.position(),
                Err(e) => e.position(),
            };
            let row = position.map_or(last_row + 1, |p| p.line() as usize);
            last_row = row;
            let record = match result {
                Ok(record) => record,
                Err(e) => {
                    batch.total_rows += 1;
                    batch.errors.push(RowError {
                        row,
                        message: format!("CSV 行解析失败: {}", e),
                    });
                    continue;
                }
            };

            let fields: HashMap<&str, &str> = headers
                .iter()
                .map(String::as_str)
                .zip(record.iter())
                .collect();
            // 跳过完全空白的行
            if fields.values().all(|v| v.is_empty()) {
                continue;
            }
            batch.total_rows += 1;

            let get = |name: &str| -> Option<String> {
                fields
                    .get(name)
                    .map(|v| v.trim())
                    .filter(|v| !v.is_empty())
                    .map(str::to_string)
            };

            let vendor_key = get("vendor").unwrap_or_default();
            let reference = get("reference");
            let key = (vendor_key.clone(), reference.clone().unwrap_or_default());

            let parsed = Self::parse_row(&get, &vendor_key, vendors);
            let group_idx = match index.get(&key) {
                Some(&idx) => idx,
                None => {
                    let (vendor_id, vendor_type) = match &parsed {
                        Ok((vendor, _, _)) => (vendor.vendor_id.clone(), Some(vendor.vendor_type)),
                        Err(_) => (vendor_key.clone(), None),
                    };
                    groups.push(Group {
                        rows: Vec::new(),
                        failed: false,
                        receipt: NewReceipt {
                            vendor_id,
                            vendor_type,
                            warehouse_id: self.warehouse_id.clone(),
                            reference,
                            ..Default::default()
                        },
                    });
                    index.insert(key, groups.len() - 1);
                    groups.len() - 1
                }
            };

            let group = &mut groups[group_idx];
            group.rows.push(row);
            match parsed {
                Ok((_, planned, line)) => {
                    if group.receipt.planned_arrival.is_none() {
                        group.receipt.planned_arrival = planned;
                    }
                    group.receipt.lines.push(line);
                }
                Err(message) => {
                    group.failed = true;
                    batch.errors.push(RowError { row, message });
                }
            }
        }

        for group in groups {
            if group.failed {
                debug!(rows = ?group.rows, vendor = %group.receipt.vendor_id, "分组含错误行，跳过");
                continue;
            }
            batch.drafts.push(ReceiptDraft {
                rows: group.rows,
                receipt: group.receipt,
            });
        }

        info!(
            warehouse_id = %self.warehouse_id,
            total_rows = batch.total_rows,
            drafts = batch.drafts.len(),
            errors = batch.errors.len(),
            "收货单 CSV 转换完成"
        );
        Ok(batch)
    }

    /// 单行校验与映射
    fn parse_row(
        get: &dyn Fn(&str) -> Option<String>,
        vendor_key: &str,
        vendors: &dyn VendorDirectory,
    ) -> Result<(VendorRef, Option<DateTime<Utc>>, NewReceiptLine), String> {
        if vendor_key.is_empty() {
            return Err("供应商为空".to_string());
        }
        let vendor = vendors
            .resolve(vendor_key)
            .ok_or_else(|| format!("未知供应商: {}", vendor_key))?;

        let raw_qty = get("quantity").ok_or_else(|| "数量为空".to_string())?;
        let quantity: i32 = raw_qty
            .parse()
            .map_err(|_| format!("数量不是整数: {}", raw_qty))?;
        if quantity <= 0 {
            return Err(format!("数量必须大于0: {}", quantity));
        }

        let planned_arrival = match get("planned_arrival") {
            Some(raw) => Some(parse_arrival(&raw).ok_or_else(|| {
                format!("计划到货时间格式错误: {}（期望 RFC3339 或 YYYY-MM-DD）", raw)
            })?),
            None => None,
        };

        let product_sku = get("product_sku");
        let product_name = get("product_name");
        if vendor.vendor_type == VendorType::Sku && product_sku.is_none() && product_name.is_none() {
            return Err("SKU 供应商的行需要 product_sku 或 product_name".to_string());
        }

        let customer_name = get("customer_name");
        let apartment = get("apartment");
        if customer_name.is_none() && apartment.is_none() {
            return Err("customer_name 与 apartment 至少填写一项".to_string());
        }

        let line = NewReceiptLine {
            product_sku,
            product_name,
            customer_name,
            apartment,
            quantity,
            notes: None,
        };
        Ok((vendor, planned_arrival, line))
    }
}

/// RFC3339 或纯日期（按 UTC 零点）
fn parse_arrival(raw: &str) -> Option<DateTime<Utc>> {
    if let Ok(ts) = DateTime::parse_from_rfc3339(raw) {
        return Some(ts.with_timezone(&Utc));
    }
    NaiveDate::parse_from_str(raw, "%Y-%m-%d")
        .ok()
        .and_then(|d| d.and_hms_opt(0, 0, 0))
        .map(|dt| dt.and_utc())
}
