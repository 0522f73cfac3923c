// ==========================================
// 仓储入库收货核心 - 收货单批量导入API
// ==========================================
// 职责: CSV → 草稿 → 逐张 create_receipt
// 红线: 单张收货单创建失败不影响其他收货单
// ==========================================

use std::path::Path;
use std::sync::Arc;
use std::time::Instant;

use serde::{Deserialize, Serialize};
use tracing::{info, warn};

use crate::api::error::{ApiError, ApiResult};
use crate::api::inbound_api::InboundApi;
use crate::i18n::t_with_args;
use crate::importer::{ReceiptBatchImporter, RowError, VendorDirectory};

/// 导入API响应
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ImportReceiptsResponse {
    /// 非空数据行数
    pub total_rows: usize,
    /// 新建收货单号（按文件首次出现顺序）
    pub created_codes: Vec<String>,
    /// 行级错误（含创建被拒的分组）
    pub errors: Vec<RowError>,
    /// 导入耗时（毫秒）
    pub elapsed_ms: i64,
    /// 按当前语言生成的结果摘要
    pub summary: String,
}

pub struct ImportApi {
    inbound_api: Arc<InboundApi>,
}

impl ImportApi {
    pub fn new(inbound_api: Arc<InboundApi>) -> Self {
        Self { inbound_api }
    }

    /// 导入收货单 CSV
    ///
    /// # 参数
    /// - file_path: CSV 文件路径
    /// - warehouse_id: 目标仓库
    /// - vendors: 供应商查询
    /// - operator: 操作人
    ///
    /// # 返回
    /// - Ok(ImportReceiptsResponse): 已创建的收货单与行错误
    /// - Err(ApiError::ImportError): 文件无法读取或表头不完整
    pub fn import_receipts_csv(
        &self,
        file_path: &Path,
        warehouse_id: &str,
        vendors: &dyn VendorDirectory,
        operator: &str,
    ) -> ApiResult<ImportReceiptsResponse> {
        if warehouse_id.trim().is_empty() {
            return Err(ApiError::InvalidInput("仓库(warehouse_id)不能为空".to_string()));
        }
        if operator.trim().is_empty() {
            return Err(ApiError::InvalidInput("操作人(operator)不能为空".to_string()));
        }
        let started = Instant::now();

        let batch = ReceiptBatchImporter::new(warehouse_id).parse_path(file_path, vendors)?;
        let mut errors = batch.errors;
        let mut created_codes = Vec::with_capacity(batch.drafts.len());

        for draft in batch.drafts {
            let first_row = draft.rows.first().copied().unwrap_or(0);
            match self.inbound_api.create_receipt(draft.receipt, operator) {
                Ok(receipt) => created_codes.push(receipt.code),
                Err(e) => {
                    warn!(row = first_row, kind = e.kind(), error = %e, "导入分组创建失败");
                    errors.push(RowError {
                        row: first_row,
                        message: e.to_string(),
                    });
                }
            }
        }
        errors.sort_by_key(|e| e.row);

        let elapsed_ms = started.elapsed().as_millis() as i64;
        info!(
            file = %file_path.display(),
            created = created_codes.len(),
            errors = errors.len(),
            elapsed_ms,
            "收货单导入完成"
        );

        let summary = t_with_args(
            "import.completed",
            &[
                ("created", &created_codes.len().to_string()),
                ("errors", &errors.len().to_string()),
            ],
        );

        Ok(ImportReceiptsResponse {
            total_rows: batch.total_rows,
            created_codes,
            errors,
            elapsed_ms,
            summary,
        })
    }
}
