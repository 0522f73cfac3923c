// ==========================================
// 收货单构建器 - 用于集成测试
// ==========================================
#![allow(dead_code)]

use chrono::{DateTime, Utc};
use wms_goods_in::api::InboundApi;
use wms_goods_in::domain::types::{ReceiptStatus, VendorType};
use wms_goods_in::domain::{LinePatch, NewReceipt, NewReceiptLine, Receipt};

// ==========================================
// NewReceipt 构建器
// ==========================================

pub struct ReceiptBuilder {
    vendor_id: String,
    vendor_type: Option<VendorType>,
    warehouse_id: String,
    reference: Option<String>,
    planned_arrival: Option<DateTime<Utc>>,
    lines: Vec<NewReceiptLine>,
}

impl ReceiptBuilder {
    pub fn new(warehouse_id: &str) -> Self {
        Self {
            vendor_id: "V-001".to_string(),
            vendor_type: Some(VendorType::Sku),
            warehouse_id: warehouse_id.to_string(),
            reference: None,
            planned_arrival: None,
            lines: Vec::new(),
        }
    }

    pub fn vendor(mut self, vendor_id: &str, vendor_type: VendorType) -> Self {
        self.vendor_id = vendor_id.to_string();
        self.vendor_type = Some(vendor_type);
        self
    }

    pub fn reference(mut self, reference: &str) -> Self {
        self.reference = Some(reference.to_string());
        self
    }

    pub fn planned_arrival(mut self, at: DateTime<Utc>) -> Self {
        self.planned_arrival = Some(at);
        self
    }

    /// 追加一行 SKU 明细（客户 + 数量）
    pub fn sku_line(mut self, sku: &str, customer: &str, quantity: i32) -> Self {
        self.lines.push(NewReceiptLine {
            product_sku: Some(sku.to_string()),
            customer_name: Some(customer.to_string()),
            quantity,
            ..Default::default()
        });
        self
    }

    /// 追加 n 行默认明细
    pub fn lines(mut self, n: usize, quantity: i32) -> Self {
        for i in 0..n {
            self = self.sku_line(&format!("SKU-{:03}", i + 1), "Customer A", quantity);
        }
        self
    }

    pub fn build(self) -> NewReceipt {
        NewReceipt {
            vendor_id: self.vendor_id,
            vendor_type: self.vendor_type,
            warehouse_id: self.warehouse_id,
            reference: self.reference,
            planned_arrival: self.planned_arrival,
            notes: None,
            lines: self.lines,
        }
    }
}

// ==========================================
// 流程推进
// ==========================================

/// 推进到 MOVED_TO_BAY（不修改质检字段）
pub fn drive_to_bay(api: &InboundApi, receipt_id: &str, operator: &str) -> Receipt {
    let mut receipt = api.get_receipt(receipt_id).unwrap();
    while receipt.status != ReceiptStatus::MovedToBay {
        receipt = api.advance_receipt(receipt_id, operator).unwrap();
    }
    receipt
}

/// 全部按计划收货后推进到 ALLOCATED
pub fn drive_to_allocated(api: &InboundApi, receipt_id: &str, operator: &str) -> Receipt {
    drive_to_bay(api, receipt_id, operator);
    api.mark_all_received(receipt_id, operator).unwrap();
    api.advance_receipt(receipt_id, operator).unwrap()
}

/// 实收数量修改
pub fn received(qty: i32) -> LinePatch {
    LinePatch {
        received_qty: Some(qty),
        ..Default::default()
    }
}
