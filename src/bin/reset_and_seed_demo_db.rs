// ==========================================
// 演示数据库: 备份旧库 → 建表 → 生成货架/库位 → 生成各状态收货单
// 用法: reset_and_seed_demo_db [数据库路径] [每仓收货单数]
// ==========================================

use chrono::{Duration, Local, Utc};
use std::error::Error;
use std::fs;
use std::path::Path;
use std::sync::{Arc, Mutex};

use wms_goods_in::config::ConfigManager;
use wms_goods_in::db::{default_db_path, open_sqlite_connection};
use wms_goods_in::domain::{LinePatch, NewReceipt, NewReceiptLine, ReceiptFilter};
use wms_goods_in::domain::types::{DamageOrigin, ReceiptStatus, VendorType};
use wms_goods_in::repository::SqliteBinInventory;
use wms_goods_in::InboundApi;

const OPERATOR: &str = "seed";
const DEFAULT_RECEIPTS_PER_WAREHOUSE: usize = 12;
const WAREHOUSES: [(&str, &str); 2] = [("WH-EAST", "EST"), ("WH-WEST", "WST")];

fn main() -> Result<(), Box<dyn Error>> {
    wms_goods_in::logging::init();

    let db_path = std::env::args().nth(1).unwrap_or_else(default_db_path);
    let per_warehouse = std::env::args()
        .nth(2)
        .and_then(|s| s.parse::<usize>().ok())
        .unwrap_or(DEFAULT_RECEIPTS_PER_WAREHOUSE)
        .max(6);

    backup_and_reset_db(&db_path)?;

    let conn = Arc::new(Mutex::new(open_sqlite_connection(&db_path)?));
    let api = InboundApi::from_connection(conn.clone())?;
    let bins = SqliteBinInventory::new(conn.clone());
    let config = ConfigManager::from_connection(conn)?;

    for (warehouse_id, short_code) in WAREHOUSES {
        config.set_short_code(warehouse_id, short_code)?;
        for rack in 1..=3 {
            bins.seed_rack_grid(warehouse_id, &format!("Rack {}", rack), 4, 5, Some(short_code))?;
        }
        seed_receipts(&api, warehouse_id, per_warehouse)?;
    }

    print_quick_counts(&api)?;
    Ok(())
}

fn backup_and_reset_db(db_path: &str) -> Result<(), Box<dyn Error>> {
    let path = Path::new(db_path);
    if !path.exists() {
        return Ok(());
    }

    let ts = Local::now().format("%Y%m%d_%H%M%S").to_string();
    let backup_path = format!("{}.bak.{}", db_path, ts);
    fs::copy(path, &backup_path)?;
    fs::remove_file(path)?;

    eprintln!("Backed up {} -> {}", db_path, backup_path);
    Ok(())
}

/// 依次生成各生命周期阶段的收货单
fn seed_receipts(api: &InboundApi, warehouse_id: &str, count: usize) -> Result<(), Box<dyn Error>> {
    let targets = [
        ReceiptStatus::AwaitingUnloading,
        ReceiptStatus::Unloading,
        ReceiptStatus::MovedToBay,
        ReceiptStatus::Allocated,
        ReceiptStatus::ReadyForPicking,
        ReceiptStatus::Completed,
    ];

    for i in 0..count {
        let vendor_type = if i % 3 == 2 { VendorType::Flat } else { VendorType::Sku };
        let lines = (0..(i % 3 + 1))
            .map(|n| NewReceiptLine {
                product_sku: Some(format!("SKU-{:04}", i * 10 + n)),
                customer_name: Some(format!("Customer {}", (i + n) % 7 + 1)),
                apartment: if n % 2 == 0 { None } else { Some(format!("{}B", n + 1)) },
                quantity: (n as i32 + 1) * 4,
                ..Default::default()
            })
            .collect();

        let receipt = api.create_receipt(
            NewReceipt {
                vendor_id: format!("VENDOR-{}", i % 4 + 1),
                vendor_type: Some(vendor_type),
                warehouse_id: warehouse_id.to_string(),
                reference: Some(format!("PO-{}-{:03}", warehouse_id, i + 1)),
                planned_arrival: Some(Utc::now() + Duration::hours(i as i64 * 6 - 24)),
                notes: None,
                lines,
            },
            OPERATOR,
        )?;

        let target = targets[i % targets.len()];
        if i == count - 1 {
            api.cancel_receipt(&receipt.id, OPERATOR)?;
            continue;
        }
        drive_to(api, &receipt.id, target, i)?;
    }
    Ok(())
}

fn drive_to(api: &InboundApi, receipt_id: &str, target: ReceiptStatus, i: usize) -> Result<(), Box<dyn Error>> {
    let mut receipt = api.get_receipt(receipt_id)?;
    while receipt.status != target {
        match receipt.status {
            ReceiptStatus::MovedToBay => {
                api.mark_all_received(receipt_id, OPERATOR)?;
                // 每隔几张制造一条已确认的短收差异
                if i % 4 == 0 {
                    if let Some(line) = receipt.lines.first() {
                        api.update_line(
                            &line.id,
                            LinePatch {
                                received_qty: Some(line.quantity - 1),
                                damaged: Some(1),
                                damaged_origin: Some(DamageOrigin::Unloading),
                                ack_diff: Some(true),
                                ..Default::default()
                            },
                            OPERATOR,
                        )?;
                    }
                }
            }
            ReceiptStatus::Allocated => {
                api.auto_allocate(receipt_id, OPERATOR)?;
            }
            _ => {}
        }
        receipt = api.advance_receipt(receipt_id, OPERATOR)?;
    }
    Ok(())
}

fn print_quick_counts(api: &InboundApi) -> Result<(), Box<dyn Error>> {
    for (warehouse_id, _) in WAREHOUSES {
        let receipts = api.list_receipts(&ReceiptFilter::for_warehouse(warehouse_id))?;
        let kpis = api.compute_kpis(Some(warehouse_id))?;
        println!(
            "{}: receipts={} open={} allocated={} exceptions={}",
            warehouse_id,
            receipts.len(),
            kpis.open_receipts,
            kpis.bins_allocated,
            kpis.exception_lines
        );
    }
    Ok(())
}
