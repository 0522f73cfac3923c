// ==========================================
// 库位分配集成测试
// ==========================================
// 职责: 验证自动分配、重分配、清除与货架可用性
// ==========================================


#[path = "helpers/receipt_builder.rs"]
mod receipt_builder;

#[cfg(test)]
mod bin_allocation_test {
    use std::collections::HashSet;

    use wms_goods_in::api::ApiError;
    use wms_goods_in::domain::types::{AllocationStatus, BinStatus, RackStatus};
    use wms_goods_in::repository::BinInventory;

    use crate::receipt_builder::{drive_to_allocated, ReceiptBuilder};
    use crate::test_helpers::{setup_inbound_env, InboundTestEnv, OPERATOR, WAREHOUSE};

    /// 创建并推进到 ALLOCATED，返回 (receipt_id, line_ids)
    fn allocated_receipt(env: &InboundTestEnv, lines: usize) -> (String, Vec<String>) {
        let receipt = env
            .api
            .create_receipt(ReceiptBuilder::new(WAREHOUSE).lines(lines, 1).build(), OPERATOR)
            .unwrap();
        drive_to_allocated(&env.api, &receipt.id, OPERATOR);
        let line_ids = receipt.lines.iter().map(|l| l.id.clone()).collect();
        (receipt.id, line_ids)
    }

    #[test]
    fn test_auto_allocate_assigns_distinct_bins_in_scan_order() {
        let env = setup_inbound_env();
        // 先建 Rack 2 再建 Rack 1，扫描顺序仍按货架序号
        let rack2 = env.seed_rack(WAREHOUSE, "Rack 2", 1, 2);
        let rack1 = env.seed_rack(WAREHOUSE, "Rack 1", 2, 2);
        let (receipt_id, line_ids) = allocated_receipt(&env, 5);

        let response = env.api.auto_allocate(&receipt_id, OPERATOR).unwrap();
        assert_eq!(response.assigned_count, 5);
        assert!(response.unresolved_line_ids.is_empty());

        let receipt = response.receipt;
        assert_eq!(receipt.allocation_status, AllocationStatus::Allocated);
        let bins: Vec<String> = receipt.lines.iter().map(|l| l.bin_id.clone().unwrap()).collect();
        let expected: Vec<String> = rack1.iter().chain(rack2.iter()).take(5).cloned().collect();
        assert_eq!(bins, expected);

        let unique: HashSet<&String> = bins.iter().collect();
        assert_eq!(unique.len(), line_ids.len());

        assert_eq!(receipt.lines[0].bin_code.as_deref(), Some("R001-S001-B001"));
        assert_eq!(receipt.lines[2].bin_code.as_deref(), Some("R001-S002-B001"));
        assert_eq!(receipt.lines[4].bin_code.as_deref(), Some("R002-S001-B001"));
        assert_eq!(env.count_bins_with_status("reserved"), 5);
    }

    #[test]
    fn test_auto_allocate_with_no_free_bins_is_not_an_error() {
        let env = setup_inbound_env();
        let (receipt_id, line_ids) = allocated_receipt(&env, 3);

        let response = env.api.auto_allocate(&receipt_id, OPERATOR).unwrap();
        assert_eq!(response.assigned_count, 0);
        assert_eq!(response.unresolved_line_ids, line_ids);
        assert_eq!(response.receipt.allocation_status, AllocationStatus::NotStarted);
    }

    #[test]
    fn test_maintenance_and_inactive_racks_are_skipped() {
        let env = setup_inbound_env();
        let (_, maintenance_bins) =
            env.insert_rack_with_bins(WAREHOUSE, "Rack 1", RackStatus::Maintenance, 3);
        let (_, inactive_bins) = env.insert_rack_with_bins(WAREHOUSE, "Rack 2", RackStatus::Inactive, 3);
        let (_, active_bins) = env.insert_rack_with_bins(WAREHOUSE, "Rack 3", RackStatus::Active, 1);
        let (receipt_id, line_ids) = allocated_receipt(&env, 2);

        let response = env.api.auto_allocate(&receipt_id, OPERATOR).unwrap();
        assert_eq!(response.assigned_count, 1);
        assert_eq!(response.unresolved_line_ids, vec![line_ids[1].clone()]);
        assert_eq!(response.receipt.lines[0].bin_id.as_deref(), Some(active_bins[0].as_str()));

        for bin_id in maintenance_bins.iter().chain(inactive_bins.iter()) {
            assert_eq!(env.bins.bin_status(bin_id).unwrap(), Some(BinStatus::Empty));
        }
    }

    #[test]
    fn test_blocked_and_occupied_bins_are_skipped() {
        let env = setup_inbound_env();
        let bins = env.seed_rack(WAREHOUSE, "Rack 1", 1, 4);
        env.bins.set_bin_status(&bins[0], BinStatus::Occupied).unwrap();
        env.bins.set_bin_status(&bins[1], BinStatus::Blocked).unwrap();
        env.bins.set_bin_status(&bins[2], BinStatus::Available).unwrap();
        let (receipt_id, _) = allocated_receipt(&env, 2);

        let receipt = env.api.auto_allocate(&receipt_id, OPERATOR).unwrap().receipt;
        assert_eq!(receipt.lines[0].bin_id.as_deref(), Some(bins[2].as_str()));
        assert_eq!(receipt.lines[1].bin_id.as_deref(), Some(bins[3].as_str()));
    }

    #[test]
    fn test_auto_allocate_is_deterministic() {
        let first_env = setup_inbound_env();
        let second_env = setup_inbound_env();

        let mut codes = Vec::new();
        for env in [&first_env, &second_env] {
            env.seed_rack(WAREHOUSE, "Rack 7", 2, 3);
            env.seed_rack(WAREHOUSE, "Rack 3", 1, 2);
            let (receipt_id, _) = allocated_receipt(env, 4);
            let receipt = env.api.auto_allocate(&receipt_id, OPERATOR).unwrap().receipt;
            codes.push(
                receipt
                    .lines
                    .iter()
                    .map(|l| l.bin_code.clone().unwrap())
                    .collect::<Vec<_>>(),
            );
        }
        assert_eq!(codes[0], codes[1]);
        assert_eq!(codes[0][0], "R003-S001-B001");
    }

    #[test]
    fn test_second_auto_allocate_only_fills_gaps() {
        let env = setup_inbound_env();
        let bins = env.seed_rack(WAREHOUSE, "Rack 1", 1, 1);
        let (receipt_id, line_ids) = allocated_receipt(&env, 2);

        let first = env.api.auto_allocate(&receipt_id, OPERATOR).unwrap();
        assert_eq!(first.unresolved_line_ids, vec![line_ids[1].clone()]);

        let more = env.seed_rack(WAREHOUSE, "Rack 2", 1, 1);
        let second = env.api.auto_allocate(&receipt_id, OPERATOR).unwrap();
        assert_eq!(second.assigned_count, 1);
        assert_eq!(second.receipt.lines[0].bin_id.as_deref(), Some(bins[0].as_str()));
        assert_eq!(second.receipt.lines[1].bin_id.as_deref(), Some(more[0].as_str()));

        // 全部已分配后再次调用无变化
        let third = env.api.auto_allocate(&receipt_id, OPERATOR).unwrap();
        assert_eq!(third.assigned_count, 0);
        assert_eq!(third.receipt.lines, second.receipt.lines);
    }

    #[test]
    fn test_receipts_never_share_a_bin() {
        let env = setup_inbound_env();
        env.seed_rack(WAREHOUSE, "Rack 1", 1, 3);
        let (first_id, _) = allocated_receipt(&env, 2);
        let (second_id, second_lines) = allocated_receipt(&env, 2);

        let first = env.api.auto_allocate(&first_id, OPERATOR).unwrap().receipt;
        let second = env.api.auto_allocate(&second_id, OPERATOR).unwrap();
        assert_eq!(second.assigned_count, 1);
        assert_eq!(second.unresolved_line_ids, vec![second_lines[1].clone()]);

        let taken: HashSet<String> = first.lines.iter().filter_map(|l| l.bin_id.clone()).collect();
        let bin = second.receipt.lines[0].bin_id.clone().unwrap();
        assert!(!taken.contains(&bin));
    }

    #[test]
    fn test_reassign_moves_line_and_releases_old_bin() {
        let env = setup_inbound_env();
        let bins = env.seed_rack(WAREHOUSE, "Rack 1", 1, 2);
        let (receipt_id, line_ids) = allocated_receipt(&env, 1);
        env.api.auto_allocate(&receipt_id, OPERATOR).unwrap();

        let line = env.api.reassign_line_bin(&line_ids[0], OPERATOR).unwrap();
        assert_eq!(line.bin_id.as_deref(), Some(bins[1].as_str()));
        assert_eq!(line.bin_code.as_deref(), Some("R001-S001-B002"));
        assert_eq!(env.bins.bin_status(&bins[0]).unwrap(), Some(BinStatus::Empty));
        assert_eq!(env.bins.bin_status(&bins[1]).unwrap(), Some(BinStatus::Reserved));
    }

    #[test]
    fn test_reassign_without_alternative_keeps_current_bin() {
        let env = setup_inbound_env();
        let bins = env.seed_rack(WAREHOUSE, "Rack 1", 1, 1);
        let (receipt_id, line_ids) = allocated_receipt(&env, 1);
        env.api.auto_allocate(&receipt_id, OPERATOR).unwrap();

        match env.api.reassign_line_bin(&line_ids[0], OPERATOR).unwrap_err() {
            ApiError::NoBinAvailable {
                warehouse_id,
                line_id,
            } => {
                assert_eq!(warehouse_id, WAREHOUSE);
                assert_eq!(line_id, line_ids[0]);
            }
            other => panic!("Expected NoBinAvailable, got {:?}", other),
        }

        let receipt = env.api.get_receipt(&receipt_id).unwrap();
        assert_eq!(receipt.lines[0].bin_id.as_deref(), Some(bins[0].as_str()));
        assert_eq!(env.bins.bin_status(&bins[0]).unwrap(), Some(BinStatus::Reserved));
    }

    #[test]
    fn test_clear_twice_equals_clear_once() {
        let env = setup_inbound_env();
        let bins = env.seed_rack(WAREHOUSE, "Rack 1", 1, 2);
        let (receipt_id, line_ids) = allocated_receipt(&env, 2);
        env.api.auto_allocate(&receipt_id, OPERATOR).unwrap();

        let once = env.api.clear_line_bin(&line_ids[0], OPERATOR).unwrap();
        let after_once = env.api.get_receipt(&receipt_id).unwrap();
        let twice = env.api.clear_line_bin(&line_ids[0], OPERATOR).unwrap();
        let after_twice = env.api.get_receipt(&receipt_id).unwrap();

        assert_eq!(once, twice);
        assert_eq!(once.bin_id, None);
        assert_eq!(once.bin_code, None);
        assert_eq!(after_once.lines, after_twice.lines);
        assert_eq!(after_twice.allocation_status, AllocationStatus::Partial);
        assert_eq!(env.bins.bin_status(&bins[0]).unwrap(), Some(BinStatus::Empty));
        assert_eq!(env.bins.bin_status(&bins[1]).unwrap(), Some(BinStatus::Reserved));

        // 清除后的库位可被再次分配
        let again = env.api.auto_allocate(&receipt_id, OPERATOR).unwrap();
        assert_eq!(again.receipt.lines[0].bin_id.as_deref(), Some(bins[0].as_str()));
    }

    #[test]
    fn test_release_is_idempotent_at_inventory_level() {
        let env = setup_inbound_env();
        let bins = env.seed_rack(WAREHOUSE, "Rack 1", 1, 1);
        assert!(env.bins.reserve_bin(&bins[0]).unwrap());
        assert!(!env.bins.reserve_bin(&bins[0]).unwrap());
        env.bins.release_bin(&bins[0]).unwrap();
        env.bins.release_bin(&bins[0]).unwrap();
        assert_eq!(env.bins.bin_status(&bins[0]).unwrap(), Some(BinStatus::Empty));
    }
}
