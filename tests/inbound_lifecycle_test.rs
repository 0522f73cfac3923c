// ==========================================
// 收货单生命周期集成测试
// ==========================================
// 职责: 经 InboundApi 验证状态流转、质检守卫、库位守卫、取消
// ==========================================


#[path = "helpers/receipt_builder.rs"]
mod receipt_builder;

#[cfg(test)]
mod inbound_lifecycle_test {
    use chrono::{Duration, Utc};
    use wms_goods_in::api::ApiError;
    use wms_goods_in::domain::types::{AllocationStatus, DamageOrigin, ReceiptStatus, VendorType};
    use wms_goods_in::domain::{LinePatch, FLAT_CONSIGNMENT_LABEL};

    use crate::receipt_builder::{drive_to_allocated, drive_to_bay, received, ReceiptBuilder};
    use crate::test_helpers::{setup_inbound_env, OPERATOR, WAREHOUSE};

    // ==========================================
    // 创建
    // ==========================================

    #[test]
    fn test_create_receipt_starts_awaiting_unloading() {
        let env = setup_inbound_env();
        let receipt = env
            .api
            .create_receipt(
                ReceiptBuilder::new(WAREHOUSE)
                    .reference("PO-100")
                    .sku_line("SKU-1", "Alice", 10)
                    .sku_line("SKU-2", "Bob", 5)
                    .build(),
                OPERATOR,
            )
            .unwrap();

        assert_eq!(receipt.status, ReceiptStatus::AwaitingUnloading);
        assert_eq!(receipt.code, "RCPT-000001");
        assert_eq!(receipt.lines.len(), 2);
        assert_eq!(receipt.lines[1].line_no, 2);
        assert_eq!(receipt.allocation_status, AllocationStatus::NotStarted);
        assert_eq!(receipt.exception_count, 0);
        assert!(receipt.actual_arrival.is_none());

        let stored = env.api.get_receipt(&receipt.id).unwrap();
        assert_eq!(stored.lines, receipt.lines);
    }

    #[test]
    fn test_create_flat_receipt_uses_consignment_label() {
        let env = setup_inbound_env();
        let receipt = env
            .api
            .create_receipt(
                ReceiptBuilder::new(WAREHOUSE)
                    .vendor("V-FLAT", VendorType::Flat)
                    .sku_line("IGNORED", "Alice", 1)
                    .build(),
                OPERATOR,
            )
            .unwrap();
        assert_eq!(receipt.lines[0].product_sku, None);
        assert_eq!(receipt.lines[0].product_name.as_deref(), Some(FLAT_CONSIGNMENT_LABEL));
    }

    #[test]
    fn test_create_rejects_empty_operator_and_bad_lines() {
        let env = setup_inbound_env();
        let err = env
            .api
            .create_receipt(ReceiptBuilder::new(WAREHOUSE).lines(1, 1).build(), "  ")
            .unwrap_err();
        assert!(matches!(err, ApiError::InvalidInput(_)));

        let err = env
            .api
            .create_receipt(ReceiptBuilder::new(WAREHOUSE).lines(1, 0).build(), OPERATOR)
            .unwrap_err();
        match err {
            ApiError::InvalidLineState { line_id, field, .. } => {
                assert_eq!(line_id, "line[0]");
                assert_eq!(field, "quantity");
            }
            other => panic!("Expected InvalidLineState, got {:?}", other),
        }

        let err = env
            .api
            .create_receipt(ReceiptBuilder::new("  ").lines(1, 1).build(), OPERATOR)
            .unwrap_err();
        assert!(matches!(err, ApiError::InvalidLineState { ref field, .. } if field == "warehouse_id"));
    }

    // ==========================================
    // 正向流转
    // ==========================================

    #[test]
    fn test_advance_follows_forward_chain_and_stamps_arrival() {
        let env = setup_inbound_env();
        env.seed_rack(WAREHOUSE, "Rack 1", 1, 4);
        let receipt = env
            .api
            .create_receipt(ReceiptBuilder::new(WAREHOUSE).lines(2, 3).build(), OPERATOR)
            .unwrap();

        let unloading = env.api.advance_receipt(&receipt.id, OPERATOR).unwrap();
        assert_eq!(unloading.status, ReceiptStatus::Unloading);
        let arrived = unloading.actual_arrival.expect("actual_arrival stamped");

        let bay = env.api.advance_receipt(&receipt.id, OPERATOR).unwrap();
        assert_eq!(bay.status, ReceiptStatus::MovedToBay);
        assert_eq!(bay.actual_arrival, Some(arrived));

        env.api.mark_all_received(&receipt.id, OPERATOR).unwrap();
        let allocated = env.api.advance_receipt(&receipt.id, OPERATOR).unwrap();
        assert_eq!(allocated.status, ReceiptStatus::Allocated);

        env.api.auto_allocate(&receipt.id, OPERATOR).unwrap();
        let ready = env.api.advance_receipt(&receipt.id, OPERATOR).unwrap();
        assert_eq!(ready.status, ReceiptStatus::ReadyForPicking);

        let done = env.api.advance_receipt(&receipt.id, OPERATOR).unwrap();
        assert_eq!(done.status, ReceiptStatus::Completed);
        assert!(done.lines.iter().all(|l| l.bin_id.is_some()));

        let err = env.api.advance_receipt(&receipt.id, OPERATOR).unwrap_err();
        assert!(matches!(err, ApiError::TerminalState { .. }));
        let err = env.api.cancel_receipt(&receipt.id, OPERATOR).unwrap_err();
        assert!(matches!(err, ApiError::TerminalState { .. }));
    }

    // ==========================================
    // 质检守卫
    // ==========================================

    #[test]
    fn test_advance_blocked_until_short_is_acknowledged() {
        let env = setup_inbound_env();
        let receipt = env
            .api
            .create_receipt(ReceiptBuilder::new(WAREHOUSE).lines(1, 10).build(), OPERATOR)
            .unwrap();
        drive_to_bay(&env.api, &receipt.id, OPERATOR);
        let line_id = receipt.lines[0].id.clone();

        env.api.update_line(&line_id, received(8), OPERATOR).unwrap();

        match env.api.advance_receipt(&receipt.id, OPERATOR).unwrap_err() {
            ApiError::QcIncomplete {
                receipt_id,
                lines_needing_ack,
                lines_needing_origin,
            } => {
                assert_eq!(receipt_id, receipt.id);
                assert_eq!(lines_needing_ack, vec![line_id.clone()]);
                assert!(lines_needing_origin.is_empty());
            }
            other => panic!("Expected QcIncomplete, got {:?}", other),
        }
        assert_eq!(
            env.api.get_receipt(&receipt.id).unwrap().status,
            ReceiptStatus::MovedToBay
        );

        let line = env
            .api
            .update_line(
                &line_id,
                LinePatch {
                    ack_diff: Some(true),
                    ..Default::default()
                },
                OPERATOR,
            )
            .unwrap();
        assert!(line.ack_diff);

        let allocated = env.api.advance_receipt(&receipt.id, OPERATOR).unwrap();
        assert_eq!(allocated.status, ReceiptStatus::Allocated);
        assert_eq!(allocated.exception_count, 1);
    }

    #[test]
    fn test_damage_requires_origin_and_both_problems_reported_together() {
        let env = setup_inbound_env();
        let receipt = env
            .api
            .create_receipt(ReceiptBuilder::new(WAREHOUSE).lines(2, 5).build(), OPERATOR)
            .unwrap();
        drive_to_bay(&env.api, &receipt.id, OPERATOR);
        let (first, second) = (receipt.lines[0].id.clone(), receipt.lines[1].id.clone());

        env.api.update_line(&first, received(6), OPERATOR).unwrap();
        env.api
            .update_line(
                &second,
                LinePatch {
                    damaged: Some(2),
                    ..Default::default()
                },
                OPERATOR,
            )
            .unwrap();

        match env.api.advance_receipt(&receipt.id, OPERATOR).unwrap_err() {
            ApiError::QcIncomplete {
                lines_needing_ack,
                lines_needing_origin,
                ..
            } => {
                assert_eq!(lines_needing_ack, vec![first.clone()]);
                assert_eq!(lines_needing_origin, vec![second.clone()]);
            }
            other => panic!("Expected QcIncomplete, got {:?}", other),
        }

        env.api
            .update_line(
                &first,
                LinePatch {
                    ack_diff: Some(true),
                    ..Default::default()
                },
                OPERATOR,
            )
            .unwrap();
        env.api
            .update_line(
                &second,
                LinePatch {
                    damaged_origin: Some(DamageOrigin::Warehouse),
                    ..Default::default()
                },
                OPERATOR,
            )
            .unwrap();

        let allocated = env.api.advance_receipt(&receipt.id, OPERATOR).unwrap();
        assert_eq!(allocated.status, ReceiptStatus::Allocated);
        assert_eq!(allocated.exception_count, 2);
    }

    #[test]
    fn test_invalid_line_patch_is_rejected_whole() {
        let env = setup_inbound_env();
        let receipt = env
            .api
            .create_receipt(ReceiptBuilder::new(WAREHOUSE).lines(1, 5).build(), OPERATOR)
            .unwrap();
        let line_id = receipt.lines[0].id.clone();

        let err = env
            .api
            .update_line(
                &line_id,
                LinePatch {
                    received_qty: Some(3),
                    damaged: Some(4),
                    notes: Some("crushed".to_string()),
                    ..Default::default()
                },
                OPERATOR,
            )
            .unwrap_err();
        match err {
            ApiError::InvalidLineState { line_id: id, field, .. } => {
                assert_eq!(id, line_id);
                assert_eq!(field, "damaged");
            }
            other => panic!("Expected InvalidLineState, got {:?}", other),
        }

        let stored = env.api.get_receipt(&receipt.id).unwrap();
        assert_eq!(stored.lines[0], receipt.lines[0]);

        let err = env.api.update_line(&line_id, received(-1), OPERATOR).unwrap_err();
        assert!(matches!(err, ApiError::InvalidLineState { .. }));

        let err = env.api.update_line("missing-line", received(1), OPERATOR).unwrap_err();
        assert!(matches!(err, ApiError::NotFound { .. }));
    }

    #[test]
    fn test_qc_fields_frozen_after_allocation_but_notes_editable() {
        let env = setup_inbound_env();
        let receipt = env
            .api
            .create_receipt(ReceiptBuilder::new(WAREHOUSE).lines(1, 5).build(), OPERATOR)
            .unwrap();
        drive_to_allocated(&env.api, &receipt.id, OPERATOR);
        let line_id = receipt.lines[0].id.clone();

        let err = env.api.update_line(&line_id, received(4), OPERATOR).unwrap_err();
        assert!(matches!(err, ApiError::CommandNotAllowed { ref status, .. } if status == "ALLOCATED"));
        let err = env.api.mark_all_received(&receipt.id, OPERATOR).unwrap_err();
        assert!(matches!(err, ApiError::CommandNotAllowed { .. }));

        let line = env
            .api
            .update_line(
                &line_id,
                LinePatch {
                    notes: Some("  top shelf  ".to_string()),
                    ..Default::default()
                },
                OPERATOR,
            )
            .unwrap();
        assert_eq!(line.notes.as_deref(), Some("top shelf"));
    }

    #[test]
    fn test_bin_commands_only_in_allocated() {
        let env = setup_inbound_env();
        env.seed_rack(WAREHOUSE, "Rack 1", 1, 2);
        let receipt = env
            .api
            .create_receipt(ReceiptBuilder::new(WAREHOUSE).lines(1, 5).build(), OPERATOR)
            .unwrap();

        let err = env.api.auto_allocate(&receipt.id, OPERATOR).unwrap_err();
        assert!(matches!(err, ApiError::CommandNotAllowed { ref command, .. } if command == "BIN_ALLOCATION"));
        let err = env
            .api
            .reassign_line_bin(&receipt.lines[0].id, OPERATOR)
            .unwrap_err();
        assert!(matches!(err, ApiError::CommandNotAllowed { .. }));
        assert_eq!(env.count_bins_with_status("reserved"), 0);
    }

    // ==========================================
    // 库位守卫
    // ==========================================

    #[test]
    fn test_advance_blocked_by_unallocated_line() {
        let env = setup_inbound_env();
        env.seed_rack(WAREHOUSE, "Rack 1", 1, 2);
        let receipt = env
            .api
            .create_receipt(ReceiptBuilder::new(WAREHOUSE).lines(3, 2).build(), OPERATOR)
            .unwrap();
        drive_to_allocated(&env.api, &receipt.id, OPERATOR);

        let response = env.api.auto_allocate(&receipt.id, OPERATOR).unwrap();
        assert_eq!(response.assigned_count, 2);
        let third = receipt.lines[2].id.clone();
        assert_eq!(response.unresolved_line_ids, vec![third.clone()]);
        assert_eq!(response.receipt.allocation_status, AllocationStatus::Partial);

        match env.api.advance_receipt(&receipt.id, OPERATOR).unwrap_err() {
            ApiError::UnallocatedLines { line_ids, .. } => assert_eq!(line_ids, vec![third]),
            other => panic!("Expected UnallocatedLines, got {:?}", other),
        }
        assert_eq!(
            env.api.get_receipt(&receipt.id).unwrap().status,
            ReceiptStatus::Allocated
        );
    }

    // ==========================================
    // 取消
    // ==========================================

    #[test]
    fn test_cancel_is_unconditional_and_terminal() {
        let env = setup_inbound_env();
        let receipt = env
            .api
            .create_receipt(ReceiptBuilder::new(WAREHOUSE).lines(1, 10).build(), OPERATOR)
            .unwrap();
        env.api.advance_receipt(&receipt.id, OPERATOR).unwrap();
        // 未确认的差异不影响取消
        env.api
            .update_line(&receipt.lines[0].id, received(1), OPERATOR)
            .unwrap();

        let cancelled = env.api.cancel_receipt(&receipt.id, OPERATOR).unwrap();
        assert_eq!(cancelled.status, ReceiptStatus::Cancelled);

        for _ in 0..2 {
            let err = env.api.advance_receipt(&receipt.id, OPERATOR).unwrap_err();
            assert!(matches!(err, ApiError::TerminalState { ref status, .. } if status == "CANCELLED"));
        }
        let err = env
            .api
            .update_line(
                &receipt.lines[0].id,
                LinePatch {
                    notes: Some("late".to_string()),
                    ..Default::default()
                },
                OPERATOR,
            )
            .unwrap_err();
        assert!(matches!(err, ApiError::TerminalState { .. }));
    }

    #[test]
    fn test_cancel_allocated_receipt_returns_bins() {
        let env = setup_inbound_env();
        env.seed_rack(WAREHOUSE, "Rack 1", 1, 3);
        let receipt = env
            .api
            .create_receipt(ReceiptBuilder::new(WAREHOUSE).lines(2, 1).build(), OPERATOR)
            .unwrap();
        drive_to_allocated(&env.api, &receipt.id, OPERATOR);
        env.api.auto_allocate(&receipt.id, OPERATOR).unwrap();
        assert_eq!(env.count_bins_with_status("reserved"), 2);

        let cancelled = env.api.cancel_receipt(&receipt.id, OPERATOR).unwrap();
        assert_eq!(cancelled.status, ReceiptStatus::Cancelled);
        assert_eq!(env.count_bins_with_status("reserved"), 0);
        assert_eq!(env.count_bins_with_status("empty"), 3);
    }

    // ==========================================
    // 超收策略
    // ==========================================

    #[test]
    fn test_overs_hold_until_uses_actual_arrival() {
        let env = setup_inbound_env();
        let receipt = env
            .api
            .create_receipt(
                ReceiptBuilder::new(WAREHOUSE)
                    .planned_arrival(Utc::now() - Duration::days(1))
                    .lines(1, 1)
                    .build(),
                OPERATOR,
            )
            .unwrap();
        assert_eq!(receipt.overs_policy.hold_days, 3);

        let unloading = env.api.advance_receipt(&receipt.id, OPERATOR).unwrap();
        let arrival = unloading.actual_arrival.unwrap();
        assert_eq!(unloading.overs_hold_until(), arrival + Duration::days(3));
    }
}
