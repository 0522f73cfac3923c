// ==========================================
// 操作日志集成测试
// ==========================================
// 职责: 每个已提交命令留痕，无变化的命令不留痕
// ==========================================


#[path = "helpers/receipt_builder.rs"]
mod receipt_builder;

#[cfg(test)]
mod action_log_test {
    use wms_goods_in::domain::types::ReceiptStatus;
    use wms_goods_in::domain::{ActionType, LinePatch};

    use crate::receipt_builder::{received, ReceiptBuilder};
    use crate::test_helpers::{setup_inbound_env, OPERATOR, WAREHOUSE};

    #[test]
    fn test_committed_commands_are_logged_in_order() {
        let env = setup_inbound_env();
        env.seed_rack(WAREHOUSE, "Rack 1", 1, 2);
        let receipt = env
            .api
            .create_receipt(ReceiptBuilder::new(WAREHOUSE).lines(1, 5).build(), OPERATOR)
            .unwrap();
        let line_id = receipt.lines[0].id.clone();

        env.api.advance_receipt(&receipt.id, OPERATOR).unwrap();
        env.api.advance_receipt(&receipt.id, OPERATOR).unwrap();
        env.api.update_line(&line_id, received(5), "qc-user").unwrap();
        env.api.advance_receipt(&receipt.id, OPERATOR).unwrap();
        env.api.auto_allocate(&receipt.id, OPERATOR).unwrap();
        env.api.reassign_line_bin(&line_id, OPERATOR).unwrap();
        env.api.clear_line_bin(&line_id, OPERATOR).unwrap();
        env.api.cancel_receipt(&receipt.id, OPERATOR).unwrap();

        let logs = env.api.list_receipt_actions(&receipt.id).unwrap();
        let types: Vec<ActionType> = logs.iter().map(|l| l.action_type).collect();
        assert_eq!(
            types,
            vec![
                ActionType::CreateReceipt,
                ActionType::Advance,
                ActionType::Advance,
                ActionType::UpdateLine,
                ActionType::Advance,
                ActionType::AutoAllocate,
                ActionType::ReassignBin,
                ActionType::ClearBin,
                ActionType::Cancel,
            ]
        );

        assert_eq!(logs[0].status_after.as_deref(), Some("AWAITING_UNLOADING"));
        assert_eq!(logs[0].payload_json.as_ref().unwrap()["code"], receipt.code.as_str());
        assert_eq!(logs[3].actor, "qc-user");
        assert_eq!(logs[3].line_id.as_deref(), Some(line_id.as_str()));
        assert_eq!(logs[3].status_after.as_deref(), Some("MOVED_TO_BAY"));
        assert_eq!(logs[4].detail.as_deref(), Some("MOVED_TO_BAY -> ALLOCATED"));
        assert_eq!(logs[5].detail.as_deref(), Some("assigned=1, unresolved=0"));
        assert_eq!(
            logs[8].status_after.as_deref(),
            Some(ReceiptStatus::Cancelled.as_str())
        );
        assert!(logs.iter().all(|l| l.receipt_id == receipt.id));
    }

    #[test]
    fn test_unchanged_commands_are_not_logged() {
        let env = setup_inbound_env();
        env.seed_rack(WAREHOUSE, "Rack 1", 1, 1);
        let receipt = env
            .api
            .create_receipt(ReceiptBuilder::new(WAREHOUSE).lines(1, 1).build(), OPERATOR)
            .unwrap();
        let line_id = receipt.lines[0].id.clone();
        for _ in 0..3 {
            env.api.advance_receipt(&receipt.id, OPERATOR).unwrap();
        }
        let baseline = env.api.list_receipt_actions(&receipt.id).unwrap().len();

        // 未绑定库位时清除、空补丁
        env.api.clear_line_bin(&line_id, OPERATOR).unwrap();
        env.api.update_line(&line_id, LinePatch::default(), OPERATOR).unwrap();
        assert_eq!(env.api.list_receipt_actions(&receipt.id).unwrap().len(), baseline);

        // 被拒绝的命令同样不留痕
        env.api.cancel_receipt(&receipt.id, OPERATOR).unwrap();
        assert!(env.api.advance_receipt(&receipt.id, OPERATOR).is_err());
        assert_eq!(env.api.list_receipt_actions(&receipt.id).unwrap().len(), baseline + 1);
    }
}
