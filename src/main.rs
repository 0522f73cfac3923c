// ==========================================
// 仓储入库收货核心 - 命令行入口
// ==========================================
// 职责: 初始化日志 → 打开数据库 → 确保表结构 → 输出收货看板
// 用法: wms-goods-in [数据库路径] [仓库ID]
// 语言: WMS_GOODS_IN_LOCALE=zh-CN|en
// ==========================================

use anyhow::Context;
use wms_goods_in::{db, i18n, logging, InboundApi};

fn main() -> anyhow::Result<()> {
    logging::init();
    i18n::init_from_env();

    let mut args = std::env::args().skip(1);
    let db_path = args.next().unwrap_or_else(db::default_db_path);
    let warehouse_id = args.next();

    tracing::info!("==================================================");
    tracing::info!("{} v{}", wms_goods_in::APP_NAME, wms_goods_in::VERSION);
    tracing::info!("使用数据库: {}", db_path);
    tracing::info!("语言: {}", i18n::current_locale());
    tracing::info!("==================================================");

    let api = InboundApi::open(&db_path)
        .map_err(|e| anyhow::anyhow!(e.localized_message()))
        .with_context(|| format!("无法打开数据库: {}", db_path))?;
    let kpis = api
        .compute_kpis(warehouse_id.as_deref())
        .context("计算收货看板失败")?;

    println!(
        "{}",
        serde_json::to_string_pretty(&kpis).context("序列化看板指标失败")?
    );
    Ok(())
}
