// ==========================================
// 仓储入库收货核心 - 国际化 (i18n)
// ==========================================
// 职责: 面向操作员的消息（错误、导入摘要）按语言渲染
// 语言包: locales/zh-CN.yml（默认）、locales/en.yml
// 注意: rust_i18n::i18n! 宏已在 lib.rs 中初始化
// ==========================================

/// 支持的语言
pub const SUPPORTED_LOCALES: [&str; 2] = ["zh-CN", "en"];

/// 选择语言的环境变量
pub const LOCALE_ENV: &str = "WMS_GOODS_IN_LOCALE";

/// 获取当前语言
pub fn current_locale() -> String {
    rust_i18n::locale().to_string()
}

/// 设置语言；不支持的语言代码保持当前语言不变
///
/// # 返回
/// - true: 已切换
/// - false: 语言不支持
pub fn set_locale(locale: &str) -> bool {
    match SUPPORTED_LOCALES.iter().find(|l| l.eq_ignore_ascii_case(locale.trim())) {
        Some(supported) => {
            rust_i18n::set_locale(supported);
            true
        }
        None => false,
    }
}

/// 按 WMS_GOODS_IN_LOCALE 设置语言（未设置时保持默认）
pub fn init_from_env() {
    if let Ok(locale) = std::env::var(LOCALE_ENV) {
        if !set_locale(&locale) {
            tracing::warn!(locale = %locale, "不支持的语言，使用默认语言");
        }
    }
}

/// 翻译消息并替换 %{name} 占位符
///
/// # 示例
/// ```no_run
/// use wms_goods_in::i18n::t_with_args;
/// let msg = t_with_args("import.file_not_found", &[("path", "/tmp/receipts.csv")]);
/// ```
pub fn t_with_args(key: &str, args: &[(&str, &str)]) -> String {
    let mut result = rust_i18n::t!(key).to_string();
    for (k, v) in args {
        let placeholder = format!("%{{{}}}", k);
        result = result.replace(&placeholder, v);
    }
    result
}
