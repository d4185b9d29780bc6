use indexmap::IndexMap;

use crate::models::{AnalysisResult, Scalar};

pub const UNKNOWN_MERCHANT: &str = "Unknown Merchant";

/// 金额格式: 两位小数 (逢半远离零进位), `$` 前缀; 缺失为 `$0.00`
pub fn format_currency(value: Option<f64>) -> String {
    let v = value.filter(|v| v.is_finite()).unwrap_or(0.0);
    let v = (v * 100.0).round() / 100.0;
    // 避免出现 "$-0.00"
    let v = if v == 0.0 { 0.0 } else { v };
    format!("${:.2}", v)
}

/// 展示字段格式化, 非数字同样显示 `$0.00`
pub fn format_scalar(value: Option<&Scalar>) -> String {
    format_currency(value.and_then(Scalar::parse))
}

/// 柱状图标签: 四舍五入到整数
pub fn format_rounded(value: f64) -> String {
    format!("${:.0}", value.round())
}

/// 多张小票的汇总
#[derive(Debug, Clone, PartialEq)]
pub struct DashboardStats {
    pub receipt_count: usize,
    /// 仅统计成功项
    pub grand_total: f64,
    /// 仅统计成功项
    pub total_items: usize,
    /// 商户 -> 消费额, 按首次出现顺序
    pub merchant_spend: IndexMap<String, f64>,
    /// 每条结果的总额 (失败项为 0), 与上传顺序一致
    pub totals: Vec<f64>,
}

impl DashboardStats {
    pub fn compute(results: &[AnalysisResult]) -> Self {
        let mut grand_total = 0.0;
        let mut total_items = 0;
        let mut merchant_spend: IndexMap<String, f64> = IndexMap::new();
        let mut totals = Vec::with_capacity(results.len());

        for result in results {
            let Some(summary) = result.summary() else {
                totals.push(0.0);
                continue;
            };

            let amount = summary.total_amount();
            grand_total += amount;
            total_items += summary.item_count();
            totals.push(amount);

            let merchant = summary
                .merchant_name()
                .unwrap_or_else(|| UNKNOWN_MERCHANT.to_string());
            *merchant_spend.entry(merchant).or_insert(0.0) += amount;
        }

        Self {
            receipt_count: results.len(),
            grand_total,
            total_items,
            merchant_spend,
            totals,
        }
    }

    pub fn bar_heights(&self, chart_height: f32) -> Vec<f32> {
        bar_heights(&self.totals, chart_height)
    }
}

/// 柱高 = 金额 / 最大金额 * 图高; 最大值非正时全部为 0
pub fn bar_heights(totals: &[f64], chart_height: f32) -> Vec<f32> {
    let max = totals.iter().copied().fold(0.0_f64, f64::max);
    totals
        .iter()
        .map(|&amount| {
            if max <= 0.0 || amount <= 0.0 {
                0.0
            } else {
                ((amount / max) as f32) * chart_height
            }
        })
        .collect()
}
