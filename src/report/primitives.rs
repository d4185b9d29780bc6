//! 可复用的绘制单元: 页眉、区块标题、卡片、表格、柱状图、页脚.
//! 每个方法接收起始 y 并返回绘制后的下一个 y.

use crate::models::{LineItem, Totals};
use crate::report::layout::{
    palette, Align, Color, DocumentBuilder, Paint, Shape, TextStyle, CONTENT_WIDTH, PAGE_HEIGHT,
    PAGE_WIDTH,
};
use crate::report::stats::{format_rounded, format_scalar};

pub const HEADER_BOTTOM: f32 = 130.0;
const ITEM_ROW_HEIGHT: f32 = 18.0;
const BREAKDOWN_ROW_HEIGHT: f32 = 20.0;

/// 统计卡片内容
#[derive(Debug, Clone)]
pub struct StatCard {
    pub title: String,
    pub value: String,
    pub subtitle: String,
    pub accent: Color,
}

/// 概览表的一行
#[derive(Debug, Clone)]
pub struct BreakdownRow {
    pub merchant: String,
    pub date: String,
    pub total: String,
    pub items: usize,
}

/// 柱状图的一根柱子
#[derive(Debug, Clone)]
pub struct Bar {
    pub height: f32,
    pub amount: f64,
    pub initial: char,
}

impl DocumentBuilder {
    /// 背景色 + 三个装饰圆, 位置随页面尺寸
    pub fn add_background(&mut self) {
        let page = self.page();
        page.shape(
            Shape::rect(0.0, 0.0, PAGE_WIDTH, PAGE_HEIGHT),
            Paint::Fill(palette::PAGE_BG),
        );
        page.shape(
            Shape::Circle { cx: PAGE_WIDTH - 100.0, cy: 100.0, radius: 80.0 },
            Paint::Fill(palette::DECOR_BLUE),
        );
        page.shape(
            Shape::Circle { cx: 50.0, cy: PAGE_HEIGHT - 100.0, radius: 60.0 },
            Paint::Fill(palette::DECOR_BLUE),
        );
        page.shape(
            Shape::Circle { cx: 200.0, cy: PAGE_HEIGHT - 150.0, radius: 40.0 },
            Paint::Fill(palette::DECOR_GREEN),
        );
    }

    /// 页眉: 圆角白底 + 居中粗体标题 + 强调条
    pub fn add_header(&mut self, x: f32, width: f32, title: &str) -> f32 {
        let page = self.page();
        page.shape(
            Shape::rounded(x, 40.0, width, 80.0, 12.0),
            Paint::FillStroke { fill: palette::WHITE, stroke: palette::BORDER, width: 1.0 },
        );
        page.text_in_box(
            title,
            x + 30.0,
            65.0,
            width - 60.0,
            Align::Center,
            TextStyle::bold(28.0, palette::PRIMARY),
        );
        page.shape(
            Shape::rect(x + width / 2.0 - 40.0, 110.0, 80.0, 3.0),
            Paint::Fill(palette::ACCENT),
        );
        HEADER_BOTTOM
    }

    pub fn add_section_header(&mut self, x: f32, y: f32, text: &str) -> f32 {
        let y = self.ensure_space(y, 40.0);
        self.page().text(text, x, y, TextStyle::bold(12.0, palette::SECTION));
        y + 20.0
    }

    /// 商户 / 日期 / 总额卡片
    pub fn add_summary_card(
        &mut self,
        x: f32,
        y: f32,
        width: f32,
        height: f32,
        merchant: &str,
        date: &str,
        total: &str,
    ) -> f32 {
        let page = self.page();
        page.shape(
            Shape::rounded(x, y, width, height, 16.0),
            Paint::FillStroke { fill: palette::WHITE, stroke: palette::BORDER, width: 1.0 },
        );
        page.text_in_box(
            merchant,
            x + 30.0,
            y + 25.0,
            width - 160.0,
            Align::Left,
            TextStyle::bold(18.0, palette::PRIMARY),
        );
        page.text(date, x + 30.0, y + 50.0, TextStyle::regular(12.0, palette::MUTED));
        page.text_in_box(
            total,
            x + width - 130.0,
            y + 30.0,
            110.0,
            Align::Right,
            TextStyle::bold(24.0, palette::SUCCESS),
        );
        y + height + 20.0
    }

    pub fn add_stat_card(&mut self, x: f32, y: f32, width: f32, height: f32, card: &StatCard) {
        let page = self.page();
        page.shape(
            Shape::rounded(x, y, width, height, 16.0),
            Paint::FillStroke { fill: palette::WHITE, stroke: palette::BORDER, width: 1.0 },
        );
        page.shape(
            Shape::Circle { cx: x + 32.0, cy: y + 32.0, radius: 12.0 },
            Paint::Fill(card.accent),
        );
        page.text_in_box(
            &card.value,
            x + 60.0,
            y + 20.0,
            width - 70.0,
            Align::Left,
            TextStyle::bold(20.0, palette::TEXT),
        );
        page.text(&card.title, x + 60.0, y + 45.0, TextStyle::regular(12.0, palette::MUTED));
        page.text(
            &card.subtitle,
            x + 20.0,
            y + height - 25.0,
            TextStyle::regular(10.0, palette::FAINT),
        );
    }

    /// 明细表: 表头 + 隔行底色; 跨页时续表并重复表头
    pub fn add_items_table(&mut self, x: f32, y: f32, width: f32, items: &[LineItem]) -> f32 {
        let cols = [width * 0.6, width * 0.1, width * 0.15, width * 0.15];
        let mut y = self.ensure_space(y, ITEM_ROW_HEIGHT * 2.0);
        self.items_table_head(x, y, &cols);
        y += 20.0;

        for (index, item) in items.iter().enumerate() {
            let next = self.ensure_space(y, ITEM_ROW_HEIGHT);
            if next != y {
                self.items_table_head(x, next, &cols);
                y = next + 20.0;
            }

            let page = self.page();
            if index % 2 == 0 {
                page.shape(
                    Shape::rect(x, y - 4.0, width, ITEM_ROW_HEIGHT),
                    Paint::Fill(palette::PAGE_BG),
                );
            }

            let style = TextStyle::regular(9.0, palette::TEXT);
            let name = item
                .name
                .as_ref()
                .and_then(|n| n.as_text())
                .unwrap_or_else(|| "Unknown Item".to_string());
            let quantity = item
                .quantity
                .as_ref()
                .filter(|q| q.is_truthy())
                .and_then(|q| q.as_text())
                .unwrap_or_else(|| "1".to_string());

            page.text_in_box(&name, x + 10.0, y, cols[0] - 20.0, Align::Left, style);
            page.text_in_box(&quantity, x + cols[0], y, cols[1], Align::Center, style);
            page.text_in_box(
                &format_scalar(item.price.as_ref()),
                x + cols[0] + cols[1],
                y,
                cols[2],
                Align::Right,
                style,
            );
            page.text_in_box(
                &format_scalar(item.total.as_ref()),
                x + cols[0] + cols[1] + cols[2],
                y,
                cols[3] - 10.0,
                Align::Right,
                style,
            );
            y += ITEM_ROW_HEIGHT;
        }

        y + 10.0
    }

    fn items_table_head(&mut self, x: f32, y: f32, cols: &[f32; 4]) {
        let page = self.page();
        let style = TextStyle::bold(10.0, palette::TABLE_HEAD);
        page.text("ITEM NAME", x, y, style);
        page.text("QTY", x + cols[0], y, style);
        page.text("PRICE", x + cols[0] + cols[1], y, style);
        page.text("TOTAL", x + cols[0] + cols[1] + cols[2], y, style);
    }

    /// 右对齐的合计区: 小计 / 税 / 折扣 / 分隔线 / 总计
    pub fn add_totals_block(&mut self, x: f32, y: f32, width: f32, totals: &Totals) -> f32 {
        const BLOCK_WIDTH: f32 = 200.0;
        let mut y = self.ensure_space(y, 80.0);
        let start_x = x + width - BLOCK_WIDTH;
        let page = self.page();
        let style = TextStyle::regular(10.0, palette::TEXT);

        let mut line = |label: &str, value: String, y: &mut f32| {
            page.text(label, start_x, *y, style);
            page.text_in_box(&value, start_x, *y, BLOCK_WIDTH, Align::Right, style);
            *y += 15.0;
        };

        if let Some(subtotal) = totals.subtotal.as_ref().filter(|v| v.is_truthy()) {
            line("Subtotal:", format_scalar(Some(subtotal)), &mut y);
        }
        if let Some(tax) = totals.tax_amount.as_ref().filter(|v| v.is_truthy()) {
            line("Tax:", format_scalar(Some(tax)), &mut y);
        }
        if let Some(discount) = totals.discount.as_ref().filter(|v| v.is_truthy()) {
            line("Discount:", format!("-{}", format_scalar(Some(discount))), &mut y);
        }

        page.shape(
            Shape::Line { x1: start_x, y1: y + 5.0, x2: start_x + BLOCK_WIDTH, y2: y + 5.0 },
            Paint::Stroke { color: palette::BORDER, width: 1.0 },
        );
        y += 10.0;

        if let Some(total) = totals.total.as_ref().filter(|v| v.is_truthy()) {
            let emphasis = TextStyle::bold(14.0, palette::SUCCESS);
            page.text("TOTAL:", start_x, y, emphasis);
            page.text_in_box(
                &format_scalar(Some(total)),
                start_x,
                y,
                BLOCK_WIDTH,
                Align::Right,
                emphasis,
            );
        }

        y + 30.0
    }

    /// 概览表: 商户 / 日期 / 总额 / 件数; 跨页时续表并重复表头
    pub fn add_breakdown_table(&mut self, x: f32, y: f32, width: f32, rows: &[BreakdownRow]) -> f32 {
        let cols = [width * 0.4, width * 0.25, width * 0.2, width * 0.15];
        let y = self.ensure_space(y, 25.0 + BREAKDOWN_ROW_HEIGHT);
        self.breakdown_table_head(x, y, width, &cols);

        let mut row_y = y + 25.0;
        for (index, row) in rows.iter().enumerate() {
            let next = self.ensure_space(row_y, BREAKDOWN_ROW_HEIGHT);
            if next != row_y {
                self.breakdown_table_head(x, next, width, &cols);
                row_y = next + 25.0;
            }
            let page = self.page();
            if index % 2 == 0 {
                page.shape(
                    Shape::rect(x, row_y - 5.0, width, BREAKDOWN_ROW_HEIGHT),
                    Paint::Fill(palette::PAGE_BG),
                );
            }
            let style = TextStyle::regular(9.0, palette::TEXT);
            page.text_in_box(&row.merchant, x, row_y, cols[0] - 10.0, Align::Left, style);
            page.text_in_box(&row.date, x + cols[0], row_y, cols[1], Align::Left, style);
            page.text_in_box(&row.total, x + cols[0] + cols[1], row_y, cols[2], Align::Right, style);
            page.text_in_box(
                &row.items.to_string(),
                x + cols[0] + cols[1] + cols[2],
                row_y,
                cols[3],
                Align::Center,
                style,
            );
            row_y += BREAKDOWN_ROW_HEIGHT;
        }
        row_y
    }

    fn breakdown_table_head(&mut self, x: f32, y: f32, width: f32, cols: &[f32; 4]) {
        let page = self.page();
        let head = TextStyle::bold(10.0, palette::TABLE_HEAD);
        page.text("MERCHANT", x, y, head);
        page.text("DATE", x + cols[0], y, head);
        page.text("TOTAL", x + cols[0] + cols[1], y, head);
        page.text("ITEMS", x + cols[0] + cols[1] + cols[2], y, head);
        page.shape(
            Shape::Line { x1: x, y1: y + 15.0, x2: x + width, y2: y + 15.0 },
            Paint::Stroke { color: palette::BORDER, width: 1.0 },
        );
    }

    /// 柱状图: 面板 + 等宽柱, 柱高足够时标金额, 下方标商户首字母
    pub fn add_bar_chart(&mut self, x: f32, y: f32, width: f32, height: f32, bars: &[Bar]) -> f32 {
        let chart_height = height - 60.0;
        let page = self.page();
        page.shape(
            Shape::rounded(x, y, width, height, 12.0),
            Paint::FillStroke { fill: palette::WHITE, stroke: palette::BORDER, width: 1.0 },
        );
        if bars.is_empty() {
            return y + height + 20.0;
        }

        let slot = (width - 40.0) / bars.len() as f32;
        let bar_width = (slot - 10.0).max(1.0);
        for (index, bar) in bars.iter().enumerate() {
            let bar_x = x + 20.0 + index as f32 * slot;
            let bar_y = y + chart_height - bar.height + 20.0;
            if bar.height > 0.0 {
                page.shape(
                    Shape::rounded(bar_x, bar_y, bar_width, bar.height, 4.0_f32.min(bar.height / 2.0)),
                    Paint::Fill(palette::ACCENT),
                );
            }
            if bar.height > 20.0 {
                page.text_in_box(
                    &format_rounded(bar.amount),
                    bar_x,
                    bar_y + bar.height / 2.0 - 5.0,
                    bar_width,
                    Align::Center,
                    TextStyle::bold(8.0, palette::WHITE),
                );
            }
            page.text_in_box(
                &bar.initial.to_string(),
                bar_x,
                y + chart_height + 25.0,
                bar_width,
                Align::Center,
                TextStyle::bold(7.0, palette::MUTED),
            );
        }
        y + height + 20.0
    }

    /// 页脚: 品牌说明 + 生成时间
    pub fn add_footer(&mut self, x: f32, width: f32, generated_at: &str) {
        let footer_y = PAGE_HEIGHT - 60.0;
        let page = self.page();
        page.text_in_box(
            "Generated by ReceiptAI - Intelligent Document Processing",
            x,
            footer_y,
            width,
            Align::Center,
            TextStyle::regular(10.0, palette::MUTED),
        );
        page.text_in_box(
            generated_at,
            x,
            footer_y + 15.0,
            width,
            Align::Center,
            TextStyle::regular(9.0, palette::FAINT),
        );
    }
}

/// 默认内容宽度下的单列居中文字, 封面使用
pub fn centered(builder: &mut DocumentBuilder, x: f32, y: f32, text: &str, style: TextStyle) {
    builder
        .page()
        .text_in_box(text, x, y, CONTENT_WIDTH, Align::Center, style);
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::report::layout::{DrawOp, CONTENT_X, FOOTER_TOP};
    use serde_json::json;

    fn items(n: usize) -> Vec<LineItem> {
        (0..n)
            .map(|i| {
                serde_json::from_value(json!({"name": format!("Item {i}"), "price": "1.5"}))
                    .unwrap()
            })
            .collect()
    }

    fn shaded_rows(builder: &mut DocumentBuilder) -> usize {
        builder
            .page()
            .ops
            .iter()
            .filter(|op| {
                matches!(op, DrawOp::Shape { shape: Shape::Rect { height, .. }, paint: Paint::Fill(c) }
                    if *height == ITEM_ROW_HEIGHT && *c == palette::PAGE_BG)
            })
            .count()
    }

    #[test]
    fn items_table_shades_even_rows_and_applies_fallbacks() {
        let mut builder = DocumentBuilder::new("t");
        let rows = vec![LineItem::default(), LineItem::default(), LineItem::default()];
        let end = builder.add_items_table(CONTENT_X, 200.0, CONTENT_WIDTH, &rows);

        assert_eq!(end, 200.0 + 20.0 + 3.0 * ITEM_ROW_HEIGHT + 10.0);
        assert_eq!(shaded_rows(&mut builder), 2);
        let page = builder.page();
        assert!(page.contains_text("ITEM NAME"));
        assert_eq!(page.texts().filter(|t| *t == "Unknown Item").count(), 3);
        assert_eq!(page.texts().filter(|t| *t == "1").count(), 3);
        assert_eq!(page.texts().filter(|t| *t == "$0.00").count(), 6);
    }

    #[test]
    fn items_table_continues_on_new_page() {
        let mut builder = DocumentBuilder::new("t");
        let end = builder.add_items_table(CONTENT_X, 200.0, CONTENT_WIDTH, &items(40));

        assert_eq!(builder.page_count(), 2);
        assert!(end < FOOTER_TOP);
        let doc = builder.finish();
        for page in &doc.pages {
            assert!(page.contains_text("ITEM NAME"));
        }
        assert!(doc.pages[1].contains_text("Item 39"));
    }

    #[test]
    fn breakdown_table_repeats_header_on_new_page() {
        let mut builder = DocumentBuilder::new("t");
        let rows: Vec<BreakdownRow> = (0..40)
            .map(|i| BreakdownRow {
                merchant: format!("Shop {i}"),
                date: "N/A".into(),
                total: "$1.00".into(),
                items: 1,
            })
            .collect();
        let end = builder.add_breakdown_table(CONTENT_X, 300.0, CONTENT_WIDTH, &rows);

        assert_eq!(builder.page_count(), 2);
        assert!(end < FOOTER_TOP);
        let doc = builder.finish();
        for page in &doc.pages {
            assert_eq!(page.texts().filter(|t| *t == "MERCHANT").count(), 1);
        }
        assert!(doc.pages[1].contains_text("Shop 39"));
        assert!(!doc.pages[0].contains_text("Shop 39"));
    }

    #[test]
    fn totals_block_lists_present_values_only() {
        let mut builder = DocumentBuilder::new("t");
        let totals: Totals = serde_json::from_value(json!({
            "subtotal": "9.00",
            "tax_amount": 0,
            "discount": "1",
            "total": "8.50"
        }))
        .unwrap();
        builder.add_totals_block(CONTENT_X, 400.0, CONTENT_WIDTH, &totals);

        let page = builder.page();
        assert!(page.contains_text("Subtotal:"));
        assert!(!page.contains_text("Tax:"));
        assert!(page.contains_text("-$1.00"));
        assert!(page.contains_text("TOTAL:"));
        assert!(page.contains_text("$8.50"));
    }

    #[test]
    fn short_bars_have_no_amount_label() {
        let mut builder = DocumentBuilder::new("t");
        let bars = vec![
            Bar { height: 60.0, amount: 42.4, initial: 'A' },
            Bar { height: 10.0, amount: 7.0, initial: 'B' },
            Bar { height: 0.0, amount: 0.0, initial: 'U' },
        ];
        builder.add_bar_chart(CONTENT_X, 500.0, CONTENT_WIDTH, 120.0, &bars);

        let page = builder.page();
        assert!(page.contains_text("$42"));
        assert!(!page.contains_text("$7"));
        assert!(page.contains_text("A"));
        assert!(page.contains_text("B"));
        assert!(page.contains_text("U"));
    }
}
