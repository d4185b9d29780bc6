use chrono::NaiveDateTime;

use crate::models::{AnalysisOutcome, AnalysisResult, ReceiptSummary};
use crate::report::layout::{
    palette, Align, Document, DocumentBuilder, Paint, Shape, TextStyle, CONTENT_WIDTH, CONTENT_X,
    PAGE_HEIGHT, PAGE_WIDTH,
};
use crate::report::primitives::{centered, Bar, BreakdownRow, StatCard};
use crate::report::stats::{format_currency, format_scalar, DashboardStats, UNKNOWN_MERCHANT};

const UNKNOWN_DATE: &str = "Unknown Date";
const CHART_HEIGHT: f32 = 120.0;

/// 报表请求: 单张小票或按上传顺序排列的多张结果
#[derive(Debug, Clone, Copy)]
pub enum ReportRequest<'a> {
    Single(&'a ReceiptSummary),
    Combined(&'a [AnalysisResult]),
}

/// 排版入口, 生成时间由调用方传入以保证输出确定
pub fn compose(request: ReportRequest<'_>, generated_at: NaiveDateTime) -> Document {
    match request {
        ReportRequest::Single(summary) => compose_single(summary, generated_at),
        ReportRequest::Combined(results) => compose_combined(results, generated_at),
    }
}

pub fn compose_single(summary: &ReceiptSummary, generated_at: NaiveDateTime) -> Document {
    let mut builder = DocumentBuilder::new("Receipt Summary");
    let y = builder.add_header(CONTENT_X, CONTENT_WIDTH, "RECEIPT SUMMARY") + 30.0;
    receipt_body(&mut builder, Some(summary), y, 80.0);
    builder.add_footer(
        CONTENT_X,
        CONTENT_WIDTH,
        &generated_at.format("%Y-%m-%d %H:%M:%S").to_string(),
    );
    builder.finish()
}

/// 封面 + 概览 + 每张小票一页
pub fn compose_combined(results: &[AnalysisResult], generated_at: NaiveDateTime) -> Document {
    let stats = DashboardStats::compute(results);
    let mut builder = DocumentBuilder::new("Receipt Portfolio");

    add_cover(&mut builder, results.len(), generated_at);

    builder.new_page();
    add_dashboard(&mut builder, results, &stats);

    for (index, result) in results.iter().enumerate() {
        builder.new_page();
        add_detail_page(&mut builder, result, index + 1);
    }

    builder.finish()
}

/// 摘要卡片 + 明细表, 返回下一个 y
fn receipt_body(
    builder: &mut DocumentBuilder,
    summary: Option<&ReceiptSummary>,
    y: f32,
    card_height: f32,
) -> f32 {
    let merchant = summary
        .and_then(ReceiptSummary::merchant_name)
        .unwrap_or_else(|| UNKNOWN_MERCHANT.to_string());
    let date = summary
        .and_then(ReceiptSummary::date)
        .unwrap_or_else(|| UNKNOWN_DATE.to_string());
    let total = format_scalar(summary.and_then(ReceiptSummary::total).as_ref());

    let mut y = builder.add_summary_card(
        CONTENT_X,
        y,
        CONTENT_WIDTH,
        card_height,
        &merchant,
        &date,
        &total,
    );

    let items = summary.map(ReceiptSummary::items).unwrap_or_default();
    if !items.is_empty() {
        y = builder.add_section_header(CONTENT_X, y, "PURCHASED ITEMS");
        y = builder.add_items_table(CONTENT_X, y, CONTENT_WIDTH, &items);
    }
    y
}

fn add_cover(builder: &mut DocumentBuilder, receipt_count: usize, generated_at: NaiveDateTime) {
    centered(builder, CONTENT_X, 150.0, "RECEIPT", TextStyle::bold(42.0, palette::PRIMARY));
    centered(builder, CONTENT_X, 200.0, "PORTFOLIO", TextStyle::bold(36.0, palette::ACCENT));

    let cx = PAGE_WIDTH / 2.0;
    let cy = 400.0;
    let page = builder.page();
    page.shape(
        Shape::Circle { cx, cy, radius: 80.0 },
        Paint::FillStroke { fill: palette::WHITE, stroke: palette::ACCENT, width: 3.0 },
    );
    page.shape(Shape::Circle { cx, cy, radius: 60.0 }, Paint::Fill(palette::ACCENT));
    page.text_in_box(
        &receipt_count.to_string(),
        cx - 60.0,
        cy - 20.0,
        120.0,
        Align::Center,
        TextStyle::bold(32.0, palette::WHITE),
    );
    page.text_in_box(
        "Receipts",
        cx - 60.0,
        cy + 20.0,
        120.0,
        Align::Center,
        TextStyle::regular(12.0, palette::WHITE),
    );

    // 装饰图标位
    let icons = [
        (100.0, 300.0),
        (PAGE_WIDTH - 150.0, 200.0),
        (150.0, PAGE_HEIGHT - 200.0),
        (PAGE_WIDTH - 100.0, PAGE_HEIGHT - 150.0),
        (PAGE_WIDTH / 2.0, 500.0),
    ];
    for (x, y) in icons {
        page.shape(Shape::rounded(x, y, 24.0, 24.0, 6.0), Paint::Fill(palette::DECOR_BLUE));
    }

    centered(
        builder,
        CONTENT_X,
        PAGE_HEIGHT - 100.0,
        "AI-Powered Receipt Analysis",
        TextStyle::regular(14.0, palette::MUTED),
    );
    centered(
        builder,
        CONTENT_X,
        PAGE_HEIGHT - 70.0,
        &format!("Generated on {}", generated_at.format("%Y-%m-%d")),
        TextStyle::regular(12.0, palette::FAINT),
    );
}

fn add_dashboard(builder: &mut DocumentBuilder, results: &[AnalysisResult], stats: &DashboardStats) {
    let x = CONTENT_X;
    let width = CONTENT_WIDTH;
    let y = builder.add_header(x, width, "DASHBOARD OVERVIEW");

    let cards = [
        StatCard {
            title: "Total Receipts".into(),
            value: stats.receipt_count.to_string(),
            subtitle: "Processed".into(),
            accent: palette::ACCENT,
        },
        StatCard {
            title: "Grand Total".into(),
            value: format_currency(Some(stats.grand_total)),
            subtitle: "Total Spent".into(),
            accent: palette::SUCCESS,
        },
        StatCard {
            title: "Total Items".into(),
            value: stats.total_items.to_string(),
            subtitle: "Purchased".into(),
            accent: palette::WARNING,
        },
    ];
    let card_width = (width - 40.0) / 3.0;
    let card_y = y + 20.0;
    for (index, card) in cards.iter().enumerate() {
        let card_x = x + index as f32 * (card_width + 20.0);
        builder.add_stat_card(card_x, card_y, card_width, 120.0, card);
    }

    let y = builder.add_section_header(x, card_y + 150.0, "RECEIPT BREAKDOWN");
    let rows: Vec<BreakdownRow> = results
        .iter()
        .map(|result| {
            let summary = result.summary();
            BreakdownRow {
                merchant: summary
                    .and_then(ReceiptSummary::merchant_name)
                    .unwrap_or_else(|| UNKNOWN_MERCHANT.to_string()),
                date: summary
                    .and_then(ReceiptSummary::date)
                    .unwrap_or_else(|| "N/A".to_string()),
                total: format_scalar(summary.and_then(ReceiptSummary::total).as_ref()),
                items: summary.map(ReceiptSummary::item_count).unwrap_or(0),
            }
        })
        .collect();
    let y = builder.add_breakdown_table(x, y, width, &rows) + 20.0;

    let bars: Vec<Bar> = results
        .iter()
        .zip(stats.bar_heights(CHART_HEIGHT - 60.0))
        .zip(&stats.totals)
        .map(|((result, height), &amount)| Bar {
            height,
            amount,
            initial: merchant_initial(result),
        })
        .collect();
    let y = builder.ensure_space(y, CHART_HEIGHT + 50.0);
    let y = builder.add_section_header(x, y, "SPENDING DISTRIBUTION");
    builder.add_bar_chart(x, y + 10.0, width, CHART_HEIGHT, &bars);
}

fn merchant_initial(result: &AnalysisResult) -> char {
    result
        .summary()
        .and_then(ReceiptSummary::merchant_name)
        .and_then(|name| name.chars().next())
        .and_then(|c| c.to_uppercase().next())
        .unwrap_or('U')
}

fn add_detail_page(builder: &mut DocumentBuilder, result: &AnalysisResult, number: usize) {
    let y = builder.add_header(CONTENT_X, CONTENT_WIDTH, &format!("RECEIPT #{number}"));
    let summary = result.summary();
    let mut y = receipt_body(builder, summary, y, 100.0);

    if let AnalysisOutcome::Error(message) = &result.outcome {
        builder.page().text_in_box(
            &format!("Extraction failed: {message}"),
            CONTENT_X,
            y,
            CONTENT_WIDTH,
            Align::Left,
            TextStyle::regular(10.0, palette::MUTED),
        );
        return;
    }

    if let Some(totals) = summary.and_then(ReceiptSummary::totals) {
        y = builder.add_section_header(CONTENT_X, y, "TRANSACTION TOTALS");
        builder.add_totals_block(CONTENT_X, y, CONTENT_WIDTH, &totals);
    }
}
