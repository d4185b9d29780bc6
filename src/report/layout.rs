//! 报表的绘制指令模型.
//!
//! 排版阶段只产出坐标确定的绘制指令 (左上角为原点, 单位 pt),
//! 由 [`crate::report::render`] 统一转换为 PDF.

/// US Letter
pub const PAGE_WIDTH: f32 = 612.0;
pub const PAGE_HEIGHT: f32 = 792.0;
pub const CONTENT_X: f32 = 40.0;
pub const CONTENT_WIDTH: f32 = PAGE_WIDTH - 80.0;
/// 页脚区域上沿, 正文不得越过
pub const FOOTER_TOP: f32 = PAGE_HEIGHT - 80.0;
/// 续页正文起始位置
pub const CONTINUATION_TOP: f32 = 60.0;

/// Helvetica 平均字宽 / 字号
const AVG_CHAR_WIDTH: f32 = 0.5;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Color {
    pub r: u8,
    pub g: u8,
    pub b: u8,
}

impl Color {
    pub const fn hex(rgb: u32) -> Self {
        Self {
            r: ((rgb >> 16) & 0xff) as u8,
            g: ((rgb >> 8) & 0xff) as u8,
            b: (rgb & 0xff) as u8,
        }
    }
}

pub mod palette {
    use super::Color;

    pub const WHITE: Color = Color::hex(0xffffff);
    pub const PAGE_BG: Color = Color::hex(0xf8fafc);
    pub const BORDER: Color = Color::hex(0xe2e8f0);
    pub const DECOR_BLUE: Color = Color::hex(0xe0f2fe);
    pub const DECOR_GREEN: Color = Color::hex(0xf0fdf4);
    pub const PRIMARY: Color = Color::hex(0x1e40af);
    pub const ACCENT: Color = Color::hex(0x3b82f6);
    pub const SUCCESS: Color = Color::hex(0x10b981);
    pub const WARNING: Color = Color::hex(0xf59e0b);
    pub const TEXT: Color = Color::hex(0x1e293b);
    pub const SECTION: Color = Color::hex(0x374151);
    pub const TABLE_HEAD: Color = Color::hex(0x475569);
    pub const MUTED: Color = Color::hex(0x64748b);
    pub const FAINT: Color = Color::hex(0x94a3b8);
}

#[derive(Debug, Clone, Copy, PartialEq)]
pub enum Shape {
    Rect {
        x: f32,
        y: f32,
        width: f32,
        height: f32,
        radius: f32,
    },
    Circle {
        cx: f32,
        cy: f32,
        radius: f32,
    },
    Line {
        x1: f32,
        y1: f32,
        x2: f32,
        y2: f32,
    },
}

impl Shape {
    pub fn rect(x: f32, y: f32, width: f32, height: f32) -> Self {
        Shape::Rect { x, y, width, height, radius: 0.0 }
    }

    pub fn rounded(x: f32, y: f32, width: f32, height: f32, radius: f32) -> Self {
        Shape::Rect { x, y, width, height, radius }
    }
}

#[derive(Debug, Clone, Copy, PartialEq)]
pub enum Paint {
    Fill(Color),
    Stroke { color: Color, width: f32 },
    FillStroke { fill: Color, stroke: Color, width: f32 },
}

#[derive(Debug, Clone, Copy, PartialEq)]
pub struct TextStyle {
    pub size: f32,
    pub bold: bool,
    pub color: Color,
}

impl TextStyle {
    pub const fn regular(size: f32, color: Color) -> Self {
        Self { size, bold: false, color }
    }

    pub const fn bold(size: f32, color: Color) -> Self {
        Self { size, bold: true, color }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Align {
    Left,
    Center,
    Right,
}

#[derive(Debug, Clone, PartialEq)]
pub enum DrawOp {
    Shape { shape: Shape, paint: Paint },
    /// `y` 为文字框上沿
    Text {
        text: String,
        x: f32,
        y: f32,
        style: TextStyle,
    },
}

#[derive(Debug, Clone, Default, PartialEq)]
pub struct Page {
    pub ops: Vec<DrawOp>,
}

impl Page {
    pub fn shape(&mut self, shape: Shape, paint: Paint) {
        self.ops.push(DrawOp::Shape { shape, paint });
    }

    pub fn text(&mut self, text: impl Into<String>, x: f32, y: f32, style: TextStyle) {
        self.ops.push(DrawOp::Text {
            text: text.into(),
            x,
            y,
            style,
        });
    }

    /// 在 [x, x+width] 内按对齐方式放置单行文字, 超宽时截断
    pub fn text_in_box(
        &mut self,
        text: &str,
        x: f32,
        y: f32,
        width: f32,
        align: Align,
        style: TextStyle,
    ) {
        let fitted = fit_text(text, style.size, width);
        let tx = aligned_x(&fitted, style.size, x, width, align);
        self.text(fitted, tx, y, style);
    }

    pub fn texts(&self) -> impl Iterator<Item = &str> {
        self.ops.iter().filter_map(|op| match op {
            DrawOp::Text { text, .. } => Some(text.as_str()),
            DrawOp::Shape { .. } => None,
        })
    }

    pub fn contains_text(&self, needle: &str) -> bool {
        self.texts().any(|t| t == needle)
    }
}

/// 排版完成的文档
#[derive(Debug, Clone, PartialEq)]
pub struct Document {
    pub title: String,
    pub width: f32,
    pub height: f32,
    pub pages: Vec<Page>,
}

pub fn text_width(text: &str, size: f32) -> f32 {
    text.chars().count() as f32 * size * AVG_CHAR_WIDTH
}

/// 超出宽度时截断并补 "..."
pub fn fit_text(text: &str, size: f32, max_width: f32) -> String {
    if text_width(text, size) <= max_width {
        return text.to_string();
    }
    let per_char = size * AVG_CHAR_WIDTH;
    let budget = ((max_width / per_char).floor() as usize).saturating_sub(3);
    let mut out: String = text.chars().take(budget).collect();
    out.push_str("...");
    out
}

pub fn aligned_x(text: &str, size: f32, x: f32, width: f32, align: Align) -> f32 {
    let w = text_width(text, size);
    match align {
        Align::Left => x,
        Align::Center => x + (width - w) / 2.0,
        Align::Right => x + width - w,
    }
}

/// 文档构建器: 持有页面列表, 游标位置由调用方显式传入并返回
pub struct DocumentBuilder {
    title: String,
    pages: Vec<Page>,
}

impl DocumentBuilder {
    /// 创建文档并开启首页 (含背景装饰)
    pub fn new(title: &str) -> Self {
        let mut builder = Self {
            title: title.to_string(),
            pages: Vec::new(),
        };
        builder.new_page();
        builder
    }

    /// 新开一页并绘制背景
    pub fn new_page(&mut self) {
        self.pages.push(Page::default());
        self.add_background();
    }

    pub fn page(&mut self) -> &mut Page {
        if self.pages.is_empty() {
            self.pages.push(Page::default());
        }
        let last = self.pages.len() - 1;
        &mut self.pages[last]
    }

    pub fn page_count(&self) -> usize {
        self.pages.len()
    }

    /// 剩余空间不足 `needed` 时换页, 返回可用的 y
    pub fn ensure_space(&mut self, y: f32, needed: f32) -> f32 {
        if y + needed > FOOTER_TOP {
            self.new_page();
            CONTINUATION_TOP
        } else {
            y
        }
    }

    pub fn finish(self) -> Document {
        Document {
            title: self.title,
            width: PAGE_WIDTH,
            height: PAGE_HEIGHT,
            pages: self.pages,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn hex_colors_split_channels() {
        assert_eq!(Color::hex(0x1e40af), Color { r: 0x1e, g: 0x40, b: 0xaf });
    }

    #[test]
    fn long_text_is_truncated_with_ellipsis() {
        let fitted = fit_text("A very long merchant name indeed", 10.0, 60.0);
        assert!(fitted.ends_with("..."));
        assert!(text_width(&fitted, 10.0) <= 60.0);
        assert_eq!(fit_text("Short", 10.0, 60.0), "Short");
    }

    #[test]
    fn alignment_offsets() {
        // "ab" at size 10 -> 10pt wide
        assert_eq!(aligned_x("ab", 10.0, 100.0, 50.0, Align::Left), 100.0);
        assert_eq!(aligned_x("ab", 10.0, 100.0, 50.0, Align::Center), 120.0);
        assert_eq!(aligned_x("ab", 10.0, 100.0, 50.0, Align::Right), 140.0);
    }

    #[test]
    fn ensure_space_breaks_page_near_footer() {
        let mut builder = DocumentBuilder::new("t");
        assert_eq!(builder.ensure_space(100.0, 18.0), 100.0);
        assert_eq!(builder.page_count(), 1);

        assert_eq!(builder.ensure_space(FOOTER_TOP - 5.0, 18.0), CONTINUATION_TOP);
        assert_eq!(builder.page_count(), 2);
    }
}
