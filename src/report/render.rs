use std::f32::consts::PI;
use std::io::BufWriter;

use printpdf::path::{PaintMode, WindingOrder};
use printpdf::{
    BuiltinFont, Color as PdfColor, IndirectFontRef, Line, Mm, PdfDocument, PdfDocumentReference,
    PdfLayerReference, Point, Polygon, Rgb,
};
use thiserror::Error;

use crate::report::layout::{Color, Document, DrawOp, Paint, Shape, TextStyle};

#[derive(Error, Debug)]
pub enum RenderError {
    #[error("{0}")]
    Pdf(String),
}

/// 圆弧近似的分段数
const CIRCLE_SEGMENTS: usize = 48;
const CORNER_SEGMENTS: usize = 6;
/// 文字框上沿到基线的距离 / 字号
const BASELINE_RATIO: f32 = 0.8;

fn mm(pt: f32) -> Mm {
    Mm(pt * 25.4 / 72.0)
}

fn pdf_color(c: Color) -> PdfColor {
    PdfColor::Rgb(Rgb::new(
        c.r as f32 / 255.0,
        c.g as f32 / 255.0,
        c.b as f32 / 255.0,
        None,
    ))
}

/// 将绘制指令渲染为 PDF 字节
pub fn render_pdf(doc: &Document) -> Result<Vec<u8>, RenderError> {
    let (pdf, first_page, first_layer) =
        PdfDocument::new(&doc.title, mm(doc.width), mm(doc.height), "Layer 1");
    let writer = PdfWriter::new(pdf, doc.height)?;

    for (index, page) in doc.pages.iter().enumerate() {
        let layer = if index == 0 {
            writer.doc.get_page(first_page).get_layer(first_layer)
        } else {
            let (p, l) = writer.doc.add_page(mm(doc.width), mm(doc.height), "Layer 1");
            writer.doc.get_page(p).get_layer(l)
        };
        for op in &page.ops {
            writer.draw(&layer, op);
        }
    }

    writer.to_bytes()
}

struct PdfWriter {
    doc: PdfDocumentReference,
    font: IndirectFontRef,
    font_bold: IndirectFontRef,
    page_height: f32,
}

impl PdfWriter {
    fn new(doc: PdfDocumentReference, page_height: f32) -> Result<Self, RenderError> {
        let font = doc
            .add_builtin_font(BuiltinFont::Helvetica)
            .map_err(|e| RenderError::Pdf(format!("{e:?}")))?;
        let font_bold = doc
            .add_builtin_font(BuiltinFont::HelveticaBold)
            .map_err(|e| RenderError::Pdf(format!("{e:?}")))?;
        Ok(Self {
            doc,
            font,
            font_bold,
            page_height,
        })
    }

    /// 左上角坐标 -> PDF 坐标 (左下角原点)
    fn point(&self, x: f32, y: f32) -> Point {
        Point::new(mm(x), mm(self.page_height - y))
    }

    fn draw(&self, layer: &PdfLayerReference, op: &DrawOp) {
        match op {
            DrawOp::Text { text, x, y, style } => self.text(layer, text, *x, *y, style),
            DrawOp::Shape { shape, paint } => self.shape(layer, shape, paint),
        }
    }

    fn text(&self, layer: &PdfLayerReference, text: &str, x: f32, y: f32, style: &TextStyle) {
        let font = if style.bold { &self.font_bold } else { &self.font };
        let baseline = self.page_height - (y + style.size * BASELINE_RATIO);
        layer.set_fill_color(pdf_color(style.color));
        layer.use_text(text, style.size, mm(x), mm(baseline), font);
    }

    fn shape(&self, layer: &PdfLayerReference, shape: &Shape, paint: &Paint) {
        let (mode, fill, stroke, width) = match *paint {
            Paint::Fill(c) => (PaintMode::Fill, Some(c), None, 0.0),
            Paint::Stroke { color, width } => (PaintMode::Stroke, None, Some(color), width),
            Paint::FillStroke { fill, stroke, width } => {
                (PaintMode::FillStroke, Some(fill), Some(stroke), width)
            }
        };
        if let Some(c) = fill {
            layer.set_fill_color(pdf_color(c));
        }
        if let Some(c) = stroke {
            layer.set_outline_color(pdf_color(c));
            layer.set_outline_thickness(width);
        }

        match *shape {
            Shape::Line { x1, y1, x2, y2 } => {
                layer.add_line(Line {
                    points: vec![(self.point(x1, y1), false), (self.point(x2, y2), false)],
                    is_closed: false,
                });
            }
            Shape::Rect { x, y, width, height, radius } => {
                let ring = rounded_rect_outline(x, y, width, height, radius)
                    .into_iter()
                    .map(|(px, py)| (self.point(px, py), false))
                    .collect();
                layer.add_polygon(Polygon {
                    rings: vec![ring],
                    mode,
                    winding_order: WindingOrder::NonZero,
                });
            }
            Shape::Circle { cx, cy, radius } => {
                let ring = circle_outline(cx, cy, radius)
                    .into_iter()
                    .map(|(px, py)| (self.point(px, py), false))
                    .collect();
                layer.add_polygon(Polygon {
                    rings: vec![ring],
                    mode,
                    winding_order: WindingOrder::NonZero,
                });
            }
        }
    }

    fn to_bytes(self) -> Result<Vec<u8>, RenderError> {
        let mut buf = BufWriter::new(Vec::new());
        self.doc
            .save(&mut buf)
            .map_err(|e| RenderError::Pdf(format!("{e:?}")))?;
        buf.into_inner().map_err(|e| RenderError::Pdf(e.to_string()))
    }
}

fn circle_outline(cx: f32, cy: f32, radius: f32) -> Vec<(f32, f32)> {
    (0..CIRCLE_SEGMENTS)
        .map(|i| {
            let angle = 2.0 * PI * i as f32 / CIRCLE_SEGMENTS as f32;
            (cx + radius * angle.cos(), cy + radius * angle.sin())
        })
        .collect()
}

/// 圆角矩形轮廓, radius 会被限制在半边长以内
fn rounded_rect_outline(x: f32, y: f32, width: f32, height: f32, radius: f32) -> Vec<(f32, f32)> {
    let r = radius.min(width / 2.0).min(height / 2.0).max(0.0);
    if r == 0.0 {
        return vec![(x, y), (x + width, y), (x + width, y + height), (x, y + height)];
    }

    // 四个圆角的圆心及起始角 (y 轴向下)
    let corners = [
        (x + width - r, y + r, -PI / 2.0),
        (x + width - r, y + height - r, 0.0),
        (x + r, y + height - r, PI / 2.0),
        (x + r, y + r, PI),
    ];
    let mut points = Vec::with_capacity(corners.len() * (CORNER_SEGMENTS + 1));
    for (ccx, ccy, start) in corners {
        for step in 0..=CORNER_SEGMENTS {
            let angle = start + (PI / 2.0) * step as f32 / CORNER_SEGMENTS as f32;
            points.push((ccx + r * angle.cos(), ccy + r * angle.sin()));
        }
    }
    points
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::ReceiptSummary;
    use crate::report::composer::compose_single;
    use chrono::NaiveDate;

    #[test]
    fn renders_pdf_bytes() {
        let at = NaiveDate::from_ymd_opt(2024, 1, 2)
            .unwrap()
            .and_hms_opt(3, 4, 5)
            .unwrap();
        let doc = compose_single(&ReceiptSummary::default(), at);
        let bytes = render_pdf(&doc).unwrap();
        assert!(bytes.starts_with(b"%PDF"));
    }

    #[test]
    fn square_corners_collapse_to_four_points() {
        assert_eq!(rounded_rect_outline(0.0, 0.0, 10.0, 5.0, 0.0).len(), 4);
    }

    #[test]
    fn rounded_outline_stays_inside_bounds() {
        let points = rounded_rect_outline(10.0, 20.0, 100.0, 40.0, 12.0);
        assert_eq!(points.len(), 4 * (CORNER_SEGMENTS + 1));
        for (px, py) in points {
            assert!((10.0 - 1e-3..=110.0 + 1e-3).contains(&px));
            assert!((20.0 - 1e-3..=60.0 + 1e-3).contains(&py));
        }
    }

    #[test]
    fn circle_points_lie_on_radius() {
        for (px, py) in circle_outline(50.0, 50.0, 10.0) {
            let d = ((px - 50.0).powi(2) + (py - 50.0).powi(2)).sqrt();
            assert!((d - 10.0).abs() < 1e-3);
        }
    }
}
