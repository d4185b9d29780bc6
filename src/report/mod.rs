//! 小票报表引擎: 汇总计算、排版、PDF 渲染.

pub mod composer;
pub mod layout;
pub mod primitives;
pub mod render;
pub mod stats;

pub use composer::{compose, compose_combined, compose_single, ReportRequest};
pub use layout::{Document, DocumentBuilder};
pub use render::{render_pdf, RenderError};
pub use stats::{format_currency, DashboardStats};
