use axum::{
    extract::{Multipart, Path, State},
    http::{header::CONTENT_TYPE, StatusCode},
    response::{IntoResponse, Response},
    Json,
};
use serde::Serialize;
use std::io::ErrorKind;
use std::path::Path as FsPath;
use std::sync::Arc;
use tracing::info;

use crate::api::extract::{read_images, AuthUser};
use crate::error::{AppError, Result};
use crate::models::{AnalysisResult, ReceiptSummary};
use crate::service::ReceiptAnalyzer;

/// 单张分析响应
#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct AnalyzeResponse {
    pub success: bool,
    pub summary: ReceiptSummary,
    pub image_url: String,
    pub pdf_url: String,
    pub message: String,
}

/// 批量分析响应
#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct BatchAnalyzeResponse {
    pub success: bool,
    pub results: Vec<AnalysisResult>,
    pub image_urls: Vec<String>,
    pub combined_pdf_url: String,
    pub message: String,
}

/// 健康检查
pub async fn health_check() -> &'static str {
    "OK"
}

/// 单张小票分析 (字段名 receipt)
pub async fn analyze_receipt(
    State(analyzer): State<Arc<ReceiptAnalyzer>>,
    AuthUser(user): AuthUser,
    mut multipart: Multipart,
) -> Result<Json<AnalyzeResponse>> {
    let upload = read_images(&mut multipart, "receipt", 1)
        .await?
        .into_iter()
        .next()
        .ok_or_else(|| AppError::BadRequest("No file uploaded".to_string()))?;

    info!("User {} uploaded {}", user.email, upload.filename);
    let analysis = analyzer.analyze_single(upload).await?;
    Ok(Json(AnalyzeResponse {
        success: true,
        summary: analysis.summary,
        image_url: analysis.image_url,
        pdf_url: analysis.pdf_url,
        message: "Receipt analyzed successfully".to_string(),
    }))
}

/// 批量小票分析 (字段名 receipts), 单张失败不影响整体
pub async fn analyze_receipts(
    State(analyzer): State<Arc<ReceiptAnalyzer>>,
    AuthUser(user): AuthUser,
    mut multipart: Multipart,
) -> Result<Json<BatchAnalyzeResponse>> {
    let max_files = analyzer.storage().max_batch_files;
    let uploads = read_images(&mut multipart, "receipts", max_files).await?;
    if uploads.is_empty() {
        return Err(AppError::BadRequest("No file uploaded".to_string()));
    }

    info!("User {} uploaded {} receipts", user.email, uploads.len());
    let batch = analyzer.analyze_batch(uploads).await?;
    let analyzed = batch.results.iter().filter(|r| !r.is_error()).count();
    let message = format!(
        "Analyzed {} of {} receipts successfully",
        analyzed,
        batch.results.len()
    );
    Ok(Json(BatchAnalyzeResponse {
        success: true,
        results: batch.results,
        image_urls: batch.image_urls,
        combined_pdf_url: batch.combined_pdf_url,
        message,
    }))
}

/// GET /uploads/:name
pub async fn serve_upload(
    State(analyzer): State<Arc<ReceiptAnalyzer>>,
    Path(name): Path<String>,
) -> Result<Response> {
    serve_file(&analyzer.storage().uploads_dir, &name).await
}

/// GET /pdfs/:name
pub async fn serve_pdf(
    State(analyzer): State<Arc<ReceiptAnalyzer>>,
    Path(name): Path<String>,
) -> Result<Response> {
    serve_file(&analyzer.storage().pdfs_dir, &name).await
}

async fn serve_file(dir: &FsPath, name: &str) -> Result<Response> {
    // 只允许目录下的直接文件名
    if name.is_empty() || name.starts_with('.') || name.contains(['/', '\\']) {
        return Ok(StatusCode::NOT_FOUND.into_response());
    }
    match tokio::fs::read(dir.join(name)).await {
        Ok(bytes) => Ok(([(CONTENT_TYPE, content_type_for(name))], bytes).into_response()),
        Err(e) if e.kind() == ErrorKind::NotFound => Ok(StatusCode::NOT_FOUND.into_response()),
        Err(e) => Err(e.into()),
    }
}

fn content_type_for(name: &str) -> &'static str {
    let ext = name.rsplit('.').next().unwrap_or("").to_ascii_lowercase();
    match ext.as_str() {
        "pdf" => "application/pdf",
        "png" => "image/png",
        "jpg" | "jpeg" => "image/jpeg",
        "webp" => "image/webp",
        _ => "application/octet-stream",
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn content_types_follow_extension() {
        assert_eq!(content_type_for("a.PDF"), "application/pdf");
        assert_eq!(content_type_for("1-2-photo.jpeg"), "image/jpeg");
        assert_eq!(content_type_for("noext"), "application/octet-stream");
    }

    #[test]
    fn batch_response_uses_camel_case() {
        let body = serde_json::to_value(BatchAnalyzeResponse {
            success: true,
            results: Vec::new(),
            image_urls: vec!["/uploads/a.png".to_string()],
            combined_pdf_url: "/pdfs/c.pdf".to_string(),
            message: "ok".to_string(),
        })
        .unwrap();
        assert_eq!(body["imageUrls"][0], "/uploads/a.png");
        assert_eq!(body["combinedPdfUrl"], "/pdfs/c.pdf");
    }
}
