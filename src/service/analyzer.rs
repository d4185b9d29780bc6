use chrono::{Local, Utc};
use std::path::Path;
use std::sync::Arc;
use std::time::{Duration, Instant};
use tokio::fs;
use tracing::{error, info, warn};

use crate::config::StorageConfig;
use crate::error::{AppError, Result};
use crate::models::{AnalysisOutcome, AnalysisResult, ReceiptSummary};
use crate::report::{compose, render_pdf, ReportRequest};
use crate::service::extractor::{parse_summary, ExtractError, ReceiptExtractor};

/// 允许上传的图片类型
pub const ALLOWED_MIME_TYPES: [&str; 4] = ["image/jpeg", "image/png", "image/jpg", "image/webp"];

/// 一张上传的小票图片
#[derive(Debug, Clone)]
pub struct UploadedImage {
    pub filename: String,
    pub content_type: String,
    pub bytes: Vec<u8>,
}

/// 单张分析结果
#[derive(Debug, Clone)]
pub struct SingleAnalysis {
    pub summary: ReceiptSummary,
    pub image_url: String,
    pub pdf_url: String,
}

/// 批量分析结果
#[derive(Debug, Clone)]
pub struct BatchAnalysis {
    pub results: Vec<AnalysisResult>,
    pub image_urls: Vec<String>,
    pub combined_pdf_url: String,
}

/// 小票分析服务: 保存图片 -> 识别 -> 清洗 -> 生成 PDF
pub struct ReceiptAnalyzer {
    extractor: Arc<dyn ReceiptExtractor>,
    storage: StorageConfig,
    timeout: Duration,
}

impl ReceiptAnalyzer {
    pub fn new(extractor: Arc<dyn ReceiptExtractor>, storage: StorageConfig, timeout: Duration) -> Self {
        Self {
            extractor,
            storage,
            timeout,
        }
    }

    pub fn storage(&self) -> &StorageConfig {
        &self.storage
    }

    /// 创建上传目录和 PDF 目录
    pub async fn ensure_dirs(&self) -> std::io::Result<()> {
        fs::create_dir_all(&self.storage.uploads_dir).await?;
        fs::create_dir_all(&self.storage.pdfs_dir).await
    }

    /// 校验 MIME 类型与大小
    pub fn validate(&self, upload: &UploadedImage) -> Result<()> {
        if !ALLOWED_MIME_TYPES.contains(&upload.content_type.as_str()) {
            return Err(AppError::BadRequest(
                "Only JPEG, PNG, JPG, and WebP images are allowed".to_string(),
            ));
        }
        if upload.bytes.len() > self.storage.max_file_bytes {
            return Err(AppError::BadRequest(format!(
                "File {} exceeds the {} MB limit",
                upload.filename,
                self.storage.max_file_bytes / (1024 * 1024)
            )));
        }
        Ok(())
    }

    /// 单张分析; 识别失败整个请求失败
    pub async fn analyze_single(&self, upload: UploadedImage) -> Result<SingleAnalysis> {
        self.validate(&upload)?;
        let start = Instant::now();
        let stamp = Utc::now().timestamp_millis();

        let stored = format!("{}-{}", stamp, safe_filename(&upload.filename));
        let image_url = self.store_upload(&stored, &upload.bytes).await?;
        info!("Processing receipt: {}", stored);

        let text = self.extract(&upload).await?;
        let summary = parse_summary(&text);

        let pdf_name = format!("receipt-summary-{}.pdf", stamp);
        let pdf_url = self
            .write_report(ReportRequest::Single(&summary), &pdf_name)
            .await?;

        info!(
            "Receipt analyzed in {:.2}s -> {}",
            start.elapsed().as_secs_f64(),
            pdf_url
        );
        Ok(SingleAnalysis {
            summary,
            image_url,
            pdf_url,
        })
    }

    /// 批量分析: 顺序处理, 单张失败只记录在该张结果中
    pub async fn analyze_batch(&self, uploads: Vec<UploadedImage>) -> Result<BatchAnalysis> {
        if uploads.is_empty() {
            return Err(AppError::BadRequest("No files uploaded".to_string()));
        }
        if uploads.len() > self.storage.max_batch_files {
            return Err(AppError::BadRequest(format!(
                "Too many files: at most {} receipts per batch",
                self.storage.max_batch_files
            )));
        }
        for upload in &uploads {
            self.validate(upload)?;
        }

        let start = Instant::now();
        let stamp = Utc::now().timestamp_millis();
        info!("Processing batch of {} receipts", uploads.len());

        let mut results = Vec::with_capacity(uploads.len());
        let mut image_urls = Vec::with_capacity(uploads.len());
        for (index, upload) in uploads.iter().enumerate() {
            let stored = format!("{}-{}-{}", stamp, index + 1, safe_filename(&upload.filename));
            let image_url = self.store_upload(&stored, &upload.bytes).await?;

            let outcome = match self.extract(upload).await {
                Ok(text) => AnalysisOutcome::Summary(parse_summary(&text)),
                Err(e) => {
                    error!("Receipt {} ({}) failed: {}", index + 1, upload.filename, e);
                    AnalysisOutcome::Error(e.to_string())
                }
            };
            results.push(AnalysisResult {
                filename: upload.filename.clone(),
                outcome,
                image_url: image_url.clone(),
            });
            image_urls.push(image_url);
        }

        let failed = results.iter().filter(|r| r.is_error()).count();
        if failed > 0 {
            warn!("{} of {} receipts failed extraction", failed, results.len());
        }

        let pdf_name = format!("combined-receipts-{}.pdf", stamp);
        let combined_pdf_url = self
            .write_report(ReportRequest::Combined(&results), &pdf_name)
            .await?;

        info!(
            "Batch of {} analyzed in {:.2}s -> {}",
            results.len(),
            start.elapsed().as_secs_f64(),
            combined_pdf_url
        );
        Ok(BatchAnalysis {
            results,
            image_urls,
            combined_pdf_url,
        })
    }

    async fn extract(&self, upload: &UploadedImage) -> std::result::Result<String, ExtractError> {
        let call = self.extractor.extract(&upload.bytes, &upload.content_type);
        match tokio::time::timeout(self.timeout, call).await {
            Ok(result) => result,
            Err(_) => Err(ExtractError::Timeout(self.timeout.as_secs())),
        }
    }

    async fn store_upload(&self, stored: &str, bytes: &[u8]) -> Result<String> {
        fs::create_dir_all(&self.storage.uploads_dir).await?;
        fs::write(self.storage.uploads_dir.join(stored), bytes).await?;
        Ok(format!("/uploads/{}", stored))
    }

    async fn write_report(&self, request: ReportRequest<'_>, name: &str) -> Result<String> {
        let document = compose(request, Local::now().naive_local());
        let bytes = render_pdf(&document)?;
        fs::create_dir_all(&self.storage.pdfs_dir).await?;
        fs::write(self.storage.pdfs_dir.join(name), bytes).await?;
        Ok(format!("/pdfs/{}", name))
    }
}

/// 只保留文件名部分, 替换路径分隔符以外的特殊字符
fn safe_filename(name: &str) -> String {
    let base = Path::new(name)
        .file_name()
        .and_then(|n| n.to_str())
        .unwrap_or("");
    let cleaned: String = base
        .chars()
        .map(|c| {
            if c.is_ascii_alphanumeric() || matches!(c, '.' | '-' | '_') {
                c
            } else {
                '_'
            }
        })
        .collect();
    if cleaned.trim_matches('.').is_empty() {
        "receipt".to_string()
    } else {
        cleaned
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use async_trait::async_trait;
    use std::collections::HashMap;
    use std::path::PathBuf;

    /// 按图片内容返回预设文本; 内容为 "slow" 时永不返回
    struct ScriptedExtractor {
        replies: HashMap<Vec<u8>, String>,
    }

    #[async_trait]
    impl ReceiptExtractor for ScriptedExtractor {
        async fn extract(&self, image: &[u8], _mime: &str) -> std::result::Result<String, ExtractError> {
            if image == b"slow" {
                std::future::pending::<()>().await;
            }
            self.replies
                .get(image)
                .cloned()
                .ok_or(ExtractError::InvalidResponse)
        }
    }

    fn storage(root: &Path) -> StorageConfig {
        StorageConfig {
            uploads_dir: root.join("uploads"),
            pdfs_dir: root.join("pdfs"),
            max_file_bytes: 1024,
            max_batch_files: 10,
        }
    }

    fn analyzer(root: &Path, replies: &[(&str, &str)]) -> ReceiptAnalyzer {
        let replies = replies
            .iter()
            .map(|(k, v)| (k.as_bytes().to_vec(), v.to_string()))
            .collect();
        ReceiptAnalyzer::new(
            Arc::new(ScriptedExtractor { replies }),
            storage(root),
            Duration::from_secs(5),
        )
    }

    fn image(name: &str, bytes: &str) -> UploadedImage {
        UploadedImage {
            filename: name.to_string(),
            content_type: "image/png".to_string(),
            bytes: bytes.as_bytes().to_vec(),
        }
    }

    fn local_path(root: &Path, url: &str) -> PathBuf {
        root.join(url.trim_start_matches('/'))
    }

    #[tokio::test]
    async fn single_receipt_writes_image_and_pdf() {
        let dir = tempfile::tempdir().unwrap();
        let analyzer = analyzer(
            dir.path(),
            &[("a", "```json\n{\"merchant\": {\"name\": \"Cafe\"}, \"totals\": {\"total\": 4.5}}\n```")],
        );

        let out = analyzer.analyze_single(image("a.png", "a")).await.unwrap();
        assert_eq!(out.summary.merchant_name().as_deref(), Some("Cafe"));
        assert!(out.image_url.starts_with("/uploads/") && out.image_url.ends_with("-a.png"));
        assert!(out.pdf_url.starts_with("/pdfs/receipt-summary-"));

        let pdf = std::fs::read(local_path(dir.path(), &out.pdf_url)).unwrap();
        assert!(pdf.starts_with(b"%PDF"));
        assert!(local_path(dir.path(), &out.image_url).exists());
    }

    #[tokio::test]
    async fn single_extraction_failure_fails_request() {
        let dir = tempfile::tempdir().unwrap();
        let analyzer = analyzer(dir.path(), &[]);
        let err = analyzer.analyze_single(image("a.png", "a")).await.unwrap_err();
        assert!(matches!(err, AppError::Extraction(_)));
    }

    #[tokio::test]
    async fn batch_keeps_failed_entries_in_order() {
        let dir = tempfile::tempdir().unwrap();
        let analyzer = analyzer(
            dir.path(),
            &[
                ("one", "{\"totals\": {\"total\": 3}}"),
                ("three", "{\"totals\": {\"total\": \"7.50\"}}"),
            ],
        );
        let uploads = vec![
            image("one.png", "one"),
            image("two.png", "two"),
            image("three.png", "three"),
        ];

        let out = analyzer.analyze_batch(uploads).await.unwrap();
        assert_eq!(out.results.len(), 3);
        assert_eq!(out.image_urls.len(), 3);
        assert!(!out.results[0].is_error());
        assert!(out.results[1].is_error());
        assert!(!out.results[2].is_error());
        assert_eq!(out.results[1].filename, "two.png");
        assert!(out.image_urls[1].ends_with("-2-two.png"));

        let pdf = std::fs::read(local_path(dir.path(), &out.combined_pdf_url)).unwrap();
        assert!(pdf.starts_with(b"%PDF"));
    }

    #[tokio::test(start_paused = true)]
    async fn slow_extraction_times_out_per_file() {
        let dir = tempfile::tempdir().unwrap();
        let analyzer = analyzer(dir.path(), &[("ok", "{}")]);
        let out = analyzer
            .analyze_batch(vec![image("slow.png", "slow"), image("ok.png", "ok")])
            .await
            .unwrap();
        match &out.results[0].outcome {
            AnalysisOutcome::Error(msg) => assert!(msg.contains("timed out")),
            other => panic!("expected timeout, got {:?}", other),
        }
        assert!(!out.results[1].is_error());
    }

    #[tokio::test]
    async fn batch_limits_are_enforced() {
        let dir = tempfile::tempdir().unwrap();
        let analyzer = analyzer(dir.path(), &[]);

        let err = analyzer.analyze_batch(Vec::new()).await.unwrap_err();
        assert!(matches!(err, AppError::BadRequest(_)));

        let many = (0..11).map(|i| image(&format!("{i}.png"), "x")).collect();
        let err = analyzer.analyze_batch(many).await.unwrap_err();
        assert!(matches!(err, AppError::BadRequest(_)));
    }

    #[test]
    fn validate_rejects_bad_type_and_size() {
        let dir = tempfile::tempdir().unwrap();
        let analyzer = analyzer(dir.path(), &[]);

        let mut gif = image("a.gif", "x");
        gif.content_type = "image/gif".to_string();
        assert!(analyzer.validate(&gif).is_err());

        let big = UploadedImage {
            bytes: vec![0; 2048],
            ..image("big.png", "")
        };
        assert!(analyzer.validate(&big).is_err());
        assert!(analyzer.validate(&image("ok.webp", "x")).is_ok());
    }

    #[test]
    fn safe_filename_strips_paths() {
        assert_eq!(safe_filename("../../etc/passwd"), "passwd");
        assert_eq!(safe_filename("my receipt.png"), "my_receipt.png");
        assert_eq!(safe_filename(""), "receipt");
        assert_eq!(safe_filename(".."), "receipt");
    }
}
