//! HTTP adapters for the vendor services.
//!
//! Thin blocking-reqwest shims behind the `remote-services` feature.
//! Bodies are JSON with base64-encoded binary payloads; every call is
//! bounded by the configured timeout and surfaces failures as
//! `ExternalService` / `ExternalServiceTimeout` so the pipeline's
//! best-effort handling applies.

use super::{
    AccessibilityChecker, AutotagOutput, AutotagProvider, CheckOutput, GenerationProvider,
    PageBitmap, PageRange, PageRasterizer, RasterizedDocument,
};
use crate::error::{PdfError, Result};
use base64::Engine as _;
use serde::Deserialize;
use serde_json::json;
use std::time::Duration;

const BASE64: base64::engine::GeneralPurpose = base64::engine::general_purpose::STANDARD;

/// Connection settings shared by the remote adapters.
#[derive(Debug, Clone)]
pub struct RemoteServiceConfig {
    pub base_url: String,
    pub api_key: String,
    pub timeout: Duration,
}

impl RemoteServiceConfig {
    pub fn new(base_url: impl Into<String>, api_key: impl Into<String>) -> Self {
        Self {
            base_url: base_url.into(),
            api_key: api_key.into(),
            timeout: Duration::from_secs(120),
        }
    }
}

/// One vendor client implementing all of the service traits.
pub struct RemoteServicesClient {
    config: RemoteServiceConfig,
    http: reqwest::blocking::Client,
}

impl RemoteServicesClient {
    pub fn new(config: RemoteServiceConfig) -> Result<Self> {
        let http = reqwest::blocking::Client::builder()
            .timeout(config.timeout)
            .build()
            .map_err(|e| PdfError::ExternalService(format!("http client: {e}")))?;
        Ok(Self { config, http })
    }

    fn post(&self, path: &str, body: serde_json::Value) -> Result<serde_json::Value> {
        let url = format!("{}/{}", self.config.base_url.trim_end_matches('/'), path);
        let response = self
            .http
            .post(&url)
            .bearer_auth(&self.config.api_key)
            .json(&body)
            .send()
            .map_err(|e| {
                if e.is_timeout() {
                    PdfError::ExternalServiceTimeout(path.to_string())
                } else {
                    PdfError::ExternalService(format!("{path}: {e}"))
                }
            })?;
        if !response.status().is_success() {
            return Err(PdfError::ExternalService(format!(
                "{path}: HTTP {}",
                response.status()
            )));
        }
        response
            .json()
            .map_err(|e| PdfError::ExternalService(format!("{path}: invalid response: {e}")))
    }
}

fn field_b64(value: &serde_json::Value, key: &str) -> Result<Vec<u8>> {
    let encoded = value
        .get(key)
        .and_then(|v| v.as_str())
        .ok_or_else(|| PdfError::ExternalService(format!("response missing '{key}'")))?;
    BASE64
        .decode(encoded)
        .map_err(|e| PdfError::ExternalService(format!("invalid base64 in '{key}': {e}")))
}

fn field_str(value: &serde_json::Value, key: &str) -> Result<String> {
    value
        .get(key)
        .and_then(|v| v.as_str())
        .map(str::to_string)
        .ok_or_else(|| PdfError::ExternalService(format!("response missing '{key}'")))
}

impl AutotagProvider for RemoteServicesClient {
    fn autotag(&self, pdf: &[u8]) -> Result<AutotagOutput> {
        let response = self.post(
            "autotag",
            json!({ "pdf": BASE64.encode(pdf) }),
        )?;
        Ok(AutotagOutput {
            tagged_pdf: field_b64(&response, "taggedPdf")?,
            report: field_b64(&response, "report").unwrap_or_default(),
        })
    }
}

impl AccessibilityChecker for RemoteServicesClient {
    fn check(&self, pdf: &[u8], page_range: Option<PageRange>) -> Result<CheckOutput> {
        let mut body = json!({ "pdf": BASE64.encode(pdf) });
        if let Some(range) = page_range {
            body["pageStart"] = json!(range.first);
            body["pageEnd"] = json!(range.last);
        }
        let response = self.post("accessibility-check", body)?;
        Ok(CheckOutput {
            pdf: field_b64(&response, "pdf").unwrap_or_else(|_| pdf.to_vec()),
            report_json: field_str(&response, "report")?,
        })
    }
}

impl GenerationProvider for RemoteServicesClient {
    fn alt_text_for_image(
        &self,
        image: &[u8],
        mime: &str,
        context_before: &str,
        context_after: &str,
    ) -> Result<String> {
        let response = self.post(
            "generate/image-alt",
            json!({
                "image": BASE64.encode(image),
                "mime": mime,
                "contextBefore": context_before,
                "contextAfter": context_after,
            }),
        )?;
        field_str(&response, "altText")
    }

    fn alt_text_for_link(
        &self,
        target: Option<&str>,
        link_text: &str,
        context_before: &str,
        context_after: &str,
    ) -> Result<String> {
        let response = self.post(
            "generate/link-alt",
            json!({
                "target": target,
                "linkText": link_text,
                "contextBefore": context_before,
                "contextAfter": context_after,
            }),
        )?;
        field_str(&response, "altText")
    }

    fn title(&self, current_title: &str, extracted_text: &str) -> Result<String> {
        let response = self.post(
            "generate/title",
            json!({
                "currentTitle": current_title,
                "extractedText": extracted_text,
            }),
        )?;
        field_str(&response, "title")
    }
}

#[derive(Debug, Deserialize)]
struct RenderResponse {
    width: u32,
    height: u32,
    bgra: String,
}

impl PageRasterizer for RemoteServicesClient {
    fn open(&self, pdf: &[u8], dpi: u32) -> Result<Box<dyn RasterizedDocument>> {
        let response = self.post(
            "rasterize/open",
            json!({ "pdf": BASE64.encode(pdf), "dpi": dpi }),
        )?;
        Ok(Box::new(RemoteRasterSession {
            session_id: field_str(&response, "sessionId")?,
            client: RemoteServicesClient::new(self.config.clone())?,
        }))
    }
}

/// Server-side rasterization session; released on drop.
struct RemoteRasterSession {
    session_id: String,
    client: RemoteServicesClient,
}

impl RasterizedDocument for RemoteRasterSession {
    fn render_page(&mut self, page_number: u32) -> Result<PageBitmap> {
        let response = self.client.post(
            "rasterize/render",
            json!({ "sessionId": self.session_id, "page": page_number }),
        )?;
        let parsed: RenderResponse = serde_json::from_value(response)
            .map_err(|e| PdfError::ExternalService(format!("render response: {e}")))?;
        let bgra = BASE64
            .decode(&parsed.bgra)
            .map_err(|e| PdfError::ExternalService(format!("render pixels: {e}")))?;
        if bgra.len() != (parsed.width * parsed.height * 4) as usize {
            return Err(PdfError::ExternalService(
                "render pixel buffer size mismatch".to_string(),
            ));
        }
        Ok(PageBitmap {
            width: parsed.width,
            height: parsed.height,
            bgra,
        })
    }
}

impl Drop for RemoteRasterSession {
    fn drop(&mut self) {
        let _ = self.client.post(
            "rasterize/close",
            json!({ "sessionId": self.session_id }),
        );
    }
}
