use anyhow::{bail, Context, Result};
use base64::engine::general_purpose::STANDARD as BASE64;
use base64::Engine;
use roster_vision::{TextDetection, Vertex};
use serde::Deserialize;
use std::future::Future;
use std::path::Path;
use std::time::Duration;
use tracing::{debug, info};

const VISION_ENDPOINT: &str = "https://vision.googleapis.com/v1/images:annotate";

/// Text-detection service: image bytes in, text runs with their quads out.
pub trait TextDetector: Send + Sync {
    fn detect_text(&self, image: &[u8]) -> impl Future<Output = Result<Vec<TextDetection>>> + Send;
}

/// Detections captured earlier and replayed for every image
#[derive(Debug, Clone, Default)]
pub struct RecordedDetections {
    detections: Vec<TextDetection>,
}

impl RecordedDetections {
    pub fn new(detections: Vec<TextDetection>) -> Self {
        Self { detections }
    }

    /// Load a JSON array of detections. Both the internal field names and the
    /// Vision API ones (`description`, `boundingPoly.vertices`) are accepted.
    pub fn load(path: &Path) -> Result<Self> {
        let content = std::fs::read_to_string(path)
            .with_context(|| format!("Failed to read detections {}", path.display()))?;
        let annotations: Vec<RecordedAnnotation> = serde_json::from_str(&content)
            .with_context(|| format!("Failed to parse detections {}", path.display()))?;
        let detections: Vec<TextDetection> = annotations.into_iter().map(Into::into).collect();
        info!("Loaded {} recorded detection(s) from {}", detections.len(), path.display());
        Ok(Self { detections })
    }
}

impl TextDetector for RecordedDetections {
    async fn detect_text(&self, _image: &[u8]) -> Result<Vec<TextDetection>> {
        Ok(self.detections.clone())
    }
}

#[derive(Debug, Deserialize)]
#[serde(untagged)]
enum RecordedAnnotation {
    Plain(TextDetection),
    Vision(TextAnnotation),
}

impl From<RecordedAnnotation> for TextDetection {
    fn from(a: RecordedAnnotation) -> Self {
        match a {
            RecordedAnnotation::Plain(d) => d,
            RecordedAnnotation::Vision(a) => a.into(),
        }
    }
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct TextAnnotation {
    #[serde(default)]
    description: String,
    #[serde(default)]
    bounding_poly: BoundingPoly,
}

#[derive(Debug, Default, Deserialize)]
struct BoundingPoly {
    #[serde(default)]
    vertices: Vec<Vertex>,
}

impl From<TextAnnotation> for TextDetection {
    fn from(a: TextAnnotation) -> Self {
        let mut quad = [Vertex::default(); 4];
        for (slot, v) in quad.iter_mut().zip(a.bounding_poly.vertices) {
            *slot = v;
        }
        TextDetection {
            text: a.description,
            quad,
        }
    }
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct AnnotateResponse {
    #[serde(default)]
    responses: Vec<AnnotateResult>,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct AnnotateResult {
    #[serde(default)]
    text_annotations: Vec<TextAnnotation>,
    error: Option<ApiError>,
}

#[derive(Debug, Deserialize)]
struct ApiError {
    #[serde(default)]
    message: String,
}

/// Cloud Vision `TEXT_DETECTION` client
#[derive(Debug, Clone)]
pub struct CloudVisionDetector {
    client: reqwest::Client,
    api_key: String,
    endpoint: String,
}

impl CloudVisionDetector {
    pub fn new(api_key: impl Into<String>, timeout: Duration) -> Result<Self> {
        let client = reqwest::Client::builder()
            .timeout(timeout)
            .build()
            .context("Failed to build HTTP client")?;
        Ok(Self {
            client,
            api_key: api_key.into(),
            endpoint: VISION_ENDPOINT.to_string(),
        })
    }
}

impl TextDetector for CloudVisionDetector {
    async fn detect_text(&self, image: &[u8]) -> Result<Vec<TextDetection>> {
        let body = serde_json::json!({
            "requests": [{
                "image": { "content": BASE64.encode(image) },
                "features": [{ "type": "TEXT_DETECTION" }],
            }]
        });

        let response: AnnotateResponse = self
            .client
            .post(&self.endpoint)
            .query(&[("key", self.api_key.as_str())])
            .json(&body)
            .send()
            .await
            .context("Vision API request failed")?
            .error_for_status()
            .context("Vision API returned an error status")?
            .json()
            .await
            .context("Failed to parse Vision API response")?;

        parse_annotate_response(response)
    }
}

fn parse_annotate_response(response: AnnotateResponse) -> Result<Vec<TextDetection>> {
    let Some(result) = response.responses.into_iter().next() else {
        return Ok(Vec::new());
    };
    if let Some(err) = result.error {
        bail!("Vision API error: {}", err.message);
    }
    let detections: Vec<TextDetection> =
        result.text_annotations.into_iter().map(Into::into).collect();
    debug!("Vision API returned {} text annotation(s)", detections.len());
    Ok(detections)
}

/// Detector chosen at runtime
#[derive(Debug, Clone)]
pub enum Detector {
    Recorded(RecordedDetections),
    Cloud(CloudVisionDetector),
}

impl TextDetector for Detector {
    async fn detect_text(&self, image: &[u8]) -> Result<Vec<TextDetection>> {
        match self {
            Detector::Recorded(d) => d.detect_text(image).await,
            Detector::Cloud(d) => d.detect_text(image).await,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_vision_response() {
        let json = r#"{"responses": [{"textAnnotations": [
            {"description": "Rank 3\n4523", "boundingPoly": {"vertices": [
                {"x": 0, "y": 0}, {"x": 700}, {"x": 700, "y": 400}, {"y": 400}]}},
            {"description": "4523", "boundingPoly": {"vertices": [
                {"x": 400, "y": 300}, {"x": 500, "y": 300}, {"x": 500, "y": 340}, {"x": 400, "y": 340}]}}
        ]}]}"#;
        let response: AnnotateResponse = serde_json::from_str(json).unwrap();
        let detections = parse_annotate_response(response).unwrap();
        assert_eq!(detections.len(), 2);
        assert_eq!(detections[1].text, "4523");
        assert_eq!(detections[1].quad[2], Vertex { x: 500.0, y: 340.0 });
        assert_eq!(detections[0].quad[1], Vertex { x: 700.0, y: 0.0 });
    }

    #[test]
    fn test_parse_vision_error() {
        let json = r#"{"responses": [{"error": {"message": "bad image"}}]}"#;
        let response: AnnotateResponse = serde_json::from_str(json).unwrap();
        assert!(parse_annotate_response(response).is_err());

        let empty: AnnotateResponse = serde_json::from_str(r#"{"responses": [{}]}"#).unwrap();
        assert!(parse_annotate_response(empty).unwrap().is_empty());
    }

    #[tokio::test]
    async fn test_recorded_detections_both_formats() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("detections.json");
        std::fs::write(
            &path,
            r#"[
                {"text": "all", "quad": [{"x":0,"y":0},{"x":9,"y":0},{"x":9,"y":9},{"x":0,"y":9}]},
                {"description": "4523", "boundingPoly": {"vertices": [
                    {"x": 400, "y": 300}, {"x": 500, "y": 300}, {"x": 500, "y": 340}, {"x": 400, "y": 340}]}}
            ]"#,
        )
        .unwrap();

        let recorded = RecordedDetections::load(&path).unwrap();
        let detections = Detector::Recorded(recorded).detect_text(b"").await.unwrap();
        assert_eq!(detections.len(), 2);
        assert_eq!(detections[0].text, "all");
        assert_eq!(detections[1].quad[0], Vertex { x: 400.0, y: 300.0 });
    }
}
