//! Inference HTTP API.
//!
//! Serves the decision pipeline over a small hand-rolled HTTP/1.1 server on
//! a background thread:
//!
//! - `POST /api/predict` — base64 image in, filtered predictions out
//! - `GET /health` — load-balancer health probe
//! - `GET /api/status` — backend/model metadata
//! - `GET /api/labels` — detector vocabulary
//!
//! Requests are independent and stateless; the backend sits behind a mutex
//! because `detect` takes `&mut self`. The shell refuses inference while no
//! backend is loaded rather than returning partial results.

use anyhow::{anyhow, Result};
use base64::Engine;
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::io::{Read, Write};
use std::net::{SocketAddr, TcpListener, TcpStream};
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Mutex};
use std::thread::JoinHandle;
use std::time::{Duration, Instant, SystemTime, UNIX_EPOCH};

use crate::classify::{PrecisionFilter, ScoredDetection};
use crate::detect::{BoundingBox, DetectorBackend};
use crate::ingest::Frame;

const MAX_HEADER_BYTES: usize = 8192;
const DEFAULT_MAX_BODY_BYTES: usize = 16 * 1024 * 1024;
/// Lowest floor ever handed to the detector; the filter re-applies the
/// caller's requested confidence afterwards.
const MIN_DETECT_FLOOR: f32 = 0.15;
const DEFAULT_REQUEST_CONFIDENCE: f32 = 0.25;

#[derive(Clone, Debug)]
pub struct ApiConfig {
    pub addr: String,
    /// Request body cap; oversized uploads get 413.
    pub max_body_bytes: usize,
}

impl Default for ApiConfig {
    fn default() -> Self {
        Self {
            addr: "127.0.0.1:8000".to_string(),
            max_body_bytes: DEFAULT_MAX_BODY_BYTES,
        }
    }
}

/// Handle to a running API server thread.
#[derive(Debug)]
pub struct ApiHandle {
    pub addr: SocketAddr,
    shutdown: Arc<AtomicBool>,
    join: Option<JoinHandle<()>>,
}

impl ApiHandle {
    pub fn stop(mut self) -> Result<()> {
        self.shutdown.store(true, Ordering::SeqCst);
        if let Some(join) = self.join.take() {
            join.join()
                .map_err(|_| anyhow!("api server thread panicked"))?;
        }
        Ok(())
    }
}

struct ApiState {
    backend: Option<Arc<Mutex<dyn DetectorBackend>>>,
    filter: Arc<PrecisionFilter>,
    version: String,
}

pub struct ApiServer {
    cfg: ApiConfig,
    state: ApiState,
}

impl ApiServer {
    pub fn new(cfg: ApiConfig, filter: PrecisionFilter) -> Self {
        Self {
            cfg,
            state: ApiState {
                backend: None,
                filter: Arc::new(filter),
                version: env!("CARGO_PKG_VERSION").to_string(),
            },
        }
    }

    /// Attach the detection backend. Without one, the server still answers
    /// health checks but refuses inference.
    pub fn with_backend<B: DetectorBackend + 'static>(mut self, backend: B) -> Self {
        self.state.backend = Some(Arc::new(Mutex::new(backend)));
        self
    }

    pub fn spawn(self) -> Result<ApiHandle> {
        let configured_addr: SocketAddr = self.cfg.addr.parse()?;
        let listener = TcpListener::bind(configured_addr)?;
        let addr = listener.local_addr()?;
        listener.set_nonblocking(true)?;

        let shutdown = Arc::new(AtomicBool::new(false));
        let shutdown_thread = shutdown.clone();
        let cfg = self.cfg;
        let state = self.state;
        let join = std::thread::spawn(move || {
            if let Err(err) = run_api(listener, cfg, state, shutdown_thread) {
                log::error!("inference api stopped: {}", err);
            }
        });

        Ok(ApiHandle {
            addr,
            shutdown,
            join: Some(join),
        })
    }
}

fn run_api(
    listener: TcpListener,
    cfg: ApiConfig,
    state: ApiState,
    shutdown: Arc<AtomicBool>,
) -> Result<()> {
    loop {
        if shutdown.load(Ordering::SeqCst) {
            break;
        }
        match listener.accept() {
            Ok((stream, _)) => {
                if let Err(err) = handle_connection(stream, &cfg, &state) {
                    log::warn!("inference api request failed: {}", err);
                }
            }
            Err(err) if err.kind() == std::io::ErrorKind::WouldBlock => {
                std::thread::sleep(Duration::from_millis(50));
                continue;
            }
            Err(err) => return Err(err.into()),
        }
    }
    Ok(())
}

fn handle_connection(mut stream: TcpStream, cfg: &ApiConfig, state: &ApiState) -> Result<()> {
    let request = match read_request(&mut stream, cfg.max_body_bytes) {
        Ok(request) => request,
        Err(RequestError::TooLarge) => {
            write_json_response(&mut stream, 413, r#"{"error":"request too large"}"#)?;
            return Ok(());
        }
        Err(RequestError::Malformed(err)) => {
            write_json_response(&mut stream, 400, r#"{"error":"malformed request"}"#)?;
            return Err(err);
        }
    };

    match (request.method.as_str(), request.path.as_str()) {
        ("GET", "/health") => handle_health(&mut stream, state),
        ("GET", "/api/status") => handle_status(&mut stream, state),
        ("GET", "/api/labels") => handle_labels(&mut stream, state),
        ("POST", "/api/predict") => handle_predict(&mut stream, state, &request.body),
        ("GET", "/api/predict") => {
            write_json_response(&mut stream, 405, r#"{"error":"method_not_allowed"}"#)
        }
        _ => write_json_response(&mut stream, 404, r#"{"error":"not_found"}"#),
    }
}

// ----------------------------------------------------------------------------
// Handlers
// ----------------------------------------------------------------------------

fn handle_health(stream: &mut TcpStream, state: &ApiState) -> Result<()> {
    let model_loaded = state.backend.is_some();
    let body = serde_json::json!({
        "status": if model_loaded { "healthy" } else { "unhealthy" },
        "model_loaded": model_loaded,
        "timestamp": epoch_seconds(),
    });
    let status = if model_loaded { 200 } else { 503 };
    write_json_response(stream, status, &body.to_string())
}

fn handle_status(stream: &mut TcpStream, state: &ApiState) -> Result<()> {
    let Some(backend) = &state.backend else {
        return write_json_response(stream, 503, r#"{"error":"api not ready"}"#);
    };
    let (name, labels) = {
        let guard = backend
            .lock()
            .map_err(|_| anyhow!("backend lock poisoned"))?;
        (guard.name(), guard.labels())
    };
    let body = serde_json::json!({
        "success": true,
        "model_loaded": true,
        "backend": name,
        "model_classes": labels,
        "version": state.version,
    });
    write_json_response(stream, 200, &body.to_string())
}

fn handle_labels(stream: &mut TcpStream, state: &ApiState) -> Result<()> {
    let labels = match &state.backend {
        Some(backend) => {
            let guard = backend
                .lock()
                .map_err(|_| anyhow!("backend lock poisoned"))?;
            guard.labels()
        }
        None => state.filter.categories().labels(),
    };
    let body = serde_json::json!({ "labels": labels });
    write_json_response(stream, 200, &body.to_string())
}

#[derive(Debug, Deserialize)]
struct PredictRequest {
    image: Option<String>,
    confidence: Option<f32>,
}

#[derive(Debug, Serialize)]
struct PredictionBody {
    label: String,
    category: String,
    confidence: f32,
    bbox: BoundingBox,
}

fn handle_predict(stream: &mut TcpStream, state: &ApiState, body: &[u8]) -> Result<()> {
    let Some(backend) = &state.backend else {
        return write_json_response(stream, 503, r#"{"error":"model not loaded"}"#);
    };

    let request: PredictRequest = match serde_json::from_slice(body) {
        Ok(request) => request,
        Err(_) => {
            return write_json_response(stream, 400, r#"{"error":"invalid request body"}"#);
        }
    };
    let Some(image_data) = request.image.filter(|data| !data.is_empty()) else {
        return write_json_response(stream, 400, r#"{"error":"no image data provided"}"#);
    };

    let frame = match decode_image_payload(&image_data) {
        Ok(frame) => frame,
        Err(err) => {
            log::debug!("image decode rejected: {err:#}");
            return write_json_response(stream, 400, r#"{"error":"could not decode image"}"#);
        }
    };

    let confidence = request
        .confidence
        .unwrap_or(DEFAULT_REQUEST_CONFIDENCE)
        .clamp(0.1, 0.9);
    // Run the detector slightly below the requested confidence so the
    // precision filter sees borderline candidates; it applies the real
    // thresholds itself.
    let floor = (confidence - 0.1).max(MIN_DETECT_FLOOR);
    let iou = state.filter.config().iou;

    let started = Instant::now();
    let raw = {
        let mut guard = backend
            .lock()
            .map_err(|_| anyhow!("backend lock poisoned"))?;
        match guard.detect(&frame.pixels, frame.width, frame.height, floor, iou) {
            Ok(raw) => raw,
            Err(err) => {
                log::error!("inference failed: {err:#}");
                return write_json_response(
                    stream,
                    503,
                    r#"{"error":"inference unavailable"}"#,
                );
            }
        }
    };
    let accepted = state.filter.filter(raw, frame.dims());
    let inference_ms = started.elapsed().as_secs_f64() * 1000.0;

    log::info!(
        "inference completed: {} predictions in {:.1}ms",
        accepted.len(),
        inference_ms
    );

    let predictions: Vec<PredictionBody> = accepted.iter().map(prediction_body).collect();
    let total_detections = predictions.len();
    let body = serde_json::json!({
        "success": true,
        "predictions": predictions,
        "inference_time_ms": (inference_ms * 10.0).round() / 10.0,
        "total_detections": total_detections,
    });
    write_json_response(stream, 200, &body.to_string())
}

fn prediction_body(det: &ScoredDetection) -> PredictionBody {
    PredictionBody {
        label: det.label.clone(),
        category: det.category.as_str().to_string(),
        confidence: det.score,
        bbox: det.bbox,
    }
}

/// Decode a base64 image payload (with or without a data-URL prefix) into
/// an RGB frame.
fn decode_image_payload(data: &str) -> Result<Frame> {
    let encoded = match data.split_once(',') {
        Some((_prefix, rest)) => rest,
        None => data,
    };
    let bytes = base64::engine::general_purpose::STANDARD
        .decode(encoded.trim())
        .map_err(|e| anyhow!("invalid base64 image data: {}", e))?;
    let decoded = image::load_from_memory(&bytes)
        .map_err(|e| anyhow!("unsupported image payload: {}", e))?
        .to_rgb8();
    let (width, height) = decoded.dimensions();
    Ok(Frame::new(decoded.into_raw(), width, height))
}

// ----------------------------------------------------------------------------
// HTTP plumbing
// ----------------------------------------------------------------------------

enum RequestError {
    TooLarge,
    Malformed(anyhow::Error),
}

struct HttpRequest {
    method: String,
    path: String,
    body: Vec<u8>,
}

fn read_request(stream: &mut TcpStream, max_body_bytes: usize) -> Result<HttpRequest, RequestError> {
    stream
        .set_read_timeout(Some(Duration::from_secs(5)))
        .map_err(|e| RequestError::Malformed(e.into()))?;

    let mut buf = [0u8; 4096];
    let mut data = Vec::new();
    let header_end = loop {
        if let Some(pos) = find_header_end(&data) {
            break pos;
        }
        if data.len() > MAX_HEADER_BYTES {
            return Err(RequestError::TooLarge);
        }
        let n = stream
            .read(&mut buf)
            .map_err(|e| RequestError::Malformed(e.into()))?;
        if n == 0 {
            return Err(RequestError::Malformed(anyhow!(
                "connection closed before headers completed"
            )));
        }
        data.extend_from_slice(&buf[..n]);
    };

    let header_text = String::from_utf8_lossy(&data[..header_end]).to_string();
    let mut lines = header_text.split("\r\n");
    let request_line = lines
        .next()
        .ok_or_else(|| RequestError::Malformed(anyhow!("empty request")))?;
    let mut parts = request_line.split_whitespace();
    let method = parts
        .next()
        .ok_or_else(|| RequestError::Malformed(anyhow!("missing method")))?
        .to_string();
    let raw_path = parts
        .next()
        .ok_or_else(|| RequestError::Malformed(anyhow!("missing path")))?;

    let mut headers = HashMap::new();
    for line in lines {
        if line.is_empty() {
            break;
        }
        if let Some((k, v)) = line.split_once(':') {
            headers.insert(k.trim().to_lowercase(), v.trim().to_string());
        }
    }

    let content_length: usize = headers
        .get("content-length")
        .map(|v| v.parse())
        .transpose()
        .map_err(|_| RequestError::Malformed(anyhow!("invalid content-length")))?
        .unwrap_or(0);
    if content_length > max_body_bytes {
        return Err(RequestError::TooLarge);
    }

    let body_start = header_end + 4;
    let mut body: Vec<u8> = data[body_start.min(data.len())..].to_vec();
    while body.len() < content_length {
        let n = stream
            .read(&mut buf)
            .map_err(|e| RequestError::Malformed(e.into()))?;
        if n == 0 {
            return Err(RequestError::Malformed(anyhow!(
                "connection closed before body completed"
            )));
        }
        body.extend_from_slice(&buf[..n]);
        if body.len() > max_body_bytes {
            return Err(RequestError::TooLarge);
        }
    }
    body.truncate(content_length);

    let path = raw_path.split('?').next().unwrap_or(raw_path).to_string();
    Ok(HttpRequest { method, path, body })
}

fn find_header_end(data: &[u8]) -> Option<usize> {
    data.windows(4).position(|w| w == b"\r\n\r\n")
}

fn write_json_response(stream: &mut TcpStream, status: u16, body: &str) -> Result<()> {
    write_response(stream, status, "application/json", body.as_bytes())
}

fn write_response(
    stream: &mut TcpStream,
    status: u16,
    content_type: &str,
    body: &[u8],
) -> Result<()> {
    let status_line = match status {
        200 => "HTTP/1.1 200 OK",
        400 => "HTTP/1.1 400 Bad Request",
        404 => "HTTP/1.1 404 Not Found",
        405 => "HTTP/1.1 405 Method Not Allowed",
        413 => "HTTP/1.1 413 Payload Too Large",
        503 => "HTTP/1.1 503 Service Unavailable",
        _ => "HTTP/1.1 500 Internal Server Error",
    };
    let header = format!(
        "{status_line}\r\nContent-Type: {content_type}\r\nContent-Length: {len}\r\nCache-Control: no-store\r\n\r\n",
        status_line = status_line,
        content_type = content_type,
        len = body.len()
    );
    stream.write_all(header.as_bytes())?;
    stream.write_all(body)?;
    Ok(())
}

fn epoch_seconds() -> u64 {
    SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .map(|d| d.as_secs())
        .unwrap_or(0)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn data_url_prefix_is_stripped() {
        let img = image::RgbImage::from_pixel(4, 4, image::Rgb([100, 150, 200]));
        let mut png = Vec::new();
        img.write_to(
            &mut std::io::Cursor::new(&mut png),
            image::ImageFormat::Png,
        )
        .unwrap();
        let encoded = base64::engine::general_purpose::STANDARD.encode(&png);

        let bare = decode_image_payload(&encoded).unwrap();
        assert_eq!((bare.width, bare.height), (4, 4));

        let with_prefix =
            decode_image_payload(&format!("data:image/png;base64,{encoded}")).unwrap();
        assert_eq!((with_prefix.width, with_prefix.height), (4, 4));
    }

    #[test]
    fn garbage_payloads_are_rejected() {
        assert!(decode_image_payload("not base64 at all!!!").is_err());

        let valid_b64 = base64::engine::general_purpose::STANDARD.encode(b"but not an image");
        assert!(decode_image_payload(&valid_b64).is_err());
    }

    #[test]
    fn header_end_detection() {
        assert_eq!(find_header_end(b"GET / HTTP/1.1\r\n\r\nbody"), Some(14));
        assert_eq!(find_header_end(b"GET / HTTP/1.1\r\n"), None);
    }
}
