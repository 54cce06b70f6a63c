#![cfg(feature = "backend-tract")]

use std::path::Path;

use anyhow::{anyhow, Context, Result};
use tract_onnx::prelude::*;

use crate::detect::backend::DetectorBackend;
use crate::detect::result::{BoundingBox, RawDetection};

/// Tract-based backend for ONNX waste-detection models.
///
/// Expects a model exported with NMS baked in, producing a `[1, N, 6]`
/// tensor of `(x1, y1, x2, y2, confidence, class_index)` rows in input
/// pixel coordinates. The `iou` argument to `detect` is unused here: the
/// exported graph already suppressed overlaps.
pub struct TractBackend {
    model: TypedSimplePlan<TypedModel>,
    width: u32,
    height: u32,
    labels: Vec<String>,
}

impl TractBackend {
    /// Load an ONNX model from disk and prepare it for inference.
    pub fn new<P: AsRef<Path>>(
        model_path: P,
        width: u32,
        height: u32,
        labels: Vec<String>,
    ) -> Result<Self> {
        let model_path = model_path.as_ref();
        let model = tract_onnx::onnx()
            .model_for_path(model_path)
            .with_context(|| format!("failed to load ONNX model from {}", model_path.display()))?
            .with_input_fact(
                0,
                InferenceFact::dt_shape(
                    f32::datum_type(),
                    tvec!(1, 3, height as usize, width as usize),
                ),
            )
            .context("failed to set input fact")?
            .into_optimized()
            .context("failed to optimize ONNX model")?
            .into_runnable()
            .context("failed to build runnable ONNX model")?;

        Ok(Self {
            model,
            width,
            height,
            labels,
        })
    }

    fn build_input(&self, pixels: &[u8], width: u32, height: u32) -> Result<Tensor> {
        if width != self.width || height != self.height {
            return Err(anyhow!(
                "frame size {}x{} does not match model input {}x{}",
                width,
                height,
                self.width,
                self.height
            ));
        }

        let expected_len = (width as usize)
            .checked_mul(height as usize)
            .and_then(|v| v.checked_mul(3))
            .ok_or_else(|| anyhow!("frame dimensions overflow"))?;

        if pixels.len() != expected_len {
            return Err(anyhow!(
                "expected {} RGB bytes, received {}",
                expected_len,
                pixels.len()
            ));
        }

        let width = width as usize;
        let input = tract_ndarray::Array4::from_shape_fn(
            (1, 3, height as usize, width),
            |(_, channel, y, x)| {
                let idx = (y * width + x) * 3 + channel;
                pixels[idx] as f32 / 255.0
            },
        );

        Ok(input.into_tensor())
    }

    fn label_for(&self, class_index: f32) -> String {
        let idx = class_index.max(0.0) as usize;
        self.labels
            .get(idx)
            .cloned()
            .unwrap_or_else(|| format!("class_{idx}"))
    }

    fn extract_detections(&self, outputs: TVec<TValue>, conf_floor: f32) -> Result<Vec<RawDetection>> {
        let output = outputs
            .first()
            .ok_or_else(|| anyhow!("model produced no outputs"))?;
        let view = output
            .to_array_view::<f32>()
            .context("model output tensor was not f32")?;

        let mut detections = Vec::new();
        for row in view.rows() {
            if row.len() < 6 {
                return Err(anyhow!(
                    "detection row has {} columns, expected at least 6",
                    row.len()
                ));
            }
            let confidence = row[4];
            if !confidence.is_finite() || confidence < conf_floor {
                continue;
            }
            let bbox = BoundingBox::new(row[0], row[1], row[2], row[3]);
            detections.push(RawDetection::new(
                self.label_for(row[5]),
                confidence.clamp(0.0, 1.0),
                bbox,
            ));
        }
        Ok(detections)
    }
}

impl DetectorBackend for TractBackend {
    fn name(&self) -> &'static str {
        "tract"
    }

    fn labels(&self) -> Vec<String> {
        self.labels.clone()
    }

    fn detect(
        &mut self,
        pixels: &[u8],
        width: u32,
        height: u32,
        conf_floor: f32,
        _iou: f32,
    ) -> Result<Vec<RawDetection>> {
        let input = self.build_input(pixels, width, height)?;
        let outputs = self
            .model
            .run(tvec!(input.into()))
            .context("ONNX inference failed")?;
        self.extract_detections(outputs, conf_floor)
    }

    fn warm_up(&mut self) -> Result<()> {
        let blank = vec![0u8; (self.width * self.height * 3) as usize];
        self.detect(&blank, self.width, self.height, 1.0, 0.45)?;
        Ok(())
    }
}
