use image::imageops::FilterType;
use tflite::ops::builtin::BuiltinOpResolver;
use tflite::context::{ElementKind, TensorInfo};
use tflite::{FlatBufferModel, Interpreter, InterpreterBuilder};

use crate::app::config::PipelineConfig;
use crate::error::DetectError;
use crate::pipeline::{ClassId, Detection, Detections, Detector};
use crate::source::Frame;

/// YOLO detection head exported to TFLite: one float input `[1, H, W, 3]`
/// and one output holding `cx, cy, w, h` (normalized) plus a score per class,
/// laid out either `[1, 4 + nc, N]` or `[1, N, 4 + nc]`.
pub struct TFLiteDetector<'a> {
    interpreter: Interpreter<'a, BuiltinOpResolver>,
    input_width: u32,
    input_height: u32,
    min_score: f32,
    iou_threshold: f32,
}

impl<'a> TFLiteDetector<'a> {
    pub fn new(config: &PipelineConfig) -> Result<Self, DetectError> {
        tracing::info!(model = %config.model_filename, "loading detection model");
        let model = FlatBufferModel::build_from_file(&config.model_filename)?;
        let resolver = BuiltinOpResolver::default();
        let builder = InterpreterBuilder::new(model, resolver)?;
        let mut interpreter = builder.build()?;
        interpreter.allocate_tensors()?;
        interpreter.set_num_threads(config.num_threads as i32);

        let inputs = interpreter.get_input_details()?;
        let dims = inputs.first().map(|t| t.dims.clone()).unwrap_or_default();
        if inputs.len() != 1 || dims.len() != 4 || dims[3] != 3 {
            return Err(DetectError::TensorShape { tensor: "input", dims });
        }
        require_float("input", &inputs[0])?;
        let outputs = interpreter.get_output_details()?;
        let out_dims = outputs.first().map(|t| t.dims.clone()).unwrap_or_default();
        if outputs.len() != 1 || out_dims.len() != 3 || out_dims[1].min(out_dims[2]) <= 4 {
            return Err(DetectError::TensorShape { tensor: "output", dims: out_dims });
        }
        require_float("output", &outputs[0])?;
        tracing::debug!(input = ?dims, output = ?out_dims, "model tensors");

        Ok(Self {
            interpreter,
            input_width: dims[2] as u32,
            input_height: dims[1] as u32,
            min_score: config.min_score,
            iou_threshold: config.iou_threshold,
        })
    }

    fn load_input(&mut self, frame: &Frame) -> Result<(), DetectError> {
        let resized = image::imageops::resize(frame, self.input_width, self.input_height, FilterType::Triangle);
        let input_index = self.interpreter.inputs()[0];
        let input: &mut [f32] = self.interpreter.tensor_data_mut(input_index)?;
        for (dst, src) in input.iter_mut().zip(resized.as_raw()) {
            *dst = *src as f32 / 255.0;
        }
        Ok(())
    }
}

impl<'a> Detector for TFLiteDetector<'a> {
    fn infer(&mut self, frame: &Frame) -> Result<Detections, DetectError> {
        self.load_input(frame)?;
        self.interpreter.invoke()?;

        let output_index = self.interpreter.outputs()[0];
        let dims = self.interpreter.tensor_info(output_index).map(|t| t.dims).unwrap_or_default();
        let raw: &[f32] = self.interpreter.tensor_data(output_index)?;
        if dims.len() != 3 {
            return Err(DetectError::TensorShape { tensor: "output", dims });
        }

        let candidates = decode_candidates(
            raw,
            OutputLayout::from_dims(dims[1], dims[2]),
            self.min_score,
            frame.width() as f32,
            frame.height() as f32,
        );
        let dets = non_max_suppression(candidates, self.iou_threshold);
        for det in &dets {
            tracing::trace!(
                "det {} with score {} at {},{} - {},{}",
                det.class.label(),
                det.confidence,
                det.x1,
                det.y1,
                det.x2,
                det.y2
            );
        }
        Ok(dets)
    }
}

/// Quantized models are rejected up front: the detector reads and writes
/// tensors as `f32` only.
fn require_float(tensor: &'static str, info: &TensorInfo) -> Result<(), DetectError> {
    if info.element_kind == ElementKind::kTfLiteFloat32 {
        Ok(())
    } else {
        Err(DetectError::TensorType {
            tensor,
            kind: format!("{:?}", info.element_kind),
        })
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct OutputLayout {
    pub attrs: usize,
    pub count: usize,
    pub channels_first: bool,
}

impl OutputLayout {
    /// The candidate axis is always the longer of the two trailing dimensions.
    pub fn from_dims(dim_a: usize, dim_b: usize) -> Self {
        if dim_a < dim_b {
            Self { attrs: dim_a, count: dim_b, channels_first: true }
        } else {
            Self { attrs: dim_b, count: dim_a, channels_first: false }
        }
    }

    fn index(&self, attr: usize, candidate: usize) -> usize {
        if self.channels_first {
            attr * self.count + candidate
        } else {
            candidate * self.attrs + attr
        }
    }
}

/// Reads raw candidates of `[cx, cy, w, h, score_0 .. score_n]` and keeps the
/// best class of each one scoring at least `min_score`.
pub fn decode_candidates(
    raw: &[f32],
    layout: OutputLayout,
    min_score: f32,
    frame_width: f32,
    frame_height: f32,
) -> Detections {
    let at = |attr: usize, i: usize| -> f32 { raw.get(layout.index(attr, i)).copied().unwrap_or(0.0) };
    let count = layout.count;
    let attrs = layout.attrs;

    let mut dets = Detections::new();
    for i in 0..count {
        let mut best_class = 0;
        let mut best_score = f32::MIN;
        for class in 0..attrs.saturating_sub(4) {
            let score = at(4 + class, i);
            if score > best_score {
                best_score = score;
                best_class = class;
            }
        }
        if best_score < min_score {
            continue;
        }
        let (cx, cy, w, h) = (at(0, i), at(1, i), at(2, i), at(3, i));
        dets.push(Detection {
            x1: ((cx - w / 2.0) * frame_width).clamp(0.0, frame_width),
            y1: ((cy - h / 2.0) * frame_height).clamp(0.0, frame_height),
            x2: ((cx + w / 2.0) * frame_width).clamp(0.0, frame_width),
            y2: ((cy + h / 2.0) * frame_height).clamp(0.0, frame_height),
            confidence: best_score,
            class: ClassId::from_index(best_class as u32),
        });
    }
    dets
}

fn iou(a: &Detection, b: &Detection) -> f32 {
    let w = (a.x2.min(b.x2) - a.x1.max(b.x1)).max(0.0);
    let h = (a.y2.min(b.y2) - a.y1.max(b.y1)).max(0.0);
    let inter = w * h;
    let union = (a.x2 - a.x1) * (a.y2 - a.y1) + (b.x2 - b.x1) * (b.y2 - b.y1) - inter;
    if union <= 0.0 {
        0.0
    } else {
        inter / union
    }
}

/// Class-aware greedy suppression, highest confidence first.
pub fn non_max_suppression(mut dets: Detections, iou_threshold: f32) -> Detections {
    dets.sort_by(|a, b| b.confidence.total_cmp(&a.confidence));
    let mut kept = Detections::new();
    for det in dets {
        let overlaps = kept
            .iter()
            .any(|k| k.class == det.class && iou(k, &det) > iou_threshold);
        if !overlaps {
            kept.push(det);
        }
    }
    kept
}
