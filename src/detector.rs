// src/detector.rs

use crate::fusion;
use crate::inference::InferenceSession;
use crate::letterbox::Letterbox;
use crate::postprocess;
use crate::preprocessing;
use crate::types::{Config, FaceBox, Frame};
use anyhow::Result;
use tracing::debug;

/// Full detection pipeline: letterbox geometry, preprocessing, one or two
/// inference passes, decode, and fusion.
pub struct FaceDetector<S: InferenceSession> {
    session: S,
    config: Config,
}

impl<S: InferenceSession> FaceDetector<S> {
    pub fn new(session: S, config: Config) -> Self {
        Self { session, config }
    }

    pub fn config(&self) -> &Config {
        &self.config
    }

    /// Detect faces in an RGBA frame, returning boxes in original-image
    /// pixel coordinates ordered by descending score.
    ///
    /// With `tta_flip` enabled a second pass runs on the mirrored frame;
    /// the passes are awaited jointly and fused afterwards. Inference
    /// failures from either pass propagate unchanged.
    pub async fn detect_faces(&self, frame: &Frame, score_threshold: f32) -> Result<Vec<FaceBox>> {
        let detection = &self.config.detection;
        let letterbox = Letterbox::compute(
            frame.width,
            frame.height,
            self.config.model.input_size,
            detection.pad_small_side,
            detection.pad_large_side,
        )?;

        let input = preprocessing::letterbox_to_tensor(frame, &letterbox)?;

        let candidates = if detection.tta_flip {
            let mirrored = preprocessing::flip_horizontal(frame);
            let mirrored_input = preprocessing::letterbox_to_tensor(&mirrored, &letterbox)?;

            let (normal_out, mirrored_out) =
                tokio::try_join!(self.session.run(input), self.session.run(mirrored_input))?;

            let mut candidates = postprocess::decode_pass(
                &normal_out,
                &letterbox,
                frame.width,
                frame.height,
                score_threshold,
                &self.config,
                false,
            )?;
            candidates.extend(postprocess::decode_pass(
                &mirrored_out,
                &letterbox,
                frame.width,
                frame.height,
                score_threshold,
                &self.config,
                true,
            )?);
            candidates
        } else {
            let output = self.session.run(input).await?;
            postprocess::decode_pass(
                &output,
                &letterbox,
                frame.width,
                frame.height,
                score_threshold,
                &self.config,
                false,
            )?
        };

        let faces = fusion::fuse(candidates, detection.iou_threshold);
        debug!(
            "{} face(s) in {}x{} frame",
            faces.len(),
            frame.width,
            frame.height
        );
        Ok(faces)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::tensor::{InputTensor, OutputTensor};
    use crate::types::{DetectionConfig, ModelConfig};
    use std::future::Future;

    /// Returns one canned tensor for the normal pass and another for the
    /// mirrored pass, matched by input contents.
    struct MockSession {
        normal_input: Vec<f32>,
        normal_output: OutputTensor,
        mirrored_output: OutputTensor,
    }

    impl InferenceSession for MockSession {
        fn run(&self, input: InputTensor) -> impl Future<Output = Result<OutputTensor>> + Send {
            let output = if input.data == self.normal_input {
                self.normal_output.clone()
            } else {
                self.mirrored_output.clone()
            };
            async move { Ok(output) }
        }
    }

    struct FailingSession;

    impl InferenceSession for FailingSession {
        fn run(&self, _input: InputTensor) -> impl Future<Output = Result<OutputTensor>> + Send {
            async { Err(anyhow::anyhow!("inference backend unavailable")) }
        }
    }

    fn gradient_frame(width: u32, height: u32) -> Frame {
        let mut data = Vec::with_capacity((width * height * 4) as usize);
        for y in 0..height {
            for x in 0..width {
                data.extend_from_slice(&[(x % 256) as u8, (y % 256) as u8, 64, 255]);
            }
        }
        Frame::new(data, width, height)
    }

    fn small_config(tta: bool) -> Config {
        Config {
            model: ModelConfig {
                reg_max: 4,
                input_size: 32,
                ..Default::default()
            },
            detection: DetectionConfig {
                tta_flip: tta,
                ..Default::default()
            },
            ..Default::default()
        }
    }

    /// All score logits strongly negative; `width` columns per row.
    fn quiet_tensor(rows: usize, width: usize) -> Vec<f32> {
        let mut data = vec![0.0f32; rows * width];
        for row in 0..rows {
            data[row * width + width - 1] = -10.0;
        }
        data
    }

    /// Write one-hot side distributions and a score logit into `row`.
    fn activate(
        data: &mut [f32],
        width: usize,
        reg_max: usize,
        row: usize,
        bins: [usize; 4],
        score_logit: f32,
    ) {
        let base = row * width;
        for (side, &bin) in bins.iter().enumerate() {
            data[base + side * reg_max + bin] = 8.0;
        }
        data[base + width - 1] = score_logit;
    }

    #[tokio::test]
    async fn test_quiet_model_yields_no_faces() {
        let config = small_config(false);
        let frame = gradient_frame(32, 32);
        let session = MockSession {
            normal_input: Vec::new(),
            normal_output: OutputTensor::new(quiet_tensor(21, 17), vec![1, 21, 17]),
            mirrored_output: OutputTensor::new(quiet_tensor(21, 17), vec![1, 21, 17]),
        };

        let faces = FaceDetector::new(session, config)
            .detect_faces(&frame, 0.5)
            .await
            .unwrap();
        assert!(faces.is_empty());
    }

    #[tokio::test]
    async fn test_inference_failure_propagates() {
        let config = small_config(false);
        let frame = gradient_frame(32, 32);

        let result = FaceDetector::new(FailingSession, config)
            .detect_faces(&frame, 0.5)
            .await;
        let err = result.unwrap_err();
        assert!(err.to_string().contains("inference backend unavailable"));
    }

    #[tokio::test]
    async fn test_single_pass_deduplicates_adjacent_cells() {
        let config = small_config(false);
        let frame = gradient_frame(32, 32);

        // Two neighboring stride-8 cells predicting the same face.
        let mut data = quiet_tensor(21, 17);
        activate(&mut data, 17, 4, 0, [1, 1, 2, 1], 5.0);
        activate(&mut data, 17, 4, 1, [1, 1, 2, 1], 4.0);
        let tensor = OutputTensor::new(data, vec![1, 21, 17]);

        let session = MockSession {
            normal_input: Vec::new(),
            normal_output: tensor.clone(),
            mirrored_output: tensor,
        };

        let faces = FaceDetector::new(session, config)
            .detect_faces(&frame, 0.5)
            .await
            .unwrap();
        assert_eq!(faces.len(), 1);
    }

    #[tokio::test]
    async fn test_tta_passes_fuse_into_final_list() {
        // 400x200 photo at network input 640: scale 1.6, pad_y 160.
        let mut config = small_config(true);
        config.model.reg_max = 16;
        config.model.input_size = 640;

        let frame = gradient_frame(400, 200);
        let letterbox = Letterbox::compute(400, 200, 640, 0.0, 0.0).unwrap();
        let normal_input = preprocessing::letterbox_to_tensor(&frame, &letterbox).unwrap();

        let width = 4 * 16 + 1;

        // Normal pass: a face near the left edge (stride-8 cell (8, 40))
        // and a face right of center (stride-16 cell (18, 19)).
        let mut normal = quiet_tensor(8400, width);
        activate(&mut normal, width, 16, 40 * 80 + 8, [0, 2, 4, 2], 4.0);
        activate(&mut normal, width, 16, 6400 + 19 * 40 + 18, [1, 2, 3, 2], 3.0);

        // Mirrored pass re-detects the left-edge face (stride-8 cell
        // (69, 40) mirrors onto it).
        let mut mirrored = quiet_tensor(8400, width);
        activate(&mut mirrored, width, 16, 40 * 80 + 69, [2, 2, 2, 2], 2.0);

        let session = MockSession {
            normal_input: normal_input.data,
            normal_output: OutputTensor::new(normal, vec![1, 8400, width]),
            mirrored_output: OutputTensor::new(mirrored, vec![1, 8400, width]),
        };

        let faces = FaceDetector::new(session, config)
            .detect_faces(&frame, 0.5)
            .await
            .unwrap();

        assert_eq!(faces.len(), 2);
        let left = faces
            .iter()
            .find(|f| f.x > 30.0 && f.x < 60.0)
            .expect("left-edge face missing");
        let right = faces
            .iter()
            .find(|f| f.x > 150.0 && f.x < 270.0)
            .expect("center-right face missing");

        // The mirrored detection collapsed into the left face rather than
        // surviving as a third box; the seed score wins.
        assert!(left.score > 0.98);
        assert!(right.score > 0.94);
        assert!(faces[0].score >= faces[1].score);
    }
}
