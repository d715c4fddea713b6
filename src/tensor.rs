// src/tensor.rs
//
// Tensor carriers at the inference boundary. Shape inspection of model
// output happens here and nowhere else.

use crate::anchors;
use anyhow::{ensure, Result};

/// Network input: channel-first normalized floats, shape [1, 3, size, size].
#[derive(Debug, Clone)]
pub struct InputTensor {
    pub data: Vec<f32>,
    pub dims: [usize; 4],
}

impl InputTensor {
    pub fn new(data: Vec<f32>, size: u32) -> Self {
        let size = size as usize;
        debug_assert_eq!(data.len(), 3 * size * size);
        Self {
            data,
            dims: [1, 3, size, size],
        }
    }
}

/// Raw model output: a flat buffer plus the shape the runtime reported.
#[derive(Debug, Clone)]
pub struct OutputTensor {
    pub data: Vec<f32>,
    pub dims: Vec<usize>,
}

impl OutputTensor {
    pub fn new(data: Vec<f32>, dims: Vec<usize>) -> Self {
        Self { data, dims }
    }

    /// Validate the shape against the head layout and return
    /// (rows, row width). Leading singleton dims (batch) are ignored.
    pub fn validate_head(&self, target: u32, reg_max: usize) -> Result<(usize, usize)> {
        let expected_rows = anchors::anchor_count(target);
        let expected_width = 4 * reg_max + 1;

        let shape: Vec<usize> = self
            .dims
            .iter()
            .copied()
            .skip_while(|&d| d == 1)
            .collect();
        ensure!(
            shape == [expected_rows, expected_width],
            "unexpected output shape {:?}, expected [{}, {}] for input {} / reg_max {}",
            self.dims,
            expected_rows,
            expected_width,
            target,
            reg_max
        );
        ensure!(
            self.data.len() == expected_rows * expected_width,
            "output buffer holds {} values, shape implies {}",
            self.data.len(),
            expected_rows * expected_width
        );

        Ok((expected_rows, expected_width))
    }

    pub fn row(&self, index: usize, width: usize) -> &[f32] {
        &self.data[index * width..(index + 1) * width]
    }
}
