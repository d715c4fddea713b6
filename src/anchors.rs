// src/anchors.rs
//
// The detection head flattens its three pyramid levels into one row-major
// tensor: all stride-8 cells first, then stride-16, then stride-32. This
// iterator recovers the (grid_x, grid_y, stride) of each linear row index
// lazily, so the mapping is testable apart from the decode math.

/// Downsampling factors of the pyramid levels, in tensor order.
pub const STRIDES: [u32; 3] = [8, 16, 32];

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Anchor {
    pub grid_x: u32,
    pub grid_y: u32,
    pub stride: u32,
}

impl Anchor {
    /// Anchor center in network-input pixels.
    pub fn center(&self) -> (f32, f32) {
        (
            (self.grid_x as f32 + 0.5) * self.stride as f32,
            (self.grid_y as f32 + 0.5) * self.stride as f32,
        )
    }
}

/// Cells per level side for a given input resolution.
fn level_side(target: u32, stride: u32) -> u32 {
    (target as f32 / stride as f32).round() as u32
}

/// Total rows the head emits for a given input resolution.
pub fn anchor_count(target: u32) -> usize {
    STRIDES
        .iter()
        .map(|&s| {
            let side = level_side(target, s) as usize;
            side * side
        })
        .sum()
}

/// Lazy iterator over every anchor of the pyramid, in tensor row order.
pub struct AnchorPoints {
    target: u32,
    level: usize,
    side: u32,
    index: u32,
}

impl AnchorPoints {
    pub fn new(target: u32) -> Self {
        Self {
            target,
            level: 0,
            side: level_side(target, STRIDES[0]),
            index: 0,
        }
    }
}

impl Iterator for AnchorPoints {
    type Item = Anchor;

    fn next(&mut self) -> Option<Anchor> {
        while self.index >= self.side * self.side {
            self.level += 1;
            if self.level >= STRIDES.len() {
                return None;
            }
            self.side = level_side(self.target, STRIDES[self.level]);
            self.index = 0;
        }

        let stride = STRIDES[self.level];
        let anchor = Anchor {
            grid_x: self.index % self.side,
            grid_y: self.index / self.side,
            stride,
        };
        self.index += 1;
        Some(anchor)
    }
}
