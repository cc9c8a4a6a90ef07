//! Pixel → sample-slot aggregation shared by every render mode.
//!
//! The sample timeline is cut into `N` slots. Slot `i` reads `stride` pixels
//! starting at `floor(i * total / N)`, so the whole buffer is swept once from
//! the first sample to the last no matter how many pixels there are.

use crate::color::PixelBuffer;

/// Averages over one slot's pixel group.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Slot {
    /// Mean luma, 0–255.
    pub luma: f64,
    pub mean_x: f64,
    pub mean_y: f64,
    /// False when every pixel in the group was fully transparent.
    pub opaque: bool,
}

impl Slot {
    const SILENT: Slot = Slot {
        luma: 0.0,
        mean_x: 0.0,
        mean_y: 0.0,
        opaque: false,
    };

    pub fn luma_unit(&self) -> f64 {
        self.luma / 255.0
    }
}

/// Walks slots in order, reusing the previous result while consecutive slots
/// read the same pixel group.
pub struct SlotWalker<'a> {
    pixels: &'a PixelBuffer,
    total: usize,
    slots: usize,
    stride: usize,
    cached: Option<(usize, Slot)>,
}

impl<'a> SlotWalker<'a> {
    pub fn new(pixels: &'a PixelBuffer, slots: usize) -> Self {
        let total = pixels.len();
        let stride = (total / slots.max(1)).max(1);
        Self {
            pixels,
            total,
            slots: slots.max(1),
            stride,
            cached: None,
        }
    }

    pub fn stride(&self) -> usize {
        self.stride
    }

    /// First pixel index read by slot `i`.
    pub fn group_start(&self, i: usize) -> usize {
        ((i as u128 * self.total as u128) / self.slots as u128) as usize
    }

    /// Aggregate for slot `i`.
    pub fn slot(&mut self, i: usize) -> Slot {
        let start = self.group_start(i);
        if let Some((cached_start, slot)) = self.cached {
            if cached_start == start {
                return slot;
            }
        }
        let slot = self.aggregate(start);
        self.cached = Some((start, slot));
        slot
    }

    fn aggregate(&self, start: usize) -> Slot {
        let end = (start + self.stride).min(self.total);
        let mut luma = 0.0;
        let mut x = 0.0;
        let mut y = 0.0;
        let mut count = 0usize;

        for idx in start..end {
            let Some(px) = self.pixels.pixel_at_index(idx) else {
                break;
            };
            if px.is_transparent() {
                continue;
            }
            let (px_x, px_y) = px.position.unwrap_or((0, 0));
            luma += px.luma();
            x += px_x as f64;
            y += px_y as f64;
            count += 1;
        }

        if count == 0 {
            return Slot::SILENT;
        }
        let n = count as f64;
        Slot {
            luma: luma / n,
            mean_x: x / n,
            mean_y: y / n,
            opaque: true,
        }
    }
}
