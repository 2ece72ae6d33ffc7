//! Page geometry primitives: bounding boxes, glyphs, words and image placements.
//!
//! All coordinates use a top-left page origin, in PDF units (1/72 inch),
//! with `top < bottom` for any non-degenerate box.

use serde::{Deserialize, Serialize};

/// An axis-aligned rectangle in top-left page coordinates.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct BBox {
    /// Left edge
    pub x0: f32,
    /// Top edge
    pub top: f32,
    /// Right edge
    pub x1: f32,
    /// Bottom edge
    pub bottom: f32,
}

impl BBox {
    /// Create a new bounding box.
    pub fn new(x0: f32, top: f32, x1: f32, bottom: f32) -> Self {
        Self {
            x0,
            top,
            x1,
            bottom,
        }
    }

    /// Width of the box (may be negative for inverted boxes).
    pub fn width(&self) -> f32 {
        self.x1 - self.x0
    }

    /// Height of the box (may be negative for inverted boxes).
    pub fn height(&self) -> f32 {
        self.bottom - self.top
    }

    /// Whether the box has zero or negative area.
    pub fn is_degenerate(&self) -> bool {
        self.x1 <= self.x0 || self.bottom <= self.top
    }

    /// Smallest box containing both `self` and `other`.
    pub fn union(&self, other: &BBox) -> BBox {
        BBox {
            x0: self.x0.min(other.x0),
            top: self.top.min(other.top),
            x1: self.x1.max(other.x1),
            bottom: self.bottom.max(other.bottom),
        }
    }

    /// Clamp every edge into `[0, width] x [0, height]`.
    pub fn clip(&self, width: f32, height: f32) -> BBox {
        BBox {
            x0: self.x0.clamp(0.0, width),
            top: self.top.clamp(0.0, height),
            x1: self.x1.clamp(0.0, width),
            bottom: self.bottom.clamp(0.0, height),
        }
    }

    /// Whether the two boxes overlap with positive area.
    pub fn intersects(&self, other: &BBox) -> bool {
        self.x0 < other.x1 && other.x0 < self.x1 && self.top < other.bottom && other.top < self.bottom
    }

    /// Union envelope of a set of boxes, or `None` for an empty set.
    pub fn envelope<'a, I>(boxes: I) -> Option<BBox>
    where
        I: IntoIterator<Item = &'a BBox>,
    {
        boxes.into_iter().fold(None, |acc, b| match acc {
            None => Some(*b),
            Some(env) => Some(env.union(b)),
        })
    }
}

/// A single positioned character as reported by the glyph source.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Glyph {
    /// The character
    pub text: char,
    /// Left edge
    pub x0: f32,
    /// Right edge
    pub x1: f32,
    /// Top edge
    pub top: f32,
    /// Bottom edge (baseline side)
    pub bottom: f32,
    /// Effective font size in points
    pub size: f32,
}

impl Glyph {
    /// Create a new glyph.
    pub fn new(text: char, x0: f32, x1: f32, top: f32, bottom: f32, size: f32) -> Self {
        Self {
            text,
            x0,
            x1,
            top,
            bottom,
            size,
        }
    }

    /// The glyph's bounding box.
    pub fn bbox(&self) -> BBox {
        BBox::new(self.x0, self.top, self.x1, self.bottom)
    }

    /// Whether the glyph is whitespace.
    pub fn is_blank(&self) -> bool {
        self.text.is_whitespace()
    }
}

/// A whitespace-delimited word built from glyphs on one line.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Word {
    /// The word text
    pub text: String,
    /// Union bounding box of the word's glyphs
    pub bbox: BBox,
}

impl Word {
    /// Vertical top of the word.
    pub fn top(&self) -> f32 {
        self.bbox.top
    }

    /// Vertical bottom of the word.
    pub fn bottom(&self) -> f32 {
        self.bbox.bottom
    }
}

/// A raster image drawn on a page.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct ImagePlacement {
    /// Zero-based page index
    pub page_index: usize,
    /// Placement bounds, clipped to the page
    pub bbox: BBox,
}

impl ImagePlacement {
    /// Clip a raw placement to the page and drop it if nothing visible remains.
    pub fn clipped(page_index: usize, raw: BBox, page_width: f32, page_height: f32) -> Option<Self> {
        let bbox = raw.clip(page_width, page_height);
        if bbox.is_degenerate() {
            return None;
        }
        Some(Self { page_index, bbox })
    }

    /// Vertical top of the placement.
    pub fn top(&self) -> f32 {
        self.bbox.top
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_bbox_union_and_envelope() {
        let a = BBox::new(10.0, 20.0, 50.0, 60.0);
        let b = BBox::new(30.0, 5.0, 80.0, 40.0);
        assert_eq!(a.union(&b), BBox::new(10.0, 5.0, 80.0, 60.0));

        let env = BBox::envelope([a, b].iter()).unwrap();
        assert_eq!(env, BBox::new(10.0, 5.0, 80.0, 60.0));
        assert!(BBox::envelope(std::iter::empty()).is_none());
    }

    #[test]
    fn test_bbox_intersects() {
        let a = BBox::new(0.0, 0.0, 10.0, 10.0);
        assert!(a.intersects(&BBox::new(5.0, 5.0, 15.0, 15.0)));
        assert!(!a.intersects(&BBox::new(10.0, 0.0, 20.0, 10.0)));
    }

    #[test]
    fn test_image_placement_clipping() {
        let placement =
            ImagePlacement::clipped(0, BBox::new(-10.0, 700.0, 100.0, 900.0), 612.0, 792.0)
                .unwrap();
        assert_eq!(placement.bbox, BBox::new(0.0, 700.0, 100.0, 792.0));
    }

    #[test]
    fn test_image_placement_degenerate_discarded() {
        // Entirely off-page collapses to zero width
        assert!(
            ImagePlacement::clipped(0, BBox::new(700.0, 10.0, 800.0, 50.0), 612.0, 792.0).is_none()
        );
        // Zero height
        assert!(
            ImagePlacement::clipped(0, BBox::new(10.0, 50.0, 20.0, 50.0), 612.0, 792.0).is_none()
        );
    }
}
