//! Clip regions as lists of disjoint integer rectangles

use crate::geometry::IntRect;
use smallvec::SmallVec;

/// Ordered list of disjoint rectangles
///
/// An empty list is an empty clip (nothing is visible). "No clip" is expressed
/// by the absence of a region (`Option<ClipRegion>::None`), never by an empty one.
#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct ClipRegion {
    rects: SmallVec<[IntRect; 4]>,
}

impl ClipRegion {
    pub fn empty() -> Self {
        Self::default()
    }

    pub fn from_rect(rect: IntRect) -> Self {
        let mut region = Self::empty();
        if !rect.is_empty() {
            region.rects.push(rect);
        }
        region
    }

    /// Union of possibly overlapping rectangles, stored disjoint
    pub fn from_rects(rects: impl IntoIterator<Item = IntRect>) -> Self {
        let mut region = Self::empty();
        for rect in rects {
            region.add(rect);
        }
        region
    }

    fn add(&mut self, rect: IntRect) {
        let mut pieces: SmallVec<[IntRect; 4]> = SmallVec::new();
        if !rect.is_empty() {
            pieces.push(rect);
        }
        for existing in &self.rects {
            pieces = pieces
                .into_iter()
                .flat_map(|piece| subtract(&piece, existing))
                .collect();
        }
        self.rects.extend(pieces);
    }

    pub fn rects(&self) -> &[IntRect] {
        &self.rects
    }

    pub fn len(&self) -> usize {
        self.rects.len()
    }

    pub fn is_empty(&self) -> bool {
        self.rects.is_empty()
    }

    pub fn bounds(&self) -> Option<IntRect> {
        self.rects.iter().copied().reduce(|a, b| a.union(&b))
    }

    pub fn contains(&self, x: i32, y: i32) -> bool {
        self.rects.iter().any(|r| r.contains(x, y))
    }

    pub fn intersect_rect(&self, rect: &IntRect) -> ClipRegion {
        ClipRegion {
            rects: self.rects.iter().filter_map(|r| r.intersect(rect)).collect(),
        }
    }

    pub fn translate(&self, dx: i32, dy: i32) -> ClipRegion {
        ClipRegion {
            rects: self.rects.iter().map(|r| r.translate(dx, dy)).collect(),
        }
    }
}

/// Parts of `a` not covered by `b`
fn subtract(a: &IntRect, b: &IntRect) -> SmallVec<[IntRect; 4]> {
    let mut out = SmallVec::new();
    let Some(overlap) = a.intersect(b) else {
        out.push(*a);
        return out;
    };
    // bands above and below the overlap span the full width of `a`
    if overlap.y > a.y {
        out.push(IntRect::new(a.x, a.y, a.width, overlap.y - a.y));
    }
    if overlap.max_y() < a.max_y() {
        out.push(IntRect::new(a.x, overlap.max_y(), a.width, a.max_y() - overlap.max_y()));
    }
    if overlap.x > a.x {
        out.push(IntRect::new(a.x, overlap.y, overlap.x - a.x, overlap.height));
    }
    if overlap.max_x() < a.max_x() {
        out.push(IntRect::new(
            overlap.max_x(),
            overlap.y,
            a.max_x() - overlap.max_x(),
            overlap.height,
        ));
    }
    out
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_overlapping_rects_become_disjoint() {
        let region = ClipRegion::from_rects([IntRect::new(0, 0, 10, 10), IntRect::new(5, 5, 10, 10)]);
        let area: i64 = region.rects().iter().map(IntRect::area).sum();
        assert_eq!(area, 100 + 100 - 25);
        for (i, a) in region.rects().iter().enumerate() {
            for b in &region.rects()[i + 1..] {
                assert!(a.intersect(b).is_none());
            }
        }
    }

    #[test]
    fn test_intersect_can_empty_region() {
        let region = ClipRegion::from_rect(IntRect::new(0, 0, 10, 10));
        let clipped = region.intersect_rect(&IntRect::new(20, 20, 5, 5));
        assert!(clipped.is_empty());
        assert_eq!(clipped.bounds(), None);
    }

    #[test]
    fn test_translate() {
        let region = ClipRegion::from_rect(IntRect::new(1, 2, 3, 4)).translate(10, -2);
        assert_eq!(region.rects(), &[IntRect::new(11, 0, 3, 4)]);
    }
}
