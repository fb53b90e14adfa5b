//! Integer rectangles, and the grid policy used to coalesce dirty regions into
//! a small number of disjoint, cache-friendly pieces.

/// An axis-aligned rectangle in canvas units. Empty if either dimension is not positive.
#[derive(Copy, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Debug, Default)]
pub struct Rect {
    pub x: i32,
    pub y: i32,
    pub width: i32,
    pub height: i32,
}
impl Rect {
    #[must_use]
    pub const fn new(x: i32, y: i32, width: i32, height: i32) -> Self {
        Self {
            x,
            y,
            width,
            height,
        }
    }
    /// Construct from inclusive-exclusive corners.
    #[must_use]
    pub fn from_corners(left: i32, top: i32, right: i32, bottom: i32) -> Self {
        Self::new(left, top, right.saturating_sub(left), bottom.saturating_sub(top))
    }
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.width <= 0 || self.height <= 0
    }
    /// Exclusive right edge, saturated at `i32::MAX`.
    #[must_use]
    pub fn right(&self) -> i32 {
        self.x.saturating_add(self.width)
    }
    /// Exclusive bottom edge, saturated at `i32::MAX`.
    #[must_use]
    pub fn bottom(&self) -> i32 {
        self.y.saturating_add(self.height)
    }
    /// Overlapping area, or None if they don't overlap.
    #[must_use]
    pub fn intersect(&self, other: &Self) -> Option<Self> {
        let rect = Self::from_corners(
            self.x.max(other.x),
            self.y.max(other.y),
            self.right().min(other.right()),
            self.bottom().min(other.bottom()),
        );
        (!rect.is_empty()).then_some(rect)
    }
    /// Smallest rect containing both. Empty rects are ignored.
    #[must_use]
    pub fn bounding(&self, other: &Self) -> Self {
        match (self.is_empty(), other.is_empty()) {
            (true, _) => *other,
            (_, true) => *self,
            _ => Self::from_corners(
                self.x.min(other.x),
                self.y.min(other.y),
                self.right().max(other.right()),
                self.bottom().max(other.bottom()),
            ),
        }
    }
    #[must_use]
    pub fn contains(&self, other: &Self) -> bool {
        other.is_empty()
            || (self.x <= other.x
                && self.y <= other.y
                && self.right() >= other.right()
                && self.bottom() >= other.bottom())
    }
    /// Area in square units.
    #[must_use]
    pub fn area(&self) -> i64 {
        if self.is_empty() {
            0
        } else {
            i64::from(self.width) * i64::from(self.height)
        }
    }
}

/// How regions are snapped and chopped.
#[derive(Copy, Clone, PartialEq, Eq, Debug)]
pub struct GridPolicy {
    /// Side length of a grid cell. Every coalesced piece is aligned to this grid.
    pub cell_size: i32,
    /// Longest side of a UI patch, in cells.
    pub max_patch_cells: i32,
}
impl Default for GridPolicy {
    fn default() -> Self {
        Self {
            cell_size: 64,
            max_patch_cells: 4,
        }
    }
}
impl GridPolicy {
    /// Cover the union of `rects` with disjoint, grid-aligned rectangles.
    ///
    /// The result depends only on the *set* of cells touched, so any permutation of the input
    /// yields the same, sorted output. Cost grows with the number of rects, not their area.
    #[must_use]
    pub fn cover<I>(&self, rects: I) -> Vec<Rect>
    where
        I: IntoIterator<Item = Rect>,
    {
        let cell = i64::from(self.cell_size.max(1));
        // Touched cells of each rect as half-open (rows, cols) spans. i64, so edges can't overflow.
        let spans: Vec<((i64, i64), (i64, i64))> = rects
            .into_iter()
            .filter(|rect| !rect.is_empty())
            .map(|rect| {
                let (x, y) = (i64::from(rect.x), i64::from(rect.y));
                let right = x + i64::from(rect.width);
                let bottom = y + i64::from(rect.height);
                (
                    (y.div_euclid(cell), (bottom - 1).div_euclid(cell) + 1),
                    (x.div_euclid(cell), (right - 1).div_euclid(cell) + 1),
                )
            })
            .collect();

        // Rows at which the set of overlapping spans may change.
        let mut edges: Vec<i64> = spans
            .iter()
            .flat_map(|&((top, bottom), _)| [top, bottom])
            .collect();
        edges.sort_unstable();
        edges.dedup();

        // Stack column runs that are identical in adjacent bands.
        // (first col, end col) -> index into `merged` of the piece still open for growth.
        let mut open = hashbrown::HashMap::<(i64, i64), usize>::new();
        // (first row, end row, first col, end col)
        let mut merged = Vec::<(i64, i64, i64, i64)>::new();
        for band in edges.windows(2) {
            let (top, bottom) = (band[0], band[1]);
            let mut cols: Vec<(i64, i64)> = spans
                .iter()
                .filter(|((first, end), _)| *first <= top && bottom <= *end)
                .map(|&(_, cols)| cols)
                .collect();
            cols.sort_unstable();
            let mut runs = Vec::<(i64, i64)>::new();
            for (start, end) in cols {
                match runs.last_mut() {
                    Some((_, run_end)) if start <= *run_end => *run_end = (*run_end).max(end),
                    _ => runs.push((start, end)),
                }
            }
            for (start, end) in runs {
                match open.get(&(start, end)).copied() {
                    Some(idx) if merged[idx].1 == top => merged[idx].1 = bottom,
                    _ => {
                        open.insert((start, end), merged.len());
                        merged.push((top, bottom, start, end));
                    }
                }
            }
        }

        let to_units = |cells: i64| saturate(cells * cell);
        let mut pieces: Vec<Rect> = merged
            .into_iter()
            .map(|(top, bottom, left, right)| {
                Rect::from_corners(
                    to_units(left),
                    to_units(top),
                    to_units(right),
                    to_units(bottom),
                )
            })
            .filter(|piece| !piece.is_empty())
            .collect();
        pieces.sort_unstable();
        pieces
    }
    /// Cover the union of `rects`, clipped to `bounds`, with patches no larger than
    /// `max_patch_cells` cells on a side.
    #[must_use]
    pub fn patches<I>(&self, rects: I, bounds: Rect) -> Vec<Rect>
    where
        I: IntoIterator<Item = Rect>,
    {
        let cell = self.cell_size.max(1);
        let max_side = cell.saturating_mul(self.max_patch_cells.max(1));
        let clipped = rects.into_iter().filter_map(|rect| rect.intersect(&bounds));

        let mut patches = Vec::new();
        for piece in self.cover(clipped) {
            // Pieces are grid aligned, so chopping at multiples of `max_side` from
            // the piece origin keeps every patch aligned too.
            let mut y = piece.y;
            while y < piece.bottom() {
                let bottom = y.saturating_add(max_side).min(piece.bottom());
                let mut x = piece.x;
                while x < piece.right() {
                    let right = x.saturating_add(max_side).min(piece.right());
                    if let Some(patch) = Rect::from_corners(x, y, right, bottom).intersect(&bounds)
                    {
                        patches.push(patch);
                    }
                    x = right;
                }
                y = bottom;
            }
        }
        patches
    }
}

fn saturate(value: i64) -> i32 {
    i32::try_from(value).unwrap_or(if value < 0 { i32::MIN } else { i32::MAX })
}

#[cfg(test)]
mod test {
    use super::{GridPolicy, Rect};

    #[test]
    fn intersect_and_bounding() {
        let a = Rect::new(0, 0, 10, 10);
        let b = Rect::new(5, 5, 10, 10);
        assert_eq!(a.intersect(&b), Some(Rect::new(5, 5, 5, 5)));
        assert_eq!(a.bounding(&b), Rect::new(0, 0, 15, 15));
        assert_eq!(a.intersect(&Rect::new(10, 0, 5, 5)), None);
        // Empties are ignored by bounding
        assert_eq!(a.bounding(&Rect::default()), a);
    }
    #[test]
    fn cover_snaps_to_grid() {
        let policy = GridPolicy::default();
        let cover = policy.cover([Rect::new(3, 3, 10, 10)]);
        assert_eq!(cover, vec![Rect::new(0, 0, 64, 64)]);
    }
    #[test]
    fn cover_merges_overlaps() {
        let policy = GridPolicy::default();
        // Three overlapping requests within two horizontally adjacent cells.
        let cover = policy.cover([
            Rect::new(10, 10, 20, 20),
            Rect::new(20, 20, 60, 10),
            Rect::new(70, 5, 5, 5),
        ]);
        assert_eq!(cover, vec![Rect::new(0, 0, 128, 64)]);
    }
    #[test]
    fn cover_is_disjoint() {
        let policy = GridPolicy::default();
        // L shape: two cells on top, one below-left.
        let cover = policy.cover([Rect::new(0, 0, 128, 64), Rect::new(0, 64, 64, 64)]);
        assert_eq!(cover.len(), 2);
        for (i, a) in cover.iter().enumerate() {
            for b in &cover[i + 1..] {
                assert_eq!(a.intersect(b), None);
            }
        }
        let area: i64 = cover.iter().map(Rect::area).sum();
        assert_eq!(area, 3 * 64 * 64);
    }
    #[test]
    fn cover_order_independent() {
        let policy = GridPolicy::default();
        let rects = [
            Rect::new(-30, 5, 100, 10),
            Rect::new(200, 200, 5, 90),
            Rect::new(60, 60, 10, 10),
            Rect::new(0, 100, 300, 3),
        ];
        let forward = policy.cover(rects);
        let mut reversed = rects;
        reversed.reverse();
        assert_eq!(forward, policy.cover(reversed));
        let mut rotated = rects;
        rotated.rotate_left(1);
        assert_eq!(forward, policy.cover(rotated));
    }
    #[test]
    fn cover_near_the_edge_of_the_plane() {
        let policy = GridPolicy::default();
        let cover = policy.cover([Rect::new(i32::MAX - 10, 0, 100, 10)]);
        assert_eq!(cover.len(), 1);
        assert_eq!(cover[0].right(), i32::MAX);
        assert_eq!(cover[0].y, 0);
        assert!(cover[0].x <= i32::MAX - 10);

        let cover = policy.cover([Rect::new(i32::MIN, i32::MIN, 10, 10)]);
        assert_eq!(cover, vec![Rect::new(i32::MIN, i32::MIN, 64, 64)]);
    }
    #[test]
    fn cover_of_huge_rects_is_cheap() {
        let policy = GridPolicy::default();
        // Millions of cells, one piece.
        let cover = policy.cover([
            Rect::new(0, 0, 200_000, 200_000),
            Rect::new(100, 100, 50_000, 50_000),
        ]);
        assert_eq!(cover, vec![Rect::new(0, 0, 200_000, 200_000)]);
    }
    #[test]
    fn patches_are_bounded_and_clipped() {
        let policy = GridPolicy {
            cell_size: 64,
            max_patch_cells: 2,
        };
        let bounds = Rect::new(0, 0, 300, 100);
        let patches = policy.patches([Rect::new(-50, -50, 1000, 1000)], bounds);
        for patch in &patches {
            assert!(bounds.contains(patch));
            assert!(patch.width <= 128 && patch.height <= 128);
        }
        let area: i64 = patches.iter().map(Rect::area).sum();
        assert_eq!(area, bounds.area());
    }
    #[test]
    fn patches_of_nothing() {
        let policy = GridPolicy::default();
        assert!(policy
            .patches([Rect::new(500, 500, 5, 5)], Rect::new(0, 0, 100, 100))
            .is_empty());
    }
}
