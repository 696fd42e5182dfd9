use super::{Point, Size};

/// Axis-aligned pixel rectangle (top-left origin, half-open on the max edge).
#[derive(Debug, Copy, Clone, Default, PartialEq, Eq, Hash)]
pub struct Rect {
    pub origin: Point,
    pub size: Size,
}

impl Rect {
    #[inline]
    pub const fn new(x: i32, y: i32, w: u32, h: u32) -> Self {
        Self {
            origin: Point::new(x, y),
            size: Size::new(w, h),
        }
    }

    #[inline]
    pub const fn from_origin_size(origin: Point, size: Size) -> Self {
        Self { origin, size }
    }

    /// Rect at the origin covering `size`.
    #[inline]
    pub const fn from_size(size: Size) -> Self {
        Self { origin: Point::zero(), size }
    }

    /// Builds a rect from min/max corners. Inverted corners give an empty rect.
    #[inline]
    pub fn from_min_max(min: Point, max: Point) -> Self {
        let w = (i64::from(max.x) - i64::from(min.x)).max(0) as u32;
        let h = (i64::from(max.y) - i64::from(min.y)).max(0) as u32;
        Rect::from_origin_size(min, Size::new(w, h))
    }

    #[inline]
    pub fn min(self) -> Point {
        self.origin
    }

    /// Exclusive max corner, clamped to `i32::MAX`.
    #[inline]
    pub fn max(self) -> Point {
        Point::new(
            self.origin.x.saturating_add_unsigned(self.size.width),
            self.origin.y.saturating_add_unsigned(self.size.height),
        )
    }

    #[inline]
    pub fn width(self) -> u32 {
        self.size.width
    }

    #[inline]
    pub fn height(self) -> u32 {
        self.size.height
    }

    #[inline]
    pub fn is_empty(self) -> bool {
        self.size.is_empty()
    }

    #[inline]
    pub fn translate(self, by: Point) -> Self {
        Rect::from_origin_size(self.origin + by, self.size)
    }

    /// Half-open containment: [min, max).
    #[inline]
    pub fn contains(self, p: Point) -> bool {
        let max = self.max();
        p.x >= self.origin.x && p.y >= self.origin.y && p.x < max.x && p.y < max.y
    }

    /// Returns the overlap, or `None` when the rects only touch or are disjoint.
    #[inline]
    pub fn intersect(self, other: Rect) -> Option<Rect> {
        let (a0, a1) = (self.min(), self.max());
        let (b0, b1) = (other.min(), other.max());

        let x0 = a0.x.max(b0.x);
        let y0 = a0.y.max(b0.y);
        let x1 = a1.x.min(b1.x);
        let y1 = a1.y.min(b1.y);

        if x1 <= x0 || y1 <= y0 {
            None
        } else {
            Some(Rect::from_min_max(Point::new(x0, y0), Point::new(x1, y1)))
        }
    }

    /// Smallest rect covering both. Empty operands are ignored.
    #[inline]
    pub fn union(self, other: Rect) -> Rect {
        if self.is_empty() {
            return other;
        }
        if other.is_empty() {
            return self;
        }
        let (a0, a1) = (self.min(), self.max());
        let (b0, b1) = (other.min(), other.max());
        Rect::from_min_max(
            Point::new(a0.x.min(b0.x), a0.y.min(b0.y)),
            Point::new(a1.x.max(b1.x), a1.y.max(b1.y)),
        )
    }
}
