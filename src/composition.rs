use std::sync::Arc;

use crate::primitive::{Primitive, Shape};

// arc wrapper enables copy-on-write: cloning a composition only copies pointers,
// not whole primitives. a replacement swaps one Arc, the rest stay shared.
/// ordered, accepted primitives painted back-to-front. only ever appended to
/// or replaced at an index; never partially edited.
#[derive(Clone, Debug, Default, PartialEq)]
pub struct Composition {
    pub width: u32,
    pub height: u32,
    primitives: Vec<Arc<Primitive>>,
}

impl Composition {
    pub fn new_blank(width: u32, height: u32) -> Self {
        profiling::scope!("Composition::new_blank");
        Self { width, height, primitives: Vec::new() }
    }

    #[inline]
    pub fn len(&self) -> usize {
        self.primitives.len()
    }

    #[inline]
    pub fn is_empty(&self) -> bool {
        self.primitives.is_empty()
    }

    #[inline]
    pub fn get(&self, idx: usize) -> Option<&Primitive> {
        self.primitives.get(idx).map(|p| p.as_ref())
    }

    /// back-to-front iteration (paint order)
    pub fn iter(&self) -> impl Iterator<Item = &Primitive> {
        self.primitives.iter().map(|p| p.as_ref())
    }

    /// a copy with `primitive` painted on top
    pub fn with_appended(&self, primitive: Primitive) -> Composition {
        let mut next = self.clone();
        next.primitives.push(Arc::new(primitive));
        next
    }

    /// a copy with the primitive at `idx` replaced (z-order kept).
    /// None if `idx` is out of range.
    pub fn with_replaced(&self, idx: usize, primitive: Primitive) -> Option<Composition> {
        if idx >= self.primitives.len() {
            return None;
        }
        let mut next = self.clone();
        next.primitives[idx] = Arc::new(primitive);
        Some(next)
    }

    /// opaque full-canvas rectangle, used to seed a run with the dominant color
    pub fn background(width: u32, height: u32, rgb: [u8; 3]) -> Primitive {
        Primitive::new(
            Shape::Rectangle { x0: 0.0, y0: 0.0, x1: width as f32, y1: height as f32 },
            [rgb[0], rgb[1], rgb[2], 255],
        )
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn square(x: f32, rgba: [u8; 4]) -> Primitive {
        Primitive::new(Shape::Rectangle { x0: x, y0: 0.0, x1: x + 2.0, y1: 2.0 }, rgba)
    }

    #[test]
    fn test_append_keeps_paint_order() {
        let c = Composition::new_blank(8, 8)
            .with_appended(square(0.0, [1, 0, 0, 255]))
            .with_appended(square(1.0, [2, 0, 0, 255]));
        let order: Vec<u8> = c.iter().map(|p| p.rgba()[0]).collect();
        assert_eq!(order, vec![1, 2]);
    }

    #[test]
    fn test_replace_does_not_touch_the_source() {
        let base = Composition::new_blank(8, 8).with_appended(square(0.0, [1, 0, 0, 255]));
        let replaced = base.with_replaced(0, square(3.0, [9, 0, 0, 255])).unwrap();
        assert_eq!(base.get(0).unwrap().rgba()[0], 1);
        assert_eq!(replaced.get(0).unwrap().rgba()[0], 9);
        assert!(base.with_replaced(5, square(0.0, [0; 4])).is_none());
    }

    #[test]
    fn test_clone_shares_primitives() {
        let base = Composition::new_blank(8, 8).with_appended(square(0.0, [1, 0, 0, 255]));
        let copy = base.clone();
        assert!(Arc::ptr_eq(&base.primitives[0], &copy.primitives[0]));
    }
}
