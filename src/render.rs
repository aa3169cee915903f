use tiny_skia as sk;

use crate::composition::Composition;
use crate::primitive::Primitive;

// Scratch pixmap reused across calls to avoid allocations.
// thread-local so rayon workers evaluating candidates each get their own.
thread_local! {
    static SCRATCH_PIX: std::cell::RefCell<Option<sk::Pixmap>> =
        std::cell::RefCell::new(None);
}

/// rasterizes compositions to PREMULTIPLIED RGBA (tiny-skia's native format)
/// on a white backdrop. the snapshot encoder emits the same backdrop.
#[derive(Clone, Copy, Debug)]
pub struct CpuRenderer {
    pub antialias: bool,
}

impl CpuRenderer {
    pub fn new(antialias: bool) -> Self {
        Self { antialias }
    }

    /// blank white canvas
    pub fn blank_premul(width: u32, height: u32) -> Vec<u8> {
        vec![255u8; (width as usize) * (height as usize) * 4]
    }

    /// Full-frame render.
    pub fn render_rgba_premul(&self, composition: &Composition) -> Vec<u8> {
        profiling::scope!("render_rgba_premul");
        self.render_up_to_premul(composition, composition.len())
    }

    /// render only primitives [0, up_to_index): the backdrop a replacement at
    /// `up_to_index` is painted over.
    pub fn render_up_to_premul(&self, composition: &Composition, up_to_index: usize) -> Vec<u8> {
        profiling::scope!("render_up_to_premul");
        let base = Self::blank_premul(composition.width, composition.height);
        self.render_range_on_base(composition, 0, up_to_index, &base)
    }

    /// render primitives [from_index, len) on top of `base_premul`
    pub fn render_from_on_base_premul(
        &self,
        composition: &Composition,
        from_index: usize,
        base_premul: &[u8],
    ) -> Vec<u8> {
        profiling::scope!("render_from_on_base_premul");
        self.render_range_on_base(composition, from_index, composition.len(), base_premul)
    }

    /// paint a single primitive on top of `base_premul` (the append case)
    pub fn render_one_on_base_premul(
        &self,
        primitive: &Primitive,
        width: u32,
        height: u32,
        base_premul: &[u8],
    ) -> Vec<u8> {
        profiling::scope!("render_one_on_base_premul");
        self.with_scratch(width, height, base_premul, |pix| {
            self.draw_primitive(pix, primitive);
        })
    }

    fn render_range_on_base(
        &self,
        composition: &Composition,
        from: usize,
        to: usize,
        base_premul: &[u8],
    ) -> Vec<u8> {
        let to = to.min(composition.len());
        self.with_scratch(composition.width, composition.height, base_premul, |pix| {
            for primitive in composition.iter().take(to).skip(from) {
                self.draw_primitive(pix, primitive);
            }
        })
    }

    /// copy `base_premul` into the thread's scratch pixmap, let `paint` draw on
    /// it and return the resulting bytes
    fn with_scratch<F>(&self, width: u32, height: u32, base_premul: &[u8], paint: F) -> Vec<u8>
    where
        F: FnOnce(&mut sk::Pixmap),
    {
        SCRATCH_PIX.with(|pix_cell| {
            let mut pix_borrow = pix_cell.borrow_mut();
            let reuse = matches!(pix_borrow.as_ref(), Some(pm) if pm.width() == width && pm.height() == height);
            if !reuse {
                *pix_borrow = sk::Pixmap::new(width, height);
            }

            match pix_borrow.as_mut() {
                Some(pix) => {
                    let dst = pix.data_mut();
                    debug_assert_eq!(dst.len(), base_premul.len());
                    dst.copy_from_slice(base_premul);
                    paint(pix);
                    pix.data().to_vec()
                }
                // tiny-skia refuses zero-sized pixmaps; nothing can be painted
                None => base_premul.to_vec(),
            }
        })
    }

    fn draw_primitive(&self, pix: &mut sk::Pixmap, primitive: &Primitive) {
        profiling::scope!("draw_primitive");

        // Quick reject: bbox fully outside the pixmap
        let (w, h) = (pix.width() as f32, pix.height() as f32);
        let (min_x, min_y, max_x, max_y) = primitive.shape().aabb();
        if max_x < 0.0 || max_y < 0.0 || min_x >= w || min_y >= h {
            return;
        }

        let Some(path) = primitive.path() else {
            return;
        };

        let [r, g, b, a] = primitive.rgba();
        let mut paint = sk::Paint::default();
        paint.anti_alias = self.antialias;
        paint.set_color_rgba8(r, g, b, a);

        pix.fill_path(path, &paint, sk::FillRule::Winding, sk::Transform::identity(), None);
    }
}

/// Premultiply RGBA - optimized scalar implementation (compiler will auto-vectorize)
#[inline(always)]
pub fn premultiply(p: &[u8]) -> Vec<u8> {
    profiling::scope!("premultiply");

    let mut out = vec![0u8; p.len()];
    for (src, dst) in p.chunks_exact(4).zip(out.chunks_exact_mut(4)) {
        let a = src[3] as u16;
        // (x * a + 127) / 255 is a fast rounded divide-by-255
        dst[0] = ((src[0] as u16 * a + 127) / 255) as u8;
        dst[1] = ((src[1] as u16 * a + 127) / 255) as u8;
        dst[2] = ((src[2] as u16 * a + 127) / 255) as u8;
        dst[3] = a as u8;
    }
    out
}
