//! SVG snapshot encoder.
//!
//! Pure function of the composition: the same primitives in the same order
//! always produce byte-identical markup.

use std::fmt::Write;

use crate::composition::Composition;
use crate::primitive::{Primitive, Shape};

/// trimmed fixed-point formatting: at most `decimals` digits, no trailing zeros, no "-0"
fn num(v: f32, decimals: usize) -> String {
    let mut s = format!("{:.*}", decimals, v);
    if s.contains('.') {
        while s.ends_with('0') {
            s.pop();
        }
        if s.ends_with('.') {
            s.pop();
        }
    }
    if s == "-0" {
        s = "0".to_string();
    }
    s
}

#[inline]
fn coord(v: f32) -> String {
    num(v, 2)
}

fn hex(rgba: [u8; 4]) -> String {
    format!("#{:02x}{:02x}{:02x}", rgba[0], rgba[1], rgba[2])
}

/// fill and (unless opaque) fill-opacity attributes
fn paint_attrs(rgba: [u8; 4]) -> String {
    if rgba[3] == 255 {
        format!(r#"fill="{}""#, hex(rgba))
    } else {
        format!(r#"fill="{}" fill-opacity="{}""#, hex(rgba), num(rgba[3] as f32 / 255.0, 3))
    }
}

fn rotate_attr(angle: f32, cx: f32, cy: f32) -> String {
    if angle == 0.0 {
        String::new()
    } else {
        format!(r#" transform="rotate({} {} {})""#, coord(angle), coord(cx), coord(cy))
    }
}

fn write_primitive(out: &mut String, primitive: &Primitive) {
    let paint = paint_attrs(primitive.rgba());
    // writing into a String cannot fail
    let _ = match *primitive.shape() {
        Shape::Triangle { points } => {
            let pts: Vec<String> = points.iter().map(|&(x, y)| format!("{},{}", coord(x), coord(y))).collect();
            writeln!(out, r#"<polygon points="{}" {}/>"#, pts.join(" "), paint)
        }
        Shape::Rectangle { x0, y0, x1, y1 } => writeln!(
            out,
            r#"<rect x="{}" y="{}" width="{}" height="{}" {}/>"#,
            coord(x0),
            coord(y0),
            coord(x1 - x0),
            coord(y1 - y0),
            paint
        ),
        Shape::Ellipse { cx, cy, rx, ry, angle } => writeln!(
            out,
            r#"<ellipse cx="{}" cy="{}" rx="{}" ry="{}"{} {}/>"#,
            coord(cx),
            coord(cy),
            coord(rx),
            coord(ry),
            rotate_attr(angle, cx, cy),
            paint
        ),
        Shape::Stroke { cx, cy, length, width, angle } => writeln!(
            out,
            r#"<rect x="{}" y="{}" width="{}" height="{}"{} {}/>"#,
            coord(cx - length * 0.5),
            coord(cy - width * 0.5),
            coord(length),
            coord(width),
            rotate_attr(angle, cx, cy),
            paint
        ),
    };
}

/// Serialize a composition to a self-contained SVG document.
///
/// The root is sized `width`×`height` with a matching viewBox and starts with
/// an opaque white backdrop (the renderer's base). With `antialias` off the
/// root carries `shape-rendering="crispEdges"` so rasterizers reproduce the
/// engine's hard edges.
pub fn encode(composition: &Composition, width: u32, height: u32, antialias: bool) -> String {
    profiling::scope!("svg::encode");
    let mut out = String::with_capacity(256 + composition.len() * 96);
    let rendering = if antialias { "" } else { r#" shape-rendering="crispEdges""# };
    let _ = writeln!(
        out,
        r#"<svg xmlns="http://www.w3.org/2000/svg" width="{width}" height="{height}" viewBox="0 0 {width} {height}"{rendering}>"#
    );
    let _ = writeln!(out, r##"<rect width="{width}" height="{height}" fill="#ffffff"/>"##);
    for primitive in composition.iter() {
        write_primitive(&mut out, primitive);
    }
    out.push_str("</svg>\n");
    out
}

#[cfg(test)]
mod tests {
    use super::*;

    fn sample() -> Composition {
        Composition::new_blank(10, 8)
            .with_appended(Primitive::new(
                Shape::Rectangle { x0: 0.0, y0: 0.0, x1: 10.0, y1: 8.0 },
                [18, 52, 86, 255],
            ))
            .with_appended(Primitive::new(
                Shape::Triangle { points: [(1.0, 1.0), (5.126, 1.0), (1.0, 6.5)] },
                [255, 0, 0, 128],
            ))
            .with_appended(Primitive::new(
                Shape::Ellipse { cx: 5.0, cy: 4.0, rx: 2.0, ry: 1.0, angle: 30.0 },
                [0, 255, 0, 20],
            ))
            .with_appended(Primitive::new(
                Shape::Stroke { cx: 5.0, cy: 5.0, length: 6.0, width: 1.0, angle: 0.0 },
                [0, 0, 255, 200],
            ))
    }

    #[test]
    fn test_number_formatting() {
        assert_eq!(num(5.0, 2), "5");
        assert_eq!(num(5.126, 2), "5.13");
        assert_eq!(num(0.5, 2), "0.5");
        assert_eq!(num(-0.001, 2), "0");
        assert_eq!(num(128.0 / 255.0, 3), "0.502");
    }

    #[test]
    fn test_encode_is_deterministic() {
        let c = sample();
        assert_eq!(encode(&c, 10, 8, true), encode(&c.clone(), 10, 8, true));
    }

    #[test]
    fn test_one_element_per_primitive_in_order() {
        let svg = encode(&sample(), 10, 8, true);
        let lines: Vec<&str> = svg.lines().collect();
        assert!(lines[0].starts_with(r#"<svg xmlns="http://www.w3.org/2000/svg" width="10" height="8" viewBox="0 0 10 8">"#));
        assert_eq!(lines[1], r##"<rect width="10" height="8" fill="#ffffff"/>"##);
        assert_eq!(lines[2], r##"<rect x="0" y="0" width="10" height="8" fill="#123456"/>"##);
        assert_eq!(lines[3], r##"<polygon points="1,1 5.13,1 1,6.5" fill="#ff0000" fill-opacity="0.502"/>"##);
        assert_eq!(
            lines[4],
            r##"<ellipse cx="5" cy="4" rx="2" ry="1" transform="rotate(30 5 4)" fill="#00ff00" fill-opacity="0.078"/>"##
        );
        assert_eq!(lines[5], r##"<rect x="2" y="4.5" width="6" height="1" fill="#0000ff" fill-opacity="0.784"/>"##);
        assert_eq!(lines[6], "</svg>");
        assert_eq!(lines.len(), 7);
    }

    #[test]
    fn test_crisp_edges_without_antialiasing() {
        let svg = encode(&Composition::new_blank(2, 2), 2, 2, false);
        assert!(svg.starts_with(r#"<svg xmlns="http://www.w3.org/2000/svg" width="2" height="2" viewBox="0 0 2 2" shape-rendering="crispEdges">"#));
    }

    #[test]
    fn test_encode_does_not_touch_composition() {
        let c = sample();
        let before = c.clone();
        let _ = encode(&c, 10, 8, true);
        assert_eq!(c, before);
    }
}
