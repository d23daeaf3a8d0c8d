//! SVG document backend.
//!
//! Shapes are kept in draw order and projected equirectangularly around the current
//! viewport when [`SvgRenderer::to_svg`] is called. Each shape carries a `data-feature`
//! attribute holding its click key so a host page can route clicks back to the engine.

use std::fmt::Write as _;

use atlas_core::{Bounds, FeatureKey, LatLng, Ring};
use tracing::debug;

use crate::{fit_zoom, px_per_degree, MapRenderer, Popup, ShapeHandle, Style, MAX_ZOOM};

#[derive(Debug, Clone)]
enum Primitive {
    Point(LatLng),
    Polygon(Vec<Ring>),
}

#[derive(Debug, Clone)]
struct SvgShape {
    handle: ShapeHandle,
    key: FeatureKey,
    primitive: Primitive,
    style: Style,
}

#[derive(Debug, Clone)]
struct OpenPopup {
    key: FeatureKey,
    anchor: LatLng,
    popup: Popup,
}

#[derive(Debug)]
pub struct SvgRenderer {
    width: f64,
    height: f64,
    center: LatLng,
    zoom: f64,
    next: u64,
    shapes: Vec<SvgShape>,
    popup: Option<OpenPopup>,
}

impl SvgRenderer {
    pub fn new(width: u32, height: u32) -> Self {
        Self {
            width: width as f64,
            height: height as f64,
            center: LatLng::new(20.5937, 78.9629),
            zoom: 5.0,
            next: 1,
            shapes: Vec::new(),
            popup: None,
        }
    }

    pub fn center(&self) -> LatLng {
        self.center
    }

    pub fn shape_count(&self) -> usize {
        self.shapes.len()
    }

    /// Frame every drawn shape; used when nothing asked for a specific view.
    pub fn fit_all(&mut self) {
        let bounds = self
            .shapes
            .iter()
            .flat_map(|s| match &s.primitive {
                Primitive::Point(p) => vec![*p],
                Primitive::Polygon(rings) => rings.iter().flatten().copied().collect(),
            })
            .fold(None::<Bounds>, |acc, p| {
                Some(match acc {
                    Some(mut b) => {
                        b.extend(p);
                        b
                    }
                    None => Bounds::from_point(p),
                })
            });
        if let Some(b) = bounds {
            self.fit_bounds(b, None);
        }
    }

    fn project(&self, p: LatLng) -> (f64, f64) {
        let k = px_per_degree(self.zoom);
        ((p.lng - self.center.lng) * k + self.width / 2.0, (self.center.lat - p.lat) * k + self.height / 2.0)
    }

    pub fn to_svg(&self) -> String {
        let mut out = String::new();
        let _ = writeln!(
            out,
            r#"<svg xmlns="http://www.w3.org/2000/svg" width="{w}" height="{h}" viewBox="0 0 {w} {h}">"#,
            w = self.width,
            h = self.height
        );
        let _ = writeln!(out, r##"<rect width="100%" height="100%" fill="#f8fafc"/>"##);
        for shape in &self.shapes {
            self.write_shape(&mut out, shape);
        }
        if let Some(p) = &self.popup {
            self.write_popup(&mut out, p);
        }
        out.push_str("</svg>\n");
        out
    }

    fn write_shape(&self, out: &mut String, shape: &SvgShape) {
        let s = &shape.style;
        let fill = s.fill.as_deref().unwrap_or("none");
        let paint = format!(
            r#"stroke="{}" stroke-opacity="{}" stroke-width="{}" fill="{}" fill-opacity="{}""#,
            escape(&s.stroke),
            s.stroke_opacity,
            s.stroke_weight,
            escape(fill),
            s.fill_opacity
        );
        let key = escape(&shape.key.to_string());
        match &shape.primitive {
            Primitive::Point(p) => {
                let (x, y) = self.project(*p);
                let _ = writeln!(
                    out,
                    r#"<circle data-feature="{key}" cx="{x:.2}" cy="{y:.2}" r="{}" {paint}/>"#,
                    s.radius
                );
            }
            Primitive::Polygon(rings) => {
                let mut d = String::new();
                for ring in rings.iter().filter(|r| !r.is_empty()) {
                    for (i, p) in ring.iter().enumerate() {
                        let (x, y) = self.project(*p);
                        let _ = write!(d, "{}{:.2} {:.2} ", if i == 0 { "M" } else { "L" }, x, y);
                    }
                    d.push_str("Z ");
                }
                let _ = writeln!(
                    out,
                    r#"<path data-feature="{key}" fill-rule="evenodd" d="{}" {paint}/>"#,
                    d.trim_end()
                );
            }
        }
    }

    fn write_popup(&self, out: &mut String, p: &OpenPopup) {
        let (x, y) = self.project(p.anchor);
        let mut lines = vec![p.popup.title.clone()];
        lines.extend(p.popup.rows.iter().map(|(k, v)| format!("{}: {}", k, v)));
        lines.extend(p.popup.note.iter().cloned());
        let line_h = 14.0;
        let box_h = line_h * lines.len() as f64 + 8.0;
        let box_w = lines.iter().map(|l| l.chars().count()).max().unwrap_or(0) as f64 * 6.5 + 12.0;
        let top = y - box_h - 10.0;
        let _ = writeln!(out, r#"<g class="popup" data-feature="{}">"#, escape(&p.key.to_string()));
        let _ = writeln!(
            out,
            r##"<rect x="{:.2}" y="{:.2}" width="{:.2}" height="{:.2}" rx="4" fill="#ffffff" stroke="#334155"/>"##,
            x - box_w / 2.0,
            top,
            box_w,
            box_h
        );
        for (i, line) in lines.iter().enumerate() {
            let weight = if i == 0 { r#" font-weight="bold""# } else { "" };
            let _ = writeln!(
                out,
                r#"<text x="{:.2}" y="{:.2}" font-size="11" font-family="sans-serif"{}>{}</text>"#,
                x - box_w / 2.0 + 6.0,
                top + line_h * (i as f64 + 1.0),
                weight,
                escape(line)
            );
        }
        out.push_str("</g>\n");
    }

    fn issue(&mut self, key: &FeatureKey, primitive: Primitive, style: &Style) -> ShapeHandle {
        let handle = ShapeHandle(self.next);
        self.next += 1;
        self.shapes.push(SvgShape { handle, key: key.clone(), primitive, style: style.clone() });
        handle
    }
}

fn escape(s: &str) -> String {
    let mut out = String::with_capacity(s.len());
    for c in s.chars() {
        match c {
            '&' => out.push_str("&amp;"),
            '<' => out.push_str("&lt;"),
            '>' => out.push_str("&gt;"),
            '"' => out.push_str("&quot;"),
            '\'' => out.push_str("&apos;"),
            c => out.push(c),
        }
    }
    out
}

impl MapRenderer for SvgRenderer {
    fn draw_point(&mut self, at: LatLng, style: &Style, click: &FeatureKey) -> ShapeHandle {
        self.issue(click, Primitive::Point(at), style)
    }

    fn draw_polygon(&mut self, rings: &[Ring], style: &Style, click: &FeatureKey) -> ShapeHandle {
        self.issue(click, Primitive::Polygon(rings.to_vec()), style)
    }

    fn set_style(&mut self, shape: ShapeHandle, style: &Style) {
        match self.shapes.iter_mut().find(|s| s.handle == shape) {
            Some(s) => s.style = style.clone(),
            None => debug!(?shape, "set_style on unknown shape"),
        }
    }

    fn remove(&mut self, shape: ShapeHandle) {
        if let Some(pos) = self.shapes.iter().position(|s| s.handle == shape) {
            let removed = self.shapes.remove(pos);
            if self.popup.as_ref().map(|p| p.key == removed.key).unwrap_or(false) {
                self.popup = None;
            }
        }
    }

    /// One popup at a time; opening another replaces it.
    fn open_popup(&mut self, feature: &FeatureKey, anchor: LatLng, popup: &Popup) {
        self.popup = Some(OpenPopup { key: feature.clone(), anchor, popup: popup.clone() });
    }

    fn set_viewport(&mut self, center: LatLng, zoom: f64) {
        self.center = center;
        self.zoom = zoom.clamp(0.0, MAX_ZOOM);
    }

    fn fit_bounds(&mut self, bounds: Bounds, max_zoom: Option<f64>) {
        let z = fit_zoom(&bounds, self.width, self.height);
        self.center = bounds.center();
        self.zoom = max_zoom.map(|m| z.min(m)).unwrap_or(z);
    }

    fn zoom(&self) -> f64 {
        self.zoom
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use atlas_core::FeatureKind;

    #[test]
    fn renders_shapes_centered_on_viewport() {
        let mut r = SvgRenderer::new(400, 300);
        let key = FeatureKey::new(FeatureKind::Claims, "A&B");
        let style = crate::style::highlight();
        r.draw_point(LatLng::new(20.0, 85.0), &style, &key);
        r.set_viewport(LatLng::new(20.0, 85.0), 10.0);
        let svg = r.to_svg();
        assert!(svg.starts_with("<svg"));
        assert!(svg.contains(r#"cx="200.00" cy="150.00""#));
        assert!(svg.contains("claims/A&amp;B"));
    }

    #[test]
    fn polygon_path_and_popup() {
        let mut r = SvgRenderer::new(400, 300);
        let key = FeatureKey::new(FeatureKind::Villages, "v1");
        let ring = vec![LatLng::new(0.0, 0.0), LatLng::new(0.0, 1.0), LatLng::new(1.0, 1.0)];
        let h = r.draw_polygon(&[ring], &crate::style::highlight(), &key);
        r.fit_all();
        r.open_popup(&key, LatLng::new(0.5, 0.5), &Popup { title: "V <1>".into(), ..Default::default() });
        let svg = r.to_svg();
        assert!(svg.contains("<path"));
        assert!(svg.contains("V &lt;1&gt;"));
        r.remove(h);
        assert_eq!(r.shape_count(), 0);
        assert!(!r.to_svg().contains("popup"));
    }
}
