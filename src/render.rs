use crate::collision::geometry::{BBox, Point};
use crate::config::RenderConfig;
use crate::figure::{
    AxisSide, Element, ElementId, ElementKind, Figure, HAlign, LineDash, LineGeometry,
    PatchGeometry, Surface, TextElement, VAlign, transform::ordinal_to_date,
};
use crate::text_metrics::TextMeasure;
use crate::theme::Theme;
use anyhow::Result;
use std::path::Path;

const TICK_COUNT: usize = 5;
const TICK_LENGTH: f64 = 4.0;

/// Geometry queries the collision engine needs from whatever draws the
/// figure. Extents are only valid after `draw` and are never cached across
/// label moves.
pub trait Renderer {
    /// Run a layout pass over the figure.
    fn draw(&mut self, figure: &Figure);

    /// Pixel bounding box of an element, `None` if it does not exist.
    fn window_extent(&self, figure: &Figure, element: ElementId) -> Option<BBox>;

    /// Vertex path of a line element in pixels.
    fn path_pixels(&self, figure: &Figure, element: ElementId) -> Vec<Point>;
}

#[derive(Debug, Clone)]
pub struct SvgRenderer {
    measure: TextMeasure,
    passes: usize,
}

impl SvgRenderer {
    pub fn new(measure: TextMeasure) -> Self {
        Self { measure, passes: 0 }
    }

    /// Renderer measuring text with the theme's font family.
    pub fn with_theme_fonts(theme: &Theme) -> Self {
        Self::new(TextMeasure::System(theme.font_family.clone()))
    }

    /// Number of layout passes run so far.
    pub fn passes(&self) -> usize {
        self.passes
    }

    pub fn measure(&self) -> &TextMeasure {
        &self.measure
    }

    fn text_extent(&self, figure: &Figure, element: &Element, text: &TextElement) -> Option<BBox> {
        let transform = figure.transform(element.surface)?;
        let (px, py) = transform.to_pixel(text.position);
        let (px, py) = (px + text.offset.0, py + text.offset.1);
        let extent = self.measure.extent(&text.text, text.font_size);
        let x0 = match text.h_align {
            HAlign::Left => px,
            HAlign::Center => px - extent.width / 2.0,
            HAlign::Right => px - extent.width,
        };
        let y0 = match text.v_align {
            VAlign::Top => py,
            VAlign::Center => py - extent.height / 2.0,
            VAlign::Bottom => py - extent.height,
        };
        Some(BBox::new(x0, y0, x0 + extent.width, y0 + extent.height))
    }

    pub fn render_svg(&mut self, figure: &Figure, theme: &Theme) -> String {
        self.draw(figure);
        let mut svg = String::new();
        let width = figure.width;
        let height = figure.height;
        svg.push_str(&format!(
            "<svg xmlns=\"http://www.w3.org/2000/svg\" width=\"{width}\" height=\"{height}\" viewBox=\"0 0 {width} {height}\">",
        ));
        svg.push_str(&format!(
            "<rect width=\"100%\" height=\"100%\" fill=\"{}\"/>",
            theme.background
        ));

        if let Some(title) = &figure.title {
            svg.push_str(&format!(
                "<text x=\"{:.2}\" y=\"{:.2}\" text-anchor=\"middle\" font-family=\"{}\" font-size=\"{}\" font-weight=\"600\" fill=\"{}\">{}</text>",
                width / 2.0,
                theme.title_size * 1.6,
                theme.font_family,
                theme.title_size,
                theme.text_color,
                escape_xml(title)
            ));
        }

        for surface in figure.surfaces() {
            svg.push_str(&axes_svg(figure, surface, theme));
        }

        for element in figure.paint_order() {
            if !element.visible {
                continue;
            }
            match &element.kind {
                ElementKind::Patch(patch) => {
                    let Some(b) = self.window_extent(figure, element.id) else {
                        continue;
                    };
                    let stroke = patch
                        .stroke
                        .as_deref()
                        .map(|s| format!(" stroke=\"{s}\" stroke-width=\"0.8\""))
                        .unwrap_or_default();
                    svg.push_str(&format!(
                        "<rect x=\"{:.2}\" y=\"{:.2}\" width=\"{:.2}\" height=\"{:.2}\" fill=\"{}\" fill-opacity=\"{}\"{stroke}/>",
                        b.x0,
                        b.y0,
                        b.width(),
                        b.height(),
                        patch.fill,
                        element.alpha
                    ));
                    for (idx, (swatch, text)) in patch.lines.iter().enumerate() {
                        let y = b.y0 + theme.font_size * (1.3 + idx as f64 * 1.4);
                        svg.push_str(&format!(
                            "<rect x=\"{:.2}\" y=\"{:.2}\" width=\"10\" height=\"10\" fill=\"{swatch}\"/>",
                            b.x0 + 6.0,
                            y - 9.0
                        ));
                        svg.push_str(&format!(
                            "<text x=\"{:.2}\" y=\"{y:.2}\" font-family=\"{}\" font-size=\"{}\" fill=\"{}\">{}</text>",
                            b.x0 + 22.0,
                            theme.font_family,
                            theme.font_size,
                            theme.text_color,
                            escape_xml(text)
                        ));
                    }
                }
                ElementKind::Line(line) => {
                    let points = self.path_pixels(figure, element.id);
                    if points.len() < 2 {
                        continue;
                    }
                    let dash = match line.dash {
                        LineDash::Solid => "",
                        LineDash::Dashed => " stroke-dasharray=\"6 4\"",
                        LineDash::Dotted => " stroke-dasharray=\"1.5 3\"",
                    };
                    svg.push_str(&format!(
                        "<path d=\"{}\" fill=\"none\" stroke=\"{}\" stroke-width=\"{}\" stroke-opacity=\"{}\"{dash}/>",
                        points_to_path(&points),
                        line.color,
                        line.width,
                        element.alpha
                    ));
                    if line.markers {
                        for (x, y) in &points {
                            svg.push_str(&format!(
                                "<circle cx=\"{x:.2}\" cy=\"{y:.2}\" r=\"{:.2}\" fill=\"{}\"/>",
                                line.width + 1.5,
                                line.color
                            ));
                        }
                    }
                }
                ElementKind::Text(text) => {
                    let Some(b) = self.window_extent(figure, element.id) else {
                        continue;
                    };
                    if let Some(background) = &text.background {
                        svg.push_str(&format!(
                            "<rect x=\"{:.2}\" y=\"{:.2}\" width=\"{:.2}\" height=\"{:.2}\" rx=\"2\" fill=\"{background}\" fill-opacity=\"{}\"/>",
                            b.x0 - 2.0,
                            b.y0 - 1.0,
                            b.width() + 4.0,
                            b.height() + 2.0,
                            element.alpha
                        ));
                    }
                    svg.push_str(&text_svg(&b, text, theme, element.alpha));
                }
            }
        }

        svg.push_str("</svg>");
        svg
    }
}

impl Default for SvgRenderer {
    fn default() -> Self {
        Self::new(TextMeasure::Heuristic)
    }
}

impl Renderer for SvgRenderer {
    fn draw(&mut self, _figure: &Figure) {
        // Extents are derived from the figure on demand, so a layout pass
        // only has to be recorded.
        self.passes += 1;
    }

    fn window_extent(&self, figure: &Figure, element: ElementId) -> Option<BBox> {
        let el = figure.element(element)?;
        match &el.kind {
            ElementKind::Text(text) => self.text_extent(figure, el, text),
            ElementKind::Patch(patch) => {
                let surface = figure.surface(el.surface)?;
                let transform = figure.transform(el.surface)?;
                let plot = surface.plot_area;
                Some(match patch.geometry {
                    PatchGeometry::Data { x0, y0, x1, y1 } => {
                        let a = transform.to_pixel((x0, y0));
                        let b = transform.to_pixel((x1, y1));
                        BBox::new(a.0, a.1, b.0, b.1)
                    }
                    PatchGeometry::XSpan { x0, x1 } => {
                        let a = transform.to_pixel((x0, transform.y.0));
                        let b = transform.to_pixel((x1, transform.y.0));
                        BBox::new(a.0, plot.y0, b.0, plot.y1)
                    }
                    PatchGeometry::YSpan { y0, y1 } => {
                        let a = transform.to_pixel((transform.x.0, y0));
                        let b = transform.to_pixel((transform.x.0, y1));
                        BBox::new(plot.x0, a.1, plot.x1, b.1)
                    }
                    PatchGeometry::Pixels(b) => b,
                })
            }
            ElementKind::Line(_) => BBox::from_points(&self.path_pixels(figure, element)),
        }
    }

    fn path_pixels(&self, figure: &Figure, element: ElementId) -> Vec<Point> {
        let Some(el) = figure.element(element) else {
            return Vec::new();
        };
        let ElementKind::Line(line) = &el.kind else {
            return Vec::new();
        };
        let (Some(surface), Some(transform)) = (figure.surface(el.surface), figure.transform(el.surface)) else {
            return Vec::new();
        };
        let plot = surface.plot_area;
        match &line.geometry {
            LineGeometry::Data(points) => points
                .iter()
                .filter(|p| p.0.is_finite() && p.1.is_finite())
                .map(|p| transform.to_pixel(*p))
                .collect(),
            LineGeometry::Horizontal(y) => {
                let py = transform.to_pixel((transform.x.0, *y)).1;
                vec![(plot.x0, py), (plot.x1, py)]
            }
            LineGeometry::Vertical(x) => {
                let px = transform.to_pixel((*x, transform.y.0)).0;
                vec![(px, plot.y0), (px, plot.y1)]
            }
        }
    }
}

fn text_svg(b: &BBox, text: &TextElement, theme: &Theme, alpha: f64) -> String {
    let (x, anchor) = match text.h_align {
        HAlign::Left => (b.x0, "start"),
        HAlign::Center => ((b.x0 + b.x1) / 2.0, "middle"),
        HAlign::Right => (b.x1, "end"),
    };
    let line_height = text.font_size * crate::text_metrics::LINE_HEIGHT;
    let mut out = String::new();
    out.push_str(&format!(
        "<text text-anchor=\"{anchor}\" font-family=\"{}\" font-size=\"{}\" fill=\"{}\" fill-opacity=\"{alpha}\">",
        theme.font_family, text.font_size, text.color
    ));
    for (idx, line) in text.text.split('\n').enumerate() {
        // Baseline sits roughly 80% down each line box.
        let y = b.y0 + line_height * (idx as f64 + 0.8);
        out.push_str(&format!("<tspan x=\"{x:.2}\" y=\"{y:.2}\">{}</tspan>", escape_xml(line)));
    }
    out.push_str("</text>");
    out
}

fn axes_svg(figure: &Figure, surface: &Surface, theme: &Theme) -> String {
    let mut out = String::new();
    let Some(transform) = figure.transform(surface.id) else {
        return out;
    };
    let plot = surface.plot_area;
    let primary = figure.siblings(surface.id).iter().all(|s| *s > surface.id);

    if primary {
        out.push_str(&format!(
            "<rect x=\"{:.2}\" y=\"{:.2}\" width=\"{:.2}\" height=\"{:.2}\" fill=\"none\" stroke=\"{}\" stroke-width=\"1\"/>",
            plot.x0,
            plot.y0,
            plot.width(),
            plot.height(),
            theme.axis_color
        ));
        let (date_axis, categories) = figure
            .x_axis(surface.id)
            .map(|a| (a.is_date(), a.categories.as_slice()))
            .unwrap_or((false, &[]));
        let ticks: Vec<f64> = if categories.is_empty() {
            nice_ticks(transform.x.0, transform.x.1, TICK_COUNT)
        } else {
            (0..categories.len()).map(|i| i as f64).collect()
        };
        for tick in ticks {
            let x = transform.to_pixel((tick, transform.y.0)).0;
            let label = if let Some(name) = categories.get(tick as usize) {
                name.clone()
            } else if date_axis {
                ordinal_to_date(tick)
                    .map(|d| d.format("%Y-%m-%d").to_string())
                    .unwrap_or_default()
            } else {
                format_tick(tick)
            };
            out.push_str(&format!(
                "<line x1=\"{x:.2}\" y1=\"{:.2}\" x2=\"{x:.2}\" y2=\"{:.2}\" stroke=\"{}\"/>",
                plot.y1,
                plot.y1 + TICK_LENGTH,
                theme.axis_color
            ));
            out.push_str(&format!(
                "<text x=\"{x:.2}\" y=\"{:.2}\" text-anchor=\"middle\" font-family=\"{}\" font-size=\"{}\" fill=\"{}\">{}</text>",
                plot.y1 + TICK_LENGTH + theme.font_size * 1.2,
                theme.font_family,
                theme.font_size,
                theme.text_color,
                escape_xml(&label)
            ));
        }
    }

    let (axis_x, dir, anchor) = match surface.side {
        AxisSide::Left => (plot.x0, -1.0, "end"),
        AxisSide::Right => (plot.x1, 1.0, "start"),
    };
    for tick in nice_ticks(transform.y.0, transform.y.1, TICK_COUNT) {
        let y = transform.to_pixel((transform.x.0, tick)).1;
        if primary {
            out.push_str(&format!(
                "<line x1=\"{:.2}\" y1=\"{y:.2}\" x2=\"{:.2}\" y2=\"{y:.2}\" stroke=\"{}\" stroke-opacity=\"0.35\"/>",
                plot.x0, plot.x1, theme.grid_color
            ));
        }
        out.push_str(&format!(
            "<line x1=\"{axis_x:.2}\" y1=\"{y:.2}\" x2=\"{:.2}\" y2=\"{y:.2}\" stroke=\"{}\"/>",
            axis_x + dir * TICK_LENGTH,
            theme.axis_color
        ));
        out.push_str(&format!(
            "<text x=\"{:.2}\" y=\"{:.2}\" text-anchor=\"{anchor}\" font-family=\"{}\" font-size=\"{}\" fill=\"{}\">{}</text>",
            axis_x + dir * (TICK_LENGTH + 3.0),
            y + theme.font_size * 0.35,
            theme.font_family,
            theme.font_size,
            theme.text_color,
            escape_xml(&format_tick(tick))
        ));
    }
    if let Some(label) = &surface.y_label {
        let x = axis_x + dir * (theme.font_size * 4.5);
        let y = (plot.y0 + plot.y1) / 2.0;
        out.push_str(&format!(
            "<text x=\"{x:.2}\" y=\"{y:.2}\" text-anchor=\"middle\" transform=\"rotate(-90 {x:.2} {y:.2})\" font-family=\"{}\" font-size=\"{}\" fill=\"{}\">{}</text>",
            theme.font_family,
            theme.font_size,
            theme.text_color,
            escape_xml(label)
        ));
    }
    out
}

/// Round tick positions covering `min..=max`.
pub fn nice_ticks(min: f64, max: f64, count: usize) -> Vec<f64> {
    if !(min.is_finite() && max.is_finite()) || max <= min || count < 2 {
        return Vec::new();
    }
    let raw = (max - min) / (count - 1) as f64;
    let magnitude = 10f64.powf(raw.log10().floor());
    let residual = raw / magnitude;
    let step = magnitude
        * if residual <= 1.0 {
            1.0
        } else if residual <= 2.0 {
            2.0
        } else if residual <= 5.0 {
            5.0
        } else {
            10.0
        };
    let first = (min / step).ceil() * step;
    let mut ticks = Vec::new();
    let mut tick = first;
    while tick <= max + step * 1e-9 {
        // Snap values like 0.30000000000000004.
        ticks.push((tick / step).round() * step);
        tick += step;
    }
    ticks
}

fn format_tick(value: f64) -> String {
    if value.fract().abs() < 1e-9 {
        format!("{}", value.round() as i64)
    } else {
        let s = format!("{value:.2}");
        s.trim_end_matches('0').trim_end_matches('.').to_string()
    }
}

fn points_to_path(points: &[Point]) -> String {
    let mut d = String::new();
    for (idx, (x, y)) in points.iter().enumerate() {
        let cmd = if idx == 0 { 'M' } else { 'L' };
        d.push_str(&format!("{cmd}{x:.2},{y:.2} "));
    }
    d.trim_end().to_string()
}

pub fn write_output_svg(svg: &str, output: Option<&Path>) -> Result<()> {
    match output {
        Some(path) => {
            std::fs::write(path, svg)?;
        }
        None => {
            print!("{}", svg);
        }
    }
    Ok(())
}

#[cfg(feature = "png")]
pub fn write_output_png(svg: &str, output: &Path, render_cfg: &RenderConfig) -> Result<()> {
    let mut opt = usvg::Options::default();
    opt.fontdb_mut().load_system_fonts();
    opt.default_size = usvg::Size::from_wh(render_cfg.width as f32, render_cfg.height as f32)
        .ok_or_else(|| anyhow::anyhow!("invalid output size {}x{}", render_cfg.width, render_cfg.height))?;

    let tree = usvg::Tree::from_str(svg, &opt)?;
    let size = tree.size().to_int_size();
    let mut pixmap = resvg::tiny_skia::Pixmap::new(size.width(), size.height())
        .ok_or_else(|| anyhow::anyhow!("Failed to allocate pixmap"))?;

    let mut pixmap_mut = pixmap.as_mut();
    resvg::render(&tree, resvg::tiny_skia::Transform::default(), &mut pixmap_mut);
    pixmap.save_png(output)?;
    Ok(())
}

#[cfg(not(feature = "png"))]
pub fn write_output_png(_svg: &str, _output: &Path, _render_cfg: &RenderConfig) -> Result<()> {
    Err(anyhow::anyhow!("PNG output requires the `png` feature"))
}

fn escape_xml(input: &str) -> String {
    input
        .replace('&', "&amp;")
        .replace('<', "&lt;")
        .replace('>', "&gt;")
        .replace('"', "&quot;")
        .replace('\'', "&apos;")
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::figure::{AxisKind, LineElement, PatchElement, PatchRole};

    fn figure() -> (Figure, crate::figure::SurfaceId) {
        let mut fig = Figure::new(500.0, 400.0);
        let s = fig.add_surface(BBox::new(100.0, 50.0, 500.0, 350.0), AxisKind::Linear);
        fig.set_xlim(s, 0.0, 10.0).unwrap();
        fig.set_ylim(s, 0.0, 100.0).unwrap();
        (fig, s)
    }

    #[test]
    fn text_extent_follows_alignment() {
        let (mut fig, s) = figure();
        let mut text = TextElement::new("abcd", (5.0, 50.0), 10.0, "#000");
        text.v_align = VAlign::Bottom;
        let id = fig.add_element(s, ElementKind::Text(text)).unwrap();
        let renderer = SvgRenderer::default();
        let b = renderer.window_extent(&fig, id).unwrap();
        // Anchor pixel is (300, 200); 4 chars * 6px wide, 12px tall, above.
        assert_eq!(b, BBox::new(288.0, 188.0, 312.0, 200.0));
    }

    #[test]
    fn reference_line_spans_plot_area() {
        let (mut fig, s) = figure();
        let id = fig
            .add_element(
                s,
                ElementKind::Line(LineElement {
                    geometry: LineGeometry::Horizontal(50.0),
                    color: "#000".to_string(),
                    width: 1.0,
                    dash: LineDash::Dashed,
                    markers: false,
                }),
            )
            .unwrap();
        let renderer = SvgRenderer::default();
        assert_eq!(renderer.path_pixels(&fig, id), vec![(100.0, 200.0), (500.0, 200.0)]);
        let b = renderer.window_extent(&fig, id).unwrap();
        assert_eq!(b.height(), 0.0);
    }

    #[test]
    fn band_covers_full_height() {
        let (mut fig, s) = figure();
        let id = fig
            .add_element(
                s,
                ElementKind::Patch(PatchElement {
                    geometry: PatchGeometry::XSpan { x0: 2.0, x1: 4.0 },
                    fill: "#eee".to_string(),
                    stroke: None,
                    role: PatchRole::Band,
                    lines: Vec::new(),
                }),
            )
            .unwrap();
        let b = SvgRenderer::default().window_extent(&fig, id).unwrap();
        assert_eq!(b, BBox::new(180.0, 50.0, 260.0, 350.0));
    }

    #[test]
    fn render_svg_contains_text_and_escapes() {
        let (mut fig, s) = figure();
        fig.title = Some("Sales & costs".to_string());
        fig.add_element(s, ElementKind::Text(TextElement::new("<peak>", (5.0, 50.0), 10.0, "#000")))
            .unwrap();
        let mut renderer = SvgRenderer::default();
        let svg = renderer.render_svg(&fig, &Theme::standard());
        assert!(svg.starts_with("<svg"));
        assert!(svg.ends_with("</svg>"));
        assert!(svg.contains("Sales &amp; costs"));
        assert!(svg.contains("&lt;peak&gt;"));
        assert_eq!(renderer.passes(), 1);
    }

    #[test]
    fn nice_ticks_are_round() {
        assert_eq!(nice_ticks(0.0, 100.0, 5), vec![0.0, 50.0, 100.0]);
        assert_eq!(nice_ticks(0.0, 1.0, 5), vec![0.0, 0.5, 1.0]);
        assert!(nice_ticks(1.0, 1.0, 5).is_empty());
    }
}
