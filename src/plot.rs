// Chart-type helpers. Each helper draws its elements into the figure and
// registers them with the collision registry in the role they play: value
// labels and captions move, reference lines and legends stay put, bands are
// ignored, and plotted lines are avoided as curves.

use crate::collision::geometry::BBox;
use crate::collision::{Registry, ResolutionReport, resolve_composed};
use crate::config::Config;
use crate::error::ChartError;
use crate::figure::{
    AxisKind, ElementId, ElementKind, Figure, HAlign, LineDash, LineElement, LineGeometry,
    PatchElement, PatchGeometry, PatchRole, SurfaceId, TextElement, VAlign,
};
use crate::format::ValueFormat;
use crate::render::SvgRenderer;
use crate::text_metrics::TextMeasure;
use std::collections::{BTreeMap, HashMap};

const MARGIN_LEFT: f64 = 72.0;
const MARGIN_RIGHT: f64 = 72.0;
const MARGIN_TOP: f64 = 48.0;
const MARGIN_BOTTOM: f64 = 44.0;
/// Gap between a value label and the bar or point it describes.
const LABEL_GAP: f64 = 3.0;
const BAND_ALPHA: f64 = 0.15;

#[derive(Debug, Clone)]
pub struct BarOptions {
    pub name: Option<String>,
    pub color: Option<String>,
    /// Bar width in x data units.
    pub width: f64,
    /// Shift of the bar centre from its x value, in data units.
    pub offset: f64,
    pub labels: bool,
    pub format: ValueFormat,
    /// Stack on top of earlier stacked bars of the same surface.
    pub stack: bool,
}

impl Default for BarOptions {
    fn default() -> Self {
        Self {
            name: None,
            color: None,
            width: 0.8,
            offset: 0.0,
            labels: true,
            format: ValueFormat::default(),
            stack: false,
        }
    }
}

#[derive(Debug, Clone)]
pub struct LineOptions {
    pub name: Option<String>,
    pub color: Option<String>,
    pub width: f64,
    pub dash: LineDash,
    pub markers: bool,
    pub labels: bool,
    pub end_label: bool,
    pub format: ValueFormat,
}

impl Default for LineOptions {
    fn default() -> Self {
        Self {
            name: None,
            color: None,
            width: 2.0,
            dash: LineDash::Solid,
            markers: true,
            labels: false,
            end_label: false,
            format: ValueFormat::default(),
        }
    }
}

#[derive(Debug, Clone, Default)]
pub struct RefLineOptions {
    pub caption: Option<String>,
    pub color: Option<String>,
    pub dash: Option<LineDash>,
    pub width: Option<f64>,
}

#[derive(Debug, Clone, Default)]
pub struct BandOptions {
    pub color: Option<String>,
    pub alpha: Option<f64>,
}

#[derive(Debug, Clone, Default)]
pub struct BarSeries {
    pub bars: Vec<ElementId>,
    pub labels: Vec<ElementId>,
}

#[derive(Debug, Clone)]
pub struct LineSeries {
    pub line: ElementId,
    pub labels: Vec<ElementId>,
}

#[derive(Debug, Clone)]
pub struct ReferenceLine {
    pub line: ElementId,
    pub caption: Option<ElementId>,
}

/// A figure with its registry and configuration.
#[derive(Debug)]
pub struct Chart {
    figure: Figure,
    registry: Registry,
    config: Config,
    renderer: SvgRenderer,
    primary: SurfaceId,
    stacks: HashMap<(SurfaceId, u64, bool), f64>,
    series: usize,
    legend: Vec<(String, String)>,
}

impl Chart {
    pub fn new(config: Config, x_kind: AxisKind) -> Self {
        let mut figure = Figure::new(config.render.width, config.render.height);
        let plot = BBox::new(
            MARGIN_LEFT,
            MARGIN_TOP,
            (config.render.width - MARGIN_RIGHT).max(MARGIN_LEFT + 1.0),
            (config.render.height - MARGIN_BOTTOM).max(MARGIN_TOP + 1.0),
        );
        let primary = figure.add_surface(plot, x_kind);
        let renderer = if config.render.system_fonts {
            SvgRenderer::with_theme_fonts(&config.theme)
        } else {
            SvgRenderer::new(TextMeasure::Heuristic)
        };
        Self {
            figure,
            registry: Registry::new(),
            renderer,
            config,
            primary,
            stacks: HashMap::new(),
            series: 0,
            legend: Vec::new(),
        }
    }

    pub fn primary(&self) -> SurfaceId {
        self.primary
    }

    pub fn figure(&self) -> &Figure {
        &self.figure
    }

    pub fn figure_mut(&mut self) -> &mut Figure {
        &mut self.figure
    }

    pub fn registry(&self) -> &Registry {
        &self.registry
    }

    pub fn registry_mut(&mut self) -> &mut Registry {
        &mut self.registry
    }

    pub fn config(&self) -> &Config {
        &self.config
    }

    pub fn renderer(&self) -> &SvgRenderer {
        &self.renderer
    }

    pub fn set_title(&mut self, title: impl Into<String>) {
        self.figure.title = Some(title.into());
    }

    pub fn set_y_label(&mut self, surface: SurfaceId, label: impl Into<String>) -> Result<(), ChartError> {
        self.figure
            .surface_mut(surface)
            .ok_or(ChartError::UnknownSurface(surface))?
            .y_label = Some(label.into());
        Ok(())
    }

    /// Name the categories of a categorical x axis; category `i` is drawn at
    /// `x = i`.
    pub fn set_categories(&mut self, surface: SurfaceId, names: Vec<String>) -> Result<(), ChartError> {
        let axis = self
            .figure
            .x_axis_mut(surface)
            .ok_or(ChartError::UnknownSurface(surface))?;
        if !names.is_empty() {
            axis.set_limits(-0.5, names.len() as f64 - 0.5);
        }
        axis.categories = names;
        Ok(())
    }

    /// Secondary y axis sharing the x axis of `surface`.
    pub fn twinx(&mut self, surface: SurfaceId) -> Result<SurfaceId, ChartError> {
        self.figure.twinx(surface)
    }

    /// Drop a surface, its elements and its registrations.
    pub fn remove_surface(&mut self, surface: SurfaceId) -> bool {
        self.registry.release(surface);
        self.figure.remove_surface(surface)
    }

    fn next_color(&mut self, requested: Option<&str>) -> String {
        let color = requested
            .map(str::to_string)
            .unwrap_or_else(|| self.config.theme.color(self.series).to_string());
        self.series += 1;
        color
    }

    fn label(&self, text: String, position: (f64, f64)) -> TextElement {
        let mut label = TextElement::new(text, position, self.config.theme.font_size, &self.config.theme.text_color);
        label.background = self.config.theme.label_background.clone();
        label
    }

    /// Offset that keeps a label clear of the element it describes once
    /// both are padded.
    fn caption_gap(&self) -> f64 {
        self.config.resolution.obstacle_padding + self.config.resolution.label_padding + 1.0
    }

    pub fn bar(
        &mut self,
        surface: SurfaceId,
        xs: &[f64],
        values: &[f64],
        opts: &BarOptions,
    ) -> Result<BarSeries, ChartError> {
        if xs.len() != values.len() {
            return Err(ChartError::LengthMismatch {
                name: opts.name.clone().unwrap_or_default(),
                values: values.len(),
                categories: xs.len(),
            });
        }
        if self.figure.surface(surface).is_none() {
            return Err(ChartError::UnknownSurface(surface));
        }
        let color = self.next_color(opts.color.as_deref());
        let mut series = BarSeries::default();
        for (&x, &value) in xs.iter().zip(values) {
            if !value.is_finite() {
                continue;
            }
            let center = x + opts.offset;
            let base = if opts.stack {
                // Positive and negative values stack separately.
                let key = (surface, center.to_bits(), value < 0.0);
                let base = self.stacks.get(&key).copied().unwrap_or(0.0);
                self.stacks.insert(key, base + value);
                base
            } else {
                0.0
            };
            let top = base + value;
            let bar = self.figure.add_element(
                surface,
                ElementKind::Patch(PatchElement {
                    geometry: PatchGeometry::Data {
                        x0: center - opts.width / 2.0,
                        y0: base,
                        x1: center + opts.width / 2.0,
                        y1: top,
                    },
                    fill: color.clone(),
                    stroke: None,
                    role: PatchRole::Bar,
                    lines: Vec::new(),
                }),
            )?;
            series.bars.push(bar);

            if opts.labels {
                let mut label = self.label(opts.format.format(value), (center, top));
                if value >= 0.0 {
                    label.v_align = VAlign::Bottom;
                    label.offset = (0.0, -self.caption_gap());
                } else {
                    label.v_align = VAlign::Top;
                    label.offset = (0.0, self.caption_gap());
                }
                let id = self.figure.add_element(surface, ElementKind::Text(label))?;
                self.registry.register_movable(surface, id);
                series.labels.push(id);
            }
        }
        if let Some(name) = &opts.name {
            self.legend.push((color, name.clone()));
        }
        Ok(series)
    }

    pub fn line(
        &mut self,
        surface: SurfaceId,
        xs: &[f64],
        ys: &[f64],
        opts: &LineOptions,
    ) -> Result<LineSeries, ChartError> {
        if xs.len() != ys.len() {
            return Err(ChartError::LengthMismatch {
                name: opts.name.clone().unwrap_or_default(),
                values: ys.len(),
                categories: xs.len(),
            });
        }
        if self.figure.surface(surface).is_none() {
            return Err(ChartError::UnknownSurface(surface));
        }
        let color = self.next_color(opts.color.as_deref());
        let points: Vec<(f64, f64)> = xs
            .iter()
            .zip(ys)
            .filter(|(x, y)| x.is_finite() && y.is_finite())
            .map(|(x, y)| (*x, *y))
            .collect();
        let line = self.figure.add_element(
            surface,
            ElementKind::Line(LineElement {
                geometry: LineGeometry::Data(points.clone()),
                color: color.clone(),
                width: opts.width,
                dash: opts.dash,
                markers: opts.markers,
            }),
        )?;
        self.registry.register_curve_obstacle(surface, line);

        let mut labels = Vec::new();
        if opts.labels {
            for &(x, y) in &points {
                let mut label = self.label(opts.format.format(y), (x, y));
                label.v_align = VAlign::Bottom;
                label.offset = (0.0, -(self.caption_gap() + opts.width / 2.0));
                label.color = color.clone();
                let id = self.figure.add_element(surface, ElementKind::Text(label))?;
                self.registry.register_movable_on_curve(surface, id, line);
                labels.push(id);
            }
        }
        if opts.end_label
            && let Some(&(x, y)) = points.last()
        {
            let text = opts.name.clone().unwrap_or_else(|| opts.format.format(y));
            let mut label = self.label(text, (x, y));
            label.h_align = HAlign::Left;
            label.offset = (LABEL_GAP * 2.0, 0.0);
            label.color = color.clone();
            let id = self.figure.add_element(surface, ElementKind::Text(label))?;
            self.registry.register_movable_on_curve(surface, id, line);
            labels.push(id);
        }
        if let Some(name) = &opts.name {
            self.legend.push((color, name.clone()));
        }
        Ok(LineSeries { line, labels })
    }

    fn reference_line(
        &mut self,
        surface: SurfaceId,
        geometry: LineGeometry,
        opts: &RefLineOptions,
    ) -> Result<ElementId, ChartError> {
        let line = self.figure.add_element(
            surface,
            ElementKind::Line(LineElement {
                geometry,
                color: opts
                    .color
                    .clone()
                    .unwrap_or_else(|| self.config.theme.axis_color.clone()),
                width: opts.width.unwrap_or(1.0),
                dash: opts.dash.unwrap_or(LineDash::Dashed),
                markers: false,
            }),
        )?;
        self.registry.register_fixed(surface, line);
        Ok(line)
    }

    /// Horizontal reference line at `y`, with an optional caption above its
    /// right end.
    pub fn axhline(&mut self, surface: SurfaceId, y: f64, opts: &RefLineOptions) -> Result<ReferenceLine, ChartError> {
        let line = self.reference_line(surface, LineGeometry::Horizontal(y), opts)?;
        let caption = match &opts.caption {
            Some(text) => {
                let x_max = self
                    .figure
                    .x_axis(surface)
                    .map(|a| a.limits().1)
                    .ok_or(ChartError::UnknownSurface(surface))?;
                let mut label = self.label(text.clone(), (x_max, y));
                label.h_align = HAlign::Right;
                label.v_align = VAlign::Bottom;
                label.offset = (-LABEL_GAP, -self.caption_gap());
                let id = self.figure.add_element(surface, ElementKind::Text(label))?;
                self.registry.register_movable(surface, id);
                Some(id)
            }
            None => None,
        };
        Ok(ReferenceLine { line, caption })
    }

    /// Vertical reference line at `x`, with an optional caption right of its
    /// top end.
    pub fn axvline(&mut self, surface: SurfaceId, x: f64, opts: &RefLineOptions) -> Result<ReferenceLine, ChartError> {
        let line = self.reference_line(surface, LineGeometry::Vertical(x), opts)?;
        let caption = match &opts.caption {
            Some(text) => {
                let y_max = self
                    .figure
                    .surface(surface)
                    .map(|s| s.y_axis.limits().1)
                    .ok_or(ChartError::UnknownSurface(surface))?;
                let mut label = self.label(text.clone(), (x, y_max));
                label.h_align = HAlign::Left;
                label.v_align = VAlign::Top;
                label.offset = (self.caption_gap(), LABEL_GAP);
                let id = self.figure.add_element(surface, ElementKind::Text(label))?;
                self.registry.register_movable(surface, id);
                Some(id)
            }
            None => None,
        };
        Ok(ReferenceLine { line, caption })
    }

    fn band(&mut self, surface: SurfaceId, geometry: PatchGeometry, opts: &BandOptions) -> Result<ElementId, ChartError> {
        let band = self.figure.add_element(
            surface,
            ElementKind::Patch(PatchElement {
                geometry,
                fill: opts
                    .color
                    .clone()
                    .unwrap_or_else(|| self.config.theme.grid_color.clone()),
                stroke: None,
                role: PatchRole::Band,
                lines: Vec::new(),
            }),
        )?;
        if let Some(el) = self.figure.element_mut(band) {
            el.alpha = opts.alpha.unwrap_or(BAND_ALPHA);
        }
        self.registry.register_passive(surface, band);
        Ok(band)
    }

    /// Shaded full-height band between `x0` and `x1`. Labels ignore it.
    pub fn axvspan(&mut self, surface: SurfaceId, x0: f64, x1: f64, opts: &BandOptions) -> Result<ElementId, ChartError> {
        self.band(surface, PatchGeometry::XSpan { x0, x1 }, opts)
    }

    /// Shaded full-width band between `y0` and `y1`. Labels ignore it.
    pub fn axhspan(&mut self, surface: SurfaceId, y0: f64, y1: f64, opts: &BandOptions) -> Result<ElementId, ChartError> {
        self.band(surface, PatchGeometry::YSpan { y0, y1 }, opts)
    }

    /// Free text at a data position; it moves like any value label.
    pub fn annotate(&mut self, surface: SurfaceId, text: impl Into<String>, position: (f64, f64)) -> Result<ElementId, ChartError> {
        let label = self.label(text.into(), position);
        let id = self.figure.add_element(surface, ElementKind::Text(label))?;
        self.registry.register_movable(surface, id);
        Ok(id)
    }

    /// Legend box in the top right corner of the plotting area, listing
    /// every named series drawn so far.
    pub fn legend(&mut self, surface: SurfaceId) -> Result<Option<ElementId>, ChartError> {
        if self.legend.is_empty() {
            return Ok(None);
        }
        let plot = self
            .figure
            .surface(surface)
            .ok_or(ChartError::UnknownSurface(surface))?
            .plot_area;
        let font_size = self.config.theme.font_size;
        let text_width = self
            .legend
            .iter()
            .map(|(_, name)| self.renderer.measure().extent(name, font_size).width)
            .fold(0.0_f64, f64::max);
        let width = text_width + 30.0;
        let height = self.legend.len() as f64 * font_size * 1.4 + font_size * 0.6;
        let x1 = plot.x1 - 8.0;
        let y0 = plot.y0 + 8.0;
        let id = self.figure.add_element(
            surface,
            ElementKind::Patch(PatchElement {
                geometry: PatchGeometry::Pixels(BBox::new(x1 - width, y0, x1, y0 + height)),
                fill: self.config.theme.background.clone(),
                stroke: Some(self.config.theme.axis_color.clone()),
                role: PatchRole::Legend,
                lines: self.legend.clone(),
            }),
        )?;
        self.registry.register_fixed(surface, id);
        Ok(Some(id))
    }

    /// Resolve the given surfaces jointly with the chart's configuration.
    pub fn resolve_with(&mut self, surfaces: &[SurfaceId]) -> ResolutionReport {
        let cfg = self.config.resolution.clone().with_theme(&self.config.theme);
        resolve_composed(&mut self.figure, &mut self.registry, &mut self.renderer, surfaces, &cfg)
    }

    /// Resolve every surface, one composed pass per group of surfaces that
    /// share an x axis.
    pub fn resolve(&mut self) -> Vec<ResolutionReport> {
        let mut groups: BTreeMap<_, Vec<SurfaceId>> = BTreeMap::new();
        for surface in self.figure.surfaces() {
            groups.entry(surface.group).or_default().push(surface.id);
        }
        groups.into_values().map(|surfaces| self.resolve_with(&surfaces)).collect()
    }

    pub fn render_svg(&mut self) -> String {
        self.renderer.render_svg(&self.figure, &self.config.theme)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::RenderConfig;

    fn chart() -> Chart {
        let config = Config {
            render: RenderConfig {
                system_fonts: false,
                ..RenderConfig::default()
            },
            ..Config::default()
        };
        Chart::new(config, AxisKind::Linear)
    }

    #[test]
    fn bar_labels_are_movable_and_bars_are_detected() {
        let mut chart = chart();
        let s = chart.primary();
        let series = chart.bar(s, &[0.0, 1.0, 2.0], &[3.0, 5.0, 4.0], &BarOptions::default()).unwrap();
        assert_eq!(series.bars.len(), 3);
        assert_eq!(chart.registry().movables(s), series.labels.as_slice());
        let excluded = series.labels.iter().copied().collect();
        assert_eq!(chart.registry().collect_obstacles(chart.figure(), s, &excluded).len(), 3);
    }

    #[test]
    fn default_bar_label_starts_clear_of_its_bar() {
        let mut chart = chart();
        let s = chart.primary();
        chart.bar(s, &[0.0], &[5.0], &BarOptions::default()).unwrap();
        chart.bar(s, &[1.0], &[-3.0], &BarOptions::default()).unwrap();
        let reports = chart.resolve();
        assert_eq!(reports.len(), 1);
        assert_eq!(reports[0].displacements, 0);
        assert!(reports[0].unresolved().next().is_none());
    }

    #[test]
    fn stacked_bars_start_on_previous_top() {
        let mut chart = chart();
        let s = chart.primary();
        let opts = BarOptions {
            stack: true,
            labels: false,
            ..BarOptions::default()
        };
        chart.bar(s, &[0.0], &[3.0], &opts).unwrap();
        let top = chart.bar(s, &[0.0], &[2.0], &opts).unwrap();
        let ElementKind::Patch(patch) = &chart.figure().element(top.bars[0]).unwrap().kind else {
            panic!("bar is not a patch");
        };
        assert_eq!(
            patch.geometry,
            PatchGeometry::Data {
                x0: -0.4,
                y0: 3.0,
                x1: 0.4,
                y1: 5.0
            }
        );
    }

    #[test]
    fn mismatched_lengths_are_rejected() {
        let mut chart = chart();
        let s = chart.primary();
        let err = chart.line(s, &[0.0, 1.0], &[1.0], &LineOptions::default()).unwrap_err();
        assert!(matches!(err, ChartError::LengthMismatch { .. }));
    }

    #[test]
    fn line_labels_remember_their_curve() {
        let mut chart = chart();
        let s = chart.primary();
        let opts = LineOptions {
            labels: true,
            ..LineOptions::default()
        };
        let series = chart.line(s, &[0.0, 1.0], &[1.0, 2.0], &opts).unwrap();
        assert_eq!(chart.registry().curves(s), &[series.line]);
        for label in &series.labels {
            assert_eq!(chart.registry().source_curve(s, *label), Some(series.line));
        }
    }

    #[test]
    fn bands_are_passive() {
        let mut chart = chart();
        let s = chart.primary();
        chart.bar(s, &[0.0], &[1.0], &BarOptions::default()).unwrap();
        chart.axvspan(s, -0.5, 0.5, &BandOptions::default()).unwrap();
        let obstacles = chart.registry().collect_obstacles(chart.figure(), s, &Default::default());
        assert_eq!(obstacles.len(), 1);
    }

    #[test]
    fn removing_a_surface_releases_registrations() {
        let mut chart = chart();
        let twin = chart.twinx(chart.primary()).unwrap();
        chart.annotate(twin, "note", (0.0, 0.0)).unwrap();
        assert!(chart.registry().is_tracked(twin));
        assert!(chart.remove_surface(twin));
        assert!(!chart.registry().is_tracked(twin));
    }

    #[test]
    fn resolve_and_render() {
        let mut chart = chart();
        let s = chart.primary();
        chart.set_title("Quarterly revenue");
        chart
            .bar(
                s,
                &[0.0, 1.0, 2.0],
                &[10.0, 10.2, 9.9],
                &BarOptions {
                    name: Some("revenue".to_string()),
                    ..BarOptions::default()
                },
            )
            .unwrap();
        chart
            .axhline(
                s,
                10.1,
                &RefLineOptions {
                    caption: Some("target".to_string()),
                    ..RefLineOptions::default()
                },
            )
            .unwrap();
        chart.legend(s).unwrap();
        let reports = chart.resolve();
        assert_eq!(reports.len(), 1);
        let svg = chart.render_svg();
        assert!(svg.contains("Quarterly revenue"));
        assert!(svg.contains("target"));
    }
}
