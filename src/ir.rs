// Declarative chart description read by the CLI, and the builder that turns
// it into a `Chart`.

use crate::config::Config;
use crate::error::ChartError;
use crate::figure::{AxisKind, DataValue, LineDash, SurfaceId};
use crate::format::ValueFormat;
use crate::plot::{BandOptions, BarOptions, Chart, LineOptions, RefLineOptions};
use serde::{Deserialize, Serialize};

/// Share of the smallest x spacing filled by a group of bars.
const BAR_SLOT: f64 = 0.8;

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ChartSpec {
    #[serde(default)]
    pub title: Option<String>,
    #[serde(default)]
    pub width: Option<f64>,
    #[serde(default)]
    pub height: Option<f64>,
    pub x: XAxisSpec,
    #[serde(default)]
    pub series: Vec<SeriesSpec>,
    #[serde(default)]
    pub reference_lines: Vec<ReferenceLineSpec>,
    #[serde(default)]
    pub bands: Vec<BandSpec>,
    #[serde(default)]
    pub annotations: Vec<AnnotationSpec>,
    /// Defaults to a legend whenever a series has a name.
    #[serde(default)]
    pub legend: Option<bool>,
    #[serde(default)]
    pub y_label: Option<String>,
    #[serde(default)]
    pub y2_label: Option<String>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum XKind {
    #[default]
    Category,
    Number,
    Date,
}

/// An x position: a number, a category name or a date string.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum XValue {
    Number(f64),
    Text(String),
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct XAxisSpec {
    #[serde(default)]
    pub kind: XKind,
    pub values: Vec<XValue>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum SeriesKind {
    #[default]
    Bar,
    Line,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum YAxisRef {
    #[default]
    Left,
    Right,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Orientation {
    #[default]
    Horizontal,
    Vertical,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SeriesSpec {
    #[serde(default)]
    pub name: Option<String>,
    #[serde(default)]
    pub kind: SeriesKind,
    #[serde(default)]
    pub axis: YAxisRef,
    /// One value per x position; `null` leaves a gap.
    pub values: Vec<Option<f64>>,
    /// Value labels; on by default for bars, off for lines.
    #[serde(default)]
    pub labels: Option<bool>,
    #[serde(default)]
    pub end_label: bool,
    #[serde(default)]
    pub format: ValueFormat,
    #[serde(default)]
    pub color: Option<String>,
    #[serde(default)]
    pub stack: bool,
    #[serde(default)]
    pub dash: LineDash,
    #[serde(default = "default_markers")]
    pub markers: bool,
}

fn default_markers() -> bool {
    true
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ReferenceLineSpec {
    #[serde(default)]
    pub orientation: Orientation,
    pub value: XValue,
    #[serde(default)]
    pub axis: YAxisRef,
    #[serde(default)]
    pub caption: Option<String>,
    #[serde(default)]
    pub color: Option<String>,
    #[serde(default)]
    pub dash: Option<LineDash>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct BandSpec {
    #[serde(default = "vertical")]
    pub orientation: Orientation,
    pub from: XValue,
    pub to: XValue,
    #[serde(default)]
    pub axis: YAxisRef,
    #[serde(default)]
    pub color: Option<String>,
    #[serde(default)]
    pub alpha: Option<f64>,
}

fn vertical() -> Orientation {
    Orientation::Vertical
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct AnnotationSpec {
    pub text: String,
    pub x: XValue,
    pub y: f64,
    #[serde(default)]
    pub axis: YAxisRef,
}

impl ChartSpec {
    /// Parse JSON or JSON5 text.
    pub fn from_json5(text: &str) -> Result<Self, json5::Error> {
        json5::from_str(text)
    }
}

/// Maps the x values of a chart description onto the numeric x axis.
struct XResolver<'a> {
    kind: XKind,
    categories: Vec<String>,
    raw: &'a [XValue],
}

impl<'a> XResolver<'a> {
    fn new(spec: &'a XAxisSpec) -> Self {
        let categories = match spec.kind {
            XKind::Category => spec.values.iter().map(category_name).collect(),
            _ => Vec::new(),
        };
        Self {
            kind: spec.kind,
            categories,
            raw: &spec.values,
        }
    }

    fn resolve(&self, value: &XValue) -> Result<f64, ChartError> {
        match (self.kind, value) {
            (XKind::Category, v) => {
                let name = category_name(v);
                self.categories
                    .iter()
                    .position(|c| *c == name)
                    .map(|idx| idx as f64)
                    .ok_or(ChartError::UnknownCategory(name))
            }
            (XKind::Number, XValue::Number(n)) => Ok(*n),
            (XKind::Number, XValue::Text(t)) => t
                .trim()
                .parse::<f64>()
                .map_err(|_| ChartError::MismatchedX(t.clone())),
            (XKind::Date, XValue::Text(t)) => Ok(DataValue::parse_date(t)?.to_ordinal()),
            (XKind::Date, XValue::Number(n)) => Err(ChartError::MismatchedX(n.to_string())),
        }
    }

    fn positions(&self) -> Result<Vec<f64>, ChartError> {
        match self.kind {
            XKind::Category => Ok((0..self.raw.len()).map(|i| i as f64).collect()),
            _ => self.raw.iter().map(|v| self.resolve(v)).collect(),
        }
    }
}

fn category_name(value: &XValue) -> String {
    match value {
        XValue::Number(n) => n.to_string(),
        XValue::Text(t) => t.clone(),
    }
}

fn min_spacing(xs: &[f64]) -> f64 {
    let mut sorted: Vec<f64> = xs.iter().copied().filter(|x| x.is_finite()).collect();
    sorted.sort_by(f64::total_cmp);
    sorted
        .windows(2)
        .map(|w| w[1] - w[0])
        .filter(|d| *d > 0.0)
        .fold(None, |acc: Option<f64>, d| Some(acc.map_or(d, |a| a.min(d))))
        .unwrap_or(1.0)
}

/// Build a chart from its description. Series are drawn in order; bars that
/// do not stack are placed side by side within each x slot.
pub fn build_chart(spec: &ChartSpec, mut config: Config) -> Result<Chart, ChartError> {
    if spec.series.is_empty() || spec.x.values.is_empty() {
        return Err(ChartError::Empty);
    }
    if let Some(width) = spec.width {
        config.render.width = width;
    }
    if let Some(height) = spec.height {
        config.render.height = height;
    }

    let x_kind = match spec.x.kind {
        XKind::Date => AxisKind::Date,
        _ => AxisKind::Linear,
    };
    let mut chart = Chart::new(config, x_kind);
    let left = chart.primary();
    let resolver = XResolver::new(&spec.x);
    let xs = resolver.positions()?;

    if let Some(title) = &spec.title {
        chart.set_title(title.clone());
    }
    if spec.x.kind == XKind::Category {
        chart.set_categories(left, resolver.categories.clone())?;
    }
    if let Some(label) = &spec.y_label {
        chart.set_y_label(left, label.clone())?;
    }

    let mut right: Option<SurfaceId> = None;
    let mut surface_for = |chart: &mut Chart, axis: YAxisRef| -> Result<SurfaceId, ChartError> {
        match axis {
            YAxisRef::Left => Ok(left),
            YAxisRef::Right => match right {
                Some(id) => Ok(id),
                None => {
                    let id = chart.twinx(left)?;
                    if let Some(label) = &spec.y2_label {
                        chart.set_y_label(id, label.clone())?;
                    }
                    right = Some(id);
                    Ok(id)
                }
            },
        }
    };

    let bars = spec.series.iter().filter(|s| s.kind == SeriesKind::Bar);
    let has_stack = bars.clone().any(|s| s.stack);
    let groups = bars.filter(|s| !s.stack).count() + usize::from(has_stack);
    let slot = min_spacing(&xs) * BAR_SLOT;
    let bar_width = slot / groups.max(1) as f64;
    let mut group = 0usize;
    let mut stack_group: Option<usize> = None;

    for series in &spec.series {
        let surface = surface_for(&mut chart, series.axis)?;
        let values: Vec<f64> = series.values.iter().map(|v| v.unwrap_or(f64::NAN)).collect();
        match series.kind {
            SeriesKind::Bar => {
                let slot_index = if series.stack {
                    *stack_group.get_or_insert_with(|| {
                        group += 1;
                        group - 1
                    })
                } else {
                    group += 1;
                    group - 1
                };
                let opts = BarOptions {
                    name: series.name.clone(),
                    color: series.color.clone(),
                    width: bar_width,
                    offset: -slot / 2.0 + bar_width * (slot_index as f64 + 0.5),
                    labels: series.labels.unwrap_or(true),
                    format: series.format.clone(),
                    stack: series.stack,
                };
                chart.bar(surface, &xs, &values, &opts)?;
            }
            SeriesKind::Line => {
                let opts = LineOptions {
                    name: series.name.clone(),
                    color: series.color.clone(),
                    dash: series.dash,
                    markers: series.markers,
                    labels: series.labels.unwrap_or(false),
                    end_label: series.end_label,
                    format: series.format.clone(),
                    ..LineOptions::default()
                };
                chart.line(surface, &xs, &values, &opts)?;
            }
        }
    }

    for line in &spec.reference_lines {
        let surface = surface_for(&mut chart, line.axis)?;
        let opts = RefLineOptions {
            caption: line.caption.clone(),
            color: line.color.clone(),
            dash: line.dash,
            width: None,
        };
        match line.orientation {
            Orientation::Horizontal => {
                let y = y_value(&line.value)?;
                chart.axhline(surface, y, &opts)?;
            }
            Orientation::Vertical => {
                let x = resolver.resolve(&line.value)?;
                chart.axvline(surface, x, &opts)?;
            }
        }
    }

    for band in &spec.bands {
        let surface = surface_for(&mut chart, band.axis)?;
        let opts = BandOptions {
            color: band.color.clone(),
            alpha: band.alpha,
        };
        match band.orientation {
            Orientation::Vertical => {
                // Category bands cover whole slots.
                let pad = if spec.x.kind == XKind::Category { 0.5 } else { 0.0 };
                let (a, b) = (resolver.resolve(&band.from)?, resolver.resolve(&band.to)?);
                chart.axvspan(surface, a.min(b) - pad, a.max(b) + pad, &opts)?;
            }
            Orientation::Horizontal => {
                chart.axhspan(surface, y_value(&band.from)?, y_value(&band.to)?, &opts)?;
            }
        }
    }

    for note in &spec.annotations {
        let surface = surface_for(&mut chart, note.axis)?;
        let x = resolver.resolve(&note.x)?;
        chart.annotate(surface, note.text.clone(), (x, note.y))?;
    }

    let named = spec.series.iter().any(|s| s.name.is_some());
    if spec.legend.unwrap_or(named) {
        chart.legend(left)?;
    }
    Ok(chart)
}

fn y_value(value: &XValue) -> Result<f64, ChartError> {
    match value {
        XValue::Number(n) => Ok(*n),
        XValue::Text(t) => t.trim().parse().map_err(|_| ChartError::MismatchedX(t.clone())),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::RenderConfig;
    use crate::figure::{ElementKind, PatchGeometry};

    fn config() -> Config {
        Config {
            render: RenderConfig {
                system_fonts: false,
                ..RenderConfig::default()
            },
            ..Config::default()
        }
    }

    const DUAL_AXIS: &str = r#"{
        // revenue bars with a margin line on the right axis
        title: "Revenue and margin",
        x: { kind: "category", values: ["Q1", "Q2", "Q3", "Q4"] },
        series: [
            { name: "Revenue", kind: "bar", values: [120, 135, 128, null] },
            { name: "Margin", kind: "line", axis: "right", values: [0.21, 0.24, 0.22, 0.25],
              labels: true, format: { kind: "percent" } },
        ],
        referenceLines: [{ value: 130, caption: "target" }],
        annotations: [{ text: "launch", x: "Q2", y: 140 }],
    }"#;

    #[test]
    fn parses_json5_with_comments() {
        let spec = ChartSpec::from_json5(DUAL_AXIS).unwrap();
        assert_eq!(spec.series.len(), 2);
        assert_eq!(spec.series[1].axis, YAxisRef::Right);
        assert_eq!(spec.series[0].values[3], None);
        assert_eq!(spec.reference_lines[0].orientation, Orientation::Horizontal);
    }

    #[test]
    fn builds_a_twin_axis_lazily() {
        let spec = ChartSpec::from_json5(DUAL_AXIS).unwrap();
        let chart = build_chart(&spec, config()).unwrap();
        let left = chart.primary();
        let siblings = chart.figure().siblings(left);
        assert_eq!(siblings.len(), 1);
        // One label per present bar, one per line point.
        assert_eq!(chart.registry().movables(siblings[0]).len(), 4);
        assert!(chart.registry().movables(left).len() >= 3 + 1 + 1);
    }

    #[test]
    fn side_by_side_bars_share_the_slot() {
        let spec = ChartSpec {
            x: XAxisSpec {
                kind: XKind::Number,
                values: vec![XValue::Number(0.0), XValue::Number(2.0)],
            },
            series: vec![
                SeriesSpec {
                    values: vec![Some(1.0), Some(2.0)],
                    ..SeriesSpec::default()
                },
                SeriesSpec {
                    values: vec![Some(3.0), Some(4.0)],
                    ..SeriesSpec::default()
                },
            ],
            ..ChartSpec::default()
        };
        let chart = build_chart(&spec, config()).unwrap();
        let spans: Vec<(f64, f64)> = chart
            .figure()
            .paint_order()
            .iter()
            .filter_map(|el| match &el.kind {
                ElementKind::Patch(p) => match p.geometry {
                    PatchGeometry::Data { x0, x1, .. } => Some((x0, x1)),
                    _ => None,
                },
                _ => None,
            })
            .collect();
        assert_eq!(spans.len(), 4);
        approx::assert_abs_diff_eq!(spans[0].0, -0.8, epsilon = 1e-9);
        approx::assert_abs_diff_eq!(spans[0].1, 0.0, epsilon = 1e-9);
        approx::assert_abs_diff_eq!(spans[2].0, 0.0, epsilon = 1e-9);
        approx::assert_abs_diff_eq!(spans[2].1, 0.8, epsilon = 1e-9);
    }

    #[test]
    fn unknown_category_is_rejected() {
        let mut spec = ChartSpec::from_json5(DUAL_AXIS).unwrap();
        spec.annotations[0].x = XValue::Text("Q9".to_string());
        let err = build_chart(&spec, config()).unwrap_err();
        assert_eq!(err, ChartError::UnknownCategory("Q9".to_string()));
    }

    #[test]
    fn date_axis_rejects_numbers() {
        let spec = ChartSpec {
            x: XAxisSpec {
                kind: XKind::Date,
                values: vec![XValue::Text("2024-01-01".to_string()), XValue::Number(3.0)],
            },
            series: vec![SeriesSpec {
                kind: SeriesKind::Line,
                values: vec![Some(1.0), Some(2.0)],
                ..SeriesSpec::default()
            }],
            ..ChartSpec::default()
        };
        let err = build_chart(&spec, config()).unwrap_err();
        assert!(matches!(err, ChartError::MismatchedX(_)));
    }

    #[test]
    fn empty_chart_is_an_error() {
        let spec = ChartSpec::default();
        assert_eq!(build_chart(&spec, config()).unwrap_err(), ChartError::Empty);
    }
}
