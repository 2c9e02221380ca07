use crate::collision::geometry::{BBox, Point};
use crate::error::ChartError;
use chrono::{Datelike, NaiveDate, NaiveDateTime, Timelike};
use serde::{Deserialize, Serialize};

const SECONDS_PER_DAY: f64 = 86_400.0;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, Default)]
#[serde(rename_all = "lowercase")]
pub enum AxisKind {
    #[default]
    Linear,
    Date,
}

/// A value as it appears in the input table. Dates are mapped to a day
/// ordinal before any transform runs.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum DataValue {
    Number(f64),
    DateTime(NaiveDateTime),
    Date(NaiveDate),
}

impl DataValue {
    pub fn to_ordinal(self) -> f64 {
        match self {
            DataValue::Number(v) => v,
            DataValue::Date(d) => date_ordinal(d),
            DataValue::DateTime(dt) => {
                date_ordinal(dt.date()) + dt.time().num_seconds_from_midnight() as f64 / SECONDS_PER_DAY
            }
        }
    }

    /// Parse `YYYY-MM-DD` or `YYYY-MM-DDTHH:MM:SS`.
    pub fn parse_date(raw: &str) -> Result<Self, ChartError> {
        let trimmed = raw.trim();
        if let Ok(dt) = NaiveDateTime::parse_from_str(trimmed, "%Y-%m-%dT%H:%M:%S") {
            return Ok(DataValue::DateTime(dt));
        }
        NaiveDate::parse_from_str(trimmed, "%Y-%m-%d")
            .map(DataValue::Date)
            .map_err(|_| ChartError::InvalidDate(raw.to_string()))
    }
}

impl From<f64> for DataValue {
    fn from(value: f64) -> Self {
        DataValue::Number(value)
    }
}

impl From<NaiveDate> for DataValue {
    fn from(value: NaiveDate) -> Self {
        DataValue::Date(value)
    }
}

pub fn date_ordinal(date: NaiveDate) -> f64 {
    date.num_days_from_ce() as f64
}

pub fn ordinal_to_date(ordinal: f64) -> Option<NaiveDate> {
    NaiveDate::from_num_days_from_ce_opt(ordinal.floor() as i32)
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Axis {
    pub kind: AxisKind,
    pub min: f64,
    pub max: f64,
    pub autoscale: bool,
    /// Tick names for a categorical axis; category `i` sits at `x = i`.
    pub categories: Vec<String>,
    /// Set once any data has been seen, so the first element replaces the
    /// placeholder limits instead of being unioned with them.
    has_data: bool,
}

impl Axis {
    pub fn new(kind: AxisKind) -> Self {
        Self {
            kind,
            min: 0.0,
            max: 1.0,
            autoscale: true,
            categories: Vec::new(),
            has_data: false,
        }
    }

    pub fn fixed(kind: AxisKind, min: f64, max: f64) -> Self {
        let mut axis = Self::new(kind);
        axis.set_limits(min, max);
        axis
    }

    pub fn limits(&self) -> (f64, f64) {
        (self.min, self.max)
    }

    /// Set explicit view limits and turn autoscale off.
    pub fn set_limits(&mut self, min: f64, max: f64) {
        let (min, max) = widen_degenerate(min.min(max), min.max(max));
        self.min = min;
        self.max = max;
        self.autoscale = false;
        self.has_data = true;
    }

    /// Grow the view limits to include `lo..=hi` when autoscaling.
    pub fn include(&mut self, lo: f64, hi: f64) {
        if !self.autoscale || !lo.is_finite() || !hi.is_finite() {
            return;
        }
        let (lo, hi) = (lo.min(hi), lo.max(hi));
        let (min, max) = if self.has_data {
            (self.min.min(lo), self.max.max(hi))
        } else {
            (lo, hi)
        };
        let (min, max) = widen_degenerate(min, max);
        self.min = min;
        self.max = max;
        self.has_data = true;
    }

    /// Put back limits saved earlier without touching the autoscale state.
    pub fn restore_limits(&mut self, limits: (f64, f64)) {
        self.min = limits.0;
        self.max = limits.1;
    }

    pub fn is_date(&self) -> bool {
        self.kind == AxisKind::Date
    }
}

fn widen_degenerate(min: f64, max: f64) -> (f64, f64) {
    if (max - min).abs() <= f64::EPSILON * max.abs().max(1.0) {
        (min - 0.5, max + 0.5)
    } else {
        (min, max)
    }
}

/// Maps data coordinates of one surface onto its plotting rectangle.
#[derive(Debug, Clone, PartialEq)]
pub struct Transform {
    pub plot_area: BBox,
    pub x: (f64, f64),
    pub y: (f64, f64),
}

impl Transform {
    pub fn new(plot_area: BBox, x_axis: &Axis, y_axis: &Axis) -> Self {
        Self {
            plot_area,
            x: x_axis.limits(),
            y: y_axis.limits(),
        }
    }

    pub fn to_pixel(&self, data: Point) -> Point {
        let tx = (data.0 - self.x.0) / (self.x.1 - self.x.0);
        let ty = (data.1 - self.y.0) / (self.y.1 - self.y.0);
        (
            self.plot_area.x0 + tx * self.plot_area.width(),
            self.plot_area.y1 - ty * self.plot_area.height(),
        )
    }

    pub fn to_data(&self, pixel: Point) -> Point {
        let width = self.plot_area.width();
        let height = self.plot_area.height();
        let tx = if width > 0.0 {
            (pixel.0 - self.plot_area.x0) / width
        } else {
            0.0
        };
        let ty = if height > 0.0 {
            (self.plot_area.y1 - pixel.1) / height
        } else {
            0.0
        };
        (
            self.x.0 + tx * (self.x.1 - self.x.0),
            self.y.0 + ty * (self.y.1 - self.y.0),
        )
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use approx::assert_relative_eq;

    fn transform() -> Transform {
        let plot = BBox::new(100.0, 50.0, 500.0, 350.0);
        Transform::new(
            plot,
            &Axis::fixed(AxisKind::Linear, 0.0, 10.0),
            &Axis::fixed(AxisKind::Linear, 0.0, 100.0),
        )
    }

    #[test]
    fn data_origin_maps_to_bottom_left() {
        let t = transform();
        assert_eq!(t.to_pixel((0.0, 0.0)), (100.0, 350.0));
        assert_eq!(t.to_pixel((10.0, 100.0)), (500.0, 50.0));
    }

    #[test]
    fn to_data_inverts_to_pixel() {
        let t = transform();
        let data = (3.7, 42.5);
        let back = t.to_data(t.to_pixel(data));
        assert_relative_eq!(back.0, data.0, epsilon = 1e-9);
        assert_relative_eq!(back.1, data.1, epsilon = 1e-9);
    }

    #[test]
    fn dates_become_day_ordinals() {
        let a = DataValue::parse_date("2024-01-01").unwrap().to_ordinal();
        let b = DataValue::parse_date("2024-01-02T12:00:00").unwrap().to_ordinal();
        assert_relative_eq!(b - a, 1.5, epsilon = 1e-9);
        assert_eq!(ordinal_to_date(a), NaiveDate::from_ymd_opt(2024, 1, 1));
    }

    #[test]
    fn bad_date_is_reported() {
        assert!(DataValue::parse_date("yesterday").is_err());
    }

    #[test]
    fn autoscale_replaces_placeholder_then_grows() {
        let mut axis = Axis::new(AxisKind::Linear);
        axis.include(5.0, 8.0);
        assert_eq!(axis.limits(), (5.0, 8.0));
        axis.include(-2.0, 6.0);
        assert_eq!(axis.limits(), (-2.0, 8.0));
    }

    #[test]
    fn single_value_limits_are_widened() {
        let mut axis = Axis::new(AxisKind::Linear);
        axis.include(3.0, 3.0);
        assert_eq!(axis.limits(), (2.5, 3.5));
    }

    #[test]
    fn explicit_limits_disable_autoscale() {
        let mut axis = Axis::new(AxisKind::Linear);
        axis.set_limits(0.0, 10.0);
        axis.include(50.0, 60.0);
        assert_eq!(axis.limits(), (0.0, 10.0));
    }
}
