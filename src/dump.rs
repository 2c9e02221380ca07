use crate::collision::ResolutionReport;
use crate::figure::Figure;
use serde::Serialize;
use std::fs::File;
use std::io::BufWriter;
use std::path::Path;

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ResolutionDump {
    pub title: Option<String>,
    pub width: f64,
    pub height: f64,
    pub passes: Vec<PassDump>,
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct PassDump {
    pub iterations: usize,
    pub displacements: usize,
    pub converged: bool,
    pub connectors: usize,
    pub labels: Vec<LabelDump>,
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct LabelDump {
    pub id: u32,
    pub surface: u32,
    pub text: String,
    pub anchor: [f64; 2],
    pub position: [f64; 2],
    pub displacement: f64,
    pub moves: usize,
    pub still_colliding: bool,
}

impl ResolutionDump {
    pub fn from_reports(figure: &Figure, reports: &[ResolutionReport]) -> Self {
        let passes = reports
            .iter()
            .map(|report| PassDump {
                iterations: report.iterations,
                displacements: report.displacements,
                converged: report.converged,
                connectors: report.connectors.len(),
                labels: report
                    .labels
                    .iter()
                    .map(|label| LabelDump {
                        id: label.element.0,
                        surface: label.surface.0,
                        text: figure
                            .element(label.element)
                            .and_then(|el| el.as_text())
                            .map(|t| t.text.clone())
                            .unwrap_or_default(),
                        anchor: [label.anchor_px.0, label.anchor_px.1],
                        position: [label.final_px.0, label.final_px.1],
                        displacement: label.displacement_px,
                        moves: label.moves,
                        still_colliding: label.still_colliding,
                    })
                    .collect(),
            })
            .collect();

        ResolutionDump {
            title: figure.title.clone(),
            width: figure.width,
            height: figure.height,
            passes,
        }
    }
}

pub fn write_resolution_dump(path: &Path, figure: &Figure, reports: &[ResolutionReport]) -> anyhow::Result<()> {
    let file = File::create(path)?;
    let writer = BufWriter::new(file);
    let dump = ResolutionDump::from_reports(figure, reports);
    serde_json::to_writer_pretty(writer, &dump)?;
    Ok(())
}
