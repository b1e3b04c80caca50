//! SVG rendering of aggregated results.

use plotters::prelude::*;
use std::fs;
use std::path::Path;
use tracing::info;

use crate::breakdown::StageBar;
use crate::compare::{SegmentKind, StackedBar};
use crate::error::{AnalysisError, Result};
use crate::series::ResponseSeries;

const SIZE: (u32, u32) = (720, 520);
const CAPTION_FONT: (&str, u32) = ("sans-serif", 20);
const LABEL_FONT: (&str, u32) = ("sans-serif", 14);

fn chart_err<E: std::fmt::Display>(err: E) -> AnalysisError {
    AnalysisError::Chart(err.to_string())
}

fn ensure_parent(path: &Path) -> Result<()> {
    if let Some(parent) = path.parent().filter(|p| !p.as_os_str().is_empty()) {
        fs::create_dir_all(parent)?;
    }
    Ok(())
}

fn segment_color(kind: SegmentKind) -> RGBColor {
    match kind {
        SegmentKind::Database => RGBColor(0xb8, 0xb8, 0xb8),
        SegmentKind::RestOverhead => RGBColor(0xff, 0xb2, 0x66),
        SegmentKind::McpOverhead => RGBColor(0x8f, 0xd1, 0x8f),
        SegmentKind::QueryTime => RGBColor(0x64, 0x95, 0xed),
        SegmentKind::ProtocolOverhead => RGBColor(0xff, 0xa5, 0x00),
    }
}

/// Vertical value range covering every stacked segment and its error bar.
fn stacked_range(bars: &[StackedBar]) -> (f64, f64) {
    let mut low = 0.0f64;
    let mut high = 0.0f64;
    for bar in bars {
        let mut cursor = 0.0;
        for segment in &bar.segments {
            cursor += segment.value_ms;
            low = low.min(cursor - segment.error_ms);
            high = high.max(cursor + segment.error_ms);
        }
    }
    (low * 1.1, (high * 1.1).max(1.0))
}

/// Stacked bars with one legend entry per segment kind and error bars on
/// each segment top.
pub fn render_stacked_bars(path: &Path, title: &str, bars: &[StackedBar]) -> Result<()> {
    ensure_parent(path)?;
    let (y_min, y_max) = stacked_range(bars);
    let count = bars.len().max(1) as u32;

    let root = SVGBackend::new(path, SIZE).into_drawing_area();
    root.fill(&WHITE).map_err(chart_err)?;

    let mut chart = ChartBuilder::on(&root)
        .caption(title, CAPTION_FONT)
        .margin(15)
        .x_label_area_size(40)
        .y_label_area_size(70)
        .build_cartesian_2d((0u32..count).into_segmented(), y_min..y_max)
        .map_err(chart_err)?;

    let labels: Vec<String> = bars.iter().map(|b| b.label.clone()).collect();
    chart
        .configure_mesh()
        .disable_x_mesh()
        .y_desc("Latency (ms)")
        .label_style(LABEL_FONT)
        .x_label_formatter(&|value| match value {
            SegmentValue::CenterOf(i) => labels.get(*i as usize).cloned().unwrap_or_default(),
            _ => String::new(),
        })
        .draw()
        .map_err(chart_err)?;

    let mut kinds: Vec<SegmentKind> = Vec::new();
    for segment in bars.iter().flat_map(|b| &b.segments) {
        if !kinds.contains(&segment.kind) {
            kinds.push(segment.kind);
        }
    }

    for kind in kinds {
        let color = segment_color(kind);
        let mut rects = Vec::new();
        for (i, bar) in bars.iter().enumerate() {
            let i = i as u32;
            let mut cursor = 0.0;
            for segment in &bar.segments {
                let top = cursor + segment.value_ms;
                if segment.kind == kind {
                    let mut rect = Rectangle::new(
                        [(SegmentValue::Exact(i), cursor), (SegmentValue::Exact(i + 1), top)],
                        color.filled(),
                    );
                    rect.set_margin(0, 0, 20, 20);
                    rects.push(rect);
                }
                cursor = top;
            }
        }
        chart
            .draw_series(rects)
            .map_err(chart_err)?
            .label(kind.label())
            .legend(move |(x, y)| Rectangle::new([(x, y - 5), (x + 12, y + 5)], color.filled()));
    }

    let mut error_bars = Vec::new();
    for (i, bar) in bars.iter().enumerate() {
        let mut cursor = 0.0;
        for segment in &bar.segments {
            cursor += segment.value_ms;
            if segment.error_ms > 0.0 {
                error_bars.push(ErrorBar::new_vertical(
                    SegmentValue::CenterOf(i as u32),
                    cursor - segment.error_ms,
                    cursor,
                    cursor + segment.error_ms,
                    BLACK.stroke_width(1),
                    8,
                ));
            }
        }
    }
    chart.draw_series(error_bars).map_err(chart_err)?;

    chart
        .configure_series_labels()
        .position(SeriesLabelPosition::UpperLeft)
        .background_style(WHITE.mix(0.9))
        .border_style(BLACK)
        .label_font(LABEL_FONT)
        .draw()
        .map_err(chart_err)?;

    root.present().map_err(chart_err)?;
    info!(path = %path.display(), bars = bars.len(), "stacked bar chart written");
    Ok(())
}

/// Horizontal stage bars, first stage on top.
pub fn render_gantt(path: &Path, title: &str, bars: &[StageBar]) -> Result<()> {
    ensure_parent(path)?;
    let count = bars.len().max(1) as u32;
    let x_max = bars
        .iter()
        .map(|b| b.start_ms + b.duration_ms.max(0.0))
        .fold(0.0f64, f64::max)
        .max(1.0)
        * 1.15;

    let root = SVGBackend::new(path, SIZE).into_drawing_area();
    root.fill(&WHITE).map_err(chart_err)?;

    let mut chart = ChartBuilder::on(&root)
        .caption(title, CAPTION_FONT)
        .margin(15)
        .x_label_area_size(40)
        .y_label_area_size(150)
        .build_cartesian_2d(0f64..x_max, (0u32..count).into_segmented())
        .map_err(chart_err)?;

    let row = |i: usize| count - 1 - i as u32;
    let labels: Vec<&str> = bars.iter().rev().map(|b| b.label).collect();
    chart
        .configure_mesh()
        .disable_y_mesh()
        .x_desc("Time since start (ms)")
        .label_style(LABEL_FONT)
        .y_label_formatter(&|value| match value {
            SegmentValue::CenterOf(i) => labels
                .get(*i as usize)
                .map(|s| s.to_string())
                .unwrap_or_default(),
            _ => String::new(),
        })
        .draw()
        .map_err(chart_err)?;

    chart
        .draw_series(bars.iter().enumerate().map(|(i, bar)| {
            let color = if bar.overhead {
                segment_color(SegmentKind::ProtocolOverhead)
            } else {
                segment_color(SegmentKind::QueryTime)
            };
            let mut rect = Rectangle::new(
                [
                    (bar.start_ms, SegmentValue::Exact(row(i))),
                    (bar.start_ms + bar.duration_ms, SegmentValue::Exact(row(i) + 1)),
                ],
                color.filled(),
            );
            rect.set_margin(6, 6, 0, 0);
            rect
        }))
        .map_err(chart_err)?;

    chart
        .draw_series(bars.iter().enumerate().map(|(i, bar)| {
            Text::new(
                format!(" {:.1} ms", bar.duration_ms),
                (bar.start_ms + bar.duration_ms.max(0.0), SegmentValue::CenterOf(row(i))),
                LABEL_FONT.into_font(),
            )
        }))
        .map_err(chart_err)?;

    root.present().map_err(chart_err)?;
    info!(path = %path.display(), stages = bars.len(), "stage chart written");
    Ok(())
}

/// Response time per run index, one line per series.
pub fn render_series(path: &Path, title: &str, series: &[ResponseSeries]) -> Result<()> {
    ensure_parent(path)?;
    let runs = series.iter().map(|s| s.response_ms.len()).max().unwrap_or(0).max(2);
    let y_max = series
        .iter()
        .flat_map(|s| s.response_ms.iter().copied())
        .fold(0.0f64, f64::max)
        .max(1.0)
        * 1.1;

    let root = SVGBackend::new(path, SIZE).into_drawing_area();
    root.fill(&WHITE).map_err(chart_err)?;

    let mut chart = ChartBuilder::on(&root)
        .caption(title, CAPTION_FONT)
        .margin(15)
        .x_label_area_size(40)
        .y_label_area_size(70)
        .build_cartesian_2d(0f64..(runs - 1) as f64, 0f64..y_max)
        .map_err(chart_err)?;

    chart
        .configure_mesh()
        .x_desc("Run")
        .y_desc("Response Time (ms)")
        .label_style(LABEL_FONT)
        .draw()
        .map_err(chart_err)?;

    for (i, s) in series.iter().enumerate() {
        let color = Palette99::pick(i).to_rgba();
        chart
            .draw_series(LineSeries::new(
                s.response_ms.iter().enumerate().map(|(run, ms)| (run as f64, *ms)),
                color.stroke_width(2),
            ))
            .map_err(chart_err)?
            .label(s.legend())
            .legend(move |(x, y)| {
                PathElement::new(vec![(x, y), (x + 20, y)], color.stroke_width(2))
            });
    }

    chart
        .configure_series_labels()
        .background_style(WHITE.mix(0.9))
        .border_style(BLACK)
        .label_font(LABEL_FONT)
        .draw()
        .map_err(chart_err)?;

    root.present().map_err(chart_err)?;
    info!(path = %path.display(), series = series.len(), "response time chart written");
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::compare::Segment;
    use tempfile::TempDir;

    fn bars() -> Vec<StackedBar> {
        vec![StackedBar {
            label: "MCP".to_string(),
            segments: vec![
                Segment::new(SegmentKind::Database, 10.0, 1.0),
                Segment::new(SegmentKind::McpOverhead, 5.0, 2.0),
            ],
        }]
    }

    #[test]
    fn test_stacked_range_covers_error_bars() {
        let (low, high) = stacked_range(&bars());
        assert_eq!(low, 0.0);
        assert!((high - 17.0 * 1.1).abs() < 1e-9);
    }

    #[test]
    fn test_render_stacked_bars_writes_svg() {
        let tmp = TempDir::new().unwrap();
        let path = tmp.path().join("nested").join("chart.svg");
        render_stacked_bars(&path, "Model Card Retrieval", &bars()).unwrap();
        let svg = fs::read_to_string(&path).unwrap();
        assert!(svg.contains("<svg"));
        assert!(svg.contains("MCP overhead"));
    }

    #[test]
    fn test_render_gantt_writes_svg() {
        let tmp = TempDir::new().unwrap();
        let path = tmp.path().join("gantt.svg");
        let stages = vec![
            StageBar {
                label: "Base Model Card",
                start_ms: 0.0,
                duration_ms: 4.0,
                overhead: false,
            },
            StageBar {
                label: "Finalize / Overhead",
                start_ms: 4.0,
                duration_ms: 2.0,
                overhead: true,
            },
        ];
        render_gantt(&path, "Stages", &stages).unwrap();
        assert!(fs::read_to_string(&path).unwrap().contains("Base Model Card"));
    }
}
