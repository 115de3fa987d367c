//! PNG charts drawn from the JSON result files.

use std::fs;
use std::path::{Path, PathBuf};

use anyhow::{anyhow, Context, Result};
use image::RgbaImage;
use serde_json::json;
use tiny_skia::{Color, FillRule, Paint, PathBuilder, Pixmap, Rect, Stroke, Transform};

use crate::errors::{CodedError, NO_RESULTS};
use crate::glyphs::{Anchor, LabelFont};
use crate::results::load_results_if_present;
use crate::schema::{BenchmarkResult, ResultFile, SuiteKind};
use crate::settings::{BenchSettings, ChartSettings};

const TEXT: [u8; 3] = [30, 30, 30];
const MUTED: [u8; 3] = [110, 110, 110];
const WARNING: [u8; 3] = [200, 30, 30];
const GRID: [u8; 3] = [225, 225, 225];
const PLOT_BACKGROUND: [u8; 3] = [250, 250, 252];
const FRAME: [u8; 3] = [150, 150, 150];
const PALETTE: [[u8; 3]; 4] = [[31, 119, 180], [255, 127, 14], [44, 160, 44], [214, 39, 40]];

/// Renders a chart for every result file present in the output directory.
/// Missing suites are skipped; having none at all is an error.
pub fn render_charts(settings: &BenchSettings) -> Result<Vec<PathBuf>> {
    let mut font = LabelFont::from_settings(settings.charts.font_path.as_deref())?;
    let mut written = Vec::new();
    let mut missing = Vec::new();

    for suite in SuiteKind::ALL {
        let path = settings.result_path(suite);
        let file = match load_results_if_present(&path)? {
            Some(file) if !file.results.is_empty() => file,
            _ => {
                eprintln!(
                    "[glbench] no {} results at {}, skipping chart",
                    suite,
                    path.display()
                );
                missing.push(path.display().to_string());
                continue;
            }
        };

        let pixmap = render_chart(&file, &settings.charts, &mut font)?;
        let chart_path = settings.chart_path(suite);
        save_png(&pixmap, &chart_path)?;
        println!("[glbench] wrote {}", chart_path.display());
        written.push(chart_path);
    }

    if written.is_empty() {
        return Err(anyhow::Error::new(
            CodedError::usage(
                NO_RESULTS,
                format!(
                    "no benchmark results found in {}; run a benchmark first",
                    settings.output_dir.display()
                ),
            )
            .with_details(json!({ "missing": missing })),
        ));
    }
    Ok(written)
}

pub fn render_chart(
    file: &ResultFile,
    settings: &ChartSettings,
    font: &mut LabelFont,
) -> Result<Pixmap> {
    let mut pixmap = Pixmap::new(settings.width, settings.height)
        .ok_or_else(|| anyhow!("invalid chart size {}x{}", settings.width, settings.height))?;
    pixmap.fill(Color::WHITE);

    let width = settings.width as f32;
    let height = settings.height as f32;
    let title = format!("{} - {}", file.suite.title(), file.renderer.adapter);
    font.draw(&mut pixmap, &title, width / 2.0, 14.0, 18.0, Anchor::Middle, TEXT);

    match file.suite {
        SuiteKind::Triangles => {
            let split = height * 0.55;
            let top = PlotRect::new(80.0, 76.0, width - 30.0, split - 40.0);
            let bottom = PlotRect::new(80.0, split + 30.0, width - 30.0, height - 50.0);

            let fps = Panel {
                title: "Average FPS by triangle count",
                y_label: "FPS",
                series: vec![Series {
                    label: "avg FPS".to_owned(),
                    color: PALETTE[0],
                    points: points(&file.results, |result| Some(result.avg_fps)),
                }],
                y_max: None,
                annotate: true,
                note: None,
            };
            draw_panel(&mut pixmap, font, top, &fps);

            let mut usage = vec![Series {
                label: "CPU %".to_owned(),
                color: PALETTE[1],
                points: points(&file.results, |result| Some(result.avg_cpu)),
            }];
            if has_gpu_samples(&file.results) {
                usage.push(Series {
                    label: "GPU %".to_owned(),
                    color: PALETTE[2],
                    points: points(&file.results, |result| result.avg_gpu),
                });
            }
            let usage = Panel {
                title: "Utilization by triangle count",
                y_label: "%",
                series: usage,
                y_max: Some(100.0),
                annotate: false,
                note: None,
            };
            draw_panel(&mut pixmap, font, bottom, &usage);
        }
        SuiteKind::Lighting | SuiteKind::Textures => {
            let half = width / 2.0;
            let left = PlotRect::new(80.0, 76.0, half - 30.0, height - 50.0);
            let right = PlotRect::new(half + 60.0, 76.0, width - 30.0, height - 50.0);
            let variant_name = if file.suite == SuiteKind::Lighting {
                "lighting mode"
            } else {
                "texture size"
            };

            let fps_title = format!("Average FPS per {}", variant_name);
            let fps = Panel {
                title: &fps_title,
                y_label: "FPS",
                series: series_by_variant(file, |result| Some(result.avg_fps)),
                y_max: None,
                annotate: false,
                note: None,
            };
            draw_panel(&mut pixmap, font, left, &fps);

            let gpu_detected = has_gpu_samples(&file.results);
            let usage_title = if gpu_detected {
                format!("GPU usage per {}", variant_name)
            } else {
                format!("CPU usage per {}", variant_name)
            };
            let usage = Panel {
                title: &usage_title,
                y_label: "%",
                series: if gpu_detected {
                    series_by_variant(file, |result| result.avg_gpu)
                } else {
                    series_by_variant(file, |result| Some(result.avg_cpu))
                },
                y_max: Some(100.0),
                annotate: false,
                note: (!gpu_detected).then_some("GPU NOT DETECTED"),
            };
            draw_panel(&mut pixmap, font, right, &usage);
        }
    }

    Ok(pixmap)
}

pub fn save_png(pixmap: &Pixmap, path: &Path) -> Result<()> {
    if let Some(parent) = path.parent().filter(|parent| !parent.as_os_str().is_empty()) {
        fs::create_dir_all(parent)
            .with_context(|| format!("failed to create directory {}", parent.display()))?;
    }
    let image = RgbaImage::from_raw(pixmap.width(), pixmap.height(), pixmap.data().to_vec())
        .ok_or_else(|| anyhow!("chart buffer does not match {}x{}", pixmap.width(), pixmap.height()))?;
    image
        .save(path)
        .with_context(|| format!("failed to write chart {}", path.display()))
}

fn has_gpu_samples(results: &[BenchmarkResult]) -> bool {
    results.iter().any(|result| result.avg_gpu.is_some())
}

fn points(
    results: &[BenchmarkResult],
    value: impl Fn(&BenchmarkResult) -> Option<f64>,
) -> Vec<(f64, f64)> {
    results
        .iter()
        .filter_map(|result| value(result).map(|y| (f64::from(result.config.triangle_count), y)))
        .collect()
}

#[derive(Debug, Clone, PartialEq)]
pub struct Series {
    pub label: String,
    pub color: [u8; 3],
    pub points: Vec<(f64, f64)>,
}

/// One series per lighting mode or texture size, in order of first
/// appearance.
pub fn series_by_variant(
    file: &ResultFile,
    value: impl Fn(&BenchmarkResult) -> Option<f64>,
) -> Vec<Series> {
    let variant = |result: &BenchmarkResult| match file.suite {
        SuiteKind::Lighting => result.config.lighting_mode.to_string(),
        SuiteKind::Textures => result.config.texture_mode.to_string(),
        SuiteKind::Triangles => "all".to_owned(),
    };

    let mut labels: Vec<String> = Vec::new();
    for result in &file.results {
        let label = variant(result);
        if !labels.contains(&label) {
            labels.push(label);
        }
    }

    labels
        .into_iter()
        .enumerate()
        .map(|(index, label)| {
            let members = file
                .results
                .iter()
                .filter(|result| variant(result) == label)
                .cloned()
                .collect::<Vec<_>>();
            Series {
                color: PALETTE[index % PALETTE.len()],
                points: points(&members, &value),
                label,
            }
        })
        .collect()
}

struct Panel<'a> {
    title: &'a str,
    y_label: &'a str,
    series: Vec<Series>,
    y_max: Option<f64>,
    annotate: bool,
    note: Option<&'a str>,
}

#[derive(Debug, Clone, Copy)]
struct PlotRect {
    left: f32,
    top: f32,
    right: f32,
    bottom: f32,
}

impl PlotRect {
    fn new(left: f32, top: f32, right: f32, bottom: f32) -> Self {
        Self {
            left,
            top,
            right,
            bottom,
        }
    }

    fn is_drawable(&self) -> bool {
        self.right - self.left > 40.0 && self.bottom - self.top > 40.0
    }
}

/// Log-scaled X, linear Y.
#[derive(Debug, Clone, Copy)]
struct Axes {
    rect: PlotRect,
    log_min: f64,
    log_max: f64,
    y_max: f64,
}

impl Axes {
    fn x(&self, value: f64) -> f32 {
        let t = (value.max(f64::MIN_POSITIVE).log10() - self.log_min) / (self.log_max - self.log_min);
        self.rect.left + (t as f32) * (self.rect.right - self.rect.left)
    }

    fn y(&self, value: f64) -> f32 {
        let t = (value / self.y_max).clamp(0.0, 1.0);
        self.rect.bottom - (t as f32) * (self.rect.bottom - self.rect.top)
    }
}

fn draw_panel(pixmap: &mut Pixmap, font: &mut LabelFont, rect: PlotRect, panel: &Panel<'_>) {
    if !rect.is_drawable() {
        return;
    }

    fill_rect(pixmap, rect, PLOT_BACKGROUND);
    let mid_x = (rect.left + rect.right) / 2.0;
    font.draw(pixmap, panel.title, mid_x, rect.top - 24.0, 12.0, Anchor::Middle, TEXT);
    font.draw(pixmap, panel.y_label, rect.left - 8.0, rect.top - 24.0, 10.0, Anchor::End, MUTED);

    let xs = panel
        .series
        .iter()
        .flat_map(|series| series.points.iter().map(|&(x, _)| x))
        .collect::<Vec<_>>();
    let (x_min, x_max) = xs
        .iter()
        .fold((f64::INFINITY, f64::NEG_INFINITY), |(lo, hi), &x| (lo.min(x), hi.max(x)));
    let (x_min, x_max) = if xs.is_empty() { (1.0, 10.0) } else { (x_min, x_max) };

    let data_max = panel
        .series
        .iter()
        .flat_map(|series| series.points.iter().map(|&(_, y)| y))
        .fold(0.0_f64, f64::max);
    let y_max = panel.y_max.unwrap_or_else(|| nice_ceiling(data_max * 1.1));

    let axes = Axes {
        rect,
        log_min: (x_min / 1.5).log10(),
        log_max: (x_max * 1.5).log10(),
        y_max,
    };

    for tick in nice_ticks(y_max, 5) {
        let y = axes.y(tick);
        draw_line(pixmap, &[(rect.left, y), (rect.right, y)], GRID, 1.0);
        font.draw(pixmap, &format_value(tick), rect.left - 8.0, y - 5.0, 10.0, Anchor::End, MUTED);
    }

    let mut tick_xs = xs.clone();
    tick_xs.sort_by(f64::total_cmp);
    tick_xs.dedup();
    let mut last_label_end = f32::NEG_INFINITY;
    for value in tick_xs {
        let x = axes.x(value);
        draw_line(pixmap, &[(x, rect.bottom), (x, rect.bottom + 5.0)], FRAME, 1.0);
        let label = format_value(value);
        let half_width = font.measure(&label, 10.0) / 2.0;
        if x - half_width > last_label_end + 4.0 {
            font.draw(pixmap, &label, x, rect.bottom + 10.0, 10.0, Anchor::Middle, MUTED);
            last_label_end = x + half_width;
        }
    }
    font.draw(
        pixmap,
        "triangles (log scale)",
        mid_x,
        rect.bottom + 28.0,
        10.0,
        Anchor::Middle,
        MUTED,
    );

    draw_line(
        pixmap,
        &[
            (rect.left, rect.top),
            (rect.right, rect.top),
            (rect.right, rect.bottom),
            (rect.left, rect.bottom),
            (rect.left, rect.top),
        ],
        FRAME,
        1.0,
    );

    for series in &panel.series {
        let mapped = series
            .points
            .iter()
            .map(|&(x, y)| (axes.x(x), axes.y(y)))
            .collect::<Vec<_>>();
        draw_line(pixmap, &mapped, series.color, 2.0);
        for (&(px, py), &(_, value)) in mapped.iter().zip(series.points.iter()) {
            draw_marker(pixmap, px, py, series.color);
            if panel.annotate {
                font.draw(pixmap, &format!("{:.0}", value), px, py - 18.0, 10.0, Anchor::Middle, TEXT);
            }
        }
    }

    draw_legend(pixmap, font, rect, &panel.series);

    if let Some(note) = panel.note {
        let mid_y = (rect.top + rect.bottom) / 2.0;
        font.draw(pixmap, note, mid_x, mid_y - 8.0, 16.0, Anchor::Middle, WARNING);
    }
}

fn draw_legend(pixmap: &mut Pixmap, font: &mut LabelFont, rect: PlotRect, series: &[Series]) {
    let label_width = series
        .iter()
        .map(|series| font.measure(&series.label, 10.0))
        .fold(0.0_f32, f32::max);
    let left = rect.right - label_width - 40.0;
    for (index, series) in series.iter().enumerate() {
        let y = rect.top + 12.0 + index as f32 * 16.0;
        draw_line(pixmap, &[(left, y + 5.0), (left + 18.0, y + 5.0)], series.color, 2.0);
        font.draw(pixmap, &series.label, left + 24.0, y, 10.0, Anchor::Start, TEXT);
    }
}

fn paint_for(color: [u8; 3]) -> Paint<'static> {
    let mut paint = Paint::default();
    paint.set_color_rgba8(color[0], color[1], color[2], 255);
    paint.anti_alias = true;
    paint
}

fn draw_line(pixmap: &mut Pixmap, points: &[(f32, f32)], color: [u8; 3], width: f32) {
    let Some((&(x0, y0), rest)) = points.split_first() else {
        return;
    };
    if rest.is_empty() {
        return;
    }
    let mut builder = PathBuilder::new();
    builder.move_to(x0, y0);
    for &(x, y) in rest {
        builder.line_to(x, y);
    }
    let Some(path) = builder.finish() else {
        return;
    };
    let stroke = Stroke {
        width,
        ..Stroke::default()
    };
    pixmap.stroke_path(&path, &paint_for(color), &stroke, Transform::identity(), None);
}

fn draw_marker(pixmap: &mut Pixmap, x: f32, y: f32, color: [u8; 3]) {
    if let Some(circle) = PathBuilder::from_circle(x, y, 4.0) {
        pixmap.fill_path(
            &circle,
            &paint_for(color),
            FillRule::Winding,
            Transform::identity(),
            None,
        );
    }
}

fn fill_rect(pixmap: &mut Pixmap, rect: PlotRect, color: [u8; 3]) {
    if let Some(rect) = Rect::from_ltrb(rect.left, rect.top, rect.right, rect.bottom) {
        pixmap.fill_rect(rect, &paint_for(color), Transform::identity(), None);
    }
}

/// 1, 2 or 5 times a power of ten, at least `raw`.
pub fn nice_step(raw: f64) -> f64 {
    if !raw.is_finite() || raw <= 0.0 {
        return 1.0;
    }
    let magnitude = 10_f64.powf(raw.log10().floor());
    let fraction = raw / magnitude;
    let nice = if fraction <= 1.0 {
        1.0
    } else if fraction <= 2.0 {
        2.0
    } else if fraction <= 5.0 {
        5.0
    } else {
        10.0
    };
    nice * magnitude
}

/// Smallest multiple of a nice step that covers `max`.
pub fn nice_ceiling(max: f64) -> f64 {
    if !max.is_finite() || max <= 0.0 {
        return 1.0;
    }
    let step = nice_step(max / 5.0);
    (max / step).ceil() * step
}

/// Evenly spaced ticks from 0 to `max` inclusive.
pub fn nice_ticks(max: f64, target: usize) -> Vec<f64> {
    let step = nice_step(max / target.max(1) as f64);
    let count = (max / step + 1e-9).floor() as usize;
    (0..=count).map(|index| index as f64 * step).collect()
}

fn format_value(value: f64) -> String {
    if value.fract().abs() < 1e-9 {
        format!("{:.0}", value)
    } else {
        format!("{:.1}", value)
    }
}
