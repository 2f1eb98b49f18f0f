use std::ops::Range;
use std::path::{Path, PathBuf};

use plotters::prelude::*;

use crate::model::{ConfigResult, OperationLatency};
use crate::settings::SweepMode;

pub const STAGE_LATENCY_CHART: &str = "stage_latency.png";
pub const STATUS_LATENCY_CHART: &str = "status_latency.png";
pub const THROUGHPUT_CHART: &str = "throughput.png";
pub const CPU_USAGE_CHART: &str = "cpu_usage.png";

const CHART_SIZE: (u32, u32) = (1000, 600);
const HEADROOM: f64 = 1.2;
const ORANGE: RGBColor = RGBColor(255, 140, 0);

struct LatencySeries<'a> {
    label: &'a str,
    color: RGBColor,
    points: Vec<OperationLatency>,
}

struct ValueSeries<'a> {
    label: &'a str,
    color: RGBColor,
    points: Vec<(usize, f64)>,
}

/// Draw every chart for `results` into `out_dir` and return the paths that were written.
///
/// Nothing is drawn without results. A chart that fails to draw is logged and skipped.
pub fn draw_charts(out_dir: &Path, sweep: SweepMode, results: &[ConfigResult]) -> Vec<PathBuf> {
    if results.is_empty() {
        log::warn!("No results to chart");
        return Vec::new();
    }

    let values: Vec<usize> = results.iter().map(|r| r.value).collect();
    let mut written = Vec::new();
    let mut attempt = |name: &str, draw: &dyn Fn(&Path) -> anyhow::Result<()>| {
        let path = out_dir.join(name);
        match draw(&path) {
            Ok(()) => {
                log::info!("Wrote chart {}", path.display());
                written.push(path);
            }
            Err(e) => log::warn!("Failed to draw {}: {e:?}", path.display()),
        }
    };

    attempt(STAGE_LATENCY_CHART, &|path: &Path| {
        latency_chart(
            path,
            "Stage latency (POST)",
            sweep,
            &values,
            &[LatencySeries {
                label: "stage",
                color: BLUE,
                points: results.iter().map(|r| r.stage).collect(),
            }],
        )
    });

    attempt(STATUS_LATENCY_CHART, &|path: &Path| {
        latency_chart(
            path,
            "Status latency (GET)",
            sweep,
            &values,
            &[
                LatencySeries {
                    label: "get_stage1",
                    color: BLUE,
                    points: results.iter().map(|r| r.get_stage1).collect(),
                },
                LatencySeries {
                    label: "get_stage2",
                    color: ORANGE,
                    points: results.iter().map(|r| r.get_stage2).collect(),
                },
            ],
        )
    });

    attempt(THROUGHPUT_CHART, &|path: &Path| {
        value_chart(
            path,
            "Throughput",
            "Requests/s",
            sweep,
            &values,
            &ValueSeries {
                label: "requests/s",
                color: BLUE,
                points: results
                    .iter()
                    .enumerate()
                    .map(|(i, r)| (i, r.requests_per_s))
                    .collect(),
            },
        )
    });

    let cpu: Vec<(usize, f64)> = results
        .iter()
        .enumerate()
        .filter_map(|(i, r)| r.cpu_percent.map(|cpu| (i, cpu)))
        .collect();
    if cpu.is_empty() {
        log::debug!("No CPU logs, skipping {CPU_USAGE_CHART}");
    } else {
        attempt(CPU_USAGE_CHART, &|path: &Path| {
            value_chart(
                path,
                "Service CPU usage",
                "CPU (%)",
                sweep,
                &values,
                &ValueSeries {
                    label: "mean cpu %",
                    color: RED,
                    points: cpu.clone(),
                },
            )
        });
    }

    written
}

fn latency_chart(
    path: &Path,
    title: &str,
    sweep: SweepMode,
    values: &[usize],
    series: &[LatencySeries],
) -> anyhow::Result<()> {
    let y_max = y_limit(
        series
            .iter()
            .flat_map(|s| s.points.iter().map(|p| p.p95_ms.max(p.avg_ms))),
    );

    let root = BitMapBackend::new(path, CHART_SIZE).into_drawing_area();
    root.fill(&WHITE)?;

    let mut chart = ChartBuilder::on(&root)
        .caption(title, ("sans-serif", 24))
        .margin(20)
        .x_label_area_size(50)
        .y_label_area_size(70)
        .build_cartesian_2d(x_range(values.len()), 0.0..y_max)?;

    let label = |x: &f64| axis_label(values, *x);
    chart
        .configure_mesh()
        .x_labels(values.len())
        .x_label_formatter(&label)
        .x_desc(sweep.label())
        .y_desc("Latency (ms), bars from min to p95")
        .draw()?;

    for (s, offset) in series.iter().zip(offsets(series.len())) {
        let color = s.color;
        let points: Vec<(f64, OperationLatency)> = s
            .points
            .iter()
            .enumerate()
            .map(|(i, p)| (i as f64 + offset, *p))
            .collect();

        chart
            .draw_series(
                LineSeries::new(points.iter().map(|(x, p)| (*x, p.avg_ms)), color.stroke_width(2))
                    .point_size(4),
            )?
            .label(s.label)
            .legend(move |(x, y)| PathElement::new(vec![(x, y), (x + 20, y)], color));

        chart.draw_series(points.iter().map(|(x, p)| {
            ErrorBar::new_vertical(*x, p.min_ms, p.avg_ms, p.p95_ms, color.filled(), 10)
        }))?;
    }

    chart
        .configure_series_labels()
        .background_style(WHITE.mix(0.8))
        .border_style(BLACK)
        .draw()?;

    root.present()?;
    Ok(())
}

fn value_chart(
    path: &Path,
    title: &str,
    y_desc: &str,
    sweep: SweepMode,
    values: &[usize],
    series: &ValueSeries,
) -> anyhow::Result<()> {
    let y_max = y_limit(series.points.iter().map(|(_, v)| *v));

    let root = BitMapBackend::new(path, CHART_SIZE).into_drawing_area();
    root.fill(&WHITE)?;

    let mut chart = ChartBuilder::on(&root)
        .caption(title, ("sans-serif", 24))
        .margin(20)
        .x_label_area_size(50)
        .y_label_area_size(70)
        .build_cartesian_2d(x_range(values.len()), 0.0..y_max)?;

    let label = |x: &f64| axis_label(values, *x);
    chart
        .configure_mesh()
        .x_labels(values.len())
        .x_label_formatter(&label)
        .x_desc(sweep.label())
        .y_desc(y_desc)
        .draw()?;

    let color = series.color;
    chart
        .draw_series(
            LineSeries::new(
                series.points.iter().map(|(i, v)| (*i as f64, *v)),
                color.stroke_width(2),
            )
            .point_size(4),
        )?
        .label(series.label)
        .legend(move |(x, y)| PathElement::new(vec![(x, y), (x + 20, y)], color));

    chart
        .configure_series_labels()
        .background_style(WHITE.mix(0.8))
        .border_style(BLACK)
        .draw()?;

    root.present()?;
    Ok(())
}

/// Configurations are drawn at evenly spaced positions `0..n`, whatever their values.
fn x_range(n: usize) -> Range<f64> {
    -0.5..(n.max(1) as f64 - 0.5)
}

fn axis_label(values: &[usize], x: f64) -> String {
    let index = x.round();
    if (x - index).abs() > 1e-6 || index < 0.0 {
        return String::new();
    }

    values
        .get(index as usize)
        .map(|v| v.to_string())
        .unwrap_or_default()
}

/// Small horizontal shifts so overlaid series don't hide each other's error bars.
fn offsets(n: usize) -> Vec<f64> {
    const STEP: f64 = 0.08;
    let centre = (n as f64 - 1.0) / 2.0;
    (0..n).map(|i| (i as f64 - centre) * STEP).collect()
}

fn y_limit(values: impl Iterator<Item = f64>) -> f64 {
    let max = values.filter(|v| v.is_finite()).fold(0.0, f64::max);
    if max > 0.0 {
        max * HEADROOM
    } else {
        1.0
    }
}
