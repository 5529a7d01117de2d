//! @ai:module:intent Vertical scatter rendering of batch distributions
//! @ai:module:layer infrastructure
//! @ai:module:public_api scatter_charts
//! @ai:module:stateless true

use crate::compare::stats::BatchComparator;
use crate::config::{GeneralSettings, MarkerDef, ScatterParams};
use anyhow::Result;
use plotters::coord::cartesian::Cartesian2d;
use plotters::coord::types::RangedCoordf64;
use plotters::prelude::*;
use std::path::Path;

const SPREAD: f64 = 0.8;

/// @ai:intent One vertical scatter PNG per metric
/// @ai:effects fs:write
pub fn scatter_charts(comparator: &BatchComparator, out_dir: &Path) -> Result<Vec<String>> {
    std::fs::create_dir_all(out_dir)?;

    let settings = comparator
        .config()
        .general_settings
        .clone()
        .unwrap_or_default();

    let mut generated = Vec::new();
    for metric in comparator.metrics() {
        let params = comparator.config().params_for(&metric).cloned();
        if params.is_none() && comparator.skips_unconfigured() {
            continue;
        }
        let params = params.unwrap_or_default();

        let file_name = format!("vertical_scatter_{}.png", metric);
        draw_scatter(
            comparator,
            &metric,
            &params,
            &settings,
            &out_dir.join(&file_name),
        )?;
        tracing::info!("Scatter plot for {} saved", metric);
        generated.push(file_name);
    }
    Ok(generated)
}

/// @ai:intent Text rows displayed above the data area
struct RatioZone {
    title: String,
    y_pos: f64,
    values: Vec<f64>,
}

/// @ai:intent Draw one metric's scatter across all batches
/// @ai:effects fs:write
fn draw_scatter(
    comparator: &BatchComparator,
    metric: &str,
    params: &ScatterParams,
    settings: &GeneralSettings,
    out_path: &Path,
) -> Result<()> {
    let labels = comparator.labels();
    let y_mult = params.y_multiplier();

    // One filtered population per category; batches missing the column
    // still occupy an x slot, with no points
    let populations: Vec<Vec<f64>> = (0..labels.len())
        .map(|i| comparator.filtered_values(i, metric).unwrap_or_default())
        .collect();

    let (mut plot_min, mut plot_max) = plot_range(params, &populations);

    for marker in &params.markers {
        plot_min = plot_min.min(marker.y_pos);
        plot_max = plot_max.max(marker.y_pos);
    }

    // Reserve headroom above the data for each on-plot ratio row
    let mut zones = Vec::new();
    let value_range = plot_max - plot_min;
    for ratio in &params.display_ratios {
        if ratio.only_table {
            continue;
        }
        let ((n_min, n_max), (p_min, p_max)) = ratio.ranges()?;
        plot_max += 0.05 * value_range;

        let values = populations
            .iter()
            .map(|values| {
                let n = values.iter().filter(|v| **v >= n_min && **v <= n_max).count();
                let p = values.iter().filter(|v| **v >= p_min && **v <= p_max).count();
                if p == 0 {
                    0.0
                } else {
                    n as f64 / p as f64 * 100.0
                }
            })
            .collect();

        zones.push(RatioZone {
            title: ratio.title.clone(),
            y_pos: plot_max,
            values,
        });
        plot_max += 0.1 * value_range;
    }

    let width = (settings.fig_size[0] * 200.0).max(200.0) as u32;
    let height = (settings.fig_size[1] * 200.0).max(200.0) as u32;
    let font_px = (settings.font_size * 2.0).max(8.0) as u32;

    let root = BitMapBackend::new(out_path, (width, height)).into_drawing_area();
    root.fill(&WHITE)?;

    let x_min = -1.0 + SPREAD / 2.0;
    let x_max = labels.len() as f64 - SPREAD / 2.0;

    let mut builder = ChartBuilder::on(&root);
    builder
        .margin(10)
        .x_label_area_size(50)
        .y_label_area_size(60);
    if params.set_title {
        builder.caption(metric, ("sans-serif", font_px + 6));
    }
    let mut chart =
        builder.build_cartesian_2d(x_min..x_max, plot_min * y_mult..plot_max * y_mult)?;

    let tick_labels = labels.to_vec();
    let formatter = |x: &f64| {
        let i = x.round();
        if (x - i).abs() < 0.01 && i >= 0.0 && (i as usize) < tick_labels.len() {
            tick_labels[i as usize].clone()
        } else {
            String::new()
        }
    };

    let mut mesh = chart.configure_mesh();
    mesh.disable_x_mesh()
        .x_labels(labels.len())
        .x_label_formatter(&formatter)
        .x_label_style(("sans-serif", font_px))
        .y_label_style(("sans-serif", font_px));
    if let Some(unit) = &params.unit {
        mesh.y_desc(unit.as_str());
    }
    mesh.draw()?;

    for marker in &params.markers {
        draw_marker(&mut chart, marker, x_min, x_max, y_mult, font_px)?;
    }

    let point_spread = 0.9 * SPREAD;
    let point_size = (settings.marker_size / 4.0).max(2.0) as i32;

    for (i, values) in populations.iter().enumerate() {
        let color = Palette99::pick(i).to_rgba();
        let scaled: Vec<f64> = values.iter().map(|v| v * y_mult).collect();
        let n = scaled.len();

        chart
            .draw_series(scaled.iter().enumerate().map(|(k, &y)| {
                let offset = if n > 1 {
                    k as f64 / (n - 1) as f64 * point_spread - point_spread / 2.0
                } else {
                    0.0
                };
                Circle::new((i as f64 + offset, y), point_size, color.mix(0.7).filled())
            }))?
            .label(labels[i].clone());

        if n > 0 {
            let mean = scaled.iter().sum::<f64>() / n as f64;
            let variance =
                scaled.iter().map(|v| (v - mean) * (v - mean)).sum::<f64>() / n as f64;
            let std = variance.sqrt();
            let (left, right) = (i as f64 - SPREAD / 2.0, i as f64 + SPREAD / 2.0);

            chart.draw_series(std::iter::once(Rectangle::new(
                [(left, mean - std), (right, mean + std)],
                color.mix(0.3).filled(),
            )))?;
            chart.draw_series(LineSeries::new(
                [(left, mean), (right, mean)],
                color.stroke_width(2),
            ))?;
        }

        for zone in &zones {
            let text = format!("{}:\n {:.1}%", zone.title, zone.values[i]);
            chart.draw_series(std::iter::once(Text::new(
                text,
                (i as f64, zone.y_pos * y_mult),
                ("sans-serif", font_px).into_font().color(&BLACK),
            )))?;
        }
    }

    root.present()?;
    Ok(())
}

/// @ai:intent The y range of the data area before zone headroom
///
/// Explicit plot_min/plot_max win; auto-calculated sides get 15% padding.
/// @ai:effects pure
fn plot_range(params: &ScatterParams, populations: &[Vec<f64>]) -> (f64, f64) {
    let all = populations.iter().flatten().copied();
    let data_min = all.clone().fold(f64::INFINITY, f64::min);
    let data_max = all.fold(f64::NEG_INFINITY, f64::max);

    let auto_min = params.plot_min.is_none();
    let auto_max = params.plot_max.is_none();

    let mut min = params.plot_min.unwrap_or(if data_min.is_finite() {
        data_min
    } else {
        -1.0
    });
    let mut max = params.plot_max.unwrap_or(if data_max.is_finite() {
        data_max
    } else {
        1.0
    });

    let range = max - min;
    if auto_min {
        min -= 0.15 * range;
    }
    if auto_max {
        max += 0.15 * range;
    }
    if min == max {
        min -= 1.0;
        max += 1.0;
    }
    (min, max)
}

/// @ai:intent Draw one horizontal reference line, dashed unless styled solid
/// @ai:effects fs:write
fn draw_marker(
    chart: &mut ChartContext<'_, BitMapBackend<'_>, Cartesian2d<RangedCoordf64, RangedCoordf64>>,
    marker: &MarkerDef,
    x_min: f64,
    x_max: f64,
    y_mult: f64,
    font_px: u32,
) -> Result<()> {
    let color = marker
        .color
        .as_deref()
        .map(parse_color)
        .unwrap_or(BLACK)
        .mix(marker.alpha.unwrap_or(1.0));
    let width = marker.thickness.unwrap_or(1.0).max(1.0) as u32;
    let style = ShapeStyle::from(color).stroke_width(width);

    let y = marker.y_pos * y_mult;
    let points = [(x_min + 0.1, y), (x_max - 0.1, y)];

    let solid = marker.style.as_deref() == Some("-");
    if solid {
        chart.draw_series(LineSeries::new(points, style))?;
    } else {
        chart.draw_series(DashedLineSeries::new(points, 5, 3, style))?;
    }

    if let Some(text) = &marker.text {
        chart.draw_series(std::iter::once(Text::new(
            text.clone(),
            (x_min + 0.1, y),
            ("sans-serif", font_px).into_font().color(&color),
        )))?;
    }
    Ok(())
}

/// @ai:intent Map a small palette of color names; unknown names are black
/// @ai:effects pure
fn parse_color(name: &str) -> RGBColor {
    match name {
        "red" => RED,
        "green" => GREEN,
        "blue" => BLUE,
        "yellow" => YELLOW,
        "magenta" => MAGENTA,
        "cyan" => CYAN,
        "gray" | "grey" => RGBColor(128, 128, 128),
        "orange" => RGBColor(255, 165, 0),
        _ => BLACK,
    }
}
