//! @ai:module:intent Histogram and correlation plots over the collected population
//! @ai:module:layer infrastructure
//! @ai:module:public_api histogram_charts, correlation_chart
//! @ai:module:stateless true

use crate::table::MetricFrame;
use anyhow::Result;
use plotters::prelude::*;
use std::path::Path;

const HISTOGRAM_BINS: usize = 20;

/// @ai:intent One histogram PNG per additive metric
/// @ai:effects fs:write
pub fn histogram_charts(frame: &MetricFrame, out_dir: &Path) -> Result<Vec<String>> {
    let mut generated = Vec::new();

    for name in frame.column_names().map(str::to_string).collect::<Vec<_>>() {
        let values: Vec<f64> = frame
            .column(&name)
            .unwrap_or_default()
            .iter()
            .copied()
            .filter(|v| v.is_finite())
            .collect();

        if values.is_empty() {
            tracing::warn!("No finite values for metric '{}'; skipping histogram", name);
            continue;
        }

        let file_name = format!("histogram_{}.png", name);
        let out_path = out_dir.join(&file_name);
        draw_histogram(&values, &name, &out_path)?;
        tracing::info!("Histogram for {} saved to {}", name, out_path.display());
        generated.push(file_name);
    }

    Ok(generated)
}

/// @ai:intent Draw a single histogram
/// @ai:effects fs:write
fn draw_histogram(values: &[f64], name: &str, out_path: &Path) -> Result<()> {
    let root = BitMapBackend::new(out_path, (800, 600)).into_drawing_area();
    root.fill(&WHITE)?;

    let min = values.iter().copied().fold(f64::INFINITY, f64::min);
    let max = values.iter().copied().fold(f64::NEG_INFINITY, f64::max);
    let (min, max) = if min == max {
        (min - 0.5, max + 0.5)
    } else {
        (min, max)
    };

    let bin_width = (max - min) / HISTOGRAM_BINS as f64;
    let mut counts = vec![0u32; HISTOGRAM_BINS];

    for &v in values {
        let mut bin = ((v - min) / bin_width) as usize;
        if bin >= HISTOGRAM_BINS {
            bin = HISTOGRAM_BINS - 1;
        }
        counts[bin] += 1;
    }

    let y_max = counts.iter().copied().max().unwrap_or(1).max(1);

    let mut chart = ChartBuilder::on(&root)
        .caption(format!("Histogram of {}", name), ("sans-serif", 30))
        .margin(20)
        .x_label_area_size(40)
        .y_label_area_size(50)
        .build_cartesian_2d(min..max, 0u32..y_max + 1)?;

    chart
        .configure_mesh()
        .y_desc("Frequency")
        .x_desc(name)
        .draw()?;

    chart.draw_series(counts.iter().enumerate().map(|(i, &count)| {
        let x0 = min + i as f64 * bin_width;
        let x1 = x0 + bin_width;
        Rectangle::new([(x0, 0), (x1, count)], BLUE.mix(0.7).filled())
    }))?;

    root.present()?;
    Ok(())
}

/// @ai:intent Pearson correlation heatmap across additive metrics
/// @ai:effects fs:write
pub fn correlation_chart(frame: &MetricFrame, out_dir: &Path) -> Result<Option<String>> {
    let names: Vec<String> = frame.column_names().map(str::to_string).collect();

    if names.len() < 2 || frame.n_rows() < 2 {
        tracing::warn!("Not enough data to correlate metrics");
        return Ok(None);
    }

    let n = names.len();
    let mut matrix = vec![vec![0.0f64; n]; n];

    for i in 0..n {
        for j in 0..n {
            let a = frame.column(&names[i]).unwrap_or_default();
            let b = frame.column(&names[j]).unwrap_or_default();
            matrix[i][j] = pearson(a, b);
        }
    }

    let file_name = "correlation_matrix.png".to_string();
    let out_path = out_dir.join(&file_name);

    let root = BitMapBackend::new(&out_path, (1000, 900)).into_drawing_area();
    root.fill(&WHITE)?;

    let mut chart = ChartBuilder::on(&root)
        .caption("Correlation Matrix of Additive Metrics", ("sans-serif", 25))
        .margin(20)
        .x_label_area_size(120)
        .y_label_area_size(120)
        .build_cartesian_2d(0..n as i32, 0..n as i32)?;

    chart
        .configure_mesh()
        .disable_mesh()
        .x_labels(n)
        .y_labels(n)
        .x_label_formatter(&|x| label_for(&names, *x))
        .y_label_formatter(&|y| label_for(&names, *y))
        .draw()?;

    chart.draw_series((0..n).flat_map(|i| {
        let row = matrix[i].clone();
        (0..n).map(move |j| {
            Rectangle::new(
                [(j as i32, i as i32), (j as i32 + 1, i as i32 + 1)],
                correlation_color(row[j]).filled(),
            )
        })
    }))?;

    root.present()?;
    tracing::info!("Correlation matrix saved to {}", out_path.display());
    Ok(Some(file_name))
}

/// @ai:intent Axis label lookup for integer cell coordinates
/// @ai:effects pure
fn label_for(names: &[String], index: i32) -> String {
    names
        .get(index as usize)
        .cloned()
        .unwrap_or_default()
}

/// @ai:intent Map [-1, 1] to a blue-white-red scale
/// @ai:effects pure
fn correlation_color(r: f64) -> RGBColor {
    let r = r.clamp(-1.0, 1.0);
    if r >= 0.0 {
        let t = r;
        RGBColor(255, (255.0 * (1.0 - t)) as u8, (255.0 * (1.0 - t)) as u8)
    } else {
        let t = -r;
        RGBColor((255.0 * (1.0 - t)) as u8, (255.0 * (1.0 - t)) as u8, 255)
    }
}

/// @ai:intent Pearson correlation over pairwise finite values
/// @ai:effects pure
fn pearson(a: &[f64], b: &[f64]) -> f64 {
    let pairs: Vec<(f64, f64)> = a
        .iter()
        .zip(b.iter())
        .filter(|(x, y)| x.is_finite() && y.is_finite())
        .map(|(x, y)| (*x, *y))
        .collect();

    if pairs.len() < 2 {
        return f64::NAN;
    }

    let count = pairs.len() as f64;
    let mean_a = pairs.iter().map(|(x, _)| x).sum::<f64>() / count;
    let mean_b = pairs.iter().map(|(_, y)| y).sum::<f64>() / count;

    let mut cov = 0.0;
    let mut var_a = 0.0;
    let mut var_b = 0.0;

    for (x, y) in &pairs {
        let dx = x - mean_a;
        let dy = y - mean_b;
        cov += dx * dy;
        var_a += dx * dx;
        var_b += dy * dy;
    }

    if var_a == 0.0 || var_b == 0.0 {
        return f64::NAN;
    }

    cov / (var_a.sqrt() * var_b.sqrt())
}
