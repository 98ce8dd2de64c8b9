// ============================================================
// Layer 6 — History Plots
// ============================================================
// Renders the fine-tuning history as two PNG charts:
//
//   training_accuracy.png  "Training and validation accuracy"
//   training_loss.png      "Training and validation loss"
//
// Training values are drawn as red dots, validation values as
// a red line, one point per epoch.

use anyhow::{Context, Result};
use plotters::prelude::*;
use std::{
    fs,
    path::{Path, PathBuf},
};

use crate::domain::history::TrainingHistory;

pub const ACCURACY_FILE: &str = "training_accuracy.png";
pub const LOSS_FILE: &str = "training_loss.png";

const SIZE: (u32, u32) = (800, 600);

/// Paths of the rendered charts.
#[derive(Debug, Clone)]
pub struct PlotFiles {
    pub accuracy: PathBuf,
    pub loss:     PathBuf,
}

/// Draw both charts for `history` into `dir`.
pub fn plot_history(history: &TrainingHistory, dir: &Path) -> Result<PlotFiles> {
    if history.is_empty() {
        anyhow::bail!("Nothing to plot: the {} history has no epochs", history.phase);
    }
    fs::create_dir_all(dir)
        .with_context(|| format!("Cannot create plot directory '{}'", dir.display()))?;

    let files = PlotFiles {
        accuracy: dir.join(ACCURACY_FILE),
        loss:     dir.join(LOSS_FILE),
    };

    draw_curves(
        &files.accuracy,
        "Training and validation accuracy",
        &history.accuracy(),
        &history.val_accuracy(),
    )?;
    draw_curves(
        &files.loss,
        "Training and validation loss",
        &history.loss(),
        &history.val_loss(),
    )?;

    tracing::info!("Wrote {} and {}", files.accuracy.display(), files.loss.display());
    Ok(files)
}

fn draw_curves(path: &Path, title: &str, train: &[f64], val: &[f64]) -> Result<()> {
    let draw_err = |e: &dyn std::fmt::Display| anyhow::anyhow!("Cannot draw '{}': {e}", path.display());

    let root = BitMapBackend::new(path, SIZE).into_drawing_area();
    root.fill(&WHITE).map_err(|e| draw_err(&e))?;

    let epochs = train.len().max(val.len()) as f64;
    let (y_min, y_max) = value_range(train.iter().chain(val));

    let mut chart = ChartBuilder::on(&root)
        .caption(title, ("sans-serif", 28))
        .margin(10)
        .x_label_area_size(40)
        .y_label_area_size(50)
        .build_cartesian_2d(0.5f64..epochs + 0.5, y_min..y_max)
        .map_err(|e| draw_err(&e))?;

    chart
        .configure_mesh()
        .disable_x_mesh()
        .x_desc("Epoch")
        .draw()
        .map_err(|e| draw_err(&e))?;

    let points = |series: &[f64]| -> Vec<(f64, f64)> {
        series
            .iter()
            .enumerate()
            .filter(|(_, v)| v.is_finite())
            .map(|(i, &v)| ((i + 1) as f64, v))
            .collect()
    };

    chart
        .draw_series(points(train).into_iter().map(|p| Circle::new(p, 4, RED.filled())))
        .map_err(|e| draw_err(&e))?
        .label("Training")
        .legend(|(x, y)| Circle::new((x + 10, y), 4, RED.filled()));

    chart
        .draw_series(LineSeries::new(points(val), &RED))
        .map_err(|e| draw_err(&e))?
        .label("Validation")
        .legend(|(x, y)| PathElement::new(vec![(x, y), (x + 20, y)], &RED));

    chart
        .configure_series_labels()
        .background_style(WHITE.mix(0.8))
        .border_style(BLACK)
        .draw()
        .map_err(|e| draw_err(&e))?;

    root.present().map_err(|e| draw_err(&e))?;
    Ok(())
}

/// Y-axis bounds covering every finite value, padded by 5%.
pub fn value_range<'a>(values: impl IntoIterator<Item = &'a f64>) -> (f64, f64) {
    let (lo, hi) = values
        .into_iter()
        .filter(|v| v.is_finite())
        .fold((f64::INFINITY, f64::NEG_INFINITY), |(lo, hi), &v| (lo.min(v), hi.max(v)));

    if lo > hi {
        return (0.0, 1.0);
    }
    if lo == hi {
        return (lo - 0.5, hi + 0.5);
    }
    let pad = (hi - lo) * 0.05;
    (lo - pad, hi + pad)
}
