// ============================================================
// Layer 6 - Error Curve Plotter
// ============================================================
// Renders the per-step dev error of selected epochs as a PNG:
//
//   solid line   → mean absolute error at each dev step
//   dots         → mean ± one standard deviation
//   shaded band  → the area between the two
//
// Plots are written only at epochs 0, 10 and 19, to
// train<layers>_<epoch>.png in the output directory. No text is
// drawn, so the bitmap backend needs no font support.
//
// Reference: plotters documentation (BitMapBackend, ChartBuilder)

use std::path::{Path, PathBuf};

use anyhow::{anyhow, Context, Result};
use plotters::prelude::*;

use crate::ml::evaluator::ErrorCurve;

pub const PLOT_EPOCHS: [usize; 3] = [0, 10, 19];

const SIZE: (u32, u32) = (720, 480);
const BAND: RGBColor = RGBColor(70, 130, 180);

pub struct ErrorCurvePlotter {
    out_dir: PathBuf,
    layers: usize,
}

impl ErrorCurvePlotter {
    pub fn new(out_dir: impl Into<PathBuf>, layers: usize) -> Self {
        Self { out_dir: out_dir.into(), layers }
    }

    pub fn path_for(&self, epoch: usize) -> PathBuf {
        self.out_dir.join(format!("train{}_{}.png", self.layers, epoch))
    }

    /// Plot `curve` if `epoch` is one of PLOT_EPOCHS and the curve
    /// has points. Returns the written path.
    pub fn plot(&self, epoch: usize, curve: &ErrorCurve) -> Result<Option<PathBuf>> {
        if !PLOT_EPOCHS.contains(&epoch) || curve.is_empty() {
            return Ok(None);
        }
        std::fs::create_dir_all(&self.out_dir)
            .with_context(|| format!("Cannot create '{}'", self.out_dir.display()))?;

        let path = self.path_for(epoch);
        render(&path, curve)?;
        Ok(Some(path))
    }
}

fn render(path: &Path, curve: &ErrorCurve) -> Result<()> {
    let upper: Vec<(f64, f64)> = curve
        .mean
        .iter()
        .zip(&curve.std)
        .enumerate()
        .map(|(t, (m, s))| (t as f64, m + s))
        .collect();
    let lower: Vec<(f64, f64)> = curve
        .mean
        .iter()
        .zip(&curve.std)
        .enumerate()
        .map(|(t, (m, s))| (t as f64, m - s))
        .collect();
    let mean: Vec<(f64, f64)> = curve.mean.iter().enumerate().map(|(t, m)| (t as f64, *m)).collect();

    let x_max = (curve.len().saturating_sub(1)).max(1) as f64;
    let y_min = lower.iter().map(|p| p.1).fold(0.0f64, f64::min);
    let mut y_max = upper.iter().map(|p| p.1).fold(f64::MIN, f64::max);
    if !(y_max > y_min) {
        y_max = y_min + 1.0;
    }

    let root = BitMapBackend::new(path, SIZE).into_drawing_area();
    root.fill(&WHITE).map_err(|e| anyhow!("backend error: {e}"))?;

    {
        let mut chart = ChartBuilder::on(&root)
            .margin(20)
            .build_cartesian_2d(0.0..x_max, y_min..y_max * 1.05)
            .map_err(|e| anyhow!("chart build error: {e}"))?;

        let band: Vec<(f64, f64)> = upper.iter().chain(lower.iter().rev()).copied().collect();
        chart
            .draw_series(std::iter::once(Polygon::new(band, BAND.mix(0.2))))
            .map_err(|e| anyhow!("draw error: {e}"))?;

        for edge in [&upper, &lower] {
            chart
                .draw_series(edge.iter().map(|&p| Circle::new(p, 2, BAND.filled())))
                .map_err(|e| anyhow!("draw error: {e}"))?;
        }

        chart
            .draw_series(LineSeries::new(mean, BLUE.stroke_width(2)))
            .map_err(|e| anyhow!("draw error: {e}"))?;
    }

    root.present().map_err(|e| anyhow!("render error: {e}"))?;
    Ok(())
}

// ─── Unit Tests ───────────────────────────────────────────────────────────────
#[cfg(test)]
mod tests {
    use super::*;

    fn curve() -> ErrorCurve {
        ErrorCurve {
            mean: vec![0.5, 0.75, 1.0, 1.5],
            std: vec![0.1, 0.2, 0.2, 0.4],
        }
    }

    #[test]
    fn test_writes_png_at_plot_epochs() {
        let dir = tempfile::tempdir().unwrap();
        let plotter = ErrorCurvePlotter::new(dir.path(), 2);

        let path = plotter.plot(10, &curve()).unwrap().unwrap();

        assert_eq!(path.file_name().unwrap(), "train2_10.png");
        assert!(path.exists());
    }

    #[test]
    fn test_skips_other_epochs() {
        let dir = tempfile::tempdir().unwrap();
        let plotter = ErrorCurvePlotter::new(dir.path(), 1);

        assert!(plotter.plot(5, &curve()).unwrap().is_none());
        assert!(!plotter.path_for(5).exists());
    }

    #[test]
    fn test_skips_empty_curve() {
        let dir = tempfile::tempdir().unwrap();
        let plotter = ErrorCurvePlotter::new(dir.path(), 1);
        assert!(plotter.plot(0, &ErrorCurve::default()).unwrap().is_none());
    }

    #[test]
    fn test_single_step_curve() {
        let dir = tempfile::tempdir().unwrap();
        let plotter = ErrorCurvePlotter::new(dir.path(), 1);
        let single = ErrorCurve { mean: vec![0.0], std: vec![0.0] };
        assert!(plotter.plot(19, &single).unwrap().is_some());
    }
}
