use std::fs::File;
use std::path::Path;

use plotters::prelude::*;
use serde::Serialize;

/// Index of the first maximum, so ties resolve to the lowest index.
#[inline(always)]
pub fn argmax<T: PartialOrd>(values: impl Iterator<Item = T>) -> usize {
    let mut result: usize = 0;
    let mut max: Option<T> = None;
    for (i, v) in values.enumerate() {
        match &max {
            Some(m) if v <= *m => {}
            _ => {
                max = Some(v);
                result = i;
            }
        }
    }
    result
}

/// Bucket whose cumulative probability first exceeds `random`. When rounding
/// leaves the total below `random`, the last bucket with mass is used.
#[inline(always)]
pub fn categorical_sample(probs: &[f64], random: f64) -> usize {
    let mut b: f64 = 0.0;
    let mut last: usize = 0;
    for (i, p) in probs.iter().enumerate() {
        if *p <= 0.0 {
            continue;
        }
        b += p;
        last = i;
        if b > random {
            return i;
        }
    }
    last
}

pub fn save_json<P: AsRef<Path>, V: Serialize>(
    path: P,
    data: &V,
) -> Result<(), serde_json::Error> {
    let file = File::create(path).map_err(serde_json::Error::io)?;
    serde_json::to_writer_pretty(file, data)
}

/// Draws the sliding-window average reward against the episode number.
///
/// `avg_score` holds one point per finished window, spread evenly over
/// `[0, num_episodes)`.
pub fn plot_performance<P: AsRef<Path>>(
    path: P,
    num_episodes: u128,
    avg_score: &[f64],
    plot_every: usize,
) -> Result<(), Box<dyn std::error::Error>> {
    if avg_score.is_empty() {
        return Ok(());
    }
    let step: f64 = num_episodes as f64 / avg_score.len() as f64;
    let mut min_y: f64 = avg_score.iter().cloned().fold(f64::INFINITY, f64::min);
    let mut max_y: f64 = avg_score.iter().cloned().fold(f64::NEG_INFINITY, f64::max);
    if (max_y - min_y).abs() < f64::EPSILON {
        min_y -= 1.0;
        max_y += 1.0;
    }

    let root = BitMapBackend::new(path.as_ref(), (1024, 768)).into_drawing_area();
    root.fill(&WHITE)?;
    let mut chart = ChartBuilder::on(&root)
        .caption("Taxi Q-learning", ("sans-serif", 30).into_font())
        .margin(10)
        .x_label_area_size(40)
        .y_label_area_size(60)
        .build_cartesian_2d(0f64..num_episodes as f64, min_y..max_y)?;
    chart
        .configure_mesh()
        .x_desc("Episode Number")
        .y_desc(format!("Average Reward (Over Next {} Episodes)", plot_every))
        .draw()?;
    chart.draw_series(LineSeries::new(
        avg_score
            .iter()
            .enumerate()
            .map(|(i, v)| (i as f64 * step, *v)),
        &BLUE,
    ))?;
    root.present()?;
    Ok(())
}
