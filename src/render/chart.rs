use crate::analysis::{AmplitudePoint, FrequencyBar};

const LEVEL_MAX: f32 = 255.0;
const BLOCKS: [char; 9] = [' ', '▁', '▂', '▃', '▄', '▅', '▆', '▇', '█'];

/// Plot amplitude points into a `width` x `height` grid of characters.
///
/// Points are mapped onto columns by time, so the plot spans the full clip
/// regardless of how many points there are. Empty input renders nothing.
pub fn waveform_chart(points: &[AmplitudePoint], width: usize, height: usize) -> Vec<String> {
    if points.is_empty() || width == 0 || height == 0 {
        return Vec::new();
    }

    let start = points[0].time_ms;
    let span = points[points.len() - 1].time_ms - start;

    let mut grid = vec![vec![' '; width]; height];
    let mid = (height - 1) as f32 / 2.0;

    for point in points {
        let col = if span > 0.0 {
            (((point.time_ms - start) / span) * (width - 1) as f64).round() as usize
        } else {
            0
        };
        let amp = point.amplitude.clamp(-1.0, 1.0);
        let row = (mid - amp * mid).round() as usize;
        let (lo, hi) = if row as f32 <= mid {
            (row, mid.ceil() as usize)
        } else {
            (mid.floor() as usize, row)
        };
        for line in grid.iter_mut().take(hi.min(height - 1) + 1).skip(lo) {
            line[col.min(width - 1)] = '│';
        }
    }

    grid.into_iter()
        .map(|line| line.into_iter().collect::<String>().trim_end().to_string())
        .collect()
}

/// Vertical bar chart, one column per bar, top row first.
pub fn spectrum_chart(bars: &[FrequencyBar], height: usize) -> Vec<String> {
    if bars.is_empty() || height == 0 {
        return Vec::new();
    }

    let steps = (BLOCKS.len() - 1) as f32;
    let heights: Vec<f32> = bars
        .iter()
        .map(|b| b.level.clamp(0.0, LEVEL_MAX) / LEVEL_MAX * height as f32)
        .collect();

    (0..height)
        .rev()
        .map(|row| {
            heights
                .iter()
                .map(|&h| {
                    let fill = (h - row as f32).clamp(0.0, 1.0);
                    BLOCKS[(fill * steps).round() as usize]
                })
                .collect::<String>()
                .trim_end()
                .to_string()
        })
        .collect()
}
