use super::types::AmplitudePoint;

/// Reduce a sample series to at most `target_point_count` plot points
/// (plus one trailing point when needed so the final sample is always shown).
///
/// The caller is responsible for passing a positive `sample_rate`; anything
/// else produces non-finite timestamps.
pub fn downsample_amplitude(
    samples: &[f32],
    sample_rate: f64,
    target_point_count: usize,
) -> Vec<AmplitudePoint> {
    let total = samples.len();
    if total == 0 || target_point_count == 0 {
        return Vec::new();
    }

    let points_to_render = target_point_count.min(total);
    let step = total as f64 / points_to_render as f64;
    let last = total - 1;

    let time_ms = |index: usize| index as f64 / sample_rate * 1000.0;

    let mut points = Vec::with_capacity(points_to_render + 1);
    let mut last_index = 0;
    for i in 0..points_to_render {
        let index = ((i as f64 * step).floor() as usize).min(last);
        last_index = index;
        points.push(AmplitudePoint {
            time_ms: time_ms(index),
            amplitude: samples[index],
        });
    }

    // Rounding can stop short of the clip end; pin the true final sample.
    if last_index != last {
        let end_time = time_ms(last);
        let emitted = points.last().map_or(f64::NEG_INFINITY, |p| p.time_ms);
        if end_time > emitted {
            points.push(AmplitudePoint {
                time_ms: end_time,
                amplitude: samples[last],
            });
        }
    }

    points
}
