use crate::error::{HawkesError, HawkesResult};
use crate::model::{EventSeries, HawkesParams};

/// One grid sample of the fitted conditional intensity.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct IntensitySample {
    /// Absolute epoch second of the grid point.
    pub t_sec: i64,
    pub lambda: f64,
}

/// Intensity sampled on a uniform grid spanning the event coverage window.
#[derive(Debug, Clone, PartialEq)]
pub struct IntensitySeries {
    pub params: HawkesParams,
    pub step_seconds: u32,
    pub samples: Vec<IntensitySample>,
}

impl IntensitySeries {
    pub fn len(&self) -> usize {
        self.samples.len()
    }

    pub fn is_empty(&self) -> bool {
        self.samples.is_empty()
    }
}

/// Exact conditional intensity at every grid point `g = k · step`,
/// `k = 0..=floor(T / step)`, relative to the first event.
///
/// A single decayed excitation `R` is carried forward: each event with
/// offset `≤ g` is consumed in order (decay to the event, add 1), then `R`
/// decays from the last consumed event to `g`. Events inside a grid interval
/// therefore keep their true sub-second timing, and
/// `λ(g) = μ + α · Σ_{t_j ≤ g} exp(−β (g − t_j))`.
pub fn reconstruct(
    series: &EventSeries,
    params: &HawkesParams,
    step_seconds: u32,
) -> HawkesResult<IntensitySeries> {
    if series.is_empty() {
        return Err(HawkesError::InvalidInput("event sequence is empty".to_string()));
    }
    params.validate()?;
    if step_seconds == 0 {
        return Err(HawkesError::InvalidInput(
            "grid step must be at least one second".to_string(),
        ));
    }

    let offsets = series.offsets();
    let step = f64::from(step_seconds);
    let last_index = (series.horizon() / step).floor() as i64;
    let origin = series.origin_second();

    let mut samples = Vec::with_capacity(last_index as usize + 1);
    let mut excitation = 0.0_f64;
    let mut cursor = 0.0_f64;
    let mut next = 0usize;

    for k in 0..=last_index {
        let grid = k as f64 * step;

        while next < offsets.len() && offsets[next] <= grid {
            let event = offsets[next];
            excitation = excitation * (-params.beta * (event - cursor)).exp() + 1.0;
            cursor = event;
            next += 1;
        }
        excitation *= (-params.beta * (grid - cursor)).exp();
        cursor = grid;

        samples.push(IntensitySample {
            t_sec: origin + k * i64::from(step_seconds),
            lambda: params.mu + params.alpha * excitation,
        });
    }

    tracing::info!(
        samples = samples.len(),
        events = series.len(),
        first_t_sec = origin,
        step_seconds,
        "Reconstructed Hawkes intensity"
    );

    Ok(IntensitySeries {
        params: *params,
        step_seconds,
        samples,
    })
}
