use crate::error::{HawkesError, HawkesResult};

/// Sorted event arrival times, shifted so the first event sits at t=0.
///
/// The absolute origin is kept alongside the relative offsets so that grid
/// samples can be labelled with epoch seconds again.
#[derive(Debug, Clone, PartialEq)]
pub struct EventSeries {
    origin: f64,
    origin_second: i64,
    offsets: Vec<f64>,
}

impl EventSeries {
    /// Build from absolute epoch seconds. Input must be non-empty, finite and
    /// non-decreasing; it is copied, never reordered.
    pub fn from_seconds(times: &[f64]) -> HawkesResult<Self> {
        let Some(&origin) = times.first() else {
            return Err(HawkesError::InvalidInput("event sequence is empty".to_string()));
        };
        if let Some(idx) = times.iter().position(|t| !t.is_finite()) {
            return Err(HawkesError::InvalidInput(format!(
                "event {} has non-finite time {}",
                idx, times[idx]
            )));
        }
        ensure_sorted(times)?;

        Ok(Self {
            origin,
            origin_second: origin.floor() as i64,
            offsets: times.iter().map(|t| t - origin).collect(),
        })
    }

    /// Build from epoch milliseconds. Offsets are taken from integer
    /// differences so no precision is lost to large epoch magnitudes.
    pub fn from_epoch_millis(ts_ms: &[i64]) -> HawkesResult<Self> {
        let Some(&first) = ts_ms.first() else {
            return Err(HawkesError::InvalidInput("event sequence is empty".to_string()));
        };
        ensure_sorted(ts_ms)?;

        Ok(Self {
            origin: first as f64 / 1000.0,
            origin_second: first.div_euclid(1000),
            offsets: ts_ms
                .iter()
                .map(|&ms| (ms - first) as f64 / 1000.0)
                .collect(),
        })
    }

    pub fn len(&self) -> usize {
        self.offsets.len()
    }

    pub fn is_empty(&self) -> bool {
        self.offsets.is_empty()
    }

    /// Absolute epoch seconds of the first event.
    pub fn origin(&self) -> f64 {
        self.origin
    }

    /// First event's epoch second, floored.
    pub fn origin_second(&self) -> i64 {
        self.origin_second
    }

    /// Event times relative to the first event (first entry is 0).
    pub fn offsets(&self) -> &[f64] {
        &self.offsets
    }

    /// Observation horizon T: relative time of the last event.
    pub fn horizon(&self) -> f64 {
        self.offsets.last().copied().unwrap_or(0.0)
    }

    /// Mean arrival rate n / T, or `None` when all events coincide.
    pub fn mean_rate(&self) -> Option<f64> {
        let horizon = self.horizon();
        (horizon > 0.0).then(|| self.len() as f64 / horizon)
    }
}

fn ensure_sorted<T: PartialOrd + std::fmt::Display>(values: &[T]) -> HawkesResult<()> {
    match values.windows(2).position(|w| w[1] < w[0]) {
        Some(idx) => Err(HawkesError::InvalidInput(format!(
            "events not sorted: {} at index {} precedes {}",
            values[idx + 1],
            idx + 1,
            values[idx]
        ))),
        None => Ok(()),
    }
}
