//! Per-channel sample times with held lookup.

use crate::util::{Chrono, Error, Result};

/// Ordered sample times of one channel (transform, bound, object or an
/// attribute).
///
/// Reads use held semantics: the sample at or before the query time, the
/// first sample for earlier times.
#[derive(Clone, Debug, Default, PartialEq)]
pub struct SampleTimes {
    times: Vec<Chrono>,
}

impl SampleTimes {
    pub fn new() -> Self {
        Self::default()
    }

    /// Build from stored times, which must already be non-decreasing.
    pub fn from_vec(times: Vec<Chrono>) -> Result<Self> {
        if times.windows(2).any(|w| w[1] < w[0]) {
            return Err(Error::invalid("sample times are not sorted"));
        }
        Ok(Self { times })
    }

    /// Append a time. Earlier than the last sample is an error; equal to
    /// the last sample returns `false` and the caller replaces that sample.
    pub fn push(&mut self, channel: &str, time: Chrono) -> Result<bool> {
        if let Some(&last) = self.times.last() {
            if time < last {
                return Err(Error::NonMonotonicTime {
                    channel: channel.to_string(),
                    previous: last,
                    time,
                });
            }
            if time == last {
                return Ok(false);
            }
        }
        self.times.push(time);
        Ok(true)
    }

    #[inline]
    pub fn len(&self) -> usize {
        self.times.len()
    }

    #[inline]
    pub fn is_empty(&self) -> bool {
        self.times.is_empty()
    }

    #[inline]
    pub fn as_slice(&self) -> &[Chrono] {
        &self.times
    }

    /// Time of sample `index`.
    pub fn time(&self, index: usize) -> Option<Chrono> {
        self.times.get(index).copied()
    }

    /// Index of the sample held at `time`. `None` without samples.
    pub fn floor_index(&self, time: Chrono) -> Option<usize> {
        if self.times.is_empty() {
            return None;
        }
        // Binary search for floor
        let mut lo = 0;
        let mut hi = self.times.len();
        while lo < hi {
            let mid = lo + (hi - lo) / 2;
            if self.times[mid] <= time {
                lo = mid + 1;
            } else {
                hi = mid;
            }
        }
        Some(lo.saturating_sub(1))
    }

    /// Bracketing samples `(floor, ceil, alpha)` for callers that blend.
    ///
    /// Outside the sampled range both indices clamp to the end sample and
    /// `alpha` is 0.
    pub fn sample_interval(&self, time: Chrono) -> Option<(usize, usize, f64)> {
        let floor = self.floor_index(time)?;
        let t0 = self.times[floor];
        if time <= t0 || floor + 1 >= self.times.len() {
            return Some((floor, floor, 0.0));
        }
        let t1 = self.times[floor + 1];
        Some((floor, floor + 1, (time - t0) / (t1 - t0)))
    }

    /// True when more than one distinct time is recorded.
    pub fn is_animated(&self) -> bool {
        self.times.len() > 1
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn times(v: &[f64]) -> SampleTimes {
        SampleTimes::from_vec(v.to_vec()).unwrap()
    }

    #[test]
    fn test_floor_index() {
        let t = times(&[0.0, 1.0, 2.0]);
        assert_eq!(t.floor_index(-5.0), Some(0));
        assert_eq!(t.floor_index(0.0), Some(0));
        assert_eq!(t.floor_index(0.5), Some(0));
        assert_eq!(t.floor_index(1.0), Some(1));
        assert_eq!(t.floor_index(1.9), Some(1));
        assert_eq!(t.floor_index(10.0), Some(2));
        assert_eq!(SampleTimes::new().floor_index(0.0), None);
    }

    #[test]
    fn test_sample_interval() {
        let t = times(&[0.0, 2.0]);
        assert_eq!(t.sample_interval(1.0), Some((0, 1, 0.5)));
        assert_eq!(t.sample_interval(-1.0), Some((0, 0, 0.0)));
        assert_eq!(t.sample_interval(3.0), Some((1, 1, 0.0)));
    }

    #[test]
    fn test_push_monotonic() {
        let mut t = SampleTimes::new();
        assert!(t.push("transform", 1.0).unwrap());
        assert!(!t.push("transform", 1.0).unwrap());
        assert!(t.push("transform", 2.0).unwrap());
        let err = t.push("transform", 1.5).unwrap_err();
        assert!(matches!(err, Error::NonMonotonicTime { .. }));
        assert_eq!(t.len(), 2);
    }

    #[test]
    fn test_unsorted_rejected() {
        assert!(SampleTimes::from_vec(vec![1.0, 0.0]).is_err());
    }
}
