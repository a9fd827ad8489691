use serde::Serialize;

/// Half-open frequency band `[min_hz, max_hz)` in whole hertz.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct Band {
    pub min_hz: u32,
    pub max_hz: u32,
}

impl Band {
    pub fn new(min_hz: u32, max_hz: u32) -> Self {
        Self { min_hz, max_hz }
    }

    /// Number of integral bins in the band.
    pub fn span(&self) -> usize {
        self.max_hz.saturating_sub(self.min_hz) as usize
    }

    pub fn contains(&self, hz: u32) -> bool {
        hz >= self.min_hz && hz < self.max_hz
    }

    /// Slot of `hz` in storage indexed from `min_hz`.
    pub fn offset(&self, hz: u32) -> Option<usize> {
        self.contains(hz).then(|| (hz - self.min_hz) as usize)
    }
}

#[derive(Clone, Copy, Debug, PartialEq, Serialize)]
pub struct SpectrumPoint {
    pub frequency_hz: f64,
    /// Normalized amplitude (0.0-1.0)
    pub amplitude: f64,
}

impl SpectrumPoint {
    pub fn new(frequency_hz: f64, amplitude: f64) -> Self {
        Self {
            frequency_hz,
            amplitude,
        }
    }
}

/// Published output of one completed run, ordered by ascending frequency.
#[derive(Clone, Debug, Default, PartialEq, Serialize)]
pub struct SpectrumResult {
    pub points: Vec<SpectrumPoint>,
    pub elapsed_seconds: f64,
}

impl SpectrumResult {
    /// Point with the largest amplitude, first one on ties.
    pub fn peak(&self) -> Option<SpectrumPoint> {
        self.points
            .iter()
            .copied()
            .fold(None, |best: Option<SpectrumPoint>, p| match best {
                Some(b) if b.amplitude >= p.amplitude => Some(b),
                _ => Some(p),
            })
    }

    /// The `count` strongest points, strongest first.
    pub fn strongest(&self, count: usize) -> Vec<SpectrumPoint> {
        let mut sorted = self.points.clone();
        sorted.sort_by(|a, b| b.amplitude.total_cmp(&a.amplitude));
        sorted.truncate(count);
        sorted
    }
}

/// Divide every amplitude by `max`. A zero or non-finite divisor yields zeros.
pub fn normalize(points: &mut [SpectrumPoint], max: f64) {
    let usable = max.is_finite() && max > 0.0;
    for point in points.iter_mut() {
        point.amplitude = if usable { point.amplitude / max } else { 0.0 };
    }
}
