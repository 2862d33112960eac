use super::wavefront::Wavefront;

// ---------------------------------------------------------------------------
// Per-step wavefront observers
// ---------------------------------------------------------------------------

/// Passive consumer of completed wavefront layers.
///
/// Called once for the launch layer and once after every step with the
/// frozen current layer. Observers never touch the numerical state.
pub trait WavefrontObserver {
    fn observe(&mut self, wave: &Wavefront);
}

/// Closures work as observers.
impl<F: FnMut(&Wavefront)> WavefrontObserver for F {
    fn observe(&mut self, wave: &Wavefront) {
        self(wave)
    }
}

/// Observer that ignores everything.
#[derive(Debug, Default, Clone, Copy)]
pub struct NoObserver;

impl WavefrontObserver for NoObserver {
    fn observe(&mut self, _wave: &Wavefront) {}
}

/// Ray population at one layer.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Census {
    pub time: f64,
    pub alive: usize,
    pub diverged: usize,
    pub surface: usize, // live rays with at least one surface bounce
    pub bottom: usize,  // live rays with at least one bottom bounce
    pub caustic: usize, // live rays past at least one caustic
}

/// Records a [`Census`] per observed layer.
#[derive(Debug, Default, Clone)]
pub struct RayCensus {
    pub history: Vec<Census>,
}

impl RayCensus {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn last(&self) -> Option<&Census> {
        self.history.last()
    }
}

impl WavefrontObserver for RayCensus {
    fn observe(&mut self, wave: &Wavefront) {
        let mut c = Census { time: wave.time(), alive: 0, diverged: 0, surface: 0, bottom: 0, caustic: 0 };
        for (_, _, cell) in wave.iter() {
            match cell.alive() {
                Some(r) => {
                    c.alive += 1;
                    c.surface += usize::from(r.surface > 0);
                    c.bottom += usize::from(r.bottom > 0);
                    c.caustic += usize::from(r.caustic > 0);
                }
                None => c.diverged += 1,
            }
        }
        self.history.push(c);
    }
}
