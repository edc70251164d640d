//! Frame clock: turns host frame timestamps into fixed simulation ticks

use crate::consts::{MAX_FRAME_DT, MAX_SUBSTEPS, SIM_DT};

/// Fixed-timestep accumulator driven by the host's frame callback
#[derive(Debug, Clone, Default)]
pub struct FrameClock {
    last_frame_ms: Option<f64>,
    accumulator: f64,
}

impl FrameClock {
    pub fn new() -> Self {
        Self::default()
    }

    /// Feed a frame timestamp (ms) and get the number of ticks to run
    ///
    /// The first frame after construction or `suspend` runs exactly one tick.
    /// Large gaps (tab stalls) are capped at `MAX_FRAME_DT`.
    pub fn advance(&mut self, now_ms: f64) -> u32 {
        if !now_ms.is_finite() {
            return 0;
        }

        let dt = match self.last_frame_ms {
            Some(last) => ((now_ms - last) / 1000.0).max(0.0),
            None => SIM_DT,
        };
        self.last_frame_ms = Some(now_ms);

        self.accumulator += dt.min(MAX_FRAME_DT);

        let mut substeps = 0;
        while self.accumulator >= SIM_DT && substeps < MAX_SUBSTEPS {
            self.accumulator -= SIM_DT;
            substeps += 1;
        }
        substeps
    }

    /// Forget the previous frame so time spent suspended is never credited
    pub fn suspend(&mut self) {
        self.last_frame_ms = None;
        self.accumulator = 0.0;
    }
}
