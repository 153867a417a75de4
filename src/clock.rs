use tokio::time::Instant;

/// Simulation time in seconds, derived from a monotonic epoch. The server
/// can pause the whole encounter; while paused, reported time is frozen at
/// the instant of pausing, and the unpause event carries the accumulated
/// offset that keeps reported time continuous instead of jumping forward by
/// the pause duration.
#[derive(Clone, Debug)]
pub struct VirtualClock {
    epoch: Instant,
    pause_instant: Option<f64>,
    pause_offset: f64,
    server_offset: f64,
}

impl VirtualClock {
    pub fn new() -> Self {
        Self {
            epoch: Instant::now(),
            pause_instant: None,
            pause_offset: 0.0,
            server_offset: 0.0,
        }
    }

    pub fn with_server_offset(server_offset: f64) -> Self {
        Self {
            server_offset,
            ..Self::new()
        }
    }

    pub fn time(&self) -> f64 {
        if let Some(frozen) = self.pause_instant {
            return frozen;
        }
        self.epoch.elapsed().as_secs_f64() - self.pause_offset - self.server_offset
    }

    pub fn is_paused(&self) -> bool {
        self.pause_instant.is_some()
    }

    pub fn pause(&mut self) {
        if self.pause_instant.is_some() {
            eprintln!("[clock] pause while already paused, ignoring");
            return;
        }
        self.pause_instant = Some(self.time());
    }

    pub fn unpause(&mut self, offset_correction: f64) {
        if self.pause_instant.take().is_none() {
            eprintln!("[clock] unpause while running, applying offset only");
        }
        self.pause_offset += offset_correction;
    }
}

impl Default for VirtualClock {
    fn default() -> Self {
        Self::new()
    }
}
