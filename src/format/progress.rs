//! Percentage progress reporting.

/// Turns "done out of total" into 0..=100 callbacks, skipping repeats.
pub struct Progress<'a> {
    sink: &'a mut dyn FnMut(u8),
    total: u64,
    last: Option<u8>,
}

impl<'a> Progress<'a> {
    pub fn new(sink: &'a mut dyn FnMut(u8), total: u64) -> Self {
        Self {
            sink,
            total,
            last: None,
        }
    }

    /// Change the denominator (e.g. once the data block size is known).
    pub fn set_total(&mut self, total: u64) {
        self.total = total;
    }

    pub fn report(&mut self, done: u64) {
        let percent = if self.total == 0 {
            100
        } else {
            (done.min(self.total) * 100 / self.total) as u8
        };
        if self.last != Some(percent) {
            self.last = Some(percent);
            (self.sink)(percent);
        }
    }

    pub fn complete(&mut self) {
        let total = self.total;
        self.report(total);
    }
}
