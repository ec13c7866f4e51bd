use tokio::{
    sync::watch,
    task::JoinHandle,
    time::{interval_at, Duration, Instant},
};

/// Visible countdown that keeps the resend control disabled.
///
/// Counts down once per `tick` on its own task and stops at zero. Dropping
/// the cooldown cancels the timer.
#[derive(Debug)]
pub struct Cooldown {
    remaining: watch::Receiver<u32>,
    task: JoinHandle<()>,
}

impl Cooldown {
    #[must_use]
    pub fn start(units: u32, tick: Duration) -> Self {
        let (tx, remaining) = watch::channel(units);

        let task = tokio::spawn(async move {
            let mut ticker = interval_at(Instant::now() + tick, tick);
            let mut left = units;
            while left > 0 {
                ticker.tick().await;
                left -= 1;
                tx.send_replace(left);
            }
        });

        Self { remaining, task }
    }

    #[must_use]
    pub fn remaining(&self) -> u32 {
        *self.remaining.borrow()
    }

    #[must_use]
    pub fn is_active(&self) -> bool {
        self.remaining() > 0
    }

    /// Text of the resend control.
    #[must_use]
    pub fn label(&self) -> String {
        match self.remaining() {
            0 => "Resend code".to_string(),
            left => format!("Resend ({left}s)"),
        }
    }
}

impl Drop for Cooldown {
    fn drop(&mut self) {
        self.task.abort();
    }
}
