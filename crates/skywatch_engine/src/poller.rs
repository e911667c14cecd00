use std::time::Duration;

use skywatch_core::Msg;
use skywatch_logging::{sky_debug, sky_trace};
use tokio::sync::mpsc;
use tokio::time::MissedTickBehavior;
use tokio_util::sync::CancellationToken;

const MIN_INTERVAL: Duration = Duration::from_millis(10);

/// Emits [`Msg::PollTick`] immediately and then every `interval`.
///
/// Each tick becomes two independent fetches (job list and stats) in the
/// state machine, so a failure in one never holds back the other.
#[derive(Debug)]
pub struct TelemetryPoller {
    cancel: CancellationToken,
}

impl TelemetryPoller {
    pub fn start(interval: Duration, msg_tx: mpsc::UnboundedSender<Msg>) -> Self {
        let cancel = CancellationToken::new();
        let token = cancel.clone();
        let interval = interval.max(MIN_INTERVAL);

        tokio::spawn(async move {
            let mut ticker = tokio::time::interval(interval);
            ticker.set_missed_tick_behavior(MissedTickBehavior::Delay);
            let mut ticks: u64 = 0;
            loop {
                tokio::select! {
                    biased;
                    _ = token.cancelled() => break,
                    _ = ticker.tick() => {
                        ticks += 1;
                        sky_trace!("poll tick {}", ticks);
                        if msg_tx.send(Msg::PollTick).is_err() {
                            break;
                        }
                    }
                }
            }
            sky_debug!("poller stopped after {} ticks", ticks);
        });

        Self { cancel }
    }

    pub fn stop(&self) {
        self.cancel.cancel();
    }

    pub fn is_running(&self) -> bool {
        !self.cancel.is_cancelled()
    }
}

impl Drop for TelemetryPoller {
    fn drop(&mut self) {
        self.cancel.cancel();
    }
}
