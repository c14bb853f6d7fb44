use tokio::sync::mpsc;

/// Everything an observer learns about a running session, in emission order.
#[derive(Clone, Debug, PartialEq, Eq)]
pub enum SyncEvent {
    TotalCount(usize),
    EntryStarted { url: String, expected_size: u64 },
    EntryProgress(u8),
    EntryFinished,
    SessionError(String),
    SessionFinished { cancelled: bool },
}

/// Receives session progress from the sync worker.
///
/// Calls arrive on the worker, strictly ordered: the total count first, then
/// `started -> progress* -> finished` per entry, and `on_session_finished`
/// exactly once at the end.
pub trait ProgressSink: Send {
    fn on_total_count(&mut self, count: usize);

    fn on_entry_started(&mut self, url: &str, expected_size: u64);

    fn on_entry_progress(&mut self, percent: u8);

    fn on_entry_finished(&mut self);

    fn on_session_error(&mut self, message: &str);

    fn on_session_finished(&mut self, _cancelled: bool) {}
}

/// Hands events to an observer on another task or thread.
#[derive(Clone, Debug)]
pub struct ChannelSink {
    updates: mpsc::UnboundedSender<SyncEvent>,
}

impl ChannelSink {
    pub fn new(updates: mpsc::UnboundedSender<SyncEvent>) -> Self {
        Self { updates }
    }

    pub fn channel() -> (Self, mpsc::UnboundedReceiver<SyncEvent>) {
        let (tx, rx) = mpsc::unbounded_channel();
        (Self::new(tx), rx)
    }

    fn send(&self, event: SyncEvent) {
        // A closed receiver just means nobody is watching anymore.
        let _ = self.updates.send(event);
    }
}

impl ProgressSink for ChannelSink {
    fn on_total_count(&mut self, count: usize) {
        self.send(SyncEvent::TotalCount(count));
    }

    fn on_entry_started(&mut self, url: &str, expected_size: u64) {
        self.send(SyncEvent::EntryStarted {
            url: url.to_owned(),
            expected_size,
        });
    }

    fn on_entry_progress(&mut self, percent: u8) {
        self.send(SyncEvent::EntryProgress(percent));
    }

    fn on_entry_finished(&mut self) {
        self.send(SyncEvent::EntryFinished);
    }

    fn on_session_error(&mut self, message: &str) {
        self.send(SyncEvent::SessionError(message.to_owned()));
    }

    fn on_session_finished(&mut self, cancelled: bool) {
        self.send(SyncEvent::SessionFinished { cancelled });
    }
}

/// Collects events in memory.
impl ProgressSink for Vec<SyncEvent> {
    fn on_total_count(&mut self, count: usize) {
        self.push(SyncEvent::TotalCount(count));
    }

    fn on_entry_started(&mut self, url: &str, expected_size: u64) {
        self.push(SyncEvent::EntryStarted {
            url: url.to_owned(),
            expected_size,
        });
    }

    fn on_entry_progress(&mut self, percent: u8) {
        self.push(SyncEvent::EntryProgress(percent));
    }

    fn on_entry_finished(&mut self) {
        self.push(SyncEvent::EntryFinished);
    }

    fn on_session_error(&mut self, message: &str) {
        self.push(SyncEvent::SessionError(message.to_owned()));
    }

    fn on_session_finished(&mut self, cancelled: bool) {
        self.push(SyncEvent::SessionFinished { cancelled });
    }
}
