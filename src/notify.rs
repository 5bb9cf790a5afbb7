use tokio::sync::mpsc;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum NoticeLevel {
    Info,
    Error,
}

/// A toast for the status area.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Notice {
    pub level: NoticeLevel,
    pub text: String,
}

/// Fire-and-forget user notifications.
pub trait Notifier: Send + Sync + 'static {
    fn info(&self, text: &str);
    fn error(&self, text: &str);
}

/// Forwards notices to the front end over a channel.
#[derive(Debug, Clone)]
pub struct ChannelNotifier {
    tx: mpsc::UnboundedSender<Notice>,
}

impl ChannelNotifier {
    pub fn new(tx: mpsc::UnboundedSender<Notice>) -> Self {
        Self { tx }
    }

    pub fn channel() -> (Self, mpsc::UnboundedReceiver<Notice>) {
        let (tx, rx) = mpsc::unbounded_channel();
        (Self::new(tx), rx)
    }

    fn push(&self, level: NoticeLevel, text: &str) {
        // Nobody listening any more: the notice is dropped
        let _ = self.tx.send(Notice {
            level,
            text: text.to_string(),
        });
    }
}

impl Notifier for ChannelNotifier {
    fn info(&self, text: &str) {
        self.push(NoticeLevel::Info, text);
    }

    fn error(&self, text: &str) {
        self.push(NoticeLevel::Error, text);
    }
}
