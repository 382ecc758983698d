use serde::Serialize;
use tokio::sync::mpsc;

#[derive(Serialize, Clone, Copy, Debug, PartialEq, Eq)]
#[serde(rename_all = "snake_case")]
pub enum StatusLevel {
    Info,
    Warning,
    Error,
}

#[derive(Serialize, Clone, Debug)]
pub struct StatusEvent {
    pub level: StatusLevel,
    pub message: String,
}

/// Progress and failure notices for the collaborator. Every event is also logged,
/// so a reporter without a receiver still leaves a trace.
#[derive(Clone, Default)]
pub struct StatusReporter {
    tx: Option<mpsc::UnboundedSender<StatusEvent>>,
}

impl StatusReporter {
    pub fn channel() -> (Self, mpsc::UnboundedReceiver<StatusEvent>) {
        let (tx, rx) = mpsc::unbounded_channel();
        (Self { tx: Some(tx) }, rx)
    }

    pub fn silent() -> Self {
        Self { tx: None }
    }

    pub fn info(&self, message: impl Into<String>) {
        let message = message.into();
        tracing::info!("{}", message);
        self.emit(StatusLevel::Info, message);
    }

    pub fn warn(&self, message: impl Into<String>) {
        let message = message.into();
        tracing::warn!("{}", message);
        self.emit(StatusLevel::Warning, message);
    }

    pub fn error(&self, message: impl Into<String>) {
        let message = message.into();
        tracing::error!("{}", message);
        self.emit(StatusLevel::Error, message);
    }

    fn emit(&self, level: StatusLevel, message: String) {
        if let Some(tx) = self.tx.as_ref() {
            let _ = tx.send(StatusEvent { level, message });
        }
    }
}
