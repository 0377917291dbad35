use kinface_core::{FrameOutput, ProcessorKind, ReloadSummary, Session, SessionError};
use kinface_sensor::SensorEvent;
use std::time::Instant;
use thiserror::Error;
use tokio::sync::{mpsc, oneshot};

#[derive(Error, Debug)]
pub enum EngineError {
    #[error("session error: {0}")]
    Session(#[from] SessionError),
    #[error("engine task exited")]
    ChannelClosed,
}

/// Snapshot of session state for callers outside the engine task.
#[derive(Debug, Clone)]
pub struct EngineStatus {
    pub processor: ProcessorKind,
    pub label: String,
    pub targets: usize,
    pub ready: bool,
    pub training_in_progress: bool,
    pub capture_armed: bool,
}

/// Messages sent to the engine task.
enum EngineRequest {
    Frame {
        event: SensorEvent,
        reply: oneshot::Sender<FrameOutput>,
    },
    Train {
        reply: oneshot::Sender<Result<Instant, SessionError>>,
    },
    SelectProcessor {
        kind: ProcessorKind,
        reply: oneshot::Sender<Result<ReloadSummary, SessionError>>,
    },
    SetLabel {
        label: String,
        reply: oneshot::Sender<Result<(), SessionError>>,
    },
    Status {
        reply: oneshot::Sender<EngineStatus>,
    },
}

/// Clone-safe handle to the engine task.
#[derive(Clone)]
pub struct EngineHandle {
    tx: mpsc::Sender<EngineRequest>,
}

impl EngineHandle {
    async fn request<T>(
        &self,
        make: impl FnOnce(oneshot::Sender<T>) -> EngineRequest,
    ) -> Result<T, EngineError> {
        let (reply_tx, reply_rx) = oneshot::channel();
        self.tx
            .send(make(reply_tx))
            .await
            .map_err(|_| EngineError::ChannelClosed)?;
        reply_rx.await.map_err(|_| EngineError::ChannelClosed)
    }

    /// Annotate one frame, enrolling its face if a capture is armed.
    pub async fn process_frame(&self, event: SensorEvent) -> Result<FrameOutput, EngineError> {
        self.request(|reply| EngineRequest::Frame { event, reply }).await
    }

    /// Press "train": start the capture countdown.
    pub async fn train(&self) -> Result<Instant, EngineError> {
        Ok(self.request(|reply| EngineRequest::Train { reply }).await??)
    }

    pub async fn select_processor(&self, kind: ProcessorKind) -> Result<ReloadSummary, EngineError> {
        Ok(self
            .request(|reply| EngineRequest::SelectProcessor { kind, reply })
            .await??)
    }

    pub async fn set_label(&self, label: String) -> Result<(), EngineError> {
        Ok(self.request(|reply| EngineRequest::SetLabel { label, reply }).await??)
    }

    pub async fn status(&self) -> Result<EngineStatus, EngineError> {
        self.request(|reply| EngineRequest::Status { reply }).await
    }
}

/// Spawn the engine task that owns `session`.
///
/// Frames, operator requests and the capture countdown expiry are handled
/// one at a time on this task, in arrival order.
pub fn spawn_engine(session: Session) -> EngineHandle {
    let (tx, rx) = mpsc::channel::<EngineRequest>(4);
    tokio::spawn(run(session, rx));
    EngineHandle { tx }
}

async fn run(mut session: Session, mut rx: mpsc::Receiver<EngineRequest>) {
    tracing::info!(processor = %session.kind(), "engine task started");
    loop {
        let deadline = session.capture_deadline();
        tokio::select! {
            // Expiry first, so a frame queued after the deadline sees the armed flag.
            biased;
            _ = wait_until(deadline) => {
                session.poll_capture(Instant::now());
            }
            req = rx.recv() => match req {
                Some(req) => handle(&mut session, req),
                None => break,
            },
        }
    }
    tracing::info!("engine task exiting");
}

async fn wait_until(deadline: Option<Instant>) {
    match deadline {
        Some(d) => tokio::time::sleep_until(tokio::time::Instant::from_std(d)).await,
        None => std::future::pending().await,
    }
}

fn handle(session: &mut Session, req: EngineRequest) {
    match req {
        EngineRequest::Frame { event, reply } => {
            let _ = reply.send(session.process_event(&event));
        }
        EngineRequest::Train { reply } => {
            let _ = reply.send(session.arm_capture(Instant::now()));
        }
        EngineRequest::SelectProcessor { kind, reply } => {
            let _ = reply.send(session.select_processor(kind));
        }
        EngineRequest::SetLabel { label, reply } => {
            let _ = reply.send(session.set_label(label));
        }
        EngineRequest::Status { reply } => {
            let _ = reply.send(EngineStatus {
                processor: session.kind(),
                label: session.label().to_string(),
                targets: session.registry().len(),
                ready: session.is_ready(),
                training_in_progress: session.training_in_progress(),
                capture_armed: session.capture_armed(),
            });
        }
    }
}
