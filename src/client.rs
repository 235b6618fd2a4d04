use async_trait::async_trait;
use tokio::sync::{oneshot, watch};
use tokio_util::sync::CancellationToken;

use crate::command::{CameraOptions, CameraRequest, CameraResponse};
use crate::config::GoProConfig;
use crate::error::CameraError;
use crate::event::CameraEvent;
use crate::interface::{HttpTransport, Transport};
use crate::state::{ConnectionSnapshot, ConnectionState};
use crate::status::CameraStatus;
use crate::task::ControlTask;

/// A long-running background job driven by the caller's runtime.
#[async_trait]
pub trait Task: Send + 'static {
    fn name(&self) -> &'static str;

    async fn run(self: Box<Self>, cancel: CancellationToken) -> anyhow::Result<()>;
}

pub(crate) type Command = (
    CameraRequest,
    oneshot::Sender<Result<CameraResponse, CameraError>>,
);

pub(crate) type CommandSink = flume::Sender<Command>;
pub(crate) type CommandSource = flume::Receiver<Command>;

/// Handle to a running [`ControlTask`]. Cheap to clone; all clones talk to
/// the same session.
#[derive(Clone)]
pub struct CameraClient {
    cmd_tx: CommandSink,
    evt_rx: flume::Receiver<CameraEvent>,
    snapshot_rx: watch::Receiver<ConnectionSnapshot>,
}

impl CameraClient {
    async fn command(&self, request: CameraRequest) -> Result<CameraResponse, CameraError> {
        let (ret_tx, ret_rx) = oneshot::channel();

        self.cmd_tx
            .try_send((request, ret_tx))
            .map_err(|err| match err {
                flume::TrySendError::Full(_) => CameraError::Busy,
                flume::TrySendError::Disconnected(_) => CameraError::Disconnected,
            })?;

        ret_rx.await.map_err(|_| CameraError::Disconnected)?
    }

    /// Establishes a session with the camera. On success the connection is
    /// `Connected`, or `Ready` if the camera was already powered on.
    pub async fn connect(&self) -> Result<(), CameraError> {
        self.command(CameraRequest::Connect).await.map(drop)
    }

    /// Tears the session down. Never fails against an already-broken link;
    /// only refuses when there is no session at all.
    pub async fn disconnect(&self) -> Result<(), CameraError> {
        self.command(CameraRequest::Disconnect).await.map(drop)
    }

    pub async fn power_on(&self) -> Result<(), CameraError> {
        self.command(CameraRequest::PowerOn).await.map(drop)
    }

    pub async fn power_off(&self) -> Result<(), CameraError> {
        self.command(CameraRequest::PowerOff).await.map(drop)
    }

    pub async fn start_shutter(&self) -> Result<(), CameraError> {
        self.command(CameraRequest::StartShutter).await.map(drop)
    }

    pub async fn stop_shutter(&self) -> Result<(), CameraError> {
        self.command(CameraRequest::StopShutter).await.map(drop)
    }

    /// Starts the camera beeping so it can be found.
    pub async fn start_locate(&self) -> Result<(), CameraError> {
        self.command(CameraRequest::StartLocate).await.map(drop)
    }

    pub async fn stop_locate(&self) -> Result<(), CameraError> {
        self.command(CameraRequest::StopLocate).await.map(drop)
    }

    /// Applies a batch of settings; see [`crate::command::translate_option`]
    /// for the accepted keys.
    pub async fn set_options(&self, options: CameraOptions) -> Result<(), CameraError> {
        self.command(CameraRequest::SetOptions(options))
            .await
            .map(drop)
    }

    /// Fetches a status snapshot immediately, off the polling cadence. The
    /// snapshot also flows to subscribers as a regular status event.
    pub async fn load_status(&self) -> Result<CameraStatus, CameraError> {
        match self.command(CameraRequest::LoadStatus).await? {
            CameraResponse::Status(status) => Ok(status),
            CameraResponse::Unit => unreachable!("load status returns a snapshot"),
        }
    }

    pub fn state(&self) -> ConnectionState {
        self.snapshot_rx.borrow().state
    }

    pub fn is_power_on(&self) -> bool {
        self.snapshot_rx.borrow().power_on
    }

    pub fn is_ready(&self) -> bool {
        self.snapshot_rx.borrow().state == ConnectionState::Ready
    }

    pub fn model(&self) -> Option<String> {
        self.snapshot_rx.borrow().model.clone()
    }

    pub fn firmware(&self) -> Option<String> {
        self.snapshot_rx.borrow().firmware.clone()
    }

    pub fn snapshot(&self) -> ConnectionSnapshot {
        self.snapshot_rx.borrow().clone()
    }

    /// Event stream from the session. Each receiver clone competes for
    /// events, so use one subscriber per stream.
    pub fn events(&self) -> flume::Receiver<CameraEvent> {
        self.evt_rx.clone()
    }

    /// Watches the connection snapshot for changes.
    pub fn watch(&self) -> watch::Receiver<ConnectionSnapshot> {
        self.snapshot_rx.clone()
    }
}

/// Creates the control task and a client handle for it, speaking HTTP to
/// the address in the config.
pub fn create_task(config: GoProConfig) -> anyhow::Result<(ControlTask<HttpTransport>, CameraClient)> {
    let transport = HttpTransport::new(&config.address, config.request_timeout)?;
    create_task_with(config, transport)
}

/// Same as [`create_task`] but over a caller-supplied transport.
pub fn create_task_with<T: Transport>(
    config: GoProConfig,
    transport: T,
) -> anyhow::Result<(ControlTask<T>, CameraClient)> {
    // one slot so a command issued while another is in flight fails fast
    let (cmd_tx, cmd_rx) = flume::bounded(1);
    let (evt_tx, evt_rx) = flume::bounded(256);
    let (snapshot_tx, snapshot_rx) =
        watch::channel(ConnectionSnapshot::new(config.address.clone()));

    let task = ControlTask::new(transport, config, cmd_rx, evt_tx, snapshot_tx);

    let client = CameraClient {
        cmd_tx,
        evt_rx,
        snapshot_rx,
    };

    Ok((task, client))
}
