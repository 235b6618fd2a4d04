use std::collections::BTreeMap;

use anyhow::Context;
use async_trait::async_trait;
use tokio::select;
use tokio::sync::watch;
use tokio::time::{sleep_until, Instant};
use tokio_util::sync::CancellationToken;
use tracing::{debug, trace, warn};

use crate::client::{CommandSource, Task};
use crate::command::{translate_option, CameraOptions, CameraRequest, CameraResponse};
use crate::config::GoProConfig;
use crate::error::CameraError;
use crate::event::CameraEvent;
use crate::interface::{endpoints, Request, Transport, TransportError};
use crate::state::{ConnectionSnapshot, ConnectionState};
use crate::status::{BacpacStatus, CameraInfo, CameraStatus, StatusDelta};

/// Owns the camera session. All connection state, the status poller and
/// command dispatch live on this one task, so requests and polls never
/// overlap on the wire.
pub struct ControlTask<T> {
    transport: T,
    config: GoProConfig,
    cmd_rx: CommandSource,
    evt_tx: flume::Sender<CameraEvent>,
    snapshot_tx: watch::Sender<ConnectionSnapshot>,
    snapshot: ConnectionSnapshot,
    password: Option<String>,
    last_properties: Option<BTreeMap<String, String>>,
    poll_at: Option<Instant>,
}

impl<T: Transport> ControlTask<T> {
    pub(crate) fn new(
        transport: T,
        config: GoProConfig,
        cmd_rx: CommandSource,
        evt_tx: flume::Sender<CameraEvent>,
        snapshot_tx: watch::Sender<ConnectionSnapshot>,
    ) -> Self {
        let snapshot = ConnectionSnapshot::new(config.address.clone());

        ControlTask {
            transport,
            config,
            cmd_rx,
            evt_tx,
            snapshot_tx,
            snapshot,
            password: None,
            last_properties: None,
            poll_at: None,
        }
    }

    fn publish(&self) {
        let _ = self.snapshot_tx.send(self.snapshot.clone());
    }

    fn emit(&self, event: CameraEvent) {
        if let Err(flume::TrySendError::Full(_)) = self.evt_tx.try_send(event) {
            warn!("event channel full, dropping event");
        }
    }

    fn set_state(&mut self, state: ConnectionState) {
        if self.snapshot.state != state {
            debug!(old = %self.snapshot.state, new = %state, "connection state changed");
            self.snapshot.state = state;
        }
        self.publish();
    }

    fn schedule_poll(&mut self, at: Instant) {
        self.poll_at = Some(at);
    }

    fn cancel_poll(&mut self) {
        self.poll_at = None;
    }

    fn require_state(
        &self,
        action: &'static str,
        state: ConnectionState,
    ) -> Result<(), CameraError> {
        if self.snapshot.state == state {
            Ok(())
        } else {
            Err(CameraError::InvalidState {
                action,
                state: self.snapshot.state,
            })
        }
    }

    fn password(&self) -> Result<&str, CameraError> {
        self.password.as_deref().ok_or(CameraError::Disconnected)
    }

    /// Tears the session down. An unrequested drop reports the loss to
    /// subscribers; an explicit disconnect stays silent.
    fn drop_session(&mut self, requested: bool) {
        self.cancel_poll();
        self.password = None;
        self.last_properties = None;
        self.snapshot.name = None;
        self.snapshot.model = None;
        self.snapshot.firmware = None;
        self.snapshot.power_on = false;

        if !requested {
            let kind = CameraError::Disconnected.kind();
            self.snapshot.last_error = Some(kind);
            self.emit(CameraEvent::Error(kind));
        }

        self.set_state(ConnectionState::Disconnected);
    }

    async fn fetch(&self, request: Request) -> Result<bytes::Bytes, TransportError> {
        self.transport.send(request).await
    }

    async fn fetch_text(&self, request: Request) -> Result<String, TransportError> {
        let raw = self.fetch(request).await?;
        Ok(String::from_utf8_lossy(&raw).into_owned())
    }

    async fn run_connect(&mut self) -> Result<CameraResponse, CameraError> {
        self.require_state("connect", ConnectionState::Disconnected)?;

        self.snapshot.last_error = None;
        self.set_state(ConnectionState::Connecting);

        match self.handshake().await {
            Ok(()) => Ok(CameraResponse::Unit),
            Err(err) => {
                debug!("handshake with {} failed: {err:#}", self.config.address);

                let error = CameraError::NotFound {
                    address: self.config.address.clone(),
                };
                self.snapshot.last_error = Some(error.kind());
                self.emit(CameraEvent::Error(error.kind()));
                self.set_state(ConnectionState::Disconnected);
                Err(error)
            }
        }
    }

    async fn handshake(&mut self) -> anyhow::Result<()> {
        let name = self
            .fetch_text(Request::get(endpoints::WIFI_NAME))
            .await
            .context("failed to read camera name")?
            .trim()
            .to_owned();

        // the password payload carries two framing bytes before the secret
        let raw_password = self
            .fetch_text(Request::get(endpoints::WIFI_PASSWORD))
            .await
            .context("failed to read camera password")?;
        let password = raw_password
            .get(2..)
            .context("camera password too short")?
            .trim_end()
            .to_owned();

        let raw = self
            .fetch(Request::with_auth(endpoints::BACPAC_STATUS, &password))
            .await
            .context("failed to read backpack status")?;
        let bacpac = BacpacStatus::parse(&raw)?;

        debug!(%name, power_on = bacpac.power_on, ready = bacpac.ready, "session established");

        self.password = Some(password);
        self.snapshot.name = Some(name.clone());
        self.snapshot.power_on = bacpac.power_on;
        self.set_state(ConnectionState::Connected);
        self.emit(CameraEvent::Connected { name });

        if bacpac.ready {
            self.enter_ready().await;
        }

        Ok(())
    }

    /// The camera is powered and accepting commands. Identity is fetched on
    /// a best-effort basis; polling starts immediately.
    async fn enter_ready(&mut self) {
        match self.fetch_camera_info().await {
            Ok(info) => {
                debug!(model = %info.model, firmware = %info.firmware, "camera identified");
                self.snapshot.model = Some(info.model);
                self.snapshot.firmware = Some(info.firmware);
            }
            Err(err) => warn!("could not identify camera: {err:#}"),
        }

        self.snapshot.power_on = true;
        self.set_state(ConnectionState::Ready);
        self.emit(CameraEvent::Ready);
        self.schedule_poll(Instant::now());
    }

    async fn fetch_camera_info(&self) -> anyhow::Result<CameraInfo> {
        let password = self.password()?;
        let raw = self
            .fetch_text(Request::with_auth(endpoints::CAMERA_INFO, password))
            .await
            .context("failed to read camera info")?;
        CameraInfo::parse(&raw)
    }

    /// Sends one setting or shutter command. A refusal leaves the session
    /// up; no answer at all means the link is gone.
    async fn run_command(&mut self, request: Request) -> Result<(), CameraError> {
        match self.fetch(request).await {
            Ok(_) => Ok(()),
            Err(TransportError::Refused { status }) => Err(CameraError::Rejected {
                reason: format!("camera answered http {status}"),
            }),
            Err(TransportError::Unreachable(reason)) => {
                debug!("camera stopped answering: {reason}");
                self.drop_session(false);
                Err(CameraError::Disconnected)
            }
        }
    }

    async fn run_simple(
        &mut self,
        action: &'static str,
        endpoint: &'static str,
        param: u8,
    ) -> Result<CameraResponse, CameraError> {
        self.require_state(action, ConnectionState::Ready)?;
        let password = self.password()?.to_owned();
        self.run_command(Request::command(endpoint, &password, param))
            .await?;
        Ok(CameraResponse::Unit)
    }

    async fn run_power(&mut self, on: bool) -> Result<CameraResponse, CameraError> {
        if on {
            self.require_state("power on", ConnectionState::Connected)?;
        } else {
            self.require_state("power off", ConnectionState::Ready)?;
        }

        let password = self.password()?.to_owned();
        let param = if on { 0x01 } else { 0x00 };
        self.run_command(Request::command(endpoints::POWER, &password, param))
            .await?;

        if on {
            self.enter_ready().await;
        } else {
            self.cancel_poll();
            self.last_properties = None;
            self.snapshot.power_on = false;
            self.set_state(ConnectionState::Connected);
        }

        Ok(CameraResponse::Unit)
    }

    async fn run_set_options(
        &mut self,
        options: CameraOptions,
    ) -> Result<CameraResponse, CameraError> {
        self.require_state("set options", ConnectionState::Ready)?;

        // mode and protune gate which other settings the camera accepts,
        // so they go out first
        let mut queue = Vec::with_capacity(options.len());
        for key in ["CameraMode", "Protune"] {
            if let Some(value) = options.get(key) {
                queue.push(translate_option(key, value)?);
            }
        }
        for (key, value) in &options {
            if key == "CameraMode" || key == "Protune" {
                continue;
            }
            queue.push(translate_option(key, value)?);
        }

        let password = self.password()?.to_owned();
        for (endpoint, param) in queue {
            trace!(endpoint, param, "applying option");
            self.run_command(Request::command(endpoint, &password, param))
                .await?;
        }

        Ok(CameraResponse::Unit)
    }

    async fn fetch_status(&self) -> Result<CameraStatus, TransportError> {
        let password = match self.password.as_deref() {
            Some(password) => password,
            None => return Err(TransportError::Unreachable("no session".to_owned())),
        };

        let status = self
            .fetch(Request::with_auth(endpoints::CAMERA_STATUS, password))
            .await?;
        let video_mode = self
            .fetch(Request::with_auth(endpoints::VIDEO_MODE_GET, password))
            .await?;
        let video_fps = self
            .fetch(Request::with_auth(endpoints::VIDEO_FPS_GET, password))
            .await?;
        let burst_rate = self
            .fetch(Request::with_auth(endpoints::BURST_RATE_GET, password))
            .await?;

        CameraStatus::decode(&status, &video_mode, &video_fps, &burst_rate)
            .map_err(|err| TransportError::Unreachable(err.to_string()))
    }

    /// Records a fresh snapshot and reports it. The first snapshot of a
    /// session reports every property.
    fn accept_snapshot(&mut self, status: CameraStatus) {
        let properties = status.properties();
        let delta = StatusDelta::between(self.last_properties.as_ref(), &properties);
        self.last_properties = Some(properties);
        self.emit(CameraEvent::StatusChanged { status, delta });
    }

    async fn run_load_status(&mut self) -> Result<CameraResponse, CameraError> {
        self.require_state("load status", ConnectionState::Ready)?;

        match self.fetch_status().await {
            Ok(status) => {
                self.accept_snapshot(status.clone());
                Ok(CameraResponse::Status(status))
            }
            Err(err) => {
                debug!("status fetch failed: {err}");
                self.drop_session(false);
                Err(CameraError::Disconnected)
            }
        }
    }

    async fn poll_round(&mut self) {
        trace!("polling camera status");

        match self.fetch_status().await {
            Ok(status) => {
                self.accept_snapshot(status);
                self.schedule_poll(Instant::now() + self.config.poll_interval);
            }
            Err(err) => {
                debug!("status poll failed: {err}");
                self.drop_session(false);
            }
        }
    }

    async fn dispatch(&mut self, request: CameraRequest) -> Result<CameraResponse, CameraError> {
        match request {
            CameraRequest::Connect => self.run_connect().await,
            CameraRequest::Disconnect => {
                if self.snapshot.state == ConnectionState::Disconnected {
                    return Err(CameraError::InvalidState {
                        action: "disconnect",
                        state: self.snapshot.state,
                    });
                }
                self.drop_session(true);
                Ok(CameraResponse::Unit)
            }
            CameraRequest::PowerOn => self.run_power(true).await,
            CameraRequest::PowerOff => self.run_power(false).await,
            CameraRequest::StartShutter => {
                self.run_simple("start shutter", endpoints::SHUTTER, 0x01)
                    .await
            }
            CameraRequest::StopShutter => {
                self.run_simple("stop shutter", endpoints::SHUTTER, 0x00)
                    .await
            }
            CameraRequest::StartLocate => {
                self.run_simple("start locate", endpoints::LOCATE, 0x01)
                    .await
            }
            CameraRequest::StopLocate => {
                self.run_simple("stop locate", endpoints::LOCATE, 0x00)
                    .await
            }
            CameraRequest::SetOptions(options) => self.run_set_options(options).await,
            CameraRequest::LoadStatus => self.run_load_status().await,
        }
    }
}

#[async_trait]
impl<T: Transport> Task for ControlTask<T> {
    fn name(&self) -> &'static str {
        "gopro/control"
    }

    async fn run(self: Box<Self>, cancel: CancellationToken) -> anyhow::Result<()> {
        let mut task = *self;

        let loop_fut = async move {
            loop {
                let poll_at = task.poll_at.unwrap_or_else(Instant::now);

                select! {
                    cmd = task.cmd_rx.recv_async() => {
                        let (request, ret_tx) = match cmd {
                            Ok(cmd) => cmd,
                            // all clients dropped their handles
                            Err(_) => break,
                        };

                        trace!(?request, "dispatching request");
                        let result = task.dispatch(request).await;
                        let _ = ret_tx.send(result);
                    }
                    _ = sleep_until(poll_at), if task.poll_at.is_some() => {
                        task.poll_round().await;
                    }
                }
            }

            Ok::<_, anyhow::Error>(())
        };

        select! {
            _ = cancel.cancelled() => {}
            res = loop_fut => { res? }
        }

        Ok(())
    }
}
