//! Out-of-process build servers: subprocess lifecycle, JSON-RPC wiring and crash recovery.
//!
//! The lifecycle is a small state machine:
//!
//! ```text
//! UNINITIALIZED ──spawn──► STARTED ──initialize──► READY
//! READY ──subprocess exit──► CRASHED ──damped restart──► READY
//! READY ──shutdown──► SHUT_DOWN
//! ```
//!
//! While `STARTED`, only `build/initialize` may be sent and its params are cached so a restart
//! can replay them. A crash fails all in-flight requests, respawns the server after a damping
//! delay, replays the initialize handshake and synthesizes a wholesale
//! `buildTarget/didChange` toward the manager so every cache is discarded.

use std::io::BufReader;
use std::path::PathBuf;
use std::process::{Command, Stdio};
use std::sync::{Arc, Mutex, Weak};
use std::time::{Duration, Instant};

use anyhow::{Context, Result};
use bsp_server::Message;
use command_group::{CommandGroup, GroupChild};
use log::{error, info, warn};

use bsp_types::notifications::{
    DidChangeBuildTargetParams, InitializedBuildParams, Notification, OnBuildExit,
    OnBuildInitialized, OnBuildTargetDidChange,
};
use bsp_types::requests::{BuildInitialize, BuildShutdown, InitializeBuildParams, Request};

use crate::adapters::bsp_config::{resolve_command, ServerConfigLocation};
use crate::adapters::rpc::{PendingResponse, RpcClient, WriteTransport};
use crate::adapters::InboundMessageHandler;
use crate::config::BuildSystemManagerConfig;
use crate::error::AdapterError;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Lifecycle {
    /// Spawned; the initialize handshake has not completed.
    Started,
    /// Initialized; arbitrary traffic is allowed.
    Ready,
    /// The subprocess exited unexpectedly; a restart may be in flight.
    Crashed,
    /// `shutdown()` ran; the adapter stays dead.
    ShutDown,
}

struct ServerProcess {
    child: GroupChild,
    client: RpcClient,
}

struct AdapterState {
    lifecycle: Lifecycle,
    process: Option<ServerProcess>,
    /// The first initialize request, kept for replay after a crash.
    cached_initialize: Option<InitializeBuildParams>,
    last_restart: Option<Instant>,
    /// Monotonically increasing spawn counter, to tell which process a reader belongs to.
    generation: u64,
}

pub struct ExternalBuildSystemAdapter {
    inner: Arc<AdapterInner>,
}

struct AdapterInner {
    location: ServerConfigLocation,
    program: PathBuf,
    arguments: Vec<String>,
    workspace_root: PathBuf,
    config: BuildSystemManagerConfig,
    handler: Mutex<Weak<dyn InboundMessageHandler>>,
    state: Mutex<AdapterState>,
}

impl ExternalBuildSystemAdapter {
    pub fn new(
        location: ServerConfigLocation,
        workspace_root: PathBuf,
        config: BuildSystemManagerConfig,
        handler: Weak<dyn InboundMessageHandler>,
    ) -> Result<ExternalBuildSystemAdapter> {
        let (program, arguments) = resolve_command(&location, None)?;
        let inner = Arc::new(AdapterInner {
            location,
            program,
            arguments,
            workspace_root,
            config,
            handler: Mutex::new(handler),
            state: Mutex::new(AdapterState {
                lifecycle: Lifecycle::Started,
                process: None,
                cached_initialize: None,
                last_restart: None,
                generation: 0,
            }),
        });
        inner.spawn_process().context("failed to spawn build server")?;
        info!(
            "spawned build server {} ({})",
            inner.location.details.name,
            inner.program.display()
        );
        Ok(ExternalBuildSystemAdapter { inner })
    }

    pub fn server_name(&self) -> &str {
        &self.inner.location.details.name
    }

    pub fn send_request<R: Request>(&self, params: R::Params) -> Result<PendingResponse<R>> {
        let mut state = self.inner.state.lock().unwrap();
        match state.lifecycle {
            Lifecycle::Started => {
                if R::METHOD != BuildInitialize::METHOD {
                    return Err(AdapterError::NotInitialized.into());
                }
                // The first initialize is the replay record; a second one is a client bug.
                let value = serde_json::to_value(&params)?;
                let initialize: InitializeBuildParams = serde_json::from_value(value)?;
                if state.cached_initialize.is_some() {
                    error!("duplicate build/initialize sent to external build server");
                } else {
                    state.cached_initialize = Some(initialize);
                }
            }
            Lifecycle::Ready => {}
            Lifecycle::Crashed => return Err(AdapterError::ServerCrashed.into()),
            Lifecycle::ShutDown => return Err(AdapterError::ServerCrashed.into()),
        }
        let process = state
            .process
            .as_ref()
            .ok_or(AdapterError::ServerCrashed)?;
        process.client.send_request::<R>(params)
    }

    pub fn notify<N: Notification>(&self, params: N::Params) -> Result<()> {
        let mut state = self.inner.state.lock().unwrap();
        match state.lifecycle {
            Lifecycle::Started if N::METHOD == OnBuildInitialized::METHOD => {
                state.lifecycle = Lifecycle::Ready;
            }
            Lifecycle::Started | Lifecycle::Ready => {}
            Lifecycle::Crashed | Lifecycle::ShutDown => {
                warn!("dropping {} notification, build server is gone", N::METHOD);
                return Ok(());
            }
        }
        let process = state
            .process
            .as_ref()
            .ok_or(AdapterError::ServerCrashed)?;
        process.client.send_notification::<N>(params)
    }

    /// Graceful teardown: `build/shutdown` with a bounded wait, `build/exit`, then a grace
    /// period before the process group is terminated.
    pub fn shutdown(&self) {
        let process = {
            let mut state = self.inner.state.lock().unwrap();
            if state.lifecycle == Lifecycle::ShutDown {
                return;
            }
            state.lifecycle = Lifecycle::ShutDown;
            state.process.take()
        };
        let Some(mut process) = process else {
            return;
        };

        if let Ok(pending) = process.client.send_request::<BuildShutdown>(()) {
            if let Err(err) = pending.wait_timeout(self.inner.config.shutdown_timeout) {
                warn!("build/shutdown failed: {err:#}");
            }
        }
        let _ = process
            .client
            .send_notification::<OnBuildExit>(Default::default());

        let grace_deadline = Instant::now() + Duration::from_secs(1);
        loop {
            match process.child.try_wait() {
                Ok(Some(_)) => return,
                Ok(None) if Instant::now() < grace_deadline => {
                    std::thread::sleep(Duration::from_millis(50));
                }
                _ => break,
            }
        }
        info!("build server did not exit in time, terminating it");
        let _ = process.child.kill();
        let _ = process.child.wait();
    }
}

impl Drop for ExternalBuildSystemAdapter {
    fn drop(&mut self) {
        // Best effort: without an explicit shutdown() the subprocess must still not outlive us.
        let process = {
            let mut state = self.inner.state.lock().unwrap();
            state.lifecycle = Lifecycle::ShutDown;
            state.process.take()
        };
        if let Some(mut process) = process {
            let _ = process.child.kill();
            let _ = process.child.wait();
        }
    }
}

impl AdapterInner {
    fn spawn_process(self: &Arc<Self>) -> Result<()> {
        let mut command = Command::new(&self.program);
        command
            .args(&self.arguments)
            .current_dir(&self.workspace_root)
            .stdin(Stdio::piped())
            .stdout(Stdio::piped())
            .stderr(Stdio::null());
        let mut child = command.group_spawn()?;

        let stdin = child
            .inner()
            .stdin
            .take()
            .context("build server has no stdin")?;
        let stdout = child
            .inner()
            .stdout
            .take()
            .context("build server has no stdout")?;

        let client = RpcClient::new(
            Box::new(WriteTransport(stdin)),
            self.handler.lock().unwrap().clone(),
        );

        let generation = {
            let mut state = self.state.lock().unwrap();
            state.generation += 1;
            state.process = Some(ServerProcess {
                child,
                client: client.clone_for_reader(),
            });
            state.generation
        };

        let weak = Arc::downgrade(self);
        std::thread::spawn(move || {
            let mut reader = BufReader::new(stdout);
            loop {
                match Message::read(&mut reader) {
                    Ok(Some(message)) => client.handle_message(message),
                    Ok(None) => break,
                    Err(err) => {
                        warn!("failed to read from build server: {err}");
                        break;
                    }
                }
            }
            client.fail_pending();
            if let Some(inner) = weak.upgrade() {
                inner.on_server_exit(generation);
            }
        });
        Ok(())
    }

    fn on_server_exit(self: Arc<Self>, generation: u64) {
        let process = {
            let mut state = self.state.lock().unwrap();
            if state.lifecycle == Lifecycle::ShutDown || state.generation != generation {
                return;
            }
            state.lifecycle = Lifecycle::Crashed;
            state.process.take()
        };

        let Some(mut process) = process else {
            return;
        };
        let status = process.child.wait().ok();
        let crashed = status.map(|status| !status.success()).unwrap_or(true);
        error!(
            "build server {} terminated unexpectedly (status: {status:?})",
            self.location.details.name
        );
        if !crashed {
            // A clean exit we did not ask for; leave the adapter dead rather than respawn-loop.
            return;
        }

        let inner = Arc::clone(&self);
        std::thread::spawn(move || inner.restart_after_crash());
    }

    fn restart_after_crash(self: Arc<Self>) {
        let delay = {
            let state = self.state.lock().unwrap();
            restart_delay(state.last_restart, &self.config)
        };
        if !delay.is_zero() {
            info!("build server crashed again recently, delaying restart by {delay:?}");
        }
        std::thread::sleep(delay);

        {
            let mut state = self.state.lock().unwrap();
            if state.lifecycle != Lifecycle::Crashed {
                return;
            }
            state.last_restart = Some(Instant::now());
        }

        if let Err(err) = self.spawn_process() {
            error!("failed to restart build server: {err:#}");
            return;
        }
        if let Err(err) = self.replay_initialize() {
            error!("failed to re-initialize restarted build server: {err:#}");
            return;
        }

        {
            let mut state = self.state.lock().unwrap();
            state.lifecycle = Lifecycle::Ready;
        }
        info!("build server {} restarted", self.location.details.name);

        // Everything the manager knows may be stale now.
        if let Some(handler) = self.handler.lock().unwrap().upgrade() {
            handler.handle_notification(bsp_server::Notification::new(
                OnBuildTargetDidChange::METHOD.to_string(),
                DidChangeBuildTargetParams { changes: None },
            ));
        }
    }

    fn replay_initialize(&self) -> Result<()> {
        let (client, params) = {
            let state = self.state.lock().unwrap();
            let process = state.process.as_ref().ok_or(AdapterError::ServerCrashed)?;
            let params = state
                .cached_initialize
                .clone()
                .ok_or(AdapterError::NotInitialized)?;
            (process.client.clone_for_reader(), params)
        };
        client.send_request::<BuildInitialize>(params)?.wait()?;
        client.send_notification::<OnBuildInitialized>(InitializedBuildParams::default())?;
        Ok(())
    }
}

/// A crash shortly after the previous restart earns an extra delay, so a server that dies on
/// startup does not respawn in a tight loop.
fn restart_delay(last_restart: Option<Instant>, config: &BuildSystemManagerConfig) -> Duration {
    match last_restart {
        Some(last) if last.elapsed() < config.crash_damping_window => config.crash_extra_delay,
        _ => Duration::ZERO,
    }
}
