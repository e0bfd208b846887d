//! Connection engine.
//!
//! Owns the TCP session to the receiver: connect/disconnect lifecycle, the
//! ingestion loop, the rate-limited writer, request/response correlation on
//! the shared response bus, and automatic reconnection with exponential
//! backoff.

use std::collections::HashSet;
use std::future::Future;
use std::pin::Pin;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::time::{Duration, Instant};

use parking_lot::Mutex;
use rand::Rng;
use tokio::io::{AsyncBufReadExt, AsyncWriteExt, BufReader};
use tokio::net::tcp::{OwnedReadHalf, OwnedWriteHalf};
use tokio::net::TcpStream;
use tokio::sync::{Mutex as AsyncMutex, Notify};
use tokio::task::JoinHandle;
use tokio_util::sync::CancellationToken;
use tracing::{debug, error, info, warn};

use crate::decode::process_raw_response;
use crate::error::Error;
use crate::params::{AvrParams, PARAM_ALWAYS_POLL, PARAM_COMMAND_DELAY, PARAM_DEBUG_COMMAND};
use crate::properties::SharedProperties;
use crate::registry::REGISTRY;
use crate::types::Zone;

const RECONNECT_DELAY_MAX_SECS: u64 = 64;
const KEEPALIVE_MAX_FAILS: u32 = 3;

/// Hook run after a successful reconnection.
pub type ReconnectHook = Arc<dyn Fn() -> Pin<Box<dyn Future<Output = ()> + Send>> + Send + Sync>;

/// Hook fired with the zones touched by each decoded frame.
pub type ZonesUpdatedHook = Arc<dyn Fn(HashSet<Zone>) + Send + Sync>;

/// Exponential backoff with uniform jitter, capped.
fn backoff_delay(retry: u32) -> Duration {
    let exp = 2u64.saturating_pow(retry.max(2).min(6));
    let base = exp.min(RECONNECT_DELAY_MAX_SECS) as f64;
    Duration::from_secs_f64(base + rand::thread_rng().gen_range(0.0..1.0))
}

/// Set TCP keepalive derived from the session timeout.
fn set_keepalive(stream: &TcpStream, timeout: Duration) {
    let keepalive = socket2::TcpKeepalive::new().with_time(timeout).with_interval(timeout);
    #[cfg(any(target_os = "linux", target_os = "macos"))]
    let keepalive = keepalive.with_retries(KEEPALIVE_MAX_FAILS);
    let socket = socket2::SockRef::from(stream);
    if let Err(err) = socket.set_tcp_keepalive(&keepalive) {
        warn!("unable to set socket keepalive options: {err}");
    }
}

type TaskSlot = Mutex<Option<(JoinHandle<()>, CancellationToken)>>;

pub struct Connection {
    host: String,
    port: u16,
    params: AvrParams,
    properties: SharedProperties,

    timeout: Mutex<Duration>,
    scan_interval: Mutex<Duration>,

    available: AtomicBool,
    reconnect_enabled: AtomicBool,
    last_updated: Mutex<Option<Instant>>,
    last_command_at: Mutex<Option<Instant>>,

    writer: AsyncMutex<Option<OwnedWriteHalf>>,
    connect_lock: AsyncMutex<()>,
    disconnect_lock: AsyncMutex<()>,
    request_lock: AsyncMutex<()>,

    listener: TaskSlot,
    reconnect_task: TaskSlot,

    response_event: Notify,
    response_queue: Mutex<Vec<String>>,
    queue_responses: AtomicBool,
    bus_flushed: AtomicBool,

    on_reconnect: Mutex<Option<ReconnectHook>>,
    on_zones_updated: Mutex<Option<ZonesUpdatedHook>>,
}

impl Connection {
    pub fn new(
        host: impl Into<String>,
        port: u16,
        timeout: Duration,
        scan_interval: Duration,
        params: AvrParams,
        properties: SharedProperties,
    ) -> Arc<Self> {
        Arc::new(Connection {
            host: host.into(),
            port,
            params,
            properties,
            timeout: Mutex::new(timeout),
            scan_interval: Mutex::new(scan_interval),
            available: AtomicBool::new(false),
            reconnect_enabled: AtomicBool::new(true),
            last_updated: Mutex::new(None),
            last_command_at: Mutex::new(None),
            writer: AsyncMutex::new(None),
            connect_lock: AsyncMutex::new(()),
            disconnect_lock: AsyncMutex::new(()),
            request_lock: AsyncMutex::new(()),
            listener: Mutex::new(None),
            reconnect_task: Mutex::new(None),
            response_event: Notify::new(),
            response_queue: Mutex::new(Vec::new()),
            queue_responses: AtomicBool::new(false),
            bus_flushed: AtomicBool::new(false),
            on_reconnect: Mutex::new(None),
            on_zones_updated: Mutex::new(None),
        })
    }

    pub fn set_on_reconnect(&self, hook: ReconnectHook) {
        *self.on_reconnect.lock() = Some(hook);
    }

    pub fn set_on_zones_updated(&self, hook: ZonesUpdatedHook) {
        *self.on_zones_updated.lock() = Some(hook);
    }

    pub fn available(&self) -> bool {
        self.available.load(Ordering::SeqCst)
    }

    pub fn timeout(&self) -> Duration {
        *self.timeout.lock()
    }

    pub fn scan_interval(&self) -> Duration {
        *self.scan_interval.lock()
    }

    pub fn set_scan_interval(&self, scan_interval: Duration) {
        *self.scan_interval.lock() = scan_interval;
    }

    /// Set the session timeout and refresh socket keepalive options.
    pub async fn set_timeout(&self, timeout: Duration) {
        *self.timeout.lock() = timeout;
        if let Some(writer) = self.writer.lock().await.as_ref() {
            set_keepalive(writer.as_ref(), timeout);
        }
    }

    /// Time since the last frame was ingested, if any.
    pub fn since_last_updated(&self) -> Option<Duration> {
        self.last_updated.lock().map(|at| at.elapsed())
    }

    pub fn touch_last_updated(&self) {
        *self.last_updated.lock() = Some(Instant::now());
    }

    /// Open the connection and start the ingestion loop.
    pub async fn connect(self: &Arc<Self>, reconnect: bool) -> Result<(), Error> {
        debug!(">> connect started");
        if self.available() {
            return Err(Error::AlreadyConnected);
        }
        let Ok(_guard) = self.connect_lock.try_lock() else {
            return Err(Error::AlreadyConnecting);
        };

        debug!("opening AVR connection");
        let timeout = self.timeout();
        let stream = match tokio::time::timeout(
            timeout,
            TcpStream::connect((self.host.as_str(), self.port)),
        )
        .await
        {
            Ok(Ok(stream)) => stream,
            Ok(Err(err)) => return Err(Error::ConnectFailed(err.to_string())),
            Err(_) => return Err(Error::ConnectTimeout),
        };
        set_keepalive(&stream, timeout);

        let (read_half, write_half) = stream.into_split();
        *self.writer.lock().await = Some(write_half);
        self.available.store(true, Ordering::SeqCst);
        self.reconnect_enabled.store(reconnect, Ordering::SeqCst);
        self.listener_schedule(read_half).await;
        info!("AVR connection established");
        tokio::task::yield_now().await; // let the listener enter its read
        debug!(">> connect completed");
        Ok(())
    }

    async fn listener_schedule(self: &Arc<Self>, read_half: OwnedReadHalf) {
        self.listener_cancel().await;
        let cancel = CancellationToken::new();
        let task = tokio::spawn(self.clone().listener(read_half, cancel.clone()));
        *self.listener.lock() = Some((task, cancel));
    }

    async fn listener_cancel(&self) {
        let slot = self.listener.lock().take();
        if let Some((task, cancel)) = slot {
            cancel.cancel();
            let _ = task.await;
        }
    }

    /// Ingestion loop: read newline-terminated frames and route them into
    /// the decoder dispatcher and, when armed, the response bus.
    async fn listener(self: Arc<Self>, read_half: OwnedReadHalf, cancel: CancellationToken) {
        debug!(">> listener started");
        let mut reader = BufReader::new(read_half);
        let mut line = String::new();
        let mut cancelled = false;
        while self.available() {
            line.clear();
            tokio::select! {
                _ = cancel.cancelled() => {
                    debug!(">> listener task cancelled");
                    cancelled = true;
                    break;
                }
                result = reader.read_line(&mut line) => match result {
                    Ok(0) => {
                        debug!(">> listener detected EOF");
                        break;
                    }
                    Ok(_) => self.handle_frame(line.trim()),
                    Err(err) => {
                        debug!(">> listener detected connection error: {err}");
                        break;
                    }
                },
            }
        }

        // flush the response bus so a waiting requester unblocks
        if self.queue_responses.load(Ordering::SeqCst) {
            self.response_queue.lock().clear();
            self.bus_flushed.store(true, Ordering::SeqCst);
            self.response_event.notify_one();
        }

        if !cancelled {
            // connection dropped out from under us
            debug!(">> listener triggering disconnect");
            let connection = self.clone();
            tokio::spawn(async move {
                if let Err(err) = connection.disconnect(None).await {
                    debug!("listener disconnect failed: {err}");
                }
            });
        }
        debug!(">> listener completed");
    }

    /// Handle one inbound frame. Decoding runs to completion before the
    /// frame is offered to the response bus, so cached state is current by
    /// the time a requester resumes.
    fn handle_frame(&self, frame: &str) {
        // any response received within the scan interval reschedules the
        // next update, unless the client is configured to always poll
        if !self.params.get_bool(PARAM_ALWAYS_POLL) {
            *self.last_updated.lock() = Some(Instant::now());
        }
        if frame.is_empty() {
            // keepalive frames, sent on some ports every 30 s
            return;
        }
        debug!("received AVR response: {frame}");

        let zones = {
            let mut properties = self.properties.write();
            match process_raw_response(frame, &self.params, &mut properties) {
                Ok(zones) => zones,
                Err(err) => {
                    error!("{err}");
                    HashSet::new()
                }
            }
        };

        if self.queue_responses.load(Ordering::SeqCst) {
            self.response_queue.lock().push(frame.to_string());
            self.response_event.notify_one();
        }

        if !zones.is_empty() {
            let hook = self.on_zones_updated.lock().clone();
            if let Some(hook) = hook {
                hook(zones);
            }
        }
    }

    /// Write a raw frame, delaying to honour the minimum inter-frame gap
    /// when rate limiting is requested. Writes serialise on the writer lock.
    pub async fn send_raw_command(&self, command: &str, rate_limit: bool) -> Result<(), Error> {
        if !self.available() {
            return Err(Error::Unavailable);
        }
        let debug_command = self.params.get_bool(PARAM_DEBUG_COMMAND);
        let mut writer = self.writer.lock().await;

        if rate_limit {
            let command_delay =
                Duration::from_secs_f64(self.params.get_f64(PARAM_COMMAND_DELAY).unwrap_or(0.1));
            let since_command = self.last_command_at.lock().map(|at| at.elapsed());
            if let Some(since_command) = since_command {
                if since_command < command_delay {
                    let delay = command_delay - since_command;
                    if debug_command {
                        debug!("delaying command for {:.3} s", delay.as_secs_f64());
                    }
                    tokio::time::sleep(delay).await;
                }
            }
        }

        let Some(writer) = writer.as_mut() else {
            return Err(Error::Unavailable);
        };
        debug!("sending command: {command}");
        let frame = format!("{command}\r");
        if let Err(err) = writer.write_all(frame.as_bytes()).await {
            error!("could not send command {command} to AVR: {err}");
            return Err(Error::Unavailable);
        }
        if let Err(err) = writer.flush().await {
            error!("could not send command {command} to AVR: {err}");
            return Err(Error::Unavailable);
        }
        *self.last_command_at.lock() = Some(Instant::now());
        Ok(())
    }

    async fn wait_for_response(&self, command: &str, response_prefix: &str) -> Result<String, Error> {
        loop {
            let notified = self.response_event.notified();
            {
                let mut queue = self.response_queue.lock();
                if self.bus_flushed.load(Ordering::SeqCst) {
                    debug!(">> wait_for_response aborting on connection closed");
                    return Err(Error::Unavailable);
                }
                for response in queue.iter() {
                    if response.starts_with(response_prefix) {
                        debug!("AVR command {command} returned response: {response}");
                        return Ok(response.clone());
                    }
                    if response.starts_with('E') {
                        return Err(Error::CommandResponse {
                            command: command.to_string(),
                            response: response.clone(),
                        });
                    }
                }
                queue.clear();
            }
            notified.await;
        }
    }

    /// Send a request frame and wait for a response matching the expected
    /// prefix. Only one request can be in flight at a time.
    pub async fn send_raw_request(
        &self,
        command: &str,
        response_prefix: &str,
        rate_limit: bool,
    ) -> Result<String, Error> {
        let _request = self.request_lock.lock().await;
        // arm the response bus before sending the command
        self.response_queue.lock().clear();
        self.bus_flushed.store(false, Ordering::SeqCst);
        self.queue_responses.store(true, Ordering::SeqCst);

        let result = match self.send_raw_command(command, rate_limit).await {
            Err(err) => Err(err),
            Ok(()) => {
                match tokio::time::timeout(
                    self.timeout(),
                    self.wait_for_response(command, response_prefix),
                )
                .await
                {
                    Ok(result) => result,
                    Err(_) => Err(Error::ResponseTimeout(command.to_string())),
                }
            }
        };

        self.queue_responses.store(false, Ordering::SeqCst);
        self.response_queue.lock().clear();
        if result.is_ok() {
            tokio::task::yield_now().await; // let the listener drain
        }
        result
    }

    /// Send a named command for a zone. Commands with an expected response
    /// prefix are sent as requests; the response frame is returned.
    pub async fn send_command(
        &self,
        name: &str,
        zone: Zone,
        prefix: &str,
        suffix: &str,
        ignore_error: Option<bool>,
        rate_limit: bool,
    ) -> Result<Option<String>, Error> {
        let result = async {
            let resolved = REGISTRY.get_command(name, zone)?;
            let frame = format!("{prefix}{}{suffix}", resolved.command);
            match resolved.response_prefix {
                Some(response_prefix) => {
                    self.send_raw_request(&frame, response_prefix, rate_limit).await.map(Some)
                }
                None => self.send_raw_command(&frame, rate_limit).await.map(|()| None),
            }
        }
        .await;

        match result {
            Ok(response) => Ok(response),
            // connection loss always propagates, even when ignoring errors
            Err(Error::Unavailable) => Err(Error::Unavailable),
            Err(err) => match ignore_error {
                None => Err(err),
                Some(true) => {
                    debug!("{err}");
                    Ok(None)
                }
                Some(false) => {
                    error!("{err}");
                    Ok(None)
                }
            },
        }
    }

    /// Close the connection. `reconnect` overrides the intent recorded at
    /// connect time; reconnection is scheduled after teardown when enabled.
    pub async fn disconnect(self: &Arc<Self>, reconnect: Option<bool>) -> Result<(), Error> {
        debug!(">> disconnect started");
        if !self.available() {
            debug!("AVR not connected, skipping disconnect");
            return Ok(());
        }
        let Ok(_guard) = self.disconnect_lock.try_lock() else {
            return Err(Error::AlreadyDisconnecting);
        };

        self.reconnect_cancel().await;
        let reconnect = reconnect.unwrap_or_else(|| self.reconnect_enabled.load(Ordering::SeqCst));

        self.available.store(false, Ordering::SeqCst);
        self.listener_cancel().await;
        if let Some(mut writer) = self.writer.lock().await.take() {
            debug!("closing AVR connection");
            if let Err(err) = writer.shutdown().await {
                debug!("ignoring disconnect exception: {err}");
            }
        }
        info!("AVR connection closed");

        if reconnect {
            self.reconnect_schedule();
        }
        debug!(">> disconnect completed");
        Ok(())
    }

    fn reconnect_schedule(self: &Arc<Self>) {
        let mut slot = self.reconnect_task.lock();
        if let Some((task, _)) = slot.as_ref() {
            if !task.is_finished() {
                error!("AVR reconnection already running");
                return;
            }
        }
        info!("reconnecting to AVR");
        let cancel = CancellationToken::new();
        let task = tokio::spawn(self.clone().reconnect_loop(cancel.clone()));
        *slot = Some((task, cancel));
    }

    async fn reconnect_cancel(&self) {
        let slot = self.reconnect_task.lock().take();
        if let Some((task, cancel)) = slot {
            cancel.cancel();
            let _ = task.await;
        }
    }

    async fn reconnect_loop(self: Arc<Self>, cancel: CancellationToken) {
        debug!(">> reconnect started");
        let mut retry = 0u32;
        while !self.available() {
            retry += 1;
            let delay = backoff_delay(retry);
            debug!("waiting {:.3}s before retrying connection #{retry}", delay.as_secs_f64());
            tokio::select! {
                _ = cancel.cancelled() => {
                    debug!(">> reconnect cancelled");
                    return;
                }
                _ = tokio::time::sleep(delay) => {}
            }
            match self.connect(true).await {
                Ok(()) => {
                    let hook = self.on_reconnect.lock().clone();
                    if let Some(hook) = hook {
                        hook().await;
                    }
                    break;
                }
                Err(Error::AlreadyConnected) => break,
                Err(err) => {
                    debug!("could not reconnect to AVR: {err}");
                }
            }
        }
        debug!(">> reconnect completed");
    }

    /// Cancel reconnection and close the session for good.
    pub async fn shutdown(self: &Arc<Self>) -> Result<(), Error> {
        debug!(">> shutdown started");
        self.reconnect_cancel().await;
        self.disconnect(Some(false)).await?;
        tokio::task::yield_now().await; // let pending tasks observe cancellation
        debug!(">> shutdown completed");
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn backoff_delay_is_capped_with_jitter() {
        for retry in 1..12 {
            let delay = backoff_delay(retry).as_secs_f64();
            assert!(delay >= 4.0, "delay {delay} below floor at retry {retry}");
            assert!(delay < 65.0, "delay {delay} above cap at retry {retry}");
        }
    }

    #[test]
    fn backoff_delay_grows() {
        // deterministic part doubles until the cap
        let d3: f64 = backoff_delay(3).as_secs_f64();
        let d6: f64 = backoff_delay(6).as_secs_f64();
        assert!(d3 >= 8.0 && d3 < 9.0);
        assert!(d6 >= 64.0 && d6 < 65.0);
    }
}
