//! Client facade.
//!
//! [`AvrClient`] binds the connection engine, command queue, property store,
//! parameters and registry into the public control surface: connect and
//! discover, refresh and update, send commands, and the convenience
//! wrappers home-automation integrations use.

use std::collections::HashSet;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Weak};
use std::time::Duration;

use parking_lot::{Mutex, RwLock};
use serde_json::{json, Map, Value};
use tokio::sync::Notify;
use tokio::task::JoinHandle;
use tokio_util::sync::CancellationToken;
use tracing::{debug, error, info, warn};

use crate::connection::Connection;
use crate::decoders::code_map::zfill;
use crate::error::{reason, Error};
use crate::params::{
    AvrParams, PARAM_DISABLE_AUTO_QUERY, PARAM_IGNORE_VOLUME_CHECK, PARAM_MAX_SOURCE_ID,
    PARAM_MAX_VOLUME, PARAM_MAX_VOLUME_ZONEX, PARAM_VOLUME_STEP_ONLY,
};
use crate::properties::modes::media_control_actions;
use crate::properties::{AvrProperties, SharedProperties};
use crate::queue::{CommandItem, CommandQueue};
use crate::registry::REGISTRY;
use crate::types::{TunerBand, Zone, DEFAULT_PORT, DEFAULT_SCAN_INTERVAL, DEFAULT_TIMEOUT};

/// Callback invoked when a zone's cached state changes.
pub type ZoneCallback = Box<dyn Fn() + Send + Sync>;

const BASIC_QUERIES: [&str; 4] = ["query_power", "query_volume", "query_mute", "query_source_id"];
const BASIC_REFRESH_QUERIES: [&str; 4] = [
    "query_listening_mode",
    "query_audio_information",
    "query_video_information",
    "query_display_information",
];
const CHANNELS: [&str; 12] =
    ["C", "L", "R", "SL", "SR", "SBL", "SBR", "SW", "LH", "RH", "LW", "RW"];
const TUNER_STEP_MAX_ATTEMPTS: usize = 5;
const STEP_COMMAND_MAX: usize = 200;

pub struct AvrClient {
    params: AvrParams,
    properties: SharedProperties,
    connection: Arc<Connection>,
    queue: CommandQueue,
    zone_callbacks: Mutex<Vec<(Zone, ZoneCallback)>>,
    updater: Mutex<Option<(JoinHandle<()>, CancellationToken)>>,
    update_notify: Notify,
    full_update: AtomicBool,
}

impl AvrClient {
    /// Create a client for one receiver. `user_params` overlays the built-in
    /// and model-derived parameter defaults.
    pub fn new(
        host: impl Into<String>,
        port: Option<u16>,
        user_params: Option<Map<String, Value>>,
    ) -> Arc<Self> {
        let params = AvrParams::new(user_params.unwrap_or_default());
        let properties: SharedProperties =
            Arc::new(RwLock::new(AvrProperties::new(params.clone())));
        let queue = properties.read().command_queue.clone();
        let connection = Connection::new(
            host,
            port.unwrap_or(DEFAULT_PORT),
            Duration::from_secs_f64(DEFAULT_TIMEOUT),
            Duration::from_secs_f64(DEFAULT_SCAN_INTERVAL),
            params.clone(),
            properties.clone(),
        );

        let client = Arc::new(AvrClient {
            params,
            properties,
            connection,
            queue,
            zone_callbacks: Mutex::new(Vec::new()),
            updater: Mutex::new(None),
            update_notify: Notify::new(),
            full_update: AtomicBool::new(false),
        });
        client.wire();
        client
    }

    /// Wire parameter observers, the queue executor and connection hooks.
    /// All hooks hold weak references so dropping the client tears the
    /// cycles down.
    fn wire(self: &Arc<Self>) {
        // listening modes depend on parameters: re-derive them on any change.
        // NOTE: parameter setters must not be called while holding the
        // property store lock.
        let weak_properties: Weak<RwLock<AvrProperties>> = Arc::downgrade(&self.properties);
        self.params.register_update_callback(Box::new(move || {
            if let Some(properties) = weak_properties.upgrade() {
                properties.write().update_listening_modes();
            }
        }));

        let weak = Arc::downgrade(self);
        self.queue.register_execute_callback(Arc::new(move |item| {
            let weak = weak.clone();
            Box::pin(async move {
                match weak.upgrade() {
                    Some(client) => client.execute_queue_item(item).await,
                    None => Err(Error::Unavailable),
                }
            })
        }));

        let weak = Arc::downgrade(self);
        self.connection.set_on_zones_updated(Arc::new(move |zones| {
            if let Some(client) = weak.upgrade() {
                client.call_zone_callbacks(&zones);
            }
        }));

        let weak = Arc::downgrade(self);
        self.connection.set_on_reconnect(Arc::new(move || {
            let weak = weak.clone();
            Box::pin(async move {
                if let Some(client) = weak.upgrade() {
                    client.on_reconnect().await;
                }
            })
        }));
    }

    pub fn params(&self) -> &AvrParams {
        &self.params
    }

    pub fn properties(&self) -> SharedProperties {
        self.properties.clone()
    }

    pub fn available(&self) -> bool {
        self.connection.available()
    }

    // =========================================================================
    // Lifecycle
    // =========================================================================

    pub async fn connect(self: &Arc<Self>, reconnect: bool) -> Result<(), Error> {
        self.connection.connect(reconnect).await?;
        self.updater_schedule();
        Ok(())
    }

    pub async fn disconnect(self: &Arc<Self>, reconnect: Option<bool>) -> Result<(), Error> {
        self.updater_cancel().await;
        self.queue.cancel().await;
        self.properties.write().reset();
        self.connection.disconnect(reconnect).await
    }

    pub async fn shutdown(self: &Arc<Self>) -> Result<(), Error> {
        self.updater_cancel().await;
        self.queue.cancel().await;
        self.connection.shutdown().await
    }

    pub async fn set_timeout(&self, timeout: Duration) {
        self.connection.set_timeout(timeout).await;
    }

    pub fn set_scan_interval(&self, scan_interval: Duration) {
        self.connection.set_scan_interval(scan_interval);
        self.update_notify.notify_one();
    }

    async fn on_reconnect(self: &Arc<Self>) {
        info!("re-initialising AVR state after reconnection");
        if let Err(err) = self.query_device_info().await {
            warn!("device info query failed after reconnect: {err}");
        }
        if let Err(err) = self.query_zones(true).await {
            warn!("zone discovery failed after reconnect: {err}");
        }
        self.updater_schedule();
    }

    // =========================================================================
    // Zone callbacks
    // =========================================================================

    /// Register a callback fired when the given zone's state changes.
    pub fn set_zone_callback(&self, zone: Zone, callback: ZoneCallback) {
        let mut callbacks = self.zone_callbacks.lock();
        callbacks.retain(|(z, _)| *z != zone);
        callbacks.push((zone, callback));
    }

    pub fn clear_zone_callbacks(&self) {
        self.zone_callbacks.lock().clear();
    }

    fn call_zone_callbacks(&self, zones: &HashSet<Zone>) {
        let all = zones.contains(&Zone::All);
        for (zone, callback) in self.zone_callbacks.lock().iter() {
            if all || zones.contains(zone) {
                debug!("calling callback for {zone}");
                callback();
            }
        }
    }

    // =========================================================================
    // Discovery
    // =========================================================================

    /// Discover zones by querying per-zone power status. The main zone must
    /// respond; other zones become discovered zones unless ignored.
    pub async fn query_zones(self: &Arc<Self>, force_update: bool) -> Result<(), Error> {
        info!("querying available zones on AVR");
        let _startup = self.queue.startup_lock().lock_owned().await;
        let ignored_zones = self.params.ignored_zones();
        let ignore_volume_check = self.params.get_bool(PARAM_IGNORE_VOLUME_CHECK);
        let mut added_zones = false;

        for zone in Zone::REAL {
            let power = self
                .connection
                .send_command("query_power", zone, "", "", Some(true), true)
                .await?
                .is_some();
            let responding = power
                && (ignore_volume_check
                    || self
                        .connection
                        .send_command("query_volume", zone, "", "", Some(true), true)
                        .await?
                        .is_some());
            if !responding {
                if zone == Zone::Z1 {
                    return Err(Error::local("query_zones", "Main Zone not found on AVR"));
                }
                continue;
            }
            if ignored_zones.contains(&zone) {
                continue;
            }
            let mut properties = self.properties.write();
            properties.zones.insert(zone);
            if !properties.max_volume.contains_key(&zone) {
                info!("{zone} discovered");
                let max_volume_param =
                    if zone == Zone::Z1 { PARAM_MAX_VOLUME } else { PARAM_MAX_VOLUME_ZONEX };
                let max_volume = self.params.get_i64(max_volume_param).unwrap_or(0);
                properties.max_volume.insert(zone, max_volume);
                added_zones = true;
            }
        }

        if added_zones || force_update {
            self.update_now(true).await?;
        }
        Ok(())
    }

    /// Query model, MAC address and software version, then re-derive model
    /// parameters.
    pub async fn query_device_info(&self) -> Result<(), Error> {
        {
            let properties = self.properties.read();
            let known = ["model", "software_version", "mac_addr"]
                .iter()
                .all(|key| properties.amp.get(*key).map(|v| !v.is_null()).unwrap_or(false));
            if known {
                return Ok(());
            }
        }
        info!("querying device information from AVR");
        for name in ["system_query_model", "system_query_mac_addr", "system_query_software_version"]
        {
            self.connection.send_command(name, Zone::Z1, "", "", Some(true), true).await?;
        }

        let model = self
            .properties
            .read()
            .amp
            .get("model")
            .and_then(Value::as_str)
            .map(str::to_string);
        if let Some(model) = model {
            // apply model-specific parameter defaults now the model is known
            self.params.set_default_params_model(&model);
        }
        Ok(())
    }

    /// Build the source id/name map by querying every candidate source ID.
    pub async fn build_source_dict(&self) -> Result<(), Error> {
        {
            let mut properties = self.properties.write();
            properties.query_sources = Some(true);
            properties.source_name_to_id.clear();
            properties.source_id_to_name.clear();
        }
        info!("querying AVR source names");
        let max_source_id = self.params.get_i64(PARAM_MAX_SOURCE_ID).unwrap_or(60);
        for source_id in 0..=max_source_id {
            self.connection
                .send_command("query_source_name", Zone::Z1, &zfill(source_id, 2), "", Some(true), false)
                .await?;
        }
        if self.properties.read().source_name_to_id.is_empty() {
            warn!("no input sources found on AVR");
        }
        Ok(())
    }

    /// Replace the source map manually; decoded source-name frames no longer
    /// update it.
    pub fn set_source_dict(
        &self,
        sources: std::collections::BTreeMap<i64, String>,
    ) -> Result<(), Error> {
        self.properties.write().set_source_dict(sources)
    }

    pub fn get_source_list(&self, zone: Zone) -> Vec<String> {
        self.properties.read().get_source_list(zone)
    }

    pub fn get_source_dict(&self, zone: Option<Zone>) -> std::collections::BTreeMap<i64, String> {
        self.properties.read().get_source_dict(zone)
    }

    // =========================================================================
    // Refresh / update
    // =========================================================================

    /// Refresh a zone, or all discovered zones when `zone` is `None`.
    pub async fn refresh(self: &Arc<Self>, zone: Option<Zone>) -> Result<(), Error> {
        match zone {
            Some(zone) => self.refresh_zone(zone).await,
            None => {
                let zones: Vec<Zone> = self.properties.read().zones.iter().copied().collect();
                for zone in zones {
                    self.refresh_zone(zone).await?;
                }
                self.call_zone_callbacks(&HashSet::from([Zone::All]));
                Ok(())
            }
        }
    }

    async fn refresh_zone(self: &Arc<Self>, zone: Zone) -> Result<(), Error> {
        self.check_zone(zone)?;
        self.queue.set_refreshing(zone, true);
        let result = self.refresh_zone_queries(zone).await;
        self.queue.set_refreshing(zone, false);
        if result.is_ok() {
            self.properties.write().zones_initial_refresh.insert(zone);
            self.call_zone_callbacks(&HashSet::from([zone]));
        }
        result
    }

    async fn refresh_zone_queries(self: &Arc<Self>, zone: Zone) -> Result<(), Error> {
        debug!("refreshing {zone}");
        for name in BASIC_QUERIES {
            self.connection.send_command(name, zone, "", "", Some(true), true).await?;
        }
        if self.params.get_bool(PARAM_DISABLE_AUTO_QUERY) {
            return Ok(());
        }
        let main_powered = self.properties.read().power.get(&Zone::Z1) == Some(&true);
        if !main_powered {
            return Ok(());
        }

        // remaining query commands registered for this zone
        for name in REGISTRY.get_command_names(Some("query_"), Some(zone)) {
            if BASIC_QUERIES.contains(&name) || name == "query_source_name" {
                continue;
            }
            self.connection.send_command(name, zone, "", "", Some(true), true).await?;
        }

        // channel levels are read through the set command with a query prefix
        if zone != Zone::Hdz {
            for channel in CHANNELS {
                let mut label = channel.to_string();
                while label.len() < 3 {
                    label.push('_');
                }
                self.connection
                    .send_command("set_channel_levels", zone, &format!("?{label}"), "", Some(true), true)
                    .await?;
            }
        }
        Ok(())
    }

    /// Debounced refresh: skipped when the last ingested frame is within the
    /// scan interval, unless a full update is requested or polling is
    /// forced.
    pub async fn update(self: &Arc<Self>, full: bool) -> Result<(), Error> {
        if full {
            self.full_update.store(true, Ordering::SeqCst);
        }
        if self.updater.lock().is_some() {
            self.update_notify.notify_one();
            tokio::task::yield_now().await;
            Ok(())
        } else {
            let full = self.full_update.swap(false, Ordering::SeqCst);
            self.update_now(full).await
        }
    }

    async fn update_now(self: &Arc<Self>, full: bool) -> Result<(), Error> {
        if !self.connection.available() {
            debug!("AVR not connected, skipping update");
            return Ok(());
        }
        let scan_interval = self.connection.scan_interval();
        let since_updated = self.connection.since_last_updated();
        let due = full
            || self.params.get_bool(crate::params::PARAM_ALWAYS_POLL)
            || since_updated.map_or(true, |since| since > scan_interval);
        if !due {
            debug!(
                "skipping update: last updated {:.3} s ago",
                since_updated.unwrap_or_default().as_secs_f64()
            );
            return Ok(());
        }
        info!(
            "updating AVR status (full={full}, last updated {:.3} s ago)",
            since_updated.unwrap_or_default().as_secs_f64()
        );
        self.connection.touch_last_updated();
        if let Err(err) = self.refresh(None).await {
            error!("could not update AVR status: {err}");
            return Err(err);
        }
        Ok(())
    }

    fn updater_schedule(self: &Arc<Self>) {
        let mut updater = self.updater.lock();
        if let Some((task, _)) = updater.as_ref() {
            if !task.is_finished() {
                return;
            }
        }
        let cancel = CancellationToken::new();
        let client = self.clone();
        let token = cancel.clone();
        let task = tokio::spawn(async move {
            debug!(">> updater started");
            loop {
                let scan_interval = client.connection.scan_interval();
                tokio::select! {
                    _ = token.cancelled() => break,
                    _ = tokio::time::sleep(scan_interval) => {}
                    _ = client.update_notify.notified() => {}
                }
                if !client.connection.available() {
                    continue;
                }
                let full = client.full_update.swap(false, Ordering::SeqCst);
                if let Err(err) = client.update_now(full).await {
                    error!("updater error: {err}");
                }
            }
            debug!(">> updater completed");
        });
        *updater = Some((task, cancel));
    }

    async fn updater_cancel(&self) {
        let slot = self.updater.lock().take();
        if let Some((task, cancel)) = slot {
            cancel.cancel();
            let _ = task.await;
        }
    }

    // =========================================================================
    // Commands
    // =========================================================================

    fn check_zone(&self, zone: Zone) -> Result<(), Error> {
        if !self.properties.read().zones.contains(&zone) {
            return Err(Error::local("check_zone", format!("zone {zone} does not exist on AVR")));
        }
        Ok(())
    }

    /// Send a named command, formatting `args` through the command's code
    /// map into the payload prefix.
    pub async fn send_command(
        &self,
        name: &str,
        zone: Zone,
        args: &[Value],
    ) -> Result<Option<String>, Error> {
        self.command(name, zone, args, None, true).await
    }

    async fn command(
        &self,
        name: &str,
        zone: Zone,
        args: &[Value],
        ignore_error: Option<bool>,
        rate_limit: bool,
    ) -> Result<Option<String>, Error> {
        let resolved = REGISTRY.get_command(name, zone)?;
        let prefix = if args.is_empty() {
            String::new()
        } else {
            let Some(map) = resolved.args else {
                return Err(Error::local(name, "command takes no arguments"));
            };
            let properties = self.properties.read();
            map.parse_args(name, args, zone, &self.params, &properties)
                .map_err(|err| wrap_parse_error(name, err))?
        };
        self.connection.send_command(name, zone, &prefix, "", ignore_error, rate_limit).await
    }

    /// Execute one queued item: either a local command or a device command.
    async fn execute_queue_item(self: &Arc<Self>, item: CommandItem) -> Result<(), Error> {
        if item.command.starts_with('_') {
            return self.execute_local_command(&item).await;
        }
        let ignore_error = if item.ignore_error { Some(true) } else { None };
        self.command(&item.command, item.zone, &item.args, ignore_error, item.rate_limit)
            .await
            .map(|_| ())
    }

    async fn execute_local_command(self: &Arc<Self>, item: &CommandItem) -> Result<(), Error> {
        let arg_f64 = item.args.first().and_then(Value::as_f64);
        match item.command.as_str() {
            "_sleep" => {
                tokio::time::sleep(Duration::from_secs_f64(arg_f64.unwrap_or(0.0))).await;
                Ok(())
            }
            "_delayed_query_basic" => {
                tokio::time::sleep(Duration::from_secs_f64(arg_f64.unwrap_or(0.0))).await;
                self.query_basic().await
            }
            "_refresh_zone" => self.refresh_zone(self.item_zone(item)?).await,
            "_delayed_refresh_zone" => {
                tokio::time::sleep(Duration::from_secs_f64(2.5)).await;
                self.refresh_zone(self.item_zone(item)?).await
            }
            "_full_refresh" => self.refresh(None).await,
            "_update_listening_modes" => {
                self.properties.write().update_listening_modes();
                Ok(())
            }
            "_calculate_am_frequency_step" => self.calculate_am_frequency_step().await,
            other => Err(Error::UnknownLocalCommand(other.to_string())),
        }
    }

    fn item_zone(&self, item: &CommandItem) -> Result<Zone, Error> {
        item.args
            .first()
            .and_then(Value::as_str)
            .and_then(Zone::from_id)
            .ok_or_else(|| Error::local(item.command.as_str(), "zone argument required"))
    }

    /// Minimal re-queries after state-changing events.
    async fn query_basic(self: &Arc<Self>) -> Result<(), Error> {
        if self.params.get_bool(PARAM_DISABLE_AUTO_QUERY) {
            return Ok(());
        }
        if self.properties.read().power.get(&Zone::Z1) != Some(&true) {
            return Ok(());
        }
        for name in BASIC_REFRESH_QUERIES {
            self.connection.send_command(name, Zone::Z1, "", "", Some(true), true).await?;
        }
        Ok(())
    }

    // =========================================================================
    // Convenience wrappers
    // =========================================================================

    pub async fn turn_on(&self, zone: Zone) -> Result<(), Error> {
        self.check_zone(zone)?;
        self.command("turn_on", zone, &[], None, true).await.map(|_| ())
    }

    pub async fn turn_off(&self, zone: Zone) -> Result<(), Error> {
        self.check_zone(zone)?;
        self.command("turn_off", zone, &[], None, true).await.map(|_| ())
    }

    pub async fn volume_up(&self, zone: Zone) -> Result<(), Error> {
        self.check_zone(zone)?;
        self.command("volume_up", zone, &[], None, true).await.map(|_| ())
    }

    pub async fn volume_down(&self, zone: Zone) -> Result<(), Error> {
        self.check_zone(zone)?;
        self.command("volume_down", zone, &[], None, true).await.map(|_| ())
    }

    pub async fn mute_on(&self, zone: Zone) -> Result<(), Error> {
        self.check_zone(zone)?;
        self.command("mute_on", zone, &[], None, true).await.map(|_| ())
    }

    pub async fn mute_off(&self, zone: Zone) -> Result<(), Error> {
        self.check_zone(zone)?;
        self.command("mute_off", zone, &[], None, true).await.map(|_| ())
    }

    /// Select an input source by name.
    pub async fn select_source(&self, source: &str, zone: Zone) -> Result<(), Error> {
        self.check_zone(zone)?;
        let source_id = self.properties.read().source_name_to_id.get(source).copied();
        let Some(source_id) = source_id else {
            return Err(Error::local("select_source", format!("invalid source {source}")));
        };
        self.command("select_source", zone, &[json!(source_id)], None, true).await.map(|_| ())
    }

    /// Set the volume level, using up/down stepping on models that do not
    /// accept direct volume set commands.
    pub async fn set_volume_level(&self, volume: i64, zone: Zone) -> Result<(), Error> {
        self.check_zone(zone)?;
        if !self.params.get_bool(PARAM_VOLUME_STEP_ONLY) {
            return self.command("set_volume_level", zone, &[json!(volume)], None, true).await.map(|_| ());
        }

        let read_volume = || self.properties.read().volume.get(&zone).copied();
        let Some(mut current) = read_volume() else {
            return Err(Error::local("set_volume_level", format!("volume for {zone} is not available")));
        };
        let mut steps = 0usize;
        while current != volume {
            if current < volume {
                self.volume_up(zone).await?;
            } else {
                self.volume_down(zone).await?;
            }
            tokio::task::yield_now().await;
            let new_volume = read_volume().unwrap_or(current);
            if new_volume == current {
                warn!("set_volume_level stopped stepping at {current}");
                break;
            }
            current = new_volume;
            steps += 1;
            if steps > STEP_COMMAND_MAX {
                break;
            }
        }
        Ok(())
    }

    /// Set the listening mode by display name.
    pub async fn set_listening_mode(&self, mode: &str) -> Result<(), Error> {
        self.command("set_listening_mode", Zone::Z1, &[json!(mode)], None, true).await.map(|_| ())
    }

    /// Set a channel level in dB for a zone.
    pub async fn set_channel_level(&self, channel: &str, level: f64, zone: Zone) -> Result<(), Error> {
        self.check_zone(zone)?;
        self.command("set_channel_levels", zone, &[json!(channel), json!(level)], None, true)
            .await
            .map(|_| ())
    }

    /// Recall a tuner preset.
    pub async fn select_tuner_preset(&self, class: &str, preset: i64) -> Result<(), Error> {
        self.command("select_tuner_preset", Zone::Z1, &[json!(class), json!(preset)], None, true)
            .await
            .map(|_| ())
    }

    /// Perform a media control action for a zone's current source.
    pub async fn media_control(&self, action: &str, zone: Zone) -> Result<(), Error> {
        self.check_zone(zone)?;
        let mode = self.properties.read().media_control_mode.get(&zone).cloned();
        let Some(mode) = mode else {
            return Err(Error::unavailable_command(
                "media_control",
                format!("media controls not supported on current source for {zone}"),
            ));
        };
        let command = media_control_actions(&mode)
            .and_then(|actions| actions.iter().find(|(name, _)| *name == action))
            .map(|(_, command)| *command);
        let Some(command) = command else {
            return Err(Error::unavailable_command(
                "media_control",
                format!("media action {action} not supported on source mode {mode}"),
            ));
        };
        // media control commands are always sent to the main zone
        self.command(command, Zone::Z1, &[], None, true).await.map(|_| ())
    }

    /// Tune to a frequency, switching band first when needed. The tuner only
    /// steps, so the frequency is approached with repeated step commands.
    pub async fn set_tuner_frequency(&self, band: TunerBand, frequency: f64) -> Result<(), Error> {
        const COMMAND: &str = "set_tuner_frequency";
        if !self.properties.read().is_source_tuner(None) {
            return Err(Error::unavailable_command(COMMAND, reason::TUNER_UNAVAILABLE));
        }

        let current_band = self.properties.read().tuner.get("band").and_then(Value::as_str).map(str::to_string);
        let wanted_band = band.to_string();
        if current_band.as_deref() != Some(wanted_band.as_str()) {
            let band_command =
                if band == TunerBand::Am { "set_tuner_band_am" } else { "set_tuner_band_fm" };
            self.command(band_command, Zone::Z1, &[], None, true).await?;
        }

        // normalise the target onto the band's step grid and validate bounds
        let target = match band {
            TunerBand::Fm => {
                let target = (frequency / 0.05).round() * 0.05;
                if !(87.5..=108.0).contains(&target) {
                    return Err(Error::local(COMMAND, format!("frequency {frequency} out of range")));
                }
                (target * 100.0).round() / 100.0
            }
            TunerBand::Am => {
                let Some(step) = self.properties.read().tuner.get("am_frequency_step").and_then(Value::as_i64)
                else {
                    return Err(Error::local(COMMAND, reason::FREQ_STEP_UNKNOWN));
                };
                let Some((minimum, maximum)) = crate::decoders::tuner::am_frequency_bounds(step) else {
                    return Err(Error::local(COMMAND, reason::FREQ_STEP_UNKNOWN));
                };
                let target = minimum + ((frequency as i64 - minimum) / step) * step;
                if target < minimum || target > maximum {
                    return Err(Error::local(COMMAND, format!("frequency {frequency} out of range")));
                }
                target as f64
            }
        };

        let read_frequency =
            || self.properties.read().tuner.get("frequency").and_then(Value::as_f64);
        if read_frequency().is_none() {
            self.command("query_tuner_frequency", Zone::Z1, &[], Some(true), true).await?;
        }
        for _ in 0..STEP_COMMAND_MAX {
            let Some(current) = read_frequency() else {
                return Err(Error::local(COMMAND, "tuner frequency unknown"));
            };
            if (current - target).abs() < 1e-6 {
                return Ok(());
            }
            let step_command = if current < target {
                "increase_tuner_frequency"
            } else {
                "decrease_tuner_frequency"
            };
            self.command(step_command, Zone::Z1, &[], None, true).await?;
            tokio::task::yield_now().await;
            if read_frequency() == Some(current) {
                // tuner stopped moving: likely at a band edge
                break;
            }
        }
        Err(Error::local(COMMAND, format!("unable to set tuner frequency to {target}")))
    }

    /// Step the tuner to determine the AM frequency step by observation.
    async fn calculate_am_frequency_step(self: &Arc<Self>) -> Result<(), Error> {
        const COMMAND: &str = "_calculate_am_frequency_step";
        if self.properties.read().tuner.get("am_frequency_step").and_then(Value::as_i64).is_some() {
            return Ok(());
        }
        if !self.properties.read().is_source_tuner(None) {
            return Err(Error::unavailable_command(COMMAND, reason::TUNER_UNAVAILABLE));
        }
        info!("calculating AM frequency step");

        let read_frequency =
            || self.properties.read().tuner.get("frequency").and_then(Value::as_i64);
        let mut increases = 0usize;
        let mut step: Option<i64> = None;
        for _ in 0..TUNER_STEP_MAX_ATTEMPTS {
            let Some(before) = read_frequency() else { break };
            self.command("increase_tuner_frequency", Zone::Z1, &[], None, true).await?;
            increases += 1;
            tokio::task::yield_now().await;
            let Some(after) = read_frequency() else { break };
            let diff = after - before;
            if diff == 9 || diff == 10 {
                step = Some(diff);
                break;
            }
        }
        // restore the original frequency
        for _ in 0..increases {
            self.command("decrease_tuner_frequency", Zone::Z1, &[], Some(true), true).await?;
        }

        let Some(step) = step else {
            return Err(Error::local(COMMAND, reason::FREQ_STEP_MAX_EXCEEDED));
        };
        info!("calculated AM frequency step: {step} kHz");
        self.properties.write().tuner.insert("am_frequency_step".to_string(), json!(step));
        Ok(())
    }

    /// Media control actions supported by the zone's current source.
    pub fn get_supported_media_controls(&self, zone: Zone) -> Option<Vec<String>> {
        self.properties.read().get_supported_media_controls(zone)
    }

    /// Wait for the command queue to drain, surfacing execution errors.
    pub async fn wait_for_command_queue(&self) -> Result<(), Error> {
        self.queue.wait().await
    }
}

fn wrap_parse_error(command: &str, err: Error) -> Error {
    match err {
        Error::CommandUnavailable { .. } => err,
        Error::LocalCommand { reason, .. } => Error::local(command, reason),
        other => Error::local(command, other.to_string()),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn volume_set_rejected_locally_when_out_of_bounds() {
        let client = AvrClient::new("127.0.0.1", None, None);
        {
            let mut properties = client.properties.write();
            properties.zones.insert(Zone::Z1);
            properties.max_volume.insert(Zone::Z1, 185);
        }
        // no connection: a local bound rejection must fire before any I/O
        let err = client.set_volume_level(200, Zone::Z1).await.unwrap_err();
        match err {
            Error::LocalCommand { command, reason } => {
                assert_eq!(command, "set_volume_level");
                assert!(reason.contains("185"), "reason: {reason}");
            }
            other => panic!("expected LocalCommand error, got {other}"),
        }
        // in-bounds volume passes the local check and fails on the connection
        let err = client.set_volume_level(185, Zone::Z1).await.unwrap_err();
        assert!(matches!(err, Error::Unavailable));
    }

    #[tokio::test]
    async fn unknown_zone_is_rejected() {
        let client = AvrClient::new("127.0.0.1", None, None);
        let err = client.turn_on(Zone::Z3).await.unwrap_err();
        assert!(matches!(err, Error::LocalCommand { .. }));
    }

    #[tokio::test]
    async fn am_frequency_set_requires_known_step() {
        let client = AvrClient::new("127.0.0.1", None, None);
        {
            let mut properties = client.properties.write();
            properties.zones.insert(Zone::Z1);
            properties.power.insert(Zone::Z1, true);
            properties.source_id.insert(Zone::Z1, crate::types::SOURCE_TUNER);
            properties.tuner.insert("band".to_string(), json!("AM"));
        }
        let err = client.set_tuner_frequency(TunerBand::Am, 999.0).await.unwrap_err();
        match err {
            Error::LocalCommand { reason, .. } => {
                assert_eq!(reason, crate::error::reason::FREQ_STEP_UNKNOWN);
            }
            other => panic!("expected LocalCommand error, got {other}"),
        }
    }

    #[tokio::test]
    async fn media_control_requires_supported_source() {
        let client = AvrClient::new("127.0.0.1", None, None);
        client.properties.write().zones.insert(Zone::Z1);
        let err = client.media_control("play", Zone::Z1).await.unwrap_err();
        assert!(matches!(err, Error::CommandUnavailable { .. }));

        client.properties.write().media_control_mode.insert(Zone::Z1, "TUNER".to_string());
        let err = client.media_control("play", Zone::Z1).await.unwrap_err();
        // tuner has no "play" action
        assert!(matches!(err, Error::CommandUnavailable { .. }));
    }
}
