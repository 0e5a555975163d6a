use chrono::{DateTime, Local};
use statum::{machine, state};
use std::collections::HashMap;
use std::time::Instant;
use tokio::time::MissedTickBehavior;
use tokio_util::sync::CancellationToken;
use tracing::{debug, info, warn};

use super::surface_handle::SurfaceError;
use super::SurfaceEvent;
use crate::config::SurfaceConfig;
use crate::hardware::HardwareEventBridge;
use crate::listener::{Listener, Listeners};
use crate::touch::event::ElementId;
use crate::touch::TouchInput;
use crate::ui_bridge::{UiBridge, UiEvent, UiEventKind};
use crate::widgets::element::ElementSpec;
use crate::widgets::{WidgetEvent, WidgetRegistry};

#[state]
#[derive(Debug, Clone)]
pub enum LoopState {
    Initializing,
    Running,
    Stopped,
}

/// What one tick did
#[derive(Debug, Default, Clone, Copy, PartialEq, Eq)]
pub struct TickReport {
    pub hardware_events: usize,
    pub ui_events: usize,
    pub touches: usize,
    pub widget_events: usize,
    pub frame: bool,
}

// Counters between two stats log lines
#[derive(Debug)]
struct LoopStats {
    ticks: u64,
    frames: u64,
    hardware_events: usize,
    ui_events: usize,
    touches: usize,
    widget_events: usize,
    last_report: DateTime<Local>,
    interval: chrono::Duration,
}

impl LoopStats {
    fn new(interval: chrono::Duration) -> Self {
        Self {
            ticks: 0,
            frames: 0,
            hardware_events: 0,
            ui_events: 0,
            touches: 0,
            widget_events: 0,
            last_report: Local::now(),
            interval,
        }
    }

    fn record(&mut self, report: &TickReport) {
        self.ticks += 1;
        self.frames += u64::from(report.frame);
        self.hardware_events += report.hardware_events;
        self.ui_events += report.ui_events;
        self.touches += report.touches;
        self.widget_events += report.widget_events;
    }

    fn report_if_due(&mut self, now: DateTime<Local>, hardware: &mut HardwareEventBridge) {
        if now - self.last_report <= self.interval {
            return;
        }

        let elapsed_seconds = (now - self.last_report).num_seconds().max(1);
        info!(
            "Control loop stats: {} ticks, {} frames in {} seconds",
            self.ticks, self.frames, elapsed_seconds
        );
        let bridge = hardware.take_stats();
        info!(
            "Events: {} hardware ({} records, {} dropped), {} ui, {} touches, {} widget",
            self.hardware_events,
            bridge.records,
            bridge.dropped,
            self.ui_events,
            self.touches,
            self.widget_events
        );
        info!(
            "Average: {:.1} frames/sec",
            self.frames as f64 / elapsed_seconds as f64
        );

        *self = Self::new(self.interval);
        self.last_report = now;
    }
}

/// The surface's single cooperative loop
///
/// Channels are drained on every poll tick. Touch input, fader animation and
/// the resulting renderer updates run once per frame; a frame that comes due
/// while the loop is behind is dropped, not queued.
#[machine]
#[derive(Debug)]
pub struct ControlLoop<S: LoopState> {
    config: SurfaceConfig,
    hardware: HardwareEventBridge,
    ui: UiBridge,
    touch: TouchInput,
    widgets: WidgetRegistry,
    // element labels, resent with every UPDATE since the renderer replaces text
    labels: HashMap<ElementId, String>,
    listeners: Listeners<SurfaceEvent>,
    cancel: CancellationToken,
    last_frame: Option<Instant>,
    stats: LoopStats,
}

impl<S: LoopState> ControlLoop<S> {
    pub fn config(&self) -> &SurfaceConfig {
        &self.config
    }

    pub fn widgets(&self) -> &WidgetRegistry {
        &self.widgets
    }

    pub fn add_listener(&mut self, listener: impl Listener<SurfaceEvent> + 'static) {
        self.listeners.add(listener);
    }
}

impl ControlLoop<Initializing> {
    /// Opens every channel named in the config. Missing channels and touch
    /// devices leave their part disabled; only an invalid layout fails.
    pub fn create(config: SurfaceConfig, cancel: CancellationToken) -> Result<Self, SurfaceError> {
        debug!("Creating control loop with timing: {:?}", config.timing);

        let hardware = HardwareEventBridge::open(&config.channels.gpio, config.sources());
        let ui = UiBridge::open(&config.channels.ui_commands, &config.channels.ui_events);
        let touch = TouchInput::open(&config.touch);
        Self::assemble(config, hardware, ui, touch, cancel)
    }

    pub fn assemble(
        config: SurfaceConfig,
        hardware: HardwareEventBridge,
        ui: UiBridge,
        touch: TouchInput,
        cancel: CancellationToken,
    ) -> Result<Self, SurfaceError> {
        let mut widgets = WidgetRegistry::new(config.panel());
        let mut labels = HashMap::new();
        for element in &config.elements {
            widgets.register(element)?;
            let label = match element {
                ElementSpec::Button(e) => e.label.clone(),
                ElementSpec::Toggle(e) => e.label.clone(),
                ElementSpec::Fader(e) => e.label.clone(),
                ElementSpec::Label(e) => e.text.clone(),
            };
            labels.insert(element.id(), label);
        }

        let stats = LoopStats::new(config.stats_interval());
        Ok(Self::new(
            config,
            hardware,
            ui,
            touch,
            widgets,
            labels,
            Listeners::new(),
            cancel,
            None, // last_frame
            stats,
        ))
    }

    /// Creates every configured element on the renderer
    pub fn start(mut self) -> ControlLoop<Running> {
        for element in &self.config.elements {
            if let Err(e) = self.ui.create_element(element) {
                warn!("Failed to create element {} on renderer: {}", element.id(), e);
            }
        }

        info!(
            "Control loop running: {} elements, hardware {}, renderer {}, touch {}",
            self.widgets.len(),
            connected(self.hardware.is_connected()),
            connected(self.ui.commands_connected()),
            connected(self.touch.is_enabled())
        );
        self.transition()
    }
}

impl ControlLoop<Running> {
    pub fn cancel_token(&self) -> CancellationToken {
        self.cancel.clone()
    }

    /// Shows or hides an element on the renderer and for touch input
    pub fn set_visible(&mut self, uid: ElementId, visible: bool) -> Result<(), SurfaceError> {
        self.widgets.set_visible(uid, visible)?;
        let sent = if visible {
            self.ui.show_element(uid)
        } else {
            self.ui.hide_element(uid)
        };
        if let Err(e) = sent {
            warn!("Failed to change visibility of element {} on renderer: {}", uid, e);
        }
        Ok(())
    }

    /// One pass of the loop at time `now`
    pub fn tick(&mut self, now: Instant) -> TickReport {
        let mut report = TickReport::default();

        let hardware_events = self.hardware.poll();
        report.hardware_events = hardware_events.len();
        for event in hardware_events {
            self.listeners.notify(&SurfaceEvent::Hardware(event));
        }

        let ui_events = self.ui.poll_events();
        report.ui_events = ui_events.len();
        for event in ui_events {
            self.apply_ui_event(&event);
            self.listeners.notify(&SurfaceEvent::Ui(event));
        }

        if !self.frame_due(now) {
            return report;
        }
        report.frame = true;

        let mut widget_events = Vec::new();
        for touch in self.touch.poll() {
            report.touches += 1;
            widget_events.extend(self.widgets.dispatch(touch));
        }
        widget_events.extend(self.widgets.advance_all());

        report.widget_events = widget_events.len();
        for event in widget_events {
            self.push_update(&event);
            self.listeners.notify(&SurfaceEvent::Widget(event));
        }
        report
    }

    /// Ticks until cancelled
    pub async fn run(mut self) -> ControlLoop<Stopped> {
        let poll_interval = self.config.poll_interval();
        info!(
            "Starting control loop: poll every {:?}, frame every {:?}",
            poll_interval,
            self.config.frame_interval()
        );

        let mut interval = tokio::time::interval(poll_interval);
        interval.set_missed_tick_behavior(MissedTickBehavior::Skip);

        loop {
            tokio::select! {
                biased;
                _ = self.cancel.cancelled() => {
                    info!("Control loop cancelled");
                    break;
                }
                _ = interval.tick() => {}
            }

            let report = self.tick(Instant::now());
            self.stats.record(&report);
            self.stats.report_if_due(Local::now(), &mut self.hardware);
        }

        self.transition()
    }

    fn frame_due(&mut self, now: Instant) -> bool {
        let due = self
            .last_frame
            .map_or(true, |last| now.saturating_duration_since(last) >= self.config.frame_interval());
        if due {
            self.last_frame = Some(now);
        }
        due
    }

    // The renderer's own touch handling moved a fader; follow it quietly
    fn apply_ui_event(&mut self, event: &UiEvent) {
        if event.kind != UiEventKind::FaderChange || self.widgets.fader(event.id).is_none() {
            return;
        }
        match self.widgets.set_fader_value(event.id, event.value as f32) {
            Ok(true) => debug!("Fader {} synced to {}", event.id, event.value),
            Ok(false) => debug!("Fader {} is being touched, ignoring renderer value", event.id),
            Err(e) => warn!("Failed to sync fader {}: {}", event.id, e),
        }
    }

    fn push_update(&mut self, event: &WidgetEvent) {
        let value = match *event {
            WidgetEvent::Clicked { .. } => 1,
            WidgetEvent::Released { .. } => 0,
            WidgetEvent::Toggled { on, .. } => i32::from(on),
            WidgetEvent::FaderChanged { value, .. } => value.round() as i32,
        };

        let uid = event.uid();
        let label = self.labels.get(&uid).map(String::as_str);
        // UPDATE overwrites visibility on the renderer, so it carries ours
        let visible = self.widgets.is_visible(uid);
        if let Err(e) = self.ui.update_element(uid, Some(value), label, Some(visible)) {
            warn!("Failed to update element {} on renderer: {}", uid, e);
        }
    }
}

impl ControlLoop<Stopped> {
    /// Closes every channel; a failure is logged and the rest still close
    pub fn shutdown(self) -> Result<(), SurfaceError> {
        info!("Shutting down control loop");
        let hardware = self.hardware.close();
        if let Err(e) = &hardware {
            warn!("Failed to close GPIO event ring: {}", e);
        }
        let ui = self.ui.close();
        if let Err(e) = &ui {
            warn!("Failed to close renderer rings: {}", e);
        }

        hardware.and(ui)?;
        info!("Control loop stopped");
        Ok(())
    }
}

fn connected(flag: bool) -> &'static str {
    if flag {
        "connected"
    } else {
        "offline"
    }
}
