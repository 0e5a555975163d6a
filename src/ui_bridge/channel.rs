use std::path::Path;
use tracing::{debug, info, warn};

use super::command::{CommandOp, ElementKind, FaderSpec, UiCommand, COMMAND_SIZE};
use super::event::{UiEvent, EVENT_SIZE};
use crate::shm::ring_buffer::SLOT_COUNT;
use crate::shm::{ChannelError, RingBufferChannel};
use crate::widgets::element::ElementSpec;
use crate::widgets::geometry::Rect;

/// Both directions to the renderer process
///
/// Commands go out on one ring where this side is the producer, events come
/// back on a second ring where this side is the consumer. Either ring may be
/// missing; the matching half then does nothing.
#[derive(Debug)]
pub struct UiBridge {
    commands: Option<RingBufferChannel>,
    events: Option<RingBufferChannel>,
}

impl UiBridge {
    pub fn open(commands_path: &Path, events_path: &Path) -> Self {
        let commands = match RingBufferChannel::open(commands_path, COMMAND_SIZE, SLOT_COUNT) {
            Ok(channel) => Some(channel),
            Err(e) => {
                warn!("UI command ring unavailable, renderer updates disabled: {}", e);
                None
            }
        };
        let events = match RingBufferChannel::open(events_path, EVENT_SIZE, SLOT_COUNT) {
            Ok(channel) => Some(channel),
            Err(e) => {
                warn!("UI event ring unavailable, renderer events disabled: {}", e);
                None
            }
        };

        if commands.is_some() && events.is_some() {
            info!("Connected to renderer");
        }
        Self::with_channels(commands, events)
    }

    pub fn with_channels(
        commands: Option<RingBufferChannel>,
        events: Option<RingBufferChannel>,
    ) -> Self {
        Self { commands, events }
    }

    pub fn commands_connected(&self) -> bool {
        self.commands.is_some()
    }

    pub fn events_connected(&self) -> bool {
        self.events.is_some()
    }

    pub fn send(&mut self, command: &UiCommand) -> Result<(), ChannelError> {
        let Some(channel) = self.commands.as_mut() else {
            debug!("Renderer offline, dropping {:?} for {}", command.op, command.id);
            return Ok(());
        };
        channel.write(&command.encode())?;
        debug!("Sent {:?} for element {}", command.op, command.id);
        Ok(())
    }

    pub fn create_button(
        &mut self,
        id: i32,
        rect: Rect,
        label: &str,
        color: i32,
    ) -> Result<(), ChannelError> {
        self.send(&create_command(id, ElementKind::Button, rect, 0, label, color))
    }

    pub fn create_toggle(
        &mut self,
        id: i32,
        rect: Rect,
        label: &str,
        on: bool,
        color: i32,
    ) -> Result<(), ChannelError> {
        self.send(&create_command(
            id,
            ElementKind::Toggle,
            rect,
            i32::from(on),
            label,
            color,
        ))
    }

    pub fn create_fader(
        &mut self,
        id: i32,
        rect: Rect,
        spec: &FaderSpec,
        value: i32,
        color: i32,
    ) -> Result<(), ChannelError> {
        self.send(&create_command(
            id,
            ElementKind::Fader,
            rect,
            value,
            &spec.encode(),
            color,
        ))
    }

    pub fn create_label(
        &mut self,
        id: i32,
        x: i32,
        y: i32,
        text: &str,
        color: i32,
    ) -> Result<(), ChannelError> {
        // The renderer sizes labels itself, this is only a hint
        let rect = Rect::new(x, y, text.chars().count() as i32 * 8, 16);
        self.send(&create_command(id, ElementKind::Label, rect, 0, text, color))
    }

    /// CREATE for a configured element description
    pub fn create_element(&mut self, element: &ElementSpec) -> Result<(), ChannelError> {
        match element {
            ElementSpec::Button(button) => {
                self.create_button(button.id, button.rect(), &button.label, button.color)
            }
            ElementSpec::Toggle(toggle) => self.create_toggle(
                toggle.id,
                toggle.rect(),
                &toggle.label,
                toggle.on,
                toggle.color,
            ),
            ElementSpec::Fader(fader) => self.create_fader(
                fader.id,
                fader.rect(),
                &FaderSpec {
                    label: fader.label.clone(),
                    mode: fader.mode,
                    smooth_speed: fader.smooth_speed,
                },
                fader.value.round() as i32,
                fader.color,
            ),
            ElementSpec::Label(label) => {
                self.create_label(label.id, label.x, label.y, &label.text, label.color)
            }
        }
    }

    pub fn update_element(
        &mut self,
        id: i32,
        value: Option<i32>,
        text: Option<&str>,
        visible: Option<bool>,
    ) -> Result<(), ChannelError> {
        let mut command = UiCommand::new(CommandOp::Update, id);
        if let Some(value) = value {
            command.value = value;
        }
        if let Some(text) = text {
            command.text = text.to_string();
        }
        if let Some(visible) = visible {
            command.visible = visible;
        }
        self.send(&command)
    }

    pub fn delete_element(&mut self, id: i32) -> Result<(), ChannelError> {
        self.send(&UiCommand::new(CommandOp::Delete, id))
    }

    pub fn show_element(&mut self, id: i32) -> Result<(), ChannelError> {
        self.send(&UiCommand::new(CommandOp::Show, id))
    }

    pub fn hide_element(&mut self, id: i32) -> Result<(), ChannelError> {
        self.send(&UiCommand::new(CommandOp::Hide, id))
    }

    /// Renderer events in the order they were written; records with an
    /// unknown kind are dropped
    pub fn poll_events(&mut self) -> Vec<UiEvent> {
        let Some(channel) = self.events.as_mut() else {
            return Vec::new();
        };

        channel
            .drain()
            .iter()
            .filter_map(|raw| match UiEvent::decode(raw) {
                Ok(event) => Some(event),
                Err(e) => {
                    debug!("Dropping malformed UI event: {}", e);
                    None
                }
            })
            .collect()
    }

    /// Closes both rings; a failure on one does not keep the other open
    pub fn close(self) -> Result<(), ChannelError> {
        let commands = self.commands.map_or(Ok(()), RingBufferChannel::close);
        let events = self.events.map_or(Ok(()), RingBufferChannel::close);
        if let Err(e) = &commands {
            warn!("Failed to close UI command ring: {}", e);
        }
        commands.and(events)
    }
}

fn create_command(
    id: i32,
    kind: ElementKind,
    rect: Rect,
    value: i32,
    text: &str,
    color: i32,
) -> UiCommand {
    let mut command = UiCommand::new(CommandOp::Create, id);
    command.kind = kind;
    command.x = rect.x;
    command.y = rect.y;
    command.width = rect.width;
    command.height = rect.height;
    command.value = value;
    command.visible = true;
    command.text = text.to_string();
    command.color = color;
    command
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::ui_bridge::event::UiEventKind;
    use crate::widgets::element::{FaderElement, LabelElement};
    use crate::widgets::fader::FaderMode;
    use tempfile::TempDir;

    struct Renderer {
        _dir: TempDir,
        commands: RingBufferChannel,
        events: RingBufferChannel,
        bridge: UiBridge,
    }

    fn connect() -> Renderer {
        let dir = tempfile::tempdir().unwrap();
        let commands_path = dir.path().join("tauwerk_ui_commands");
        let events_path = dir.path().join("tauwerk_ui_events");
        let commands = RingBufferChannel::create(&commands_path, COMMAND_SIZE, SLOT_COUNT).unwrap();
        let events = RingBufferChannel::create(&events_path, EVENT_SIZE, SLOT_COUNT).unwrap();
        let bridge = UiBridge::open(&commands_path, &events_path);
        Renderer {
            _dir: dir,
            commands,
            events,
            bridge,
        }
    }

    fn received(renderer: &mut Renderer) -> Vec<UiCommand> {
        renderer
            .commands
            .drain()
            .iter()
            .map(|raw| UiCommand::decode(raw).unwrap())
            .collect()
    }

    #[test]
    fn fader_create_carries_mode_in_text() {
        let mut renderer = connect();
        let fader = FaderElement {
            id: 4,
            label: "BPM".to_string(),
            mode: FaderMode::Incremental,
            smooth_speed: 0.25,
            value: 120.0,
            max: 200.0,
            ..FaderElement::default()
        };
        renderer
            .bridge
            .create_element(&ElementSpec::Fader(fader))
            .unwrap();

        let commands = received(&mut renderer);
        assert_eq!(commands.len(), 1);
        assert_eq!(commands[0].op, CommandOp::Create);
        assert_eq!(commands[0].kind, ElementKind::Fader);
        assert_eq!(commands[0].value, 120);
        assert!(commands[0].visible);
        let spec = FaderSpec::parse(&commands[0].text).unwrap();
        assert_eq!(spec.mode, FaderMode::Incremental);
        assert_eq!(spec.smooth_speed, 0.25);
    }

    #[test]
    fn commands_arrive_in_order() {
        let mut renderer = connect();
        renderer
            .bridge
            .create_element(&ElementSpec::Label(LabelElement {
                id: 5,
                x: 320,
                y: 10,
                text: "TAUWERK".to_string(),
                color: 0xFFFFFF,
            }))
            .unwrap();
        renderer.bridge.update_element(5, Some(3), None, Some(true)).unwrap();
        renderer.bridge.hide_element(5).unwrap();
        renderer.bridge.show_element(5).unwrap();
        renderer.bridge.delete_element(5).unwrap();

        let ops: Vec<CommandOp> = received(&mut renderer).iter().map(|c| c.op).collect();
        assert_eq!(
            ops,
            vec![
                CommandOp::Create,
                CommandOp::Update,
                CommandOp::Hide,
                CommandOp::Show,
                CommandOp::Delete
            ]
        );
    }

    #[test]
    fn label_width_is_estimated_from_text() {
        let mut renderer = connect();
        renderer.bridge.create_label(5, 320, 10, "TAUWERK", 0xFFFFFF).unwrap();
        let commands = received(&mut renderer);
        assert_eq!(commands[0].width, 7 * 8);
        assert_eq!(commands[0].height, 16);
        assert_eq!(commands[0].color, 0xFFFFFF);
    }

    #[test]
    fn events_are_decoded_and_malformed_ones_dropped() {
        let mut renderer = connect();
        let down = UiEvent {
            kind: UiEventKind::ButtonDown,
            id: 1,
            value: 0,
            timestamp: 5,
        };
        let up = UiEvent {
            kind: UiEventKind::ButtonUp,
            ..down
        };
        let mut garbage = down.encode();
        garbage[0] = 9;

        renderer.events.write(&down.encode()).unwrap();
        renderer.events.write(&garbage).unwrap();
        renderer.events.write(&up.encode()).unwrap();

        assert_eq!(renderer.bridge.poll_events(), vec![down, up]);
        assert!(renderer.bridge.poll_events().is_empty());
    }

    #[test]
    fn offline_renderer_is_a_no_op() {
        let dir = tempfile::tempdir().unwrap();
        let mut bridge = UiBridge::open(&dir.path().join("a"), &dir.path().join("b"));
        assert!(!bridge.commands_connected());
        assert!(!bridge.events_connected());
        bridge.hide_element(1).unwrap();
        assert!(bridge.poll_events().is_empty());
        bridge.close().unwrap();
    }
}
