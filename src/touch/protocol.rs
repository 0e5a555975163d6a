//! evdev touch protocol decoding
//!
//! Turns the kernel's raw `input_event` stream into per-finger DOWN/DRAG/UP
//! samples, still in raw panel coordinates.
//!
//! - Multi-touch (type B): `ABS_MT_SLOT` selects the slot that the following
//!   `ABS_MT_*` values belong to. `ABS_MT_TRACKING_ID` starts a contact,
//!   `-1` lifts it.
//! - Single-touch: one implicit slot 0, `BTN_TOUCH` starts and lifts.
//!
//! DOWN goes out at the first `SYN_REPORT` where the slot knows both
//! coordinates. Later reports with a changed coordinate become DRAG. UP goes
//! out as soon as the lift arrives, at the last known position.

use std::collections::BTreeMap;
use tracing::trace;

use super::device::{
    RawInputEvent, TouchProtocol, ABS_MT_POSITION_X, ABS_MT_POSITION_Y, ABS_MT_SLOT,
    ABS_MT_TRACKING_ID, ABS_X, ABS_Y, BTN_TOUCH, EV_ABS, EV_KEY, EV_SYN, SYN_REPORT,
};
use super::event::TouchPhase;

/// Tracking state of one physical contact
#[derive(Debug, Default, Clone, PartialEq, Eq)]
pub struct TouchSlot {
    pub tracking_id: Option<i32>,
    pub last_x: Option<i32>,
    pub last_y: Option<i32>,
    pub pressed: bool,
    /// DOWN has been reported for this contact
    pub position_received: bool,
    moved: bool,
}

impl TouchSlot {
    fn position(&self) -> Option<(i32, i32)> {
        Some((self.last_x?, self.last_y?))
    }
}

/// A touch sample before calibration
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RawTouch {
    pub finger_id: i32,
    pub raw_x: i32,
    pub raw_y: i32,
    pub phase: TouchPhase,
}

#[derive(Debug)]
pub struct TouchDecoder {
    protocol: TouchProtocol,
    current_slot: i32,
    slots: BTreeMap<i32, TouchSlot>,
}

impl TouchDecoder {
    pub fn new(protocol: TouchProtocol) -> Self {
        Self {
            protocol,
            current_slot: 0,
            slots: BTreeMap::new(),
        }
    }

    pub fn protocol(&self) -> TouchProtocol {
        self.protocol
    }

    pub fn slot(&self, slot: i32) -> Option<&TouchSlot> {
        self.slots.get(&slot)
    }

    pub fn active_slots(&self) -> usize {
        self.slots.values().filter(|s| s.pressed).count()
    }

    pub fn feed(&mut self, event: RawInputEvent) -> Vec<RawTouch> {
        trace!("input {:?}", event);
        if event.kind == EV_SYN {
            return if event.code == SYN_REPORT {
                self.report()
            } else {
                Vec::new()
            };
        }

        match self.protocol {
            TouchProtocol::MultiTouch => self.feed_multitouch(event),
            TouchProtocol::SingleTouch => self.feed_singletouch(event),
        }
    }

    fn feed_multitouch(&mut self, event: RawInputEvent) -> Vec<RawTouch> {
        if event.kind != EV_ABS {
            return Vec::new();
        }

        match event.code {
            ABS_MT_SLOT => {
                self.current_slot = event.value;
                Vec::new()
            }
            ABS_MT_TRACKING_ID if event.value < 0 => self.lift(self.current_slot).into_iter().collect(),
            ABS_MT_TRACKING_ID => {
                let slot = self.current_slot;
                // A slot reused without a lift in between ends the old contact
                let replaced = match self.slots.get(&slot).and_then(|s| s.tracking_id) {
                    Some(id) if id != event.value => self.lift(slot),
                    _ => None,
                };
                let state = self.slots.entry(slot).or_default();
                state.tracking_id = Some(event.value);
                state.pressed = true;
                replaced.into_iter().collect()
            }
            ABS_MT_POSITION_X => {
                self.set_coordinate(self.current_slot, Some(event.value), None);
                Vec::new()
            }
            ABS_MT_POSITION_Y => {
                self.set_coordinate(self.current_slot, None, Some(event.value));
                Vec::new()
            }
            _ => Vec::new(),
        }
    }

    fn feed_singletouch(&mut self, event: RawInputEvent) -> Vec<RawTouch> {
        match (event.kind, event.code) {
            (EV_ABS, ABS_X) => self.set_coordinate(0, Some(event.value), None),
            (EV_ABS, ABS_Y) => self.set_coordinate(0, None, Some(event.value)),
            (EV_KEY, BTN_TOUCH) if event.value != 0 => {
                let state = self.slots.entry(0).or_default();
                state.tracking_id = Some(0);
                state.pressed = true;
            }
            (EV_KEY, BTN_TOUCH) => return self.lift(0).into_iter().collect(),
            _ => {}
        }
        Vec::new()
    }

    fn set_coordinate(&mut self, slot: i32, x: Option<i32>, y: Option<i32>) {
        let state = self.slots.entry(slot).or_default();
        if let Some(x) = x {
            state.last_x = Some(x);
        }
        if let Some(y) = y {
            state.last_y = Some(y);
        }
        state.moved = true;
    }

    /// Ends the contact in `slot`; UP only for a contact that was reported
    /// as down. The coordinates stay: the kernel does not repeat unchanged
    /// ABS values, so the next contact at the same spot only sends its
    /// press and a report.
    fn lift(&mut self, slot: i32) -> Option<RawTouch> {
        let state = self.slots.get_mut(&slot)?;
        let tracking_id = state.tracking_id.take();
        let was_down = std::mem::take(&mut state.position_received);
        state.pressed = false;
        state.moved = false;
        if !was_down {
            return None;
        }
        let (raw_x, raw_y) = state.position()?;
        Some(RawTouch {
            finger_id: tracking_id.unwrap_or(slot),
            raw_x,
            raw_y,
            phase: TouchPhase::Up,
        })
    }

    fn report(&mut self) -> Vec<RawTouch> {
        let mut touches = Vec::new();
        for (slot, state) in self.slots.iter_mut() {
            let moved = std::mem::take(&mut state.moved);
            if !state.pressed {
                continue;
            }
            let Some((raw_x, raw_y)) = state.position() else {
                continue;
            };

            let phase = if !state.position_received {
                state.position_received = true;
                TouchPhase::Down
            } else if moved {
                TouchPhase::Drag
            } else {
                continue;
            };
            touches.push(RawTouch {
                finger_id: state.tracking_id.unwrap_or(*slot),
                raw_x,
                raw_y,
                phase,
            });
        }
        touches
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn abs(code: u16, value: i32) -> RawInputEvent {
        RawInputEvent {
            kind: EV_ABS,
            code,
            value,
        }
    }

    fn key(code: u16, value: i32) -> RawInputEvent {
        RawInputEvent {
            kind: EV_KEY,
            code,
            value,
        }
    }

    fn syn() -> RawInputEvent {
        RawInputEvent {
            kind: EV_SYN,
            code: SYN_REPORT,
            value: 0,
        }
    }

    fn feed_all(decoder: &mut TouchDecoder, events: &[RawInputEvent]) -> Vec<RawTouch> {
        events.iter().flat_map(|e| decoder.feed(*e)).collect()
    }

    fn touch(finger_id: i32, raw_x: i32, raw_y: i32, phase: TouchPhase) -> RawTouch {
        RawTouch {
            finger_id,
            raw_x,
            raw_y,
            phase,
        }
    }

    #[test]
    fn multitouch_down_drag_up() {
        let mut decoder = TouchDecoder::new(TouchProtocol::MultiTouch);
        let touches = feed_all(
            &mut decoder,
            &[
                abs(ABS_MT_SLOT, 0),
                abs(ABS_MT_TRACKING_ID, 7),
                abs(ABS_MT_POSITION_X, 100),
                abs(ABS_MT_POSITION_Y, 200),
                syn(),
                abs(ABS_MT_POSITION_X, 110),
                syn(),
                syn(),
                abs(ABS_MT_TRACKING_ID, -1),
                syn(),
            ],
        );
        assert_eq!(
            touches,
            vec![
                touch(7, 100, 200, TouchPhase::Down),
                touch(7, 110, 200, TouchPhase::Drag),
                touch(7, 110, 200, TouchPhase::Up),
            ]
        );
        let lifted = decoder.slot(0).unwrap();
        assert_eq!(lifted.tracking_id, None);
        assert!(!lifted.pressed);
        assert_eq!((lifted.last_x, lifted.last_y), (Some(110), Some(200)));
    }

    #[test]
    fn second_tap_on_the_same_spot_is_reported() {
        let mut single = TouchDecoder::new(TouchProtocol::SingleTouch);
        let touches = feed_all(
            &mut single,
            &[
                key(BTN_TOUCH, 1),
                abs(ABS_X, 100),
                abs(ABS_Y, 200),
                syn(),
                key(BTN_TOUCH, 0),
                syn(),
                // unchanged coordinates are not sent again
                key(BTN_TOUCH, 1),
                syn(),
                key(BTN_TOUCH, 0),
                syn(),
            ],
        );
        assert_eq!(
            touches,
            vec![
                touch(0, 100, 200, TouchPhase::Down),
                touch(0, 100, 200, TouchPhase::Up),
                touch(0, 100, 200, TouchPhase::Down),
                touch(0, 100, 200, TouchPhase::Up),
            ]
        );

        let mut multi = TouchDecoder::new(TouchProtocol::MultiTouch);
        let touches = feed_all(
            &mut multi,
            &[
                abs(ABS_MT_TRACKING_ID, 30),
                abs(ABS_MT_POSITION_X, 40),
                abs(ABS_MT_POSITION_Y, 50),
                syn(),
                abs(ABS_MT_TRACKING_ID, -1),
                syn(),
                abs(ABS_MT_TRACKING_ID, 31),
                syn(),
            ],
        );
        assert_eq!(
            touches,
            vec![
                touch(30, 40, 50, TouchPhase::Down),
                touch(30, 40, 50, TouchPhase::Up),
                touch(31, 40, 50, TouchPhase::Down),
            ]
        );
    }

    #[test]
    fn down_waits_for_both_coordinates() {
        let mut decoder = TouchDecoder::new(TouchProtocol::MultiTouch);
        let early = feed_all(
            &mut decoder,
            &[abs(ABS_MT_TRACKING_ID, 3), abs(ABS_MT_POSITION_X, 10), syn()],
        );
        assert!(early.is_empty());
        assert!(!decoder.slot(0).unwrap().position_received);

        let late = feed_all(&mut decoder, &[abs(ABS_MT_POSITION_Y, 20), syn()]);
        assert_eq!(late, vec![touch(3, 10, 20, TouchPhase::Down)]);
    }

    #[test]
    fn lift_before_any_position_reports_nothing() {
        let mut decoder = TouchDecoder::new(TouchProtocol::MultiTouch);
        let touches = feed_all(
            &mut decoder,
            &[abs(ABS_MT_TRACKING_ID, 3), abs(ABS_MT_POSITION_X, 10), abs(ABS_MT_TRACKING_ID, -1), syn()],
        );
        assert!(touches.is_empty());
        assert_eq!(decoder.active_slots(), 0);
    }

    #[test]
    fn slots_track_fingers_independently() {
        let mut decoder = TouchDecoder::new(TouchProtocol::MultiTouch);
        let touches = feed_all(
            &mut decoder,
            &[
                abs(ABS_MT_SLOT, 0),
                abs(ABS_MT_TRACKING_ID, 20),
                abs(ABS_MT_POSITION_X, 100),
                abs(ABS_MT_POSITION_Y, 100),
                abs(ABS_MT_SLOT, 1),
                abs(ABS_MT_TRACKING_ID, 21),
                abs(ABS_MT_POSITION_X, 500),
                abs(ABS_MT_POSITION_Y, 300),
                syn(),
                abs(ABS_MT_POSITION_Y, 310),
                abs(ABS_MT_SLOT, 0),
                abs(ABS_MT_TRACKING_ID, -1),
                syn(),
                abs(ABS_MT_SLOT, 1),
                abs(ABS_MT_TRACKING_ID, -1),
            ],
        );
        assert_eq!(
            touches,
            vec![
                touch(20, 100, 100, TouchPhase::Down),
                touch(21, 500, 300, TouchPhase::Down),
                touch(20, 100, 100, TouchPhase::Up),
                touch(21, 500, 310, TouchPhase::Drag),
                touch(21, 500, 310, TouchPhase::Up),
            ]
        );
    }

    #[test]
    fn reused_slot_ends_previous_contact() {
        let mut decoder = TouchDecoder::new(TouchProtocol::MultiTouch);
        let touches = feed_all(
            &mut decoder,
            &[
                abs(ABS_MT_TRACKING_ID, 1),
                abs(ABS_MT_POSITION_X, 5),
                abs(ABS_MT_POSITION_Y, 6),
                syn(),
                abs(ABS_MT_TRACKING_ID, 2),
                abs(ABS_MT_POSITION_X, 50),
                abs(ABS_MT_POSITION_Y, 60),
                syn(),
            ],
        );
        assert_eq!(
            touches,
            vec![
                touch(1, 5, 6, TouchPhase::Down),
                touch(1, 5, 6, TouchPhase::Up),
                touch(2, 50, 60, TouchPhase::Down),
            ]
        );
    }

    #[test]
    fn singletouch_uses_btn_touch() {
        let mut decoder = TouchDecoder::new(TouchProtocol::SingleTouch);
        let touches = feed_all(
            &mut decoder,
            &[
                key(BTN_TOUCH, 1),
                abs(ABS_X, 300),
                abs(ABS_Y, 200),
                syn(),
                abs(ABS_X, 320),
                syn(),
                key(BTN_TOUCH, 0),
                syn(),
            ],
        );
        assert_eq!(
            touches,
            vec![
                touch(0, 300, 200, TouchPhase::Down),
                touch(0, 320, 200, TouchPhase::Drag),
                touch(0, 320, 200, TouchPhase::Up),
            ]
        );
    }

    #[test]
    fn each_protocol_ignores_the_others_codes() {
        let mut multi = TouchDecoder::new(TouchProtocol::MultiTouch);
        let emulated = [key(BTN_TOUCH, 1), abs(ABS_X, 300), abs(ABS_Y, 200), syn()];
        assert!(feed_all(&mut multi, &emulated).is_empty());

        let mut single = TouchDecoder::new(TouchProtocol::SingleTouch);
        let mt = [
            abs(ABS_MT_TRACKING_ID, 4),
            abs(ABS_MT_POSITION_X, 1),
            abs(ABS_MT_POSITION_Y, 1),
            syn(),
        ];
        assert!(feed_all(&mut single, &mt).is_empty());
    }
}
