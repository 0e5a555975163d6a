//! Touch ownership
//!
//! Decides which element a finger talks to. Elements are hit-tested in
//! registration order and the first match wins.
//!
//! ```text
//!            DOWN on E, finger unowned
//!   none ───────────────────────────────► Active(E) ──┐
//!    │ ▲                                      │       │ DRAG: stays on E,
//!    │ │ DRAG off everything                  │       │ wherever the finger is
//!    │ │                                      │ ◄─────┘
//!    ▼ │  DRAG onto E / re-entrant DOWN       │
//!  Hovered(E) ◄───────────────────────────────┘
//!
//!   UP: Active > Hovered > element under the original DOWN, then forget
//! ```

use std::collections::HashMap;
use tracing::debug;

use super::event::{ElementId, TouchEvent, TouchPhase};
use crate::widgets::geometry::Rect;

/// What a finger currently owns. Active and hovered are mutually exclusive
/// by construction.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Ownership {
    Active(ElementId),
    Hovered(ElementId),
}

impl Ownership {
    pub fn element(&self) -> ElementId {
        match self {
            Ownership::Active(uid) | Ownership::Hovered(uid) => *uid,
        }
    }
}

#[derive(Debug, Default, Clone, Copy)]
struct FingerRecord {
    ownership: Option<Ownership>,
    down_element: Option<ElementId>,
}

impl FingerRecord {
    fn is_empty(&self) -> bool {
        self.ownership.is_none() && self.down_element.is_none()
    }
}

#[derive(Debug, Clone, Copy)]
struct HitTarget {
    uid: ElementId,
    area: Rect,
    visible: bool,
}

#[derive(Debug, Default)]
pub struct TouchRouter {
    targets: Vec<HitTarget>,
    fingers: HashMap<i32, FingerRecord>,
}

impl TouchRouter {
    pub fn new() -> Self {
        Self::default()
    }

    /// Adds a hit area behind all existing ones. `false` if the id is taken.
    pub fn register(&mut self, uid: ElementId, area: Rect) -> bool {
        if self.targets.iter().any(|t| t.uid == uid) {
            return false;
        }
        self.targets.push(HitTarget {
            uid,
            area,
            visible: true,
        });
        true
    }

    /// Removes the element and every ownership record pointing at it
    pub fn unregister(&mut self, uid: ElementId) -> bool {
        let before = self.targets.len();
        self.targets.retain(|t| t.uid != uid);
        if self.targets.len() == before {
            return false;
        }

        for record in self.fingers.values_mut() {
            if record.ownership.map(|o| o.element()) == Some(uid) {
                record.ownership = None;
            }
            if record.down_element == Some(uid) {
                record.down_element = None;
            }
        }
        self.fingers.retain(|_, record| !record.is_empty());
        true
    }

    /// Hidden elements keep their ownership records but take no new touches
    pub fn set_visible(&mut self, uid: ElementId, visible: bool) -> bool {
        match self.targets.iter_mut().find(|t| t.uid == uid) {
            Some(target) => {
                target.visible = visible;
                true
            }
            None => false,
        }
    }

    pub fn ownership(&self, finger_id: i32) -> Option<Ownership> {
        self.fingers.get(&finger_id).and_then(|r| r.ownership)
    }

    pub fn tracked_fingers(&self) -> usize {
        self.fingers.len()
    }

    pub fn candidate(&self, x: i32, y: i32) -> Option<ElementId> {
        self.targets
            .iter()
            .find(|t| t.visible && t.area.contains(x, y))
            .map(|t| t.uid)
    }

    /// Resolves the owning element, records it as the event's target and
    /// returns it
    pub fn process_touch(&mut self, event: &mut TouchEvent) -> Option<ElementId> {
        let candidate = self.candidate(event.x, event.y);

        let target = match event.phase {
            TouchPhase::Down => {
                let record = self.fingers.entry(event.finger_id).or_default();
                match (record.ownership, candidate) {
                    (None, Some(uid)) => {
                        record.ownership = Some(Ownership::Active(uid));
                        record.down_element = Some(uid);
                    }
                    // re-entrant down while a gesture is still in flight
                    (Some(_), _) => record.ownership = candidate.map(Ownership::Hovered),
                    (None, None) => {}
                }
                candidate
            }
            TouchPhase::Drag => {
                let record = self.fingers.entry(event.finger_id).or_default();
                match record.ownership {
                    Some(Ownership::Active(uid)) => Some(uid),
                    _ => {
                        record.ownership = candidate.map(Ownership::Hovered);
                        candidate
                    }
                }
            }
            TouchPhase::Up => self.fingers.remove(&event.finger_id).and_then(|record| {
                record
                    .ownership
                    .map(|o| o.element())
                    .or(record.down_element)
            }),
        };

        if self
            .fingers
            .get(&event.finger_id)
            .is_some_and(FingerRecord::is_empty)
        {
            self.fingers.remove(&event.finger_id);
        }

        debug!(
            "Touch {:?} finger {} at ({}, {}) -> {:?}",
            event.phase, event.finger_id, event.x, event.y, target
        );
        event.target = target;
        target
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn touch(router: &mut TouchRouter, finger: i32, x: i32, y: i32, phase: TouchPhase) -> Option<ElementId> {
        let mut event = TouchEvent::new(finger, x, y, phase);
        let target = router.process_touch(&mut event);
        assert_eq!(event.target, target);
        target
    }

    fn layout() -> TouchRouter {
        let mut router = TouchRouter::new();
        router.register(1, Rect::new(0, 0, 100, 100));
        router.register(2, Rect::new(200, 0, 100, 100));
        router
    }

    #[test]
    fn first_registered_element_wins_overlap() {
        let mut router = TouchRouter::new();
        router.register(7, Rect::new(0, 0, 100, 100));
        router.register(8, Rect::new(50, 50, 100, 100));
        assert_eq!(router.candidate(75, 75), Some(7));
        assert_eq!(router.candidate(140, 140), Some(8));
        assert!(!router.register(7, Rect::new(0, 0, 1, 1)));
    }

    #[test]
    fn active_finger_keeps_target_outside_its_rect() {
        let mut router = layout();
        assert_eq!(touch(&mut router, 0, 50, 50, TouchPhase::Down), Some(1));
        assert_eq!(router.ownership(0), Some(Ownership::Active(1)));

        // across empty space and over another element
        assert_eq!(touch(&mut router, 0, 150, 50, TouchPhase::Drag), Some(1));
        assert_eq!(touch(&mut router, 0, 250, 50, TouchPhase::Drag), Some(1));
        assert_eq!(touch(&mut router, 0, 250, 50, TouchPhase::Up), Some(1));
        assert_eq!(router.tracked_fingers(), 0);
    }

    #[test]
    fn finger_sliding_on_becomes_hovered_and_reresolves() {
        let mut router = layout();
        assert_eq!(touch(&mut router, 3, 150, 50, TouchPhase::Down), None);
        assert_eq!(router.ownership(3), None);

        assert_eq!(touch(&mut router, 3, 210, 50, TouchPhase::Drag), Some(2));
        assert_eq!(router.ownership(3), Some(Ownership::Hovered(2)));

        assert_eq!(touch(&mut router, 3, 50, 50, TouchPhase::Drag), Some(1));
        assert_eq!(router.ownership(3), Some(Ownership::Hovered(1)));

        assert_eq!(touch(&mut router, 3, 150, 50, TouchPhase::Drag), None);
        assert_eq!(router.ownership(3), None);
        assert_eq!(touch(&mut router, 3, 150, 50, TouchPhase::Up), None);
    }

    #[test]
    fn reentrant_down_is_hovered_and_up_falls_back_to_down_element() {
        let mut router = layout();
        touch(&mut router, 0, 50, 50, TouchPhase::Down);
        assert_eq!(touch(&mut router, 0, 250, 50, TouchPhase::Down), Some(2));
        assert_eq!(router.ownership(0), Some(Ownership::Hovered(2)));

        // off everything: ownership gone, the down element remains
        assert_eq!(touch(&mut router, 0, 150, 50, TouchPhase::Drag), None);
        assert_eq!(touch(&mut router, 0, 150, 50, TouchPhase::Up), Some(1));
    }

    #[test]
    fn two_fingers_interleaved() {
        let mut router = layout();
        let script = [
            (0, 50, 50, TouchPhase::Down, Some(1), Some(Ownership::Active(1))),
            (1, 250, 50, TouchPhase::Down, Some(2), Some(Ownership::Active(2))),
            (0, 250, 50, TouchPhase::Down, Some(2), Some(Ownership::Hovered(2))),
            (1, 150, 50, TouchPhase::Drag, Some(2), Some(Ownership::Active(2))),
            (1, 60, 60, TouchPhase::Drag, Some(2), Some(Ownership::Active(2))),
            (0, 10, 10, TouchPhase::Drag, Some(1), Some(Ownership::Hovered(1))),
            (1, 60, 60, TouchPhase::Up, Some(2), None),
            (0, 10, 10, TouchPhase::Up, Some(1), None),
        ];
        for (finger, x, y, phase, target, owned) in script {
            assert_eq!(touch(&mut router, finger, x, y, phase), target);
            assert_eq!(router.ownership(finger), owned);
        }
        assert_eq!(router.tracked_fingers(), 0);
    }

    #[test]
    fn hidden_elements_take_no_new_touches() {
        let mut router = layout();
        router.set_visible(1, false);
        assert_eq!(touch(&mut router, 0, 50, 50, TouchPhase::Down), None);
        router.set_visible(1, true);
        assert_eq!(touch(&mut router, 1, 50, 50, TouchPhase::Down), Some(1));
    }

    #[test]
    fn unregister_drops_records_for_element() {
        let mut router = layout();
        touch(&mut router, 0, 50, 50, TouchPhase::Down);
        assert!(router.unregister(1));
        assert_eq!(router.ownership(0), None);
        assert_eq!(router.tracked_fingers(), 0);
        assert_eq!(touch(&mut router, 0, 50, 50, TouchPhase::Up), None);
        assert!(!router.unregister(1));
    }
}
