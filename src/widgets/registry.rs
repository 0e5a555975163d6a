use std::collections::BTreeSet;
use tracing::{debug, info};

use super::button::{ButtonWidget, ToggleWidget};
use super::element::{ElementSpec, LabelElement, WidgetError};
use super::event::WidgetEvent;
use super::fader::FaderWidget;
use super::geometry::{PanelSize, Rect};
use crate::touch::event::{ElementId, TouchEvent};
use crate::touch::router::TouchRouter;

#[derive(Debug, Clone)]
pub enum Widget {
    Button(ButtonWidget),
    Toggle(ToggleWidget),
    Fader(FaderWidget),
    Label(LabelElement),
}

impl Widget {
    pub fn uid(&self) -> ElementId {
        match self {
            Widget::Button(w) => w.uid(),
            Widget::Toggle(w) => w.uid(),
            Widget::Fader(w) => w.uid(),
            Widget::Label(l) => l.id,
        }
    }

    // Faders pick up new touches in their overflow zone; labels take none
    fn hit_area(&self) -> Option<Rect> {
        match self {
            Widget::Button(w) => Some(w.rect()),
            Widget::Toggle(w) => Some(w.rect()),
            Widget::Fader(w) => Some(w.overflow_zone()),
            Widget::Label(_) => None,
        }
    }

    fn handle_touch(&mut self, event: &TouchEvent) -> Option<WidgetEvent> {
        match self {
            Widget::Button(w) => w.handle_touch(event),
            Widget::Toggle(w) => w.handle_touch(event),
            Widget::Fader(w) => w.handle_touch(event),
            Widget::Label(_) => None,
        }
    }
}

/// All live widgets plus the router that hands touches to them
///
/// Owned by the control loop; hit-test order is registration order.
#[derive(Debug)]
pub struct WidgetRegistry {
    panel: PanelSize,
    router: TouchRouter,
    widgets: Vec<Widget>,
    hidden: BTreeSet<ElementId>,
}

impl WidgetRegistry {
    pub fn new(panel: PanelSize) -> Self {
        Self {
            panel,
            router: TouchRouter::new(),
            widgets: Vec::new(),
            hidden: BTreeSet::new(),
        }
    }

    pub fn len(&self) -> usize {
        self.widgets.len()
    }

    pub fn is_empty(&self) -> bool {
        self.widgets.is_empty()
    }

    pub fn iter(&self) -> impl Iterator<Item = &Widget> {
        self.widgets.iter()
    }

    pub fn get(&self, uid: ElementId) -> Option<&Widget> {
        self.widgets.iter().find(|w| w.uid() == uid)
    }

    pub fn fader(&self, uid: ElementId) -> Option<&FaderWidget> {
        match self.get(uid)? {
            Widget::Fader(fader) => Some(fader),
            _ => None,
        }
    }

    pub fn register(&mut self, element: &ElementSpec) -> Result<(), WidgetError> {
        element.validate()?;
        let uid = element.id();
        if self.get(uid).is_some() {
            return Err(WidgetError::DuplicateId(uid));
        }

        let widget = match element {
            ElementSpec::Button(e) => Widget::Button(ButtonWidget::from_element(e)),
            ElementSpec::Toggle(e) => Widget::Toggle(ToggleWidget::from_element(e)),
            ElementSpec::Fader(e) => Widget::Fader(FaderWidget::from_element(e, self.panel)),
            ElementSpec::Label(e) => Widget::Label(e.clone()),
        };
        if let Some(area) = widget.hit_area() {
            self.router.register(uid, area);
        }

        info!("Registered element {}: {:?}", uid, widget.hit_area());
        self.widgets.push(widget);
        Ok(())
    }

    pub fn unregister(&mut self, uid: ElementId) -> Result<Widget, WidgetError> {
        let index = self
            .widgets
            .iter()
            .position(|w| w.uid() == uid)
            .ok_or(WidgetError::Unknown(uid))?;
        self.router.unregister(uid);
        self.hidden.remove(&uid);
        Ok(self.widgets.remove(index))
    }

    pub fn set_visible(&mut self, uid: ElementId, visible: bool) -> Result<(), WidgetError> {
        if self.get(uid).is_none() {
            return Err(WidgetError::Unknown(uid));
        }
        self.router.set_visible(uid, visible);
        if visible {
            self.hidden.remove(&uid);
        } else {
            self.hidden.insert(uid);
        }
        Ok(())
    }

    /// False for hidden and for unknown elements
    pub fn is_visible(&self, uid: ElementId) -> bool {
        self.get(uid).is_some() && !self.hidden.contains(&uid)
    }

    /// Routes one touch sample and lets the owning widget react
    pub fn dispatch(&mut self, mut event: TouchEvent) -> Option<WidgetEvent> {
        let uid = self.router.process_touch(&mut event)?;
        let widget = self.widgets.iter_mut().find(|w| w.uid() == uid)?;
        let result = widget.handle_touch(&event);
        if let Some(change) = &result {
            debug!("Widget {} reported {:?}", uid, change);
        }
        result
    }

    /// One frame for every fader; smooth ones keep gliding without a finger
    pub fn advance_all(&mut self) -> Vec<WidgetEvent> {
        self.widgets
            .iter_mut()
            .filter_map(|w| match w {
                Widget::Fader(fader) => fader.advance(),
                _ => None,
            })
            .collect()
    }

    /// Takes a value reported from outside without producing an event.
    /// `Ok(false)` for a fader that is being touched, where the finger wins.
    pub fn set_fader_value(&mut self, uid: ElementId, value: f32) -> Result<bool, WidgetError> {
        match self.widgets.iter_mut().find(|w| w.uid() == uid) {
            Some(Widget::Fader(fader)) => {
                if fader.is_touched() {
                    return Ok(false);
                }
                fader.set_value(value);
                Ok(true)
            }
            Some(_) => Err(WidgetError::Invalid {
                id: uid,
                reason: "not a fader".to_string(),
            }),
            None => Err(WidgetError::Unknown(uid)),
        }
    }

    pub fn set_toggle(&mut self, uid: ElementId, on: bool) -> Result<(), WidgetError> {
        match self.widgets.iter_mut().find(|w| w.uid() == uid) {
            Some(Widget::Toggle(toggle)) => {
                toggle.set_on(on);
                Ok(())
            }
            Some(_) => Err(WidgetError::Invalid {
                id: uid,
                reason: "not a toggle".to_string(),
            }),
            None => Err(WidgetError::Unknown(uid)),
        }
    }
}
