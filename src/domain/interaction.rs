// Interaction controller - pointer state machine for drag, resize and selection
use super::layout;
use super::widget::{Position, Size, Widget};
use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ControlAction {
    Delete,
    Minimize,
    Expand,
}

/// Part of a widget under the pointer
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "kind", content = "action", rename_all = "kebab-case")]
pub enum WidgetRegion {
    Chrome,
    ResizeHandle,
    TextRegion,
    Control(ControlAction),
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "on", rename_all = "kebab-case")]
pub enum HitTarget {
    Canvas,
    Widget {
        #[serde(rename = "widgetId")]
        widget_id: String,
        region: WidgetRegion,
    },
    Editor {
        #[serde(rename = "widgetId")]
        widget_id: String,
    },
}

/// Pointer coordinates are relative to the canvas origin
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "event", rename_all = "kebab-case")]
pub enum PointerEvent {
    Down { target: HitTarget, x: f64, y: f64 },
    Move { x: f64, y: f64 },
    Up { x: f64, y: f64 },
    Cancel,
}

#[derive(Debug, Clone, PartialEq, Default)]
pub enum InteractionState {
    #[default]
    Idle,
    Dragging {
        widget_id: String,
        offset: Position,
        moved: bool,
    },
    Resizing {
        widget_id: String,
        start_pointer: Position,
        start_size: Size,
    },
}

/// Model changes requested by a transition, applied by the owner of the dashboard
#[derive(Debug, Clone, PartialEq)]
pub enum Intent {
    MoveWidget { widget_id: String, position: Position },
    ResizeWidget { widget_id: String, size: Size },
    /// Gesture finished; persist the geometry
    CommitGeometry { widget_id: String },
    ToggleSelection { widget_id: String },
    Control { widget_id: String, action: ControlAction },
    /// Pointer landed outside the selected widget and its editor
    DismissEditor,
    /// Chart canvases need an explicit relayout once resizing settles
    ChartRelayout { widget_id: String },
}

#[derive(Debug, Clone, PartialEq)]
pub struct Transition {
    pub state: InteractionState,
    pub intents: Vec<Intent>,
}

impl Transition {
    fn stay(state: InteractionState) -> Self {
        Self {
            state,
            intents: Vec::new(),
        }
    }

    fn to(state: InteractionState, intents: Vec<Intent>) -> Self {
        Self { state, intents }
    }
}

impl InteractionState {
    #[cfg(test)]
    pub fn is_idle(&self) -> bool {
        matches!(self, InteractionState::Idle)
    }

    /// The widget an active gesture is operating on
    pub fn active_widget(&self) -> Option<&str> {
        match self {
            InteractionState::Idle => None,
            InteractionState::Dragging { widget_id, .. }
            | InteractionState::Resizing { widget_id, .. } => Some(widget_id),
        }
    }

    pub fn label(&self) -> &'static str {
        match self {
            InteractionState::Idle => "idle",
            InteractionState::Dragging { .. } => "dragging",
            InteractionState::Resizing { .. } => "resizing",
        }
    }

    pub fn on_event(self, event: PointerEvent, widgets: &[Widget]) -> Transition {
        match (self, event) {
            (InteractionState::Idle, PointerEvent::Down { target, x, y }) => {
                Self::pointer_down(target, Position::new(x, y), widgets)
            }
            (state, PointerEvent::Down { .. }) => {
                tracing::debug!(
                    "Ignoring pointer-down while {} is in progress",
                    state.label()
                );
                Transition::stay(state)
            }
            (
                InteractionState::Dragging {
                    widget_id, offset, ..
                },
                PointerEvent::Move { x, y },
            ) => {
                let position = layout::drag_position(Position::new(x, y), offset);
                let intents = vec![Intent::MoveWidget {
                    widget_id: widget_id.clone(),
                    position,
                }];
                Transition::to(
                    InteractionState::Dragging {
                        widget_id,
                        offset,
                        moved: true,
                    },
                    intents,
                )
            }
            (
                InteractionState::Resizing {
                    widget_id,
                    start_pointer,
                    start_size,
                },
                PointerEvent::Move { x, y },
            ) => {
                let Some(widget) = widgets.iter().find(|w| w.id == widget_id) else {
                    return Transition::stay(InteractionState::Idle);
                };
                let size = layout::resized(
                    widget.widget_type,
                    start_size,
                    x - start_pointer.x,
                    y - start_pointer.y,
                );
                let mut intents = vec![Intent::ResizeWidget {
                    widget_id: widget_id.clone(),
                    size,
                }];
                if widget.widget_type.is_chart() {
                    intents.push(Intent::ChartRelayout {
                        widget_id: widget_id.clone(),
                    });
                }
                Transition::to(
                    InteractionState::Resizing {
                        widget_id,
                        start_pointer,
                        start_size,
                    },
                    intents,
                )
            }
            (InteractionState::Dragging { widget_id, moved, .. }, PointerEvent::Up { .. }) => {
                if moved {
                    Transition::to(
                        InteractionState::Idle,
                        vec![Intent::CommitGeometry { widget_id }],
                    )
                } else {
                    Transition::to(
                        InteractionState::Idle,
                        vec![Intent::ToggleSelection { widget_id }],
                    )
                }
            }
            (InteractionState::Resizing { widget_id, .. }, PointerEvent::Up { .. }) => {
                Transition::to(
                    InteractionState::Idle,
                    vec![Intent::CommitGeometry { widget_id }],
                )
            }
            (InteractionState::Dragging { widget_id, moved, .. }, PointerEvent::Cancel) => {
                let intents = if moved {
                    vec![Intent::CommitGeometry { widget_id }]
                } else {
                    Vec::new()
                };
                Transition::to(InteractionState::Idle, intents)
            }
            (InteractionState::Resizing { widget_id, .. }, PointerEvent::Cancel) => {
                Transition::to(
                    InteractionState::Idle,
                    vec![Intent::CommitGeometry { widget_id }],
                )
            }
            (
                InteractionState::Idle,
                PointerEvent::Move { .. } | PointerEvent::Up { .. } | PointerEvent::Cancel,
            ) => Transition::stay(InteractionState::Idle),
        }
    }

    fn pointer_down(target: HitTarget, at: Position, widgets: &[Widget]) -> Transition {
        let selected = widgets.iter().find(|w| w.is_selected()).map(|w| w.id.as_str());

        match target {
            HitTarget::Canvas => {
                if selected.is_some() {
                    Transition::to(InteractionState::Idle, vec![Intent::DismissEditor])
                } else {
                    Transition::stay(InteractionState::Idle)
                }
            }
            HitTarget::Editor { .. } => Transition::stay(InteractionState::Idle),
            HitTarget::Widget { widget_id, region } => {
                let Some(widget) = widgets.iter().find(|w| w.id == widget_id) else {
                    return Transition::stay(InteractionState::Idle);
                };

                // any press outside the controls of another widget closes the open editor
                let dismiss = match selected {
                    Some(id) if id != widget_id => vec![Intent::DismissEditor],
                    _ => Vec::new(),
                };
                match region {
                    WidgetRegion::Control(action) => Transition::to(
                        InteractionState::Idle,
                        vec![Intent::Control { widget_id, action }],
                    ),
                    WidgetRegion::TextRegion => Transition::to(InteractionState::Idle, dismiss),
                    WidgetRegion::ResizeHandle => Transition::to(
                        InteractionState::Resizing {
                            start_pointer: at,
                            start_size: widget.size,
                            widget_id,
                        },
                        dismiss,
                    ),
                    WidgetRegion::Chrome => Transition::to(
                        InteractionState::Dragging {
                            offset: Position::new(at.x - widget.position.x, at.y - widget.position.y),
                            moved: false,
                            widget_id,
                        },
                        dismiss,
                    ),
                }
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::widget::{SelectionState, WidgetType};

    fn widgets() -> Vec<Widget> {
        vec![
            Widget::new("widget-1".into(), WidgetType::Bar, Position::new(20.0, 20.0)),
            Widget::new("widget-2".into(), WidgetType::TextHeader, Position::new(342.0, 20.0)),
        ]
    }

    fn down(widget_id: &str, region: WidgetRegion, x: f64, y: f64) -> PointerEvent {
        PointerEvent::Down {
            target: HitTarget::Widget {
                widget_id: widget_id.into(),
                region,
            },
            x,
            y,
        }
    }

    #[test]
    fn test_drag_moves_by_captured_offset() {
        let widgets = widgets();
        let t = InteractionState::Idle.on_event(down("widget-1", WidgetRegion::Chrome, 30.0, 25.0), &widgets);
        assert_eq!(t.state.label(), "dragging");
        assert!(t.intents.is_empty());

        let t = t.state.on_event(PointerEvent::Move { x: 130.0, y: 225.0 }, &widgets);
        assert_eq!(
            t.intents,
            vec![Intent::MoveWidget {
                widget_id: "widget-1".into(),
                position: Position::new(120.0, 220.0)
            }]
        );

        let t = t.state.on_event(PointerEvent::Up { x: 130.0, y: 225.0 }, &widgets);
        assert!(t.state.is_idle());
        assert_eq!(t.intents, vec![Intent::CommitGeometry { widget_id: "widget-1".into() }]);
    }

    #[test]
    fn test_drag_clamps_to_non_negative() {
        let widgets = widgets();
        let t = InteractionState::Idle.on_event(down("widget-1", WidgetRegion::Chrome, 60.0, 60.0), &widgets);
        let t = t.state.on_event(PointerEvent::Move { x: -500.0, y: 10.0 }, &widgets);
        assert_eq!(
            t.intents,
            vec![Intent::MoveWidget {
                widget_id: "widget-1".into(),
                position: Position::new(0.0, 0.0)
            }]
        );
    }

    #[test]
    fn test_click_without_movement_toggles_selection() {
        let widgets = widgets();
        let t = InteractionState::Idle.on_event(down("widget-1", WidgetRegion::Chrome, 30.0, 25.0), &widgets);
        let t = t.state.on_event(PointerEvent::Up { x: 30.0, y: 25.0 }, &widgets);
        assert_eq!(t.intents, vec![Intent::ToggleSelection { widget_id: "widget-1".into() }]);
    }

    #[test]
    fn test_resize_never_goes_below_minimum() {
        let widgets = widgets();
        let t = InteractionState::Idle.on_event(
            down("widget-1", WidgetRegion::ResizeHandle, 320.0, 270.0),
            &widgets,
        );
        assert_eq!(t.state.label(), "resizing");

        let t = t.state.on_event(PointerEvent::Move { x: -9_000.0, y: -9_000.0 }, &widgets);
        assert_eq!(
            t.intents,
            vec![
                Intent::ResizeWidget {
                    widget_id: "widget-1".into(),
                    size: Size::new(250.0, 200.0)
                },
                Intent::ChartRelayout { widget_id: "widget-1".into() },
            ]
        );

        let t = t.state.on_event(PointerEvent::Up { x: 0.0, y: 0.0 }, &widgets);
        assert!(t.state.is_idle());
        assert_eq!(t.intents, vec![Intent::CommitGeometry { widget_id: "widget-1".into() }]);
    }

    #[test]
    fn test_text_header_resize_has_no_chart_relayout() {
        let widgets = widgets();
        let t = InteractionState::Idle.on_event(
            down("widget-2", WidgetRegion::ResizeHandle, 642.0, 80.0),
            &widgets,
        );
        let t = t.state.on_event(PointerEvent::Move { x: 700.0, y: 100.0 }, &widgets);
        assert_eq!(
            t.intents,
            vec![Intent::ResizeWidget {
                widget_id: "widget-2".into(),
                size: Size::new(358.0, 80.0)
            }]
        );
    }

    #[test]
    fn test_second_gesture_ignored_while_active() {
        let widgets = widgets();
        let t = InteractionState::Idle.on_event(down("widget-1", WidgetRegion::Chrome, 30.0, 25.0), &widgets);
        let before = t.state.clone();
        let t = t.state.on_event(down("widget-2", WidgetRegion::ResizeHandle, 600.0, 70.0), &widgets);
        assert_eq!(t.state, before);
        assert!(t.intents.is_empty());
        assert_eq!(t.state.active_widget(), Some("widget-1"));
    }

    #[test]
    fn test_controls_and_text_region_never_start_gestures() {
        let widgets = widgets();
        let t = InteractionState::Idle.on_event(
            down("widget-1", WidgetRegion::Control(ControlAction::Minimize), 300.0, 30.0),
            &widgets,
        );
        assert!(t.state.is_idle());
        assert_eq!(
            t.intents,
            vec![Intent::Control {
                widget_id: "widget-1".into(),
                action: ControlAction::Minimize
            }]
        );

        let t = InteractionState::Idle.on_event(down("widget-2", WidgetRegion::TextRegion, 400.0, 40.0), &widgets);
        assert!(t.state.is_idle());
        assert!(t.intents.is_empty());
    }

    #[test]
    fn test_canvas_click_dismisses_editor_only_with_selection() {
        let mut widgets = widgets();
        let canvas = PointerEvent::Down { target: HitTarget::Canvas, x: 900.0, y: 900.0 };
        let t = InteractionState::Idle.on_event(canvas.clone(), &widgets);
        assert!(t.intents.is_empty());

        widgets[0].selection = SelectionState::Selected;
        let t = InteractionState::Idle.on_event(canvas, &widgets);
        assert_eq!(t.intents, vec![Intent::DismissEditor]);

        let editor = PointerEvent::Down {
            target: HitTarget::Editor { widget_id: "widget-1".into() },
            x: 40.0,
            y: 300.0,
        };
        assert!(InteractionState::Idle.on_event(editor, &widgets).intents.is_empty());
    }

    #[test]
    fn test_press_on_other_widget_dismisses_open_editor() {
        let mut widgets = widgets();
        widgets[0].selection = SelectionState::Selected;

        let t = InteractionState::Idle.on_event(down("widget-2", WidgetRegion::TextRegion, 400.0, 40.0), &widgets);
        assert!(t.state.is_idle());
        assert_eq!(t.intents, vec![Intent::DismissEditor]);

        let t = InteractionState::Idle.on_event(down("widget-2", WidgetRegion::ResizeHandle, 642.0, 80.0), &widgets);
        assert_eq!(t.state.label(), "resizing");
        assert_eq!(t.intents, vec![Intent::DismissEditor]);

        let t = InteractionState::Idle.on_event(down("widget-2", WidgetRegion::Chrome, 350.0, 25.0), &widgets);
        assert_eq!(t.state.label(), "dragging");
        assert_eq!(t.intents, vec![Intent::DismissEditor]);

        // the selected widget's own regions and any control leave the editor alone
        let t = InteractionState::Idle.on_event(down("widget-1", WidgetRegion::ResizeHandle, 320.0, 270.0), &widgets);
        assert!(t.intents.is_empty());
        let minimize = down("widget-2", WidgetRegion::Control(ControlAction::Minimize), 600.0, 30.0);
        assert_eq!(
            InteractionState::Idle.on_event(minimize, &widgets).intents,
            vec![Intent::Control {
                widget_id: "widget-2".into(),
                action: ControlAction::Minimize
            }]
        );
    }

    #[test]
    fn test_cancel_always_returns_to_idle() {
        let widgets = widgets();
        let t = InteractionState::Idle.on_event(down("widget-1", WidgetRegion::Chrome, 30.0, 25.0), &widgets);
        let t = t.state.on_event(PointerEvent::Cancel, &widgets);
        assert!(t.state.is_idle());
        assert!(t.intents.is_empty());
        assert!(t.state.active_widget().is_none());
    }

    #[test]
    fn test_pointer_event_wire_format() {
        let event: PointerEvent = serde_json::from_value(serde_json::json!({
            "event": "down",
            "target": {"on": "widget", "widgetId": "widget-1", "region": {"kind": "control", "action": "delete"}},
            "x": 1.0,
            "y": 2.0
        }))
        .unwrap();
        assert_eq!(event, down("widget-1", WidgetRegion::Control(ControlAction::Delete), 1.0, 2.0));
    }
}
