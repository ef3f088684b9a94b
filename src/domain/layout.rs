// Layout engine - initial placement and geometry clamping
use super::widget::{Position, Size, Widget, WidgetType};

pub const START_X: f64 = 20.0;
pub const START_Y: f64 = 20.0;
pub const SPACING: f64 = 22.0;

/// Where a new widget goes: a single left-to-right row after the rightmost edge
pub fn insertion_point(widgets: &[Widget]) -> Position {
    if widgets.is_empty() {
        return Position::new(START_X, START_Y);
    }

    let rightmost = widgets
        .iter()
        .map(Widget::right_edge)
        .fold(START_X, f64::max);

    Position::new(rightmost + SPACING, START_Y)
}

/// Drag target for a pointer, never left of or above the canvas origin
pub fn drag_position(pointer: Position, offset: Position) -> Position {
    Position::new(
        (pointer.x - offset.x).max(0.0),
        (pointer.y - offset.y).max(0.0),
    )
}

/// Size after a resize gesture of (dx, dy), clamped to the type's minimum
pub fn resized(widget_type: WidgetType, start: Size, dx: f64, dy: f64) -> Size {
    let min = widget_type.min_size();
    Size::new(
        (start.width + dx).max(min.width),
        (start.height + dy).max(min.height),
    )
}

#[cfg(test)]
mod tests {
    use super::*;

    fn widget_at(x: f64, width: f64) -> Widget {
        let mut widget = Widget::new(format!("w{}", x), WidgetType::Bar, Position::new(x, 40.0));
        widget.size.width = width;
        widget
    }

    #[test]
    fn test_first_widget_goes_to_start() {
        assert_eq!(insertion_point(&[]), Position::new(START_X, START_Y));
    }

    #[test]
    fn test_next_widget_follows_rightmost_edge() {
        let widgets = vec![widget_at(20.0, 300.0), widget_at(600.0, 250.0), widget_at(100.0, 50.0)];
        assert_eq!(insertion_point(&widgets), Position::new(872.0, START_Y));
    }

    #[test]
    fn test_rightmost_never_below_start() {
        // a widget dragged fully left still leaves the start column reserved
        let widgets = vec![widget_at(0.0, 0.0)];
        assert_eq!(insertion_point(&widgets).x, START_X + SPACING);
    }

    #[test]
    fn test_drag_position_clamps_to_origin() {
        let offset = Position::new(30.0, 10.0);
        assert_eq!(drag_position(Position::new(10.0, 5.0), offset), Position::new(0.0, 0.0));
        assert_eq!(
            drag_position(Position::new(5000.0, 7000.0), offset),
            Position::new(4970.0, 6990.0)
        );
    }

    #[test]
    fn test_resize_clamps_to_type_minimum() {
        let size = resized(WidgetType::Table, Size::new(400.0, 300.0), -10_000.0, -10_000.0);
        assert_eq!(size, Size::new(250.0, 200.0));

        let size = resized(WidgetType::TextHeader, Size::new(300.0, 60.0), -1_000.0, 15.0);
        assert_eq!(size, Size::new(150.0, 75.0));

        let size = resized(WidgetType::Line, Size::new(300.0, 250.0), 50.0, 25.0);
        assert_eq!(size, Size::new(350.0, 275.0));
    }
}
