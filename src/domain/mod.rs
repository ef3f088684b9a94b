// Domain layer - widget model, layout, interaction state machine and views
pub mod dashboard;
pub mod interaction;
pub mod layout;
pub mod render_shape;
pub mod view;
pub mod widget;
