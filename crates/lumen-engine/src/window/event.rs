use crate::coords::{Point, Size};

/// Per-window notification, delivered in the order it happened.
#[derive(Debug, Copy, Clone, Eq, PartialEq)]
pub enum WinEvent {
    Move(Point),
    Resize(Size),
    Focus,
    DeFocus,
    Minimize,
    Close,
}
