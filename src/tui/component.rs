use ratatui::Frame;
use ratatui::layout::Rect;

/// Something that draws itself into a region of the frame.
///
/// Props are struct fields set by the parent before each frame. `render`
/// takes `&mut self` so stateful components can update scroll offsets and
/// list selection while drawing, the same way a ratatui `StatefulWidget` does.
pub trait Component {
    fn render(&mut self, frame: &mut Frame, area: Rect);
}

/// A component that reacts to terminal input.
pub trait EventHandler {
    /// What the component reports back to the event loop.
    type Event;

    /// Returns `Some` when the parent has to act on the input.
    fn handle_event(&mut self, event: &super::event::TuiEvent) -> Option<Self::Event>;
}
