use glam::Vec2;

/// Phase of a pointer sample, as reported by the platform input layer.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum PointerPhase {
    TouchBegan,
    TouchMoved,
    TouchStationary,
    TouchEnded,
    MouseDown,
    MouseUp,
}

/// One pointer sample in screen pixels, origin at the bottom-left corner.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct PointerEvent {
    pub phase: PointerPhase,
    pub position: Vec2,
}

impl PointerEvent {
    pub fn new(phase: PointerPhase, position: Vec2) -> Self {
        Self { phase, position }
    }

    pub fn touch_began(x: f32, y: f32) -> Self {
        Self::new(PointerPhase::TouchBegan, Vec2::new(x, y))
    }

    pub fn mouse_down(x: f32, y: f32) -> Self {
        Self::new(PointerPhase::MouseDown, Vec2::new(x, y))
    }

    /// Only the start of a touch or a primary click emits a ray.
    pub fn is_qualifying(&self) -> bool {
        matches!(self.phase, PointerPhase::TouchBegan | PointerPhase::MouseDown)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn only_began_and_down_qualify() {
        assert!(PointerEvent::touch_began(1.0, 2.0).is_qualifying());
        assert!(PointerEvent::mouse_down(1.0, 2.0).is_qualifying());
        for phase in [
            PointerPhase::TouchMoved,
            PointerPhase::TouchStationary,
            PointerPhase::TouchEnded,
            PointerPhase::MouseUp,
        ] {
            assert!(!PointerEvent::new(phase, Vec2::ZERO).is_qualifying());
        }
    }
}
