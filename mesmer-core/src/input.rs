/// Mouse buttons the explorer reacts to.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum MouseButton {
    Left,
    Right,
    Middle,
}

/// Logical keys, already translated from the platform key codes.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Key {
    /// Leave the current fractal (Escape / Backspace).
    Back,
    /// Restore the default view (Space).
    ResetView,
    /// Write the current pre-render to disk (S).
    Export,
}

/// Discrete input delivered by the event pump.
///
/// Positions are in drawable pixels with the origin at the top-left.
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum InputEvent {
    /// Positive `delta` zooms in, one unit per notch.
    Wheel { position: (f32, f32), delta: f32 },
    MouseDown { position: (f32, f32), button: MouseButton },
    MouseUp { position: (f32, f32), button: MouseButton },
    MouseMotion { position: (f32, f32) },
    Key(Key),
    Close,
}
