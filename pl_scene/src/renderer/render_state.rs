/// Fixed-function render states and their valid value ranges.

/// Render-state keys
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum RenderState {
    /// `Fill` value
    FillMode,
    /// `Cull` value
    CullMode,
    /// 0/1
    ZEnable,
    /// 0/1
    ZWriteEnable,
    /// `Compare` value
    ZFunc,
    /// 0/1
    BlendEnable,
    /// `BlendFunc` value
    SrcBlendFunc,
    /// `BlendFunc` value
    DstBlendFunc,
    /// 0/1
    AlphaTestEnable,
    /// `Compare` value
    AlphaTestFunction,
    /// 0/1
    StencilEnable,
    /// 0/1
    ScissorTestEnable,
    /// Bitmask of the four color channels (0..=0xF)
    ColorWriteMask,
}

impl RenderState {
    pub const COUNT: usize = 13;

    pub const ALL: [RenderState; Self::COUNT] = [
        RenderState::FillMode,
        RenderState::CullMode,
        RenderState::ZEnable,
        RenderState::ZWriteEnable,
        RenderState::ZFunc,
        RenderState::BlendEnable,
        RenderState::SrcBlendFunc,
        RenderState::DstBlendFunc,
        RenderState::AlphaTestEnable,
        RenderState::AlphaTestFunction,
        RenderState::StencilEnable,
        RenderState::ScissorTestEnable,
        RenderState::ColorWriteMask,
    ];

    /// Position in `ALL`
    pub fn index(self) -> usize {
        self as usize
    }

    /// Largest accepted value
    pub fn max_value(self) -> u32 {
        match self {
            RenderState::FillMode => Fill::Solid as u32,
            RenderState::CullMode => Cull::CounterClockwise as u32,
            RenderState::ZFunc | RenderState::AlphaTestFunction => Compare::Always as u32,
            RenderState::SrcBlendFunc | RenderState::DstBlendFunc => BlendFunc::InvDstColor as u32,
            RenderState::ColorWriteMask => 0xF,
            RenderState::ZEnable
            | RenderState::ZWriteEnable
            | RenderState::BlendEnable
            | RenderState::AlphaTestEnable
            | RenderState::StencilEnable
            | RenderState::ScissorTestEnable => 1,
        }
    }

    pub fn is_valid_value(self, value: u32) -> bool {
        value <= self.max_value()
    }

    /// Backend default
    pub fn default_value(self) -> u32 {
        match self {
            RenderState::FillMode => Fill::Solid as u32,
            RenderState::CullMode => Cull::CounterClockwise as u32,
            RenderState::ZEnable | RenderState::ZWriteEnable => 1,
            RenderState::ZFunc => Compare::LessEqual as u32,
            RenderState::SrcBlendFunc => BlendFunc::SrcAlpha as u32,
            RenderState::DstBlendFunc => BlendFunc::InvSrcAlpha as u32,
            RenderState::AlphaTestFunction => Compare::GreaterEqual as u32,
            RenderState::ColorWriteMask => 0xF,
            RenderState::BlendEnable
            | RenderState::AlphaTestEnable
            | RenderState::StencilEnable
            | RenderState::ScissorTestEnable => 0,
        }
    }
}

/// Polygon fill modes
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[repr(u32)]
pub enum Fill {
    Point = 0,
    Line = 1,
    Solid = 2,
}

/// Face culling modes (which winding is culled)
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[repr(u32)]
pub enum Cull {
    None = 0,
    Clockwise = 1,
    CounterClockwise = 2,
}

impl Cull {
    /// Opposite winding, `None` stays `None`
    pub fn inverted(self) -> Cull {
        match self {
            Cull::None => Cull::None,
            Cull::Clockwise => Cull::CounterClockwise,
            Cull::CounterClockwise => Cull::Clockwise,
        }
    }
}

/// Comparison functions
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[repr(u32)]
pub enum Compare {
    Never = 0,
    Less = 1,
    Equal = 2,
    LessEqual = 3,
    Greater = 4,
    NotEqual = 5,
    GreaterEqual = 6,
    Always = 7,
}

/// Blend factors
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[repr(u32)]
pub enum BlendFunc {
    Zero = 0,
    One = 1,
    SrcColor = 2,
    InvSrcColor = 3,
    SrcAlpha = 4,
    InvSrcAlpha = 5,
    DstAlpha = 6,
    InvDstAlpha = 7,
    DstColor = 8,
    InvDstColor = 9,
}

/// Complete render-state table
///
/// Used by backends to track their state and by passes to describe the
/// state they want applied.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RenderStates {
    values: [u32; RenderState::COUNT],
}

impl Default for RenderStates {
    fn default() -> Self {
        let mut values = [0; RenderState::COUNT];
        for state in RenderState::ALL {
            values[state.index()] = state.default_value();
        }
        Self { values }
    }
}

impl RenderStates {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn get(&self, state: RenderState) -> u32 {
        self.values[state.index()]
    }

    /// Store a value; out-of-range values follow the `Renderer::set_render_state` rules
    pub fn set(&mut self, state: RenderState, value: u32) -> bool {
        if !state.is_valid_value(value) {
            debug_assert!(false, "render state {:?}: value {} out of range", state, value);
            return false;
        }
        self.values[state.index()] = value;
        true
    }

    /// Back to backend defaults
    pub fn reset(&mut self) {
        *self = Self::default();
    }

    pub fn iter(&self) -> impl Iterator<Item = (RenderState, u32)> + '_ {
        RenderState::ALL.iter().map(move |&s| (s, self.values[s.index()]))
    }
}

#[cfg(test)]
#[path = "render_state_tests.rs"]
mod tests;
