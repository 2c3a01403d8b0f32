/// Renderer module - backend trait, render states, draw submission types

pub mod renderer;
pub mod render_state;

#[cfg(test)]
pub mod mock_renderer;

pub use renderer::*;
pub use render_state::*;
