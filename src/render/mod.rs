//! Compositing: the shader program, the fixed pipeline state and the backends that run it.

pub mod backend;
pub mod compositor;
pub mod cpu;
pub mod fallback;
#[cfg(feature = "gpu")]
pub mod gpu;
pub mod pipeline;
pub mod shader;
pub mod surface;
