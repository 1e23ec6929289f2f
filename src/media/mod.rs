//! Frame acquisition: the decoding element, its events, and the readiness gate.

pub mod decode;
pub mod element;
pub mod events;
pub mod fetch;
pub mod frame;
pub mod readiness;
pub mod source;
