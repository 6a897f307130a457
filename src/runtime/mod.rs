//! Application lifecycle: building the registry and tearing it down.

pub mod lifetime;
