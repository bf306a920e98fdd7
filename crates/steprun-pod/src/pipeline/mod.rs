//! Per-step compilation stages

pub(crate) mod implicit;
pub(crate) mod resources;
pub(crate) mod scripts;
