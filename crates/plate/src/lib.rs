mod config;
mod core;
mod editing;
mod html;
mod ops;
mod plugin;
mod text;

pub use crate::config::*;
pub use crate::core::*;
pub use crate::html::*;
pub use crate::ops::*;
pub use crate::plugin::*;
