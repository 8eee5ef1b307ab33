//! Implementations of the ports (development and production defaults).

pub mod resources;

pub use self::resources::{InlineResource, TokioResource};
