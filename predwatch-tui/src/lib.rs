//! Terminal dashboard over a live [`predwatch_data`] feed.
//!
//! - [`view`]: per-chart index window with pan, focus-preserving zoom, hover and
//!   auto-follow.
//! - [`app`]: maps crossterm key and mouse events onto the views and tracks feed health.
//! - [`render`]: ratatui layout for the header, the three charts and the hover readout.
pub mod app;
pub mod config;
pub mod error;
pub mod render;
pub mod view;

pub use app::{App, AppAction, Health};
pub use config::ViewConfig;
pub use error::TuiError;
pub use view::{Interaction, ViewWindow, clamp_view};
