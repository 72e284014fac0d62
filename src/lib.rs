//! PerlerPad: a pixel-grid editor for fuse-bead (perler) designs.
//!
//! The document model lives in [`canvas`] and [`project`], pointer
//! handling in [`components::tools`], drawing in [`render`].  [`app`] is the
//! egui window and [`cli`] the headless renderer.

#![allow(clippy::too_many_arguments)]

#[macro_use]
pub mod logger;

pub mod app;
pub mod canvas;
pub mod cli;
pub mod components;
pub mod io;
pub mod palette;
pub mod project;
pub mod render;
pub mod settings;
pub mod viewport;
