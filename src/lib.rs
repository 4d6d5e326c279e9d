//! Side-by-side comparison and commenting of 360° panoramas.
//!
//! A project holds tours (one panorama each). Up to two of them are shown
//! next to each other; clicking a panorama starts a comment anchored at the
//! clicked pitch/yaw, and saved comments come back as hotspots.

pub mod annotations;
pub mod app;
pub mod config;
pub mod documents;
pub mod layout;
pub mod model;
pub mod panorama;
pub mod registry;
pub mod selection;
pub mod session;
pub mod viewport;
pub mod writer;
