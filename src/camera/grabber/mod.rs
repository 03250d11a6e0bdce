//! Frame-grabber backend.
//!
//! All SDK access goes through the `GrabberSdk` trait. A vendor binding
//! implements it in production; `MockGrabberSdk` and `SimulatedGrabberSdk`
//! run without hardware.

pub mod api;
pub mod backend;
pub mod discovery;
pub mod mock;
pub mod queue;
pub mod sdk;
pub mod sim;
