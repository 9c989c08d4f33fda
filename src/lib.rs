//! roomcraft: AI room design client
//!
//! This library provides:
//! - A design session state machine (generate, redesign, segment, recolor,
//!   reconstruct, narrate) that owns every piece of on-screen state
//! - A backend gateway trait with an HTTP implementation
//! - A capture-device seam with scoped camera handles
//! - Designer quotes and avatar chat with local fallbacks

pub mod capture;
pub mod cli;
pub mod config;
pub mod gateway;
pub mod session;

pub use config::Config;
pub use gateway::{Gateway, GatewayFailure, HttpGateway};
pub use session::{Mode, PhaseKind, Session, SessionSnapshot, Style};
