//! Control client for GoPro HERO-series cameras over their WiFi hotspot.
//!
//! The camera's WiFi backpack speaks a plain request/response protocol; this
//! crate wraps it in a session state machine (connect → power-on → ready), a
//! self-rescheduling status poller and a serialized command dispatcher, all
//! running on a single control task. The UI or host program talks to the task
//! through a cheap-to-clone [`CameraClient`] handle and receives
//! [`CameraEvent`] notifications over a channel, so the core never calls back
//! into its host.
//!
//! ```no_run
//! # async fn demo() -> anyhow::Result<()> {
//! use tokio_util::sync::CancellationToken;
//! use gopro_control::{create_task, GoProConfig, Task};
//!
//! let (task, camera) = create_task(GoProConfig::default())?;
//! let cancel = CancellationToken::new();
//! tokio::spawn(Box::new(task).run(cancel.clone()));
//!
//! let events = camera.events();
//! camera.connect().await?;
//! if !camera.is_power_on() {
//!     camera.power_on().await?;
//! }
//! let status = camera.load_status().await?;
//! println!("battery: {}%", status.battery_level);
//! # Ok(())
//! # }
//! ```

pub mod client;
pub mod command;
pub mod config;
pub mod error;
pub mod event;
pub mod interface;
pub mod state;
pub mod status;
mod task;

pub use client::*;
pub use command::*;
pub use config::*;
pub use error::*;
pub use event::*;
pub use interface::*;
pub use state::*;
pub use status::*;
pub use task::*;
