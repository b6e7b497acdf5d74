//! Unofficial client for the Ayla Networks IoT cloud API.
//!
//! A number of smart-home products (Shark robot vacuums, Culligan water
//! softeners, Fujitsu FGLair HVAC units among them) use the Ayla Networks
//! cloud for remote access. This crate signs in with the vendor application
//! credentials, enumerates the devices registered to an account and reads or
//! sets their properties.
//!
//! API documentation for the underlying service lives at
//! <https://developer.aylanetworks.com/apibrowser/>.
//!
//! # Quick start
//!
//! ```no_run
//! use ayla_iot::{AylaClient, Region};
//!
//! # async fn run() -> Result<(), ayla_iot::AylaError> {
//! let client = AylaClient::builder("user@example.com", "hunter2", "app-id", "app-secret")
//!     .region(Region::Europe)
//!     .build()?;
//! client.sign_in().await?;
//!
//! for mut device in client.get_devices().await? {
//!     device.device_mut().update().await?;
//!     println!("{} ({})", device.device().name(), device.device().dsn());
//! }
//! # Ok(())
//! # }
//! ```

pub mod auth;
pub mod client;
pub mod device;
pub mod error;
pub mod region;

pub use auth::Authorization;
pub use client::{AylaClient, AylaClientBuilder};
pub use device::{Device, DeviceEntry, FujitsuHvac, Property, PropertyValue, Softener, TypedDevice, Vacuum};
pub use error::AylaError;
pub use region::Region;

/// Convenience alias used throughout the crate.
pub type Result<T> = std::result::Result<T, AylaError>;
