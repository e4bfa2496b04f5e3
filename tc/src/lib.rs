//! ThingClient - consume Web of Things devices over HTTP
//!
//! A device publishes a Thing Description (TD): a JSON document naming its
//! properties and actions, the forms (URLs) that reach them, and unit
//! metadata for each field. This crate turns a TD into a callable [`Thing`]
//! and fetches the TD list from a Thing Directory.
//!
//! # Example
//!
//! ```ignore
//! use thingclient::{Directory, HttpThing, Thing};
//!
//! let directory = Directory::new("http://localhost:8081/things")?;
//! let tds = directory.fetch().await?;
//! let belt = HttpThing::new(tds[0].clone())?;
//! belt.invoke_action("startBeltForward", None).await?;
//! ```

mod description;
mod directory;
mod error;
mod http;
mod thing;

pub use description::{ActionAffordance, DataSchema, Form, PropertyAffordance, ThingDescription};
pub use directory::{Directory, titles};
pub use error::ThingError;
pub use http::HttpThing;
pub use thing::Thing;

/// Default Thing Directory listing endpoint
pub const DEFAULT_DIRECTORY_URL: &str = "http://localhost:8081/things";
