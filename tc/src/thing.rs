//! Thing trait definition

use async_trait::async_trait;
use serde_json::Value;

use super::{ThingDescription, ThingError};

/// A consumed Thing - the capability surface of one device
///
/// Every device on the line is reached through these three operations.
/// Unit metadata is static and comes from [`Thing::description`].
#[async_trait]
pub trait Thing: Send + Sync {
    /// The device title from its Thing Description
    fn title(&self) -> &str {
        &self.description().title
    }

    /// The Thing Description this handle was built from
    fn description(&self) -> &ThingDescription;

    /// Invoke an action, resolving when the device answers
    async fn invoke_action(&self, name: &str, input: Option<Value>) -> Result<Value, ThingError>;

    /// Read the current value of a property
    async fn read_property(&self, name: &str) -> Result<Value, ThingError>;

    /// Write a property value
    async fn write_property(&self, name: &str, value: Value) -> Result<(), ThingError>;
}
