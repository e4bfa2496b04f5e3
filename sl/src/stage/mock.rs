//! Recording devices for stage tests

use std::sync::{Arc, Mutex};

use async_trait::async_trait;
use serde_json::{Value, json};
use thingclient::{Thing, ThingDescription, ThingError};

/// Shared log of every action invoked, as `title:action`
pub type CallLog = Arc<Mutex<Vec<String>>>;

/// Wraps a Thing, logging its actions and failing chosen ones once each
pub struct Logged {
    inner: Arc<dyn Thing>,
    log: CallLog,
    fail_once: Mutex<Vec<&'static str>>,
}

impl Logged {
    pub fn new(inner: Arc<dyn Thing>, log: CallLog) -> Self {
        Self {
            inner,
            log,
            fail_once: Mutex::new(Vec::new()),
        }
    }

    pub fn failing_once(self, action: &'static str) -> Self {
        self.fail_once.lock().unwrap().push(action);
        self
    }
}

#[async_trait]
impl Thing for Logged {
    fn description(&self) -> &ThingDescription {
        self.inner.description()
    }

    async fn invoke_action(&self, name: &str, input: Option<Value>) -> Result<Value, ThingError> {
        self.log.lock().unwrap().push(format!("{}:{}", self.title(), name));
        let fail = {
            let mut fail_once = self.fail_once.lock().unwrap();
            match fail_once.iter().position(|a| *a == name) {
                Some(index) => {
                    fail_once.remove(index);
                    true
                }
                None => false,
            }
        };
        if fail {
            return Err(ThingError::Status {
                thing: self.title().to_string(),
                status: 503,
                message: format!("{} failed", name),
            });
        }
        self.inner.invoke_action(name, input).await
    }

    async fn read_property(&self, name: &str) -> Result<Value, ThingError> {
        self.inner.read_property(name).await
    }

    async fn write_property(&self, name: &str, value: Value) -> Result<(), ThingError> {
        self.inner.write_property(name, value).await
    }
}

/// A belt that accepts every command
pub struct IdleBelt(ThingDescription);

impl IdleBelt {
    pub fn new(title: &str) -> Self {
        Self(ThingDescription::new(title))
    }
}

#[async_trait]
impl Thing for IdleBelt {
    fn description(&self) -> &ThingDescription {
        &self.0
    }

    async fn invoke_action(&self, _name: &str, _input: Option<Value>) -> Result<Value, ThingError> {
        Ok(Value::Null)
    }

    async fn read_property(&self, _name: &str) -> Result<Value, ThingError> {
        Ok(Value::Null)
    }

    async fn write_property(&self, _name: &str, _value: Value) -> Result<(), ThingError> {
        Ok(())
    }
}

/// Color sensor always seeing one cube
pub struct SteadyColor {
    td: ThingDescription,
    rgb: [u8; 3],
}

impl SteadyColor {
    pub fn new(rgb: [u8; 3]) -> Self {
        Self {
            td: ThingDescription::new("VirtualColorSensor"),
            rgb,
        }
    }
}

#[async_trait]
impl Thing for SteadyColor {
    fn description(&self) -> &ThingDescription {
        &self.td
    }

    async fn invoke_action(&self, _name: &str, _input: Option<Value>) -> Result<Value, ThingError> {
        Ok(Value::Null)
    }

    async fn read_property(&self, name: &str) -> Result<Value, ThingError> {
        match name {
            "objectPresence" => Ok(json!(true)),
            _ => Ok(json!(self.rgb)),
        }
    }

    async fn write_property(&self, _name: &str, _value: Value) -> Result<(), ThingError> {
        Ok(())
    }
}
