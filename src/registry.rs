//! Attribute writes looked up by name.
//!
//! The registry is derived from the schema once, so every writable attribute
//! is reachable as `(cluster name, write name)` without per-attribute glue.
//! Names match without regard to ASCII case, and a write may be named either
//! after its attribute (`onTime`) or after its client method
//! (`writeOnTimeAttribute`).

use std::{collections::HashMap, fmt};

use once_cell::sync::Lazy;
use serde_json::Value;

use crate::{
    builder::build,
    callback::{CallbackFactory, WriteCallback},
    cluster::ClusterClient,
    data_model::{AttributePath, AttributeType},
    error::{ValidationError, WriteError},
    pending::CorrelationId,
    schema::{AttributeSchema, ClusterSchema, CLUSTERS},
};

/// Name of the single argument every attribute write takes.
pub const VALUE_PARAMETER: &str = "value";

static GLOBAL: Lazy<WriteRegistry> = Lazy::new(|| WriteRegistry::from_schema(CLUSTERS));

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ParameterInfo {
    pub name: &'static str,
    pub ty: AttributeType,
}

impl ParameterInfo {
    /// The type name client bindings use for this parameter
    pub fn type_name(&self) -> &'static str {
        self.ty.value_type.parameter_type()
    }
}

/// A write of one attribute, ready to be invoked on any client of its
/// cluster.
#[derive(Clone, Copy)]
pub struct WriteInteraction {
    cluster: &'static ClusterSchema,
    attribute: &'static AttributeSchema,
    parameters: [ParameterInfo; 1],
}

impl WriteInteraction {
    fn new(cluster: &'static ClusterSchema, attribute: &'static AttributeSchema) -> Self {
        Self {
            cluster,
            attribute,
            parameters: [ParameterInfo {
                name: VALUE_PARAMETER,
                ty: attribute.ty,
            }],
        }
    }

    pub fn cluster(&self) -> &'static ClusterSchema {
        self.cluster
    }

    pub fn attribute(&self) -> &'static AttributeSchema {
        self.attribute
    }

    /// Client method name, such as `writeOnTimeAttribute`
    pub fn method_name(&self) -> String {
        format!("write{}Attribute", self.attribute.name)
    }

    pub fn parameters(&self) -> &[ParameterInfo] {
        &self.parameters
    }

    /// Validate `args` and submit the write through `client`. Nothing is
    /// sent when an argument is missing or invalid.
    pub fn invoke(
        &self,
        client: &dyn ClusterClient,
        callback: Box<dyn WriteCallback>,
        args: &HashMap<String, Value>,
    ) -> Result<CorrelationId, WriteError> {
        let value = args
            .get(VALUE_PARAMETER)
            .ok_or_else(|| ValidationError::MissingArgument(VALUE_PARAMETER.to_string()))?;
        self.invoke_value(client, callback, value)
    }

    /// Like [`Self::invoke`] with a callback made by `factory`.
    pub fn invoke_with_default(
        &self,
        client: &dyn ClusterClient,
        factory: &dyn CallbackFactory,
        args: &HashMap<String, Value>,
    ) -> Result<CorrelationId, WriteError> {
        let label = format!("{}.{}", self.cluster.name, self.attribute.name);
        self.invoke(client, factory.create(&label), args)
    }

    pub fn invoke_value(
        &self,
        client: &dyn ClusterClient,
        callback: Box<dyn WriteCallback>,
        value: &Value,
    ) -> Result<CorrelationId, WriteError> {
        if client.cluster().id != self.cluster.id {
            return Err(ValidationError::UnknownAttribute {
                cluster: client.cluster().name.to_string(),
                attribute: self.attribute.name.to_string(),
            }
            .into());
        }

        let path = AttributePath::new(client.endpoint_id(), self.cluster.id, self.attribute.id);
        let timed_expiry = self.attribute.timed.then(|| client.timed_write_expiry());
        let write = build(path, value, self.attribute.ty, None, timed_expiry)?;
        Ok(client.submit_write(write, callback)?)
    }
}

impl fmt::Debug for WriteInteraction {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("WriteInteraction")
            .field("cluster", &self.cluster.name)
            .field("attribute", &self.attribute.name)
            .field("parameters", &self.parameters)
            .finish()
    }
}

#[derive(Debug, Default)]
pub struct WriteRegistry {
    interactions: Vec<WriteInteraction>,
    // (lowercase cluster name, lowercase attribute name) -> interaction
    index: HashMap<(String, String), usize>,
}

impl WriteRegistry {
    pub fn from_schema(clusters: &'static [ClusterSchema]) -> Self {
        let mut registry = Self::default();
        for cluster in clusters {
            for attribute in cluster.attributes {
                let key = (
                    cluster.name.to_ascii_lowercase(),
                    attribute.name.to_ascii_lowercase(),
                );
                registry.index.insert(key, registry.interactions.len());
                registry
                    .interactions
                    .push(WriteInteraction::new(cluster, attribute));
            }
        }
        registry
    }

    /// The registry of every cluster this crate knows.
    pub fn global() -> &'static WriteRegistry {
        &GLOBAL
    }

    pub fn lookup(&self, cluster: &str, name: &str) -> Option<&WriteInteraction> {
        let cluster = cluster.to_ascii_lowercase();
        let name = name.to_ascii_lowercase();
        let found = self.index.get(&(cluster.clone(), name.clone())).or_else(|| {
            let attribute = name.strip_prefix("write")?.strip_suffix("attribute")?;
            self.index.get(&(cluster, attribute.to_string()))
        })?;
        self.interactions.get(*found)
    }

    /// Writes of one cluster, in schema order.
    pub fn interactions<'a>(
        &'a self,
        cluster: &'a str,
    ) -> impl Iterator<Item = &'a WriteInteraction> + 'a {
        self.interactions
            .iter()
            .filter(move |interaction| interaction.cluster.name.eq_ignore_ascii_case(cluster))
    }

    pub fn cluster_names(&self) -> Vec<&'static str> {
        let mut names: Vec<_> = self
            .interactions
            .iter()
            .map(|interaction| interaction.cluster.name)
            .collect();
        names.dedup();
        names
    }

    pub fn len(&self) -> usize {
        self.interactions.len()
    }

    pub fn is_empty(&self) -> bool {
        self.interactions.is_empty()
    }
}

#[cfg(test)]
mod tests {
    use std::{
        sync::{Arc, Mutex},
        time::Duration,
    };

    use serde_json::json;

    use super::*;
    use crate::{
        builder::EncodedWrite,
        callback::{from_fn, LoggingCallbackFactory},
        data_model::{IntWidth, ValueType},
        error::SessionError,
        interaction_model::WriteRequestMessage,
        schema::cluster_by_name,
    };

    /// Records submitted writes instead of sending them.
    struct RecordingClient {
        endpoint_id: u16,
        cluster: &'static ClusterSchema,
        writes: Arc<Mutex<Vec<EncodedWrite>>>,
    }

    impl RecordingClient {
        fn new(cluster: &str) -> Self {
            Self {
                endpoint_id: 1,
                cluster: cluster_by_name(cluster).unwrap(),
                writes: Default::default(),
            }
        }
    }

    impl ClusterClient for RecordingClient {
        fn endpoint_id(&self) -> u16 {
            self.endpoint_id
        }

        fn cluster(&self) -> &'static ClusterSchema {
            self.cluster
        }

        fn timed_write_expiry(&self) -> Duration {
            Duration::from_millis(10000)
        }

        fn submit_write(
            &self,
            write: EncodedWrite,
            _callback: Box<dyn WriteCallback>,
        ) -> Result<CorrelationId, SessionError> {
            let mut writes = self.writes.lock().unwrap();
            writes.push(write);
            let table = crate::pending::PendingTable::new();
            Ok(table.register(from_fn(|_| {}), Duration::from_secs(1)))
        }
    }

    fn args(value: Value) -> HashMap<String, Value> {
        HashMap::from([(VALUE_PARAMETER.to_string(), value)])
    }

    #[test]
    fn test_lookup_names() {
        let registry = WriteRegistry::global();
        let by_attribute = registry.lookup("onOff", "onTime").unwrap();
        let by_method = registry.lookup("OnOff", "writeOnTimeAttribute").unwrap();
        assert_eq!(by_attribute.attribute().id, 0x4001);
        assert_eq!(by_method.attribute().id, 0x4001);
        assert_eq!(by_method.method_name(), "writeOnTimeAttribute");

        assert!(registry.lookup("onOff", "writeBogusAttribute").is_none());
        assert!(registry.lookup("bogus", "onTime").is_none());
    }

    #[test]
    fn test_parameters() {
        let registry = WriteRegistry::global();
        let int24 = registry.lookup("unitTesting", "int24u").unwrap();
        let [parameter] = int24.parameters() else {
            panic!("expected one parameter");
        };
        assert_eq!(parameter.name, "value");
        assert_eq!(parameter.ty.value_type, ValueType::UInt(IntWidth::W24));
        assert_eq!(parameter.type_name(), "Long");

        let octets = registry.lookup("unitTesting", "octetString").unwrap();
        assert_eq!(octets.parameters()[0].type_name(), "byte[]");
    }

    #[test]
    fn test_every_schema_attribute_is_registered() {
        let registry = WriteRegistry::global();
        let total: usize = CLUSTERS.iter().map(|cluster| cluster.attributes.len()).sum();
        assert_eq!(registry.len(), total);
        assert_eq!(registry.cluster_names().len(), CLUSTERS.len());
        assert_eq!(
            registry.interactions("identify").count(),
            cluster_by_name("Identify").unwrap().attributes.len()
        );
    }

    #[test]
    fn test_invoke() {
        let client = RecordingClient::new("UnitTesting");
        let registry = WriteRegistry::global();

        registry
            .lookup("UnitTesting", "int8u")
            .unwrap()
            .invoke(&client, from_fn(|_| {}), &args(json!(200)))
            .unwrap();
        registry
            .lookup("UnitTesting", "timedWriteBoolean")
            .unwrap()
            .invoke_with_default(&client, &LoggingCallbackFactory, &args(json!(true)))
            .unwrap();

        let writes = client.writes.lock().unwrap();
        assert_eq!(writes.len(), 2);
        assert!(!writes[0].is_timed());
        assert_eq!(writes[1].timed_expiry(), Some(Duration::from_millis(10000)));
        let request = WriteRequestMessage::from_tlv(writes[1].payload()).unwrap();
        assert!(request.timed_request);
    }

    #[test]
    fn test_invoke_rejects_before_submitting() {
        let client = RecordingClient::new("UnitTesting");
        let registry = WriteRegistry::global();
        let int8u = registry.lookup("UnitTesting", "int8u").unwrap();

        assert_eq!(
            int8u.invoke(&client, from_fn(|_| {}), &args(json!(300))),
            Err(WriteError::Validation(ValidationError::OutOfRange {
                value: 300,
                min: 0,
                max: 255
            }))
        );
        assert_eq!(
            int8u.invoke(&client, from_fn(|_| {}), &HashMap::new()),
            Err(WriteError::Validation(ValidationError::MissingArgument(
                "value".to_string()
            )))
        );

        // A client of another cluster
        let on_off = RecordingClient::new("OnOff");
        assert!(matches!(
            int8u.invoke(&on_off, from_fn(|_| {}), &args(json!(1))),
            Err(WriteError::Validation(ValidationError::UnknownAttribute { .. }))
        ));
        assert!(client.writes.lock().unwrap().is_empty());
        assert!(on_off.writes.lock().unwrap().is_empty());
    }
}
