use std::time::Duration;

use serde_json::Value;

use crate::{
    builder::EncodedWrite,
    callback::WriteCallback,
    error::{SessionError, ValidationError, WriteError},
    pending::CorrelationId,
    registry::WriteRegistry,
    schema::ClusterSchema,
    session::Session,
};

/// One cluster on one endpoint of a remote node, as seen by a client.
///
/// Writes looked up by name are handed to this trait, so anything able to
/// submit an encoded write can stand behind a cluster.
pub trait ClusterClient {
    fn endpoint_id(&self) -> u16;
    fn cluster(&self) -> &'static ClusterSchema;
    /// Window to request ahead of writes to timed attributes
    fn timed_write_expiry(&self) -> Duration;
    fn submit_write(
        &self,
        write: EncodedWrite,
        callback: Box<dyn WriteCallback>,
    ) -> Result<CorrelationId, SessionError>;
}

/// A cluster reached through a [`Session`].
#[derive(Debug, Clone)]
pub struct ClusterHandle {
    session: Session,
    endpoint_id: u16,
    cluster: &'static ClusterSchema,
}

impl ClusterHandle {
    pub fn new(session: Session, endpoint_id: u16, cluster: &'static ClusterSchema) -> Self {
        Self {
            session,
            endpoint_id,
            cluster,
        }
    }

    pub fn session(&self) -> &Session {
        &self.session
    }

    /// Write `value` to the attribute named `attribute`, validated against
    /// the schema.
    pub fn write_attribute(
        &self,
        attribute: &str,
        value: &Value,
        callback: Box<dyn WriteCallback>,
    ) -> Result<CorrelationId, WriteError> {
        let interaction = WriteRegistry::global()
            .lookup(self.cluster.name, attribute)
            .ok_or_else(|| ValidationError::UnknownAttribute {
                cluster: self.cluster.name.to_string(),
                attribute: attribute.to_string(),
            })?;
        interaction.invoke_value(self, callback, value)
    }
}

impl ClusterClient for ClusterHandle {
    fn endpoint_id(&self) -> u16 {
        self.endpoint_id
    }

    fn cluster(&self) -> &'static ClusterSchema {
        self.cluster
    }

    fn timed_write_expiry(&self) -> Duration {
        self.session.config().timed_write_expiry()
    }

    fn submit_write(
        &self,
        write: EncodedWrite,
        callback: Box<dyn WriteCallback>,
    ) -> Result<CorrelationId, SessionError> {
        self.session.submit(write, callback, None)
    }
}

#[cfg(test)]
mod tests {
    use serde_json::json;

    use super::*;
    use crate::{
        callback::completion,
        config::SessionConfig,
        data_model::AttributePath,
        interaction_model::WriteRequestMessage,
        message::Message,
        schema::ON_OFF,
        transport::{FrameSource, Link, MemoryLink},
    };

    #[tokio::test]
    async fn test_write_attribute() {
        let (link, node) = MemoryLink::pair();
        let (_node_sink, mut node_source) = node.split();
        let session = Session::connect(0x2A, link, SessionConfig::default());
        let on_off = ClusterHandle::new(session, 1, &ON_OFF);

        let (callback, _completion) = completion();
        on_off
            .write_attribute("onTime", &json!(600), callback)
            .unwrap();

        let frame = node_source.recv_frame().await.unwrap().unwrap();
        let message = Message::decode(&frame).unwrap();
        let request = WriteRequestMessage::from_tlv(&message.payload).unwrap();
        assert_eq!(request.write_requests.len(), 1);
        assert_eq!(
            request.write_requests[0].path.to_path(),
            Some(AttributePath::new(1, 0x0006, 0x4001))
        );
        assert!(!request.timed_request);
    }

    #[tokio::test]
    async fn test_unknown_attribute() {
        let (link, _node) = MemoryLink::pair();
        let session = Session::connect(0x2A, link, SessionConfig::default());
        let on_off = ClusterHandle::new(session.clone(), 1, &ON_OFF);

        let (callback, _completion) = completion();
        let error = on_off
            .write_attribute("brightness", &json!(1), callback)
            .unwrap_err();
        assert!(matches!(
            error,
            WriteError::Validation(ValidationError::UnknownAttribute { .. })
        ));
        assert_eq!(session.pending_count(), 0);
    }
}
