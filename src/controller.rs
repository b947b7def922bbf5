use std::{
    collections::HashMap,
    sync::{PoisonError, RwLock, RwLockReadGuard, RwLockWriteGuard},
};

use log::info;
use serde_json::Value;

use crate::{
    callback::{CallbackFactory, WriteCallback},
    cluster::ClusterHandle,
    config::SessionConfig,
    error::{SessionError, ValidationError, WriteError},
    pending::CorrelationId,
    registry::{WriteInteraction, WriteRegistry},
    schema,
    session::Session,
    transport::Link,
};

/// Keeps one session per remote node and routes writes to them by node id.
/// Sessions are independent of each other.
#[derive(Debug)]
pub struct Controller {
    config: SessionConfig,
    registry: &'static WriteRegistry,
    sessions: RwLock<HashMap<u64, Session>>,
}

impl Controller {
    pub fn new(config: SessionConfig) -> Self {
        Self {
            config,
            registry: WriteRegistry::global(),
            sessions: RwLock::new(HashMap::new()),
        }
    }

    fn sessions(&self) -> RwLockReadGuard<'_, HashMap<u64, Session>> {
        self.sessions.read().unwrap_or_else(PoisonError::into_inner)
    }

    fn sessions_mut(&self) -> RwLockWriteGuard<'_, HashMap<u64, Session>> {
        self.sessions.write().unwrap_or_else(PoisonError::into_inner)
    }

    pub fn config(&self) -> &SessionConfig {
        &self.config
    }

    pub fn registry(&self) -> &'static WriteRegistry {
        self.registry
    }

    /// Open a session with `node_id` over `link`, closing any session the
    /// node already had.
    pub fn connect<L: Link>(&self, node_id: u64, link: L) -> Session {
        let session = Session::connect(node_id, link, self.config.clone());
        let previous = self.sessions_mut().insert(node_id, session.clone());
        if let Some(previous) = previous {
            info!("Replacing session with node {node_id:#018x}");
            previous.close();
        }
        session
    }

    /// Open a session with `node_id` over UDP, from an ephemeral local port.
    #[cfg(feature = "udp")]
    pub async fn connect_udp(
        &self,
        node_id: u64,
        peer_address: std::net::SocketAddr,
    ) -> std::io::Result<Session> {
        use std::net::{Ipv4Addr, Ipv6Addr, SocketAddr};

        let local_address: SocketAddr = if peer_address.is_ipv4() {
            (Ipv4Addr::UNSPECIFIED, 0).into()
        } else {
            (Ipv6Addr::UNSPECIFIED, 0).into()
        };
        let link = crate::transport::UdpLink::connect(local_address, peer_address).await?;
        Ok(self.connect(node_id, link))
    }

    pub fn session(&self, node_id: u64) -> Result<Session, SessionError> {
        self.sessions()
            .get(&node_id)
            .cloned()
            .ok_or(SessionError::UnknownNode(node_id))
    }

    pub fn node_ids(&self) -> Vec<u64> {
        let mut node_ids: Vec<_> = self.sessions().keys().copied().collect();
        node_ids.sort_unstable();
        node_ids
    }

    pub fn cluster(
        &self,
        node_id: u64,
        endpoint_id: u16,
        cluster: &str,
    ) -> Result<ClusterHandle, WriteError> {
        let schema = schema::cluster_by_name(cluster)
            .ok_or_else(|| ValidationError::UnknownCluster(cluster.to_string()))?;
        Ok(ClusterHandle::new(self.session(node_id)?, endpoint_id, schema))
    }

    fn interaction(
        &self,
        cluster: &str,
        name: &str,
    ) -> Result<&'static WriteInteraction, WriteError> {
        self.registry.lookup(cluster, name).ok_or_else(|| {
            ValidationError::UnknownAttribute {
                cluster: cluster.to_string(),
                attribute: name.to_string(),
            }
            .into()
        })
    }

    /// Write an attribute named by cluster and write name, with arguments
    /// by name.
    pub fn write_attribute(
        &self,
        node_id: u64,
        endpoint_id: u16,
        cluster: &str,
        name: &str,
        args: &HashMap<String, Value>,
        callback: Box<dyn WriteCallback>,
    ) -> Result<CorrelationId, WriteError> {
        let interaction = self.interaction(cluster, name)?;
        let handle = self.cluster(node_id, endpoint_id, cluster)?;
        interaction.invoke(&handle, callback, args)
    }

    /// Like [`Self::write_attribute`] with a callback made by `factory`.
    pub fn write_attribute_with_default(
        &self,
        node_id: u64,
        endpoint_id: u16,
        cluster: &str,
        name: &str,
        args: &HashMap<String, Value>,
        factory: &dyn CallbackFactory,
    ) -> Result<CorrelationId, WriteError> {
        let interaction = self.interaction(cluster, name)?;
        let handle = self.cluster(node_id, endpoint_id, cluster)?;
        interaction.invoke_with_default(&handle, factory, args)
    }

    /// Close the session with `node_id`. Its pending writes fail with
    /// [`WriteError::SessionClosed`].
    pub fn disconnect(&self, node_id: u64) -> bool {
        let session = self.sessions_mut().remove(&node_id);
        match session {
            Some(session) => {
                session.close();
                true
            }
            None => false,
        }
    }
}

impl Drop for Controller {
    fn drop(&mut self) {
        for (_, session) in self.sessions_mut().drain() {
            session.close();
        }
    }
}
