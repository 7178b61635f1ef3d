//! The in-memory projection of a validated ledger.

use std::collections::HashMap;

use ows_codec::LedgerVersion;
use ows_identity::user_id;

use crate::error::LedgerError;
use crate::policy::Policy;

/// Configuration of a deployed function.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FunctionConfig {
    /// The function runtime, e.g. `"nodejs"`.
    pub runtime: String,
    /// The asset id of the function's handler code.
    pub handler_asset_id: String,
}

/// One HTTP route attached to a gateway.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct GatewayEndpointConfig {
    /// HTTP method, e.g. `"GET"`.
    pub method: String,
    /// URL path.
    pub path: String,
    /// The function id invoked for this route.
    pub fn_id: String,
}

/// Configuration of an HTTP gateway.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct GatewayConfig {
    /// The TCP port the gateway listens on.
    pub port: u16,
    /// The gateway's endpoints.
    pub endpoints: Vec<GatewayEndpointConfig>,
}

/// Configuration of a peer node.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct NodeConfig {
    /// The node's raw Ed25519 public key.
    pub pub_key: [u8; 32],
    /// The node's network address (hostname or IP).
    pub address: String,
    /// The port the node's gossip/sync listener binds to.
    pub gossip_port: u16,
    /// The port the node's API listener binds to.
    pub api_port: u16,
}

/// Configuration of a registered user.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct UserConfig {
    /// The user's raw Ed25519 public key.
    pub pub_key: [u8; 32],
    /// Root users implicitly hold the all-allow policy forever and cannot
    /// be removed.
    pub is_root: bool,
    /// Ids of policies attached to this user (only meaningful for
    /// non-root users).
    pub policies: Vec<String>,
}

/// The typed state derived by replaying a ledger's change sets in order.
#[derive(Debug, Clone)]
pub struct Snapshot {
    /// The ledger version this snapshot was built under.
    pub version: LedgerVersion,
    /// Id of the most recently applied change set.
    pub head: String,
    /// Deployed functions, keyed by function id.
    pub functions: HashMap<String, FunctionConfig>,
    /// HTTP gateways, keyed by gateway id.
    pub gateways: HashMap<String, GatewayConfig>,
    /// Peer nodes, keyed by node id.
    pub nodes: HashMap<String, NodeConfig>,
    /// Registered users, keyed by user id.
    pub users: HashMap<String, UserConfig>,
    /// Stored policies, keyed by policy id. Empty in v1: no action
    /// currently creates non-root policies, but the projection exists so
    /// future actions can populate it without a snapshot-shape change.
    pub policies: HashMap<String, Policy>,
}

impl Snapshot {
    /// Builds an empty snapshot at the given ledger version.
    #[must_use]
    pub fn new(version: LedgerVersion) -> Self {
        Self {
            version,
            head: String::new(),
            functions: HashMap::new(),
            gateways: HashMap::new(),
            nodes: HashMap::new(),
            users: HashMap::new(),
            policies: HashMap::new(),
        }
    }

    /// Adds a function. Fails if `id` already exists.
    pub fn add_function(&mut self, id: String, config: FunctionConfig) -> Result<(), LedgerError> {
        if self.functions.contains_key(&id) {
            return Err(LedgerError::InvariantViolation(format!(
                "function resource {id} already exists"
            )));
        }
        self.functions.insert(id, config);
        Ok(())
    }

    /// Removes a function. Fails if `id` does not exist.
    pub fn remove_function(&mut self, id: &str) -> Result<(), LedgerError> {
        self.functions
            .remove(id)
            .map(|_| ())
            .ok_or_else(|| LedgerError::InvariantViolation(format!("function {id} doesn't exist")))
    }

    /// Returns the map of every port currently claimed by a gateway or a
    /// node's gossip/API port, to the resource id that claims it. Used to
    /// enforce that the port space is bijective.
    #[must_use]
    pub fn ports(&self) -> HashMap<u16, String> {
        let mut ports = HashMap::new();
        for (id, gateway) in &self.gateways {
            ports.insert(gateway.port, id.clone());
        }
        for (id, node) in &self.nodes {
            ports.insert(node.gossip_port, id.clone());
            ports.insert(node.api_port, id.clone());
        }
        ports
    }

    /// Adds a gateway. Fails if `id` already exists or `config.port` is
    /// already claimed by any gateway or any node's gossip/API port.
    pub fn add_gateway(&mut self, id: String, config: GatewayConfig) -> Result<(), LedgerError> {
        if self.gateways.contains_key(&id) {
            return Err(LedgerError::InvariantViolation(format!(
                "gateway resource {id} already exists"
            )));
        }
        if let Some(owner) = self.ports().get(&config.port) {
            return Err(LedgerError::InvariantViolation(format!(
                "port {} already used by {owner}",
                config.port
            )));
        }
        self.gateways.insert(id, config);
        Ok(())
    }

    /// Removes a gateway. Fails if `id` does not exist.
    pub fn remove_gateway(&mut self, id: &str) -> Result<(), LedgerError> {
        self.gateways
            .remove(id)
            .map(|_| ())
            .ok_or_else(|| LedgerError::InvariantViolation(format!("gateway {id} doesn't exist")))
    }

    /// Adds an endpoint to an existing gateway. Fails if the gateway does
    /// not exist, the referenced function does not exist, or an endpoint
    /// with the same `(method, path)` already exists on that gateway.
    pub fn add_gateway_endpoint(
        &mut self,
        gateway_id: &str,
        endpoint: GatewayEndpointConfig,
    ) -> Result<(), LedgerError> {
        if !self.functions.contains_key(&endpoint.fn_id) {
            return Err(LedgerError::InvariantViolation(format!(
                "function {} doesn't exist",
                endpoint.fn_id
            )));
        }
        let gateway = self.gateways.get_mut(gateway_id).ok_or_else(|| {
            LedgerError::InvariantViolation(format!("gateway {gateway_id} doesn't exist"))
        })?;
        if gateway
            .endpoints
            .iter()
            .any(|ep| ep.method == endpoint.method && ep.path == endpoint.path)
        {
            return Err(LedgerError::InvariantViolation(format!(
                "duplicate endpoint for gateway {gateway_id} (method={}, path={})",
                endpoint.method, endpoint.path
            )));
        }
        gateway.endpoints.push(endpoint);
        Ok(())
    }

    /// Removes the endpoint matching `(method, path)` from a gateway.
    /// Fails if the gateway or the endpoint does not exist.
    pub fn remove_gateway_endpoint(
        &mut self,
        gateway_id: &str,
        method: &str,
        path: &str,
    ) -> Result<(), LedgerError> {
        let gateway = self.gateways.get_mut(gateway_id).ok_or_else(|| {
            LedgerError::InvariantViolation(format!("gateway {gateway_id} doesn't exist"))
        })?;
        let before = gateway.endpoints.len();
        gateway
            .endpoints
            .retain(|ep| !(ep.method == method && ep.path == path));
        if gateway.endpoints.len() == before {
            return Err(LedgerError::InvariantViolation(format!(
                "gateway endpoint {method} {path} of {gateway_id} doesn't exist"
            )));
        }
        Ok(())
    }

    /// Adds a node. Fails if `id` already exists or either of its ports
    /// collides with any existing gateway or node port.
    pub fn add_node(&mut self, id: String, config: NodeConfig) -> Result<(), LedgerError> {
        if self.nodes.contains_key(&id) {
            return Err(LedgerError::InvariantViolation(format!(
                "node {id} already exists"
            )));
        }
        let ports = self.ports();
        if let Some(owner) = ports.get(&config.gossip_port) {
            return Err(LedgerError::InvariantViolation(format!(
                "port {} already used by {owner}",
                config.gossip_port
            )));
        }
        if let Some(owner) = ports.get(&config.api_port) {
            return Err(LedgerError::InvariantViolation(format!(
                "port {} already used by {owner}",
                config.api_port
            )));
        }
        self.nodes.insert(id, config);
        Ok(())
    }

    /// Removes a node. Fails if `id` does not exist.
    pub fn remove_node(&mut self, id: &str) -> Result<(), LedgerError> {
        self.nodes
            .remove(id)
            .map(|_| ())
            .ok_or_else(|| LedgerError::InvariantViolation(format!("node {id} doesn't exist")))
    }

    /// Adds a user. Fails if `id` already exists.
    pub fn add_user(&mut self, id: String, config: UserConfig) -> Result<(), LedgerError> {
        if self.users.contains_key(&id) {
            return Err(LedgerError::InvariantViolation(format!(
                "user {id} already exists"
            )));
        }
        self.users.insert(id, config);
        Ok(())
    }

    /// Removes a non-root user. Fails if `id` does not exist or belongs
    /// to a root user.
    pub fn remove_user(&mut self, id: &str) -> Result<(), LedgerError> {
        match self.users.get(id) {
            None => Err(LedgerError::InvariantViolation(format!(
                "user {id} doesn't exist"
            ))),
            Some(config) if config.is_root => Err(LedgerError::InvariantViolation(format!(
                "can't remove root user {id}"
            ))),
            Some(_) => {
                self.users.remove(id);
                Ok(())
            }
        }
    }

    /// Registers every key in `root_keys` as a root user. Called exactly
    /// once, while validating the initial configuration.
    pub fn add_root_users(&mut self, root_keys: &[[u8; 32]]) -> Result<(), LedgerError> {
        for key in root_keys {
            let id = user_id(key).map_err(|err| LedgerError::InvariantViolation(err.to_string()))?;
            self.add_user(
                id,
                UserConfig {
                    pub_key: *key,
                    is_root: true,
                    policies: Vec::new(),
                },
            )?;
        }
        Ok(())
    }

    /// Returns the root policy for every root signer and the union of
    /// attached policies for non-root signers among `signers`.
    pub fn user_policies(&self, signers: &[[u8; 32]]) -> Result<Vec<Policy>, LedgerError> {
        let mut policies = Vec::new();
        for key in signers {
            let id = user_id(key).map_err(|err| LedgerError::InvariantViolation(err.to_string()))?;
            let Some(config) = self.users.get(&id) else {
                continue;
            };
            if config.is_root {
                policies.push(Policy::root());
                continue;
            }
            for policy_id in &config.policies {
                let policy = self
                    .policies
                    .get(policy_id)
                    .ok_or_else(|| LedgerError::NotFound(format!("policy {policy_id} not found")))?;
                policies.push(policy.clone());
            }
        }
        Ok(policies)
    }
}

#[cfg(test)]
mod tests {
    #![allow(clippy::unwrap_used)]
    #![allow(clippy::expect_used)]

    use super::*;

    fn fn_config() -> FunctionConfig {
        FunctionConfig {
            runtime: "nodejs".to_string(),
            handler_asset_id: "asset1xyz".to_string(),
        }
    }

    #[test]
    fn add_function_rejects_duplicate_id() {
        let mut snapshot = Snapshot::new(LedgerVersion::CURRENT);
        snapshot
            .add_function("fn1a".to_string(), fn_config())
            .expect("first add");
        assert!(snapshot.add_function("fn1a".to_string(), fn_config()).is_err());
    }

    #[test]
    fn add_gateway_rejects_port_collision_with_node() {
        let mut snapshot = Snapshot::new(LedgerVersion::CURRENT);
        snapshot
            .add_node(
                "node1a".to_string(),
                NodeConfig {
                    pub_key: [1u8; 32],
                    address: "10.0.0.1".to_string(),
                    gossip_port: 4000,
                    api_port: 4001,
                },
            )
            .expect("add node");
        let err = snapshot.add_gateway(
            "gateway1a".to_string(),
            GatewayConfig {
                port: 4001,
                endpoints: Vec::new(),
            },
        );
        assert!(err.is_err());
    }

    #[test]
    fn add_node_rejects_port_collision_with_gateway() {
        let mut snapshot = Snapshot::new(LedgerVersion::CURRENT);
        snapshot
            .add_gateway(
                "gateway1a".to_string(),
                GatewayConfig {
                    port: 8080,
                    endpoints: Vec::new(),
                },
            )
            .expect("add gateway");
        let err = snapshot.add_node(
            "node1a".to_string(),
            NodeConfig {
                pub_key: [2u8; 32],
                address: "10.0.0.2".to_string(),
                gossip_port: 8080,
                api_port: 9000,
            },
        );
        assert!(err.is_err(), "tightened invariant: node ports must also be collision-free");
    }

    #[test]
    fn add_gateway_endpoint_rejects_dangling_function() {
        let mut snapshot = Snapshot::new(LedgerVersion::CURRENT);
        snapshot
            .add_gateway(
                "gateway1a".to_string(),
                GatewayConfig {
                    port: 8080,
                    endpoints: Vec::new(),
                },
            )
            .expect("add gateway");
        let err = snapshot.add_gateway_endpoint(
            "gateway1a",
            GatewayEndpointConfig {
                method: "GET".to_string(),
                path: "/".to_string(),
                fn_id: "fn1missing".to_string(),
            },
        );
        assert!(err.is_err());
    }

    #[test]
    fn remove_user_rejects_root_user() {
        let mut snapshot = Snapshot::new(LedgerVersion::CURRENT);
        snapshot.add_root_users(&[[9u8; 32]]).expect("add root");
        let id = user_id(&[9u8; 32]).expect("user id");
        assert!(snapshot.remove_user(&id).is_err());
    }

    #[test]
    fn user_policies_returns_root_policy_for_root_signer() {
        let mut snapshot = Snapshot::new(LedgerVersion::CURRENT);
        snapshot.add_root_users(&[[4u8; 32]]).expect("add root");
        let policies = snapshot.user_policies(&[[4u8; 32]]).expect("policies");
        assert_eq!(policies.len(), 1);
        assert!(policies[0].allows_all("nodes", "Add", &["*".to_string()]));
    }

    #[test]
    fn user_policies_is_empty_for_unknown_signer() {
        let snapshot = Snapshot::new(LedgerVersion::CURRENT);
        let policies = snapshot.user_policies(&[[7u8; 32]]).expect("policies");
        assert!(policies.is_empty());
    }
}
