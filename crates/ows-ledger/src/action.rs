//! The typed actions a change set can carry, and their versioned wire
//! encoding.

use ciborium::Value;
use ows_codec::{canonical, HRP_FN, HRP_GATEWAY};
use ows_identity::{node_id, user_id};

use crate::error::LedgerError;
use crate::ids::generate_resource_id;
use crate::snapshot::{FunctionConfig, GatewayConfig, GatewayEndpointConfig, NodeConfig, Snapshot, UserConfig};

/// One state-changing operation within a change set.
///
/// Each variant corresponds to exactly one `(category, name)` pair known
/// to the v1 decoder table. There is deliberately no action that creates
/// or attaches a non-root policy: in this version, policies only ever
/// come from the root bootstrap.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Action {
    /// Deploys a function.
    AddFunction {
        /// Runtime identifier, e.g. `"nodejs"`.
        runtime: String,
        /// Asset id of the handler code.
        handler_asset_id: String,
    },
    /// Undeploys a function.
    RemoveFunction {
        /// Id of the function to remove.
        fn_id: String,
    },
    /// Opens a new gateway listener.
    AddGateway {
        /// Port the gateway should bind to.
        port: u16,
    },
    /// Attaches a route to an existing gateway.
    AddGatewayEndpoint {
        /// The gateway to attach to.
        gateway_id: String,
        /// HTTP method.
        method: String,
        /// URL path.
        path: String,
        /// The function the route invokes.
        fn_id: String,
    },
    /// Closes a gateway listener.
    RemoveGateway {
        /// Id of the gateway to remove.
        gateway_id: String,
    },
    /// Admits a new peer node.
    AddNode {
        /// The node's raw public key.
        pub_key: [u8; 32],
        /// The node's network address.
        address: String,
        /// The node's gossip/sync port.
        gossip_port: u16,
        /// The node's API port.
        api_port: u16,
    },
    /// Evicts a peer node.
    RemoveNode {
        /// Id of the node to remove.
        node_id: String,
    },
    /// Registers a new non-root user.
    AddUser {
        /// The user's raw public key.
        pub_key: [u8; 32],
    },
}

impl Action {
    /// The action's category, e.g. `"functions"`.
    #[must_use]
    pub const fn category(&self) -> &'static str {
        match self {
            Self::AddFunction { .. } | Self::RemoveFunction { .. } => "functions",
            Self::AddGateway { .. } | Self::AddGatewayEndpoint { .. } | Self::RemoveGateway { .. } => "gateways",
            Self::AddNode { .. } | Self::RemoveNode { .. } => "nodes",
            Self::AddUser { .. } => "permissions",
        }
    }

    /// The action's name within its category, e.g. `"Add"`.
    #[must_use]
    pub const fn name(&self) -> &'static str {
        match self {
            Self::AddFunction { .. } | Self::AddGateway { .. } | Self::AddNode { .. } => "Add",
            Self::RemoveFunction { .. } | Self::RemoveGateway { .. } | Self::RemoveNode { .. } => "Remove",
            Self::AddGatewayEndpoint { .. } => "AddEndpoint",
            Self::AddUser { .. } => "AddUser",
        }
    }

    /// The resource ids this action is evaluated against for
    /// authorization. Pure creation actions with no pre-existing target
    /// are evaluated against the wildcard resource `"*"`; actions on an
    /// existing resource are evaluated against that resource's id.
    #[must_use]
    pub fn resources(&self) -> Vec<String> {
        match self {
            Self::AddFunction { .. } | Self::AddGateway { .. } | Self::AddNode { .. } | Self::AddUser { .. } => {
                vec!["*".to_string()]
            }
            Self::RemoveFunction { fn_id } => vec![fn_id.clone()],
            Self::AddGatewayEndpoint { gateway_id, .. } | Self::RemoveGateway { gateway_id } => {
                vec![gateway_id.clone()]
            }
            Self::RemoveNode { node_id } => vec![node_id.clone()],
        }
    }

    /// Applies this action to `snapshot`, deriving any new resource id
    /// from `prev_id` (the containing change set's `prev`) and `index`
    /// (this action's position within that change set).
    pub fn apply(&self, snapshot: &mut Snapshot, prev_id: &str, index: u64) -> Result<(), LedgerError> {
        match self {
            Self::AddFunction { runtime, handler_asset_id } => {
                let id = generate_resource_id(HRP_FN, prev_id, index)?;
                snapshot.add_function(
                    id,
                    FunctionConfig {
                        runtime: runtime.clone(),
                        handler_asset_id: handler_asset_id.clone(),
                    },
                )
            }
            Self::RemoveFunction { fn_id } => snapshot.remove_function(fn_id),
            Self::AddGateway { port } => {
                let id = generate_resource_id(HRP_GATEWAY, prev_id, index)?;
                snapshot.add_gateway(
                    id,
                    GatewayConfig {
                        port: *port,
                        endpoints: Vec::new(),
                    },
                )
            }
            Self::AddGatewayEndpoint { gateway_id, method, path, fn_id } => snapshot.add_gateway_endpoint(
                gateway_id,
                GatewayEndpointConfig {
                    method: method.clone(),
                    path: path.clone(),
                    fn_id: fn_id.clone(),
                },
            ),
            Self::RemoveGateway { gateway_id } => snapshot.remove_gateway(gateway_id),
            Self::AddNode { pub_key, address, gossip_port, api_port } => {
                let id = node_id(pub_key).map_err(|err| LedgerError::InvariantViolation(err.to_string()))?;
                snapshot.add_node(
                    id,
                    NodeConfig {
                        pub_key: *pub_key,
                        address: address.clone(),
                        gossip_port: *gossip_port,
                        api_port: *api_port,
                    },
                )
            }
            Self::RemoveNode { node_id } => snapshot.remove_node(node_id),
            Self::AddUser { pub_key } => {
                let id = user_id(pub_key).map_err(|err| LedgerError::InvariantViolation(err.to_string()))?;
                snapshot.add_user(
                    id,
                    UserConfig {
                        pub_key: *pub_key,
                        is_root: false,
                        policies: Vec::new(),
                    },
                )
            }
        }
    }

    /// Canonically encodes this action's attributes into the field
    /// layout its `(category, name, version)` decoder expects.
    fn encode_attributes(&self) -> Result<Vec<u8>, LedgerError> {
        let value = match self {
            Self::AddFunction { runtime, handler_asset_id } => map(&[
                (0, Value::Text(runtime.clone())),
                (1, Value::Text(handler_asset_id.clone())),
            ]),
            Self::RemoveFunction { fn_id } => map(&[(0, Value::Text(fn_id.clone()))]),
            Self::AddGateway { port } => map(&[(0, Value::Integer((*port).into()))]),
            Self::AddGatewayEndpoint { gateway_id, method, path, fn_id } => map(&[
                (0, Value::Text(gateway_id.clone())),
                (1, Value::Text(method.clone())),
                (2, Value::Text(path.clone())),
                (3, Value::Text(fn_id.clone())),
            ]),
            Self::RemoveGateway { gateway_id } => map(&[(0, Value::Text(gateway_id.clone()))]),
            Self::AddNode { pub_key, address, gossip_port, api_port } => map(&[
                (0, Value::Bytes(pub_key.to_vec())),
                (1, Value::Text(address.clone())),
                (2, Value::Integer((*gossip_port).into())),
                (3, Value::Integer((*api_port).into())),
            ]),
            Self::RemoveNode { node_id } => map(&[(0, Value::Text(node_id.clone()))]),
            Self::AddUser { pub_key } => map(&[(0, Value::Bytes(pub_key.to_vec()))]),
        };
        canonical::encode(&value).map_err(LedgerError::from)
    }

    /// Builds the outer `{category, name, attributes}` map `Value` for
    /// this action, as embedded directly into a change set's `actions`
    /// array.
    pub(crate) fn to_value(&self) -> Result<Value, LedgerError> {
        let attributes = self.encode_attributes()?;
        Ok(map(&[
            (0, Value::Text(self.category().to_string())),
            (1, Value::Text(self.name().to_string())),
            (2, Value::Bytes(attributes)),
        ]))
    }

    /// Canonically encodes this action into the outer `{category, name,
    /// attributes}` map stored on a change set.
    pub fn encode(&self) -> Result<Vec<u8>, LedgerError> {
        canonical::encode(&self.to_value()?).map_err(LedgerError::from)
    }

    /// Parses an action from its outer `{category, name, attributes}`
    /// map `Value`, looking up the nearest registered attribute decoder
    /// at or below `version`.
    pub(crate) fn from_value(value: &Value, version: u64) -> Result<Self, LedgerError> {
        let entries = map_entries(value)?;
        let category = text_field(entries, 0)?;
        let name = text_field(entries, 1)?;
        let attributes = bytes_field(entries, 2)?;
        decode_attributes(&category, &name, version, &attributes)
    }

    /// Decodes an action from its outer `{category, name, attributes}`
    /// encoding, looking up the nearest registered attribute decoder at
    /// or below `version`.
    pub fn decode(bytes: &[u8], version: u64) -> Result<Self, LedgerError> {
        let value = canonical::decode(bytes).map_err(LedgerError::from)?;
        Self::from_value(&value, version)
    }
}

fn map(entries: &[(u8, Value)]) -> Value {
    Value::Map(
        entries
            .iter()
            .map(|(key, val)| (Value::Integer((*key).into()), val.clone()))
            .collect(),
    )
}

fn map_entries(value: &Value) -> Result<&[(Value, Value)], LedgerError> {
    match value {
        Value::Map(entries) => Ok(entries),
        other => Err(LedgerError::Decode(format!("expected map, got {other:?}"))),
    }
}

fn field<'a>(entries: &'a [(Value, Value)], key: u8) -> Result<&'a Value, LedgerError> {
    entries
        .iter()
        .find(|(k, _)| matches!(k, Value::Integer(n) if *n == key.into()))
        .map(|(_, v)| v)
        .ok_or_else(|| LedgerError::Decode(format!("missing field {key}")))
}

fn text_field(entries: &[(Value, Value)], key: u8) -> Result<String, LedgerError> {
    match field(entries, key)? {
        Value::Text(s) => Ok(s.clone()),
        other => Err(LedgerError::Decode(format!("field {key}: expected text, got {other:?}"))),
    }
}

fn bytes_field(entries: &[(Value, Value)], key: u8) -> Result<Vec<u8>, LedgerError> {
    match field(entries, key)? {
        Value::Bytes(b) => Ok(b.clone()),
        other => Err(LedgerError::Decode(format!("field {key}: expected bytes, got {other:?}"))),
    }
}

fn u16_field(entries: &[(Value, Value)], key: u8) -> Result<u16, LedgerError> {
    match field(entries, key)? {
        Value::Integer(n) => u16::try_from(i128::from(*n))
            .map_err(|_| LedgerError::Decode(format!("field {key}: out of range for u16"))),
        other => Err(LedgerError::Decode(format!("field {key}: expected integer, got {other:?}"))),
    }
}

fn key_field(entries: &[(Value, Value)], key: u8) -> Result<[u8; 32], LedgerError> {
    let bytes = bytes_field(entries, key)?;
    bytes
        .as_slice()
        .try_into()
        .map_err(|_| LedgerError::Decode(format!("field {key}: expected 32 bytes, got {}", bytes.len())))
}

fn decode_attributes(category: &str, name: &str, version: u64, bytes: &[u8]) -> Result<Action, LedgerError> {
    // Only version 1 exists today; a future version would add match arms
    // here rather than branch on `version` inside each arm, keeping every
    // decoder revision visible in one place.
    if version != 1 {
        return Err(LedgerError::NoDecoder {
            category: category.to_string(),
            name: name.to_string(),
            version,
        });
    }
    let value = canonical::decode(bytes).map_err(LedgerError::from)?;
    let entries = map_entries(&value)?;
    match (category, name) {
        ("functions", "Add") => Ok(Action::AddFunction {
            runtime: text_field(entries, 0)?,
            handler_asset_id: text_field(entries, 1)?,
        }),
        ("functions", "Remove") => Ok(Action::RemoveFunction { fn_id: text_field(entries, 0)? }),
        ("gateways", "Add") => Ok(Action::AddGateway { port: u16_field(entries, 0)? }),
        ("gateways", "AddEndpoint") => Ok(Action::AddGatewayEndpoint {
            gateway_id: text_field(entries, 0)?,
            method: text_field(entries, 1)?,
            path: text_field(entries, 2)?,
            fn_id: text_field(entries, 3)?,
        }),
        ("gateways", "Remove") => Ok(Action::RemoveGateway { gateway_id: text_field(entries, 0)? }),
        ("nodes", "Add") => Ok(Action::AddNode {
            pub_key: key_field(entries, 0)?,
            address: text_field(entries, 1)?,
            gossip_port: u16_field(entries, 2)?,
            api_port: u16_field(entries, 3)?,
        }),
        ("nodes", "Remove") => Ok(Action::RemoveNode { node_id: text_field(entries, 0)? }),
        ("permissions", "AddUser") => Ok(Action::AddUser { pub_key: key_field(entries, 0)? }),
        _ => Err(LedgerError::NoDecoder {
            category: category.to_string(),
            name: name.to_string(),
            version,
        }),
    }
}
