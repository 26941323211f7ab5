//! Builders for container, node, parameter, interface and connection
//! management envelopes.

use std::fmt;

use rce_core::Envelope;
use rce_core::constants::control;
use serde::Serialize;
use serde_json::{Map, Value, json};

/// Kind of endpoint interface the cloud engine should create.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub enum InterfaceType {
    /// Calls a ROS service.
    ServiceClient,
    /// Provides a ROS service.
    ServiceProvider,
    /// Publishes on a ROS topic.
    Publisher,
    /// Subscribes to a ROS topic.
    Subscriber,
    /// Converter for a service client.
    ServiceClientConverter,
    /// Converter for a service provider.
    ServiceProviderConverter,
    /// Converter for a publisher.
    PublisherConverter,
    /// Converter for a subscriber.
    SubscriberConverter,
    /// Forwarder for a service client.
    ServiceClientForwarder,
    /// Forwarder for a service provider.
    ServiceProviderForwarder,
    /// Forwarder for a publisher.
    PublisherForwarder,
    /// Forwarder for a subscriber.
    SubscriberForwarder,
}

impl InterfaceType {
    /// Every variant, in wire order.
    pub const ALL: [Self; 12] = [
        Self::ServiceClient,
        Self::ServiceProvider,
        Self::Publisher,
        Self::Subscriber,
        Self::ServiceClientConverter,
        Self::ServiceProviderConverter,
        Self::PublisherConverter,
        Self::SubscriberConverter,
        Self::ServiceClientForwarder,
        Self::ServiceProviderForwarder,
        Self::PublisherForwarder,
        Self::SubscriberForwarder,
    ];

    /// Wire name.
    pub fn as_str(self) -> &'static str {
        match self {
            Self::ServiceClient => "ServiceInterface",
            Self::ServiceProvider => "ServiceProviderInterface",
            Self::Publisher => "PublisherInterface",
            Self::Subscriber => "SubscriberInterface",
            Self::ServiceClientConverter => "ServiceConverter",
            Self::ServiceProviderConverter => "ServiceProviderConverter",
            Self::PublisherConverter => "PublisherConverter",
            Self::SubscriberConverter => "SubscriberConverter",
            Self::ServiceClientForwarder => "ServiceForwarder",
            Self::ServiceProviderForwarder => "ServiceProviderForwarder",
            Self::PublisherForwarder => "PublisherForwarder",
            Self::SubscriberForwarder => "SubscriberForwarder",
        }
    }
}

impl fmt::Display for InterfaceType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Parameter value stored in a container's parameter server.
#[derive(Clone, Debug, PartialEq, Serialize)]
#[serde(untagged)]
pub enum ParamValue {
    /// Integer.
    Int(i64),
    /// Floating point.
    Float(f64),
    /// String.
    Str(String),
    /// Boolean.
    Bool(bool),
}

impl From<i64> for ParamValue {
    fn from(v: i64) -> Self {
        Self::Int(v)
    }
}

impl From<i32> for ParamValue {
    fn from(v: i32) -> Self {
        Self::Int(i64::from(v))
    }
}

impl From<f64> for ParamValue {
    fn from(v: f64) -> Self {
        Self::Float(v)
    }
}

impl From<&str> for ParamValue {
    fn from(v: &str) -> Self {
        Self::Str(v.to_owned())
    }
}

impl From<String> for ParamValue {
    fn from(v: String) -> Self {
        Self::Str(v)
    }
}

impl From<bool> for ParamValue {
    fn from(v: bool) -> Self {
        Self::Bool(v)
    }
}

/// One side of a connection: a bare interface tag or an endpoint-qualified one.
#[derive(Clone, Debug, PartialEq, Eq)]
pub enum InterfaceRef {
    /// Interface tag only.
    Tag(String),
    /// Interface on a specific endpoint.
    Qualified {
        /// Endpoint tag.
        endpoint: String,
        /// Interface tag.
        interface: String,
    },
}

impl InterfaceRef {
    /// Endpoint-qualified reference.
    pub fn qualified(endpoint: impl Into<String>, interface: impl Into<String>) -> Self {
        Self::Qualified {
            endpoint: endpoint.into(),
            interface: interface.into(),
        }
    }
}

impl fmt::Display for InterfaceRef {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Tag(tag) => f.write_str(tag),
            Self::Qualified {
                endpoint,
                interface,
            } => write!(f, "{endpoint}/{interface}"),
        }
    }
}

impl From<&str> for InterfaceRef {
    fn from(tag: &str) -> Self {
        Self::Tag(tag.to_owned())
    }
}

impl From<String> for InterfaceRef {
    fn from(tag: String) -> Self {
        Self::Tag(tag)
    }
}

impl From<(&str, &str)> for InterfaceRef {
    fn from((endpoint, interface): (&str, &str)) -> Self {
        Self::qualified(endpoint, interface)
    }
}

/// ROS node launch description.
#[derive(Clone, Debug, Default, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct NodeSpec {
    /// Container the node runs in.
    pub container_tag: String,
    /// Tag of the node.
    pub node_tag: String,
    /// ROS package.
    pub pkg: String,
    /// Executable within the package.
    pub exe: String,
    /// Command line arguments.
    pub args: String,
    /// ROS node name.
    pub name: String,
    /// ROS namespace.
    pub namespace: String,
}

/// Create a container.
pub fn create_container(container_tag: &str) -> Envelope {
    Envelope::control(
        control::CREATE_CONTAINER,
        json!({ "containerTag": container_tag }),
    )
}

/// Destroy a container.
pub fn destroy_container(container_tag: &str) -> Envelope {
    Envelope::control(
        control::DESTROY_CONTAINER,
        json!({ "containerTag": container_tag }),
    )
}

/// Launch a node inside a container.
pub fn add_node(node: &NodeSpec) -> Envelope {
    configure_component("addNodes", json!(node))
}

/// Stop a node.
pub fn remove_node(container_tag: &str, node_tag: &str) -> Envelope {
    configure_component(
        "removeNodes",
        json!({ "containerTag": container_tag, "nodeTag": node_tag }),
    )
}

/// Set a parameter in a container.
pub fn add_parameter(container_tag: &str, name: &str, value: impl Into<ParamValue>) -> Envelope {
    let value: ParamValue = value.into();
    configure_component(
        "setParam",
        json!({ "containerTag": container_tag, "name": name, "value": value }),
    )
}

/// Delete a parameter from a container.
pub fn remove_parameter(container_tag: &str, name: &str) -> Envelope {
    configure_component(
        "deleteParam",
        json!({ "containerTag": container_tag, "name": name }),
    )
}

/// Add an interface to an endpoint. `addr` is empty for the default address.
pub fn add_interface(
    endpoint_tag: &str,
    interface_tag: &str,
    interface_type: InterfaceType,
    class_name: &str,
    addr: &str,
) -> Envelope {
    configure_component(
        "addInterfaces",
        json!({
            "endpointTag": endpoint_tag,
            "interfaceTag": interface_tag,
            "interfaceType": interface_type.as_str(),
            "className": class_name,
            "addr": addr,
        }),
    )
}

/// Remove an interface from an endpoint.
pub fn remove_interface(endpoint_tag: &str, interface_tag: &str) -> Envelope {
    configure_component(
        "removeInterfaces",
        json!({ "endpointTag": endpoint_tag, "interfaceTag": interface_tag }),
    )
}

/// Connect two interfaces.
pub fn add_connection(a: &InterfaceRef, b: &InterfaceRef) -> Envelope {
    configure_connection("connect", a, b)
}

/// Disconnect two interfaces.
pub fn remove_connection(a: &InterfaceRef, b: &InterfaceRef) -> Envelope {
    configure_connection("disconnect", a, b)
}

/// Wrap one entry as `{kind: [entry]}`.
fn batch(kind: &str, entry: Value) -> Value {
    let mut data = Map::new();
    let _ = data.insert(kind.to_owned(), Value::Array(vec![entry]));
    Value::Object(data)
}

fn configure_component(kind: &str, component: Value) -> Envelope {
    Envelope::control(control::CONFIGURE_COMPONENT, batch(kind, component))
}

fn configure_connection(kind: &str, a: &InterfaceRef, b: &InterfaceRef) -> Envelope {
    Envelope::control(
        control::CONFIGURE_CONNECTION,
        batch(kind, json!({ "tagA": a.to_string(), "tagB": b.to_string() })),
    )
}

// ─────────────────────────────────────────────────────────────────────────────
// Tests
// ─────────────────────────────────────────────────────────────────────────────
