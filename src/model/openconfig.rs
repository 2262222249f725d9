//! Demo OpenConfig device model.
//!
//! Covers the subset of the openconfig-interfaces, openconfig-openflow,
//! openconfig-platform and openconfig-system modules that the simulator
//! serves, including the datetime and synthetic-telemetry paths.

use super::schema::LeafKind;
use super::schema::SchemaNode;
use super::Model;
use crate::proto::gnmi::ModelData;

/// OpenconfigInterfacesModel is the openconfig YANG model for interfaces.
pub const OPENCONFIG_INTERFACES_MODEL: &str = "openconfig-interfaces";
/// OpenconfigOpenflowModel is the openconfig YANG model for openflow.
pub const OPENCONFIG_OPENFLOW_MODEL: &str = "openconfig-openflow";
/// OpenconfigPlatformModel is the openconfig YANG model for platform.
pub const OPENCONFIG_PLATFORM_MODEL: &str = "openconfig-platform";
/// OpenconfigSystemModel is the openconfig YANG model for system.
pub const OPENCONFIG_SYSTEM_MODEL: &str = "openconfig-system";

const MODEL_ORGANIZATION: &str = "OpenConfig working group";

const OPENFLOW_FAILURE_MODE: &[&str] = &["SECURE", "STANDALONE"];
const OPENFLOW_TRANSPORT: &[&str] = &["TLS", "TCP"];
const INTERFACE_ADMIN_STATUS: &[&str] = &["UP", "DOWN", "TESTING"];
const INTERFACE_OPER_STATUS: &[&str] = &[
    "UP",
    "DOWN",
    "TESTING",
    "UNKNOWN",
    "DORMANT",
    "NOT_PRESENT",
    "LOWER_LAYER_DOWN",
];

/// Metadata of the supported models, as advertised by Capabilities.
pub fn model_data() -> Vec<ModelData> {
    [
        (OPENCONFIG_INTERFACES_MODEL, "2017-07-14"),
        (OPENCONFIG_OPENFLOW_MODEL, "2017-06-01"),
        (OPENCONFIG_PLATFORM_MODEL, "2016-12-22"),
        (OPENCONFIG_SYSTEM_MODEL, "2017-07-06"),
    ]
    .into_iter()
    .map(|(name, version)| ModelData {
        name: name.to_string(),
        organization: MODEL_ORGANIZATION.to_string(),
        version: version.to_string(),
    })
    .collect()
}

/// Builds the demo device model.
pub fn openconfig_model() -> Model {
    Model::new(model_data(), device_schema())
}

fn device_schema() -> SchemaNode {
    SchemaNode::container("device").with_children(vec![
        interfaces_schema().with_module(OPENCONFIG_INTERFACES_MODEL),
        components_schema().with_module(OPENCONFIG_PLATFORM_MODEL),
        system_schema().with_module(OPENCONFIG_SYSTEM_MODEL),
    ])
}

fn interfaces_schema() -> SchemaNode {
    SchemaNode::container("interfaces").with_children(vec![SchemaNode::list(
        "interface",
        &["name"],
    )
    .with_children(vec![
        SchemaNode::leaf("name", LeafKind::String),
        SchemaNode::container("config").with_children(vec![
            SchemaNode::leaf("name", LeafKind::String),
            SchemaNode::leaf("description", LeafKind::String),
            SchemaNode::leaf("enabled", LeafKind::Bool),
            SchemaNode::leaf("mtu", LeafKind::Uint),
        ]),
        SchemaNode::container("state").with_children(vec![
            SchemaNode::leaf("name", LeafKind::String),
            SchemaNode::leaf("description", LeafKind::String),
            SchemaNode::leaf("enabled", LeafKind::Bool),
            SchemaNode::leaf("mtu", LeafKind::Uint),
            SchemaNode::leaf("ifindex", LeafKind::Uint),
            SchemaNode::leaf("admin-status", LeafKind::Enumeration(INTERFACE_ADMIN_STATUS)),
            SchemaNode::leaf("oper-status", LeafKind::Enumeration(INTERFACE_OPER_STATUS)),
        ]),
    ])])
}

fn components_schema() -> SchemaNode {
    SchemaNode::container("components").with_children(vec![SchemaNode::list(
        "component",
        &["name"],
    )
    .with_children(vec![
        SchemaNode::leaf("name", LeafKind::String),
        SchemaNode::container("config")
            .with_children(vec![SchemaNode::leaf("name", LeafKind::String)]),
        SchemaNode::container("state").with_children(vec![
            SchemaNode::leaf("name", LeafKind::String),
            SchemaNode::leaf("id", LeafKind::String),
            SchemaNode::leaf("description", LeafKind::String),
            SchemaNode::leaf("mfg-name", LeafKind::String),
            SchemaNode::leaf("serial-no", LeafKind::String),
            SchemaNode::leaf("part-no", LeafKind::String),
        ]),
    ])])
}

fn system_schema() -> SchemaNode {
    SchemaNode::container("system").with_children(vec![
        SchemaNode::container("config").with_children(vec![
            SchemaNode::leaf("hostname", LeafKind::String),
            SchemaNode::leaf("domain-name", LeafKind::String),
            SchemaNode::leaf("login-banner", LeafKind::String),
            SchemaNode::leaf("motd-banner", LeafKind::String),
        ]),
        SchemaNode::container("state").with_children(vec![
            SchemaNode::leaf("hostname", LeafKind::String),
            SchemaNode::leaf("domain-name", LeafKind::String),
            SchemaNode::leaf("login-banner", LeafKind::String),
            SchemaNode::leaf("motd-banner", LeafKind::String),
            SchemaNode::leaf("current-datetime", LeafKind::String),
            SchemaNode::leaf("boot-time", LeafKind::Uint),
        ]),
        SchemaNode::container("clock").with_children(vec![
            SchemaNode::container("config")
                .with_children(vec![SchemaNode::leaf("timezone-name", LeafKind::String)]),
            SchemaNode::container("state")
                .with_children(vec![SchemaNode::leaf("timezone-name", LeafKind::String)]),
        ]),
        openflow_schema(),
    ])
}

fn openflow_schema() -> SchemaNode {
    let agent_leaves = || {
        vec![
            SchemaNode::leaf("datapath-id", LeafKind::String),
            SchemaNode::leaf("failure-mode", LeafKind::Enumeration(OPENFLOW_FAILURE_MODE)),
            SchemaNode::leaf("backoff-interval", LeafKind::Uint),
            SchemaNode::leaf("max-backoff", LeafKind::Uint),
            SchemaNode::leaf("inactivity-probe", LeafKind::Uint),
        ]
    };
    let connection_leaves = || {
        vec![
            SchemaNode::leaf("aux-id", LeafKind::Uint),
            SchemaNode::leaf("address", LeafKind::String),
            SchemaNode::leaf("port", LeafKind::Uint),
            SchemaNode::leaf("priority", LeafKind::Uint),
            SchemaNode::leaf("source-interface", LeafKind::String),
            SchemaNode::leaf("transport", LeafKind::Enumeration(OPENFLOW_TRANSPORT)),
        ]
    };
    SchemaNode::container("openflow").with_children(vec![
        SchemaNode::container("agent").with_children(vec![
            SchemaNode::container("config").with_children(agent_leaves()),
            SchemaNode::container("state").with_children(agent_leaves()),
        ]),
        SchemaNode::container("controllers").with_children(vec![SchemaNode::list(
            "controller",
            &["name"],
        )
        .with_children(vec![
            SchemaNode::leaf("name", LeafKind::String),
            SchemaNode::container("config")
                .with_children(vec![SchemaNode::leaf("name", LeafKind::String)]),
            SchemaNode::container("state")
                .with_children(vec![SchemaNode::leaf("name", LeafKind::String)]),
            SchemaNode::container("connections").with_children(vec![SchemaNode::list(
                "connection",
                &["aux-id"],
            )
            .with_children(vec![
                SchemaNode::leaf("aux-id", LeafKind::Uint),
                SchemaNode::container("config").with_children(connection_leaves()),
                SchemaNode::container("state").with_children({
                    let mut leaves = connection_leaves();
                    leaves.push(SchemaNode::leaf("connected", LeafKind::Bool));
                    leaves
                }),
            ])]),
        ])]),
    ])
}
