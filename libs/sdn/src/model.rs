//! Wire types for the VSD-style SDN REST API: entities are addressed by a
//! server-assigned `ID`, identified for idempotency purposes by `name`, and
//! JSON keys use the API's native camelCase rather than Rust's.

use serde::{Deserialize, Serialize};

/// A tenant-level container for one or more [`Domain`]s.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Enterprise {
    #[serde(rename = "ID")]
    pub id: String,
    pub name: String,
}

/// Instantiated from a [`DomainTemplate`]; the top-level routing context for
/// a cluster's [`Zone`]s.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Domain {
    #[serde(rename = "ID")]
    pub id: String,
    pub name: String,
    #[serde(rename = "templateID")]
    pub template_id: String,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct DomainTemplate {
    #[serde(rename = "ID")]
    pub id: String,
    pub name: String,
}

/// One per Kubernetes namespace (spec: `"K8S namespace " + name`).
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Zone {
    #[serde(rename = "ID")]
    pub id: String,
    pub name: String,
}

/// A routable prefix inside a [`Zone`], hosting [`Container`] interfaces.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Subnet {
    #[serde(rename = "ID")]
    pub id: String,
    pub name: String,
    pub address: String,
    pub netmask: String,
}

/// The SDN-side record of a pod. Carries exactly one interface in this
/// system (§4.1 `ContainerIPandMask`'s structural precondition).
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Container {
    #[serde(rename = "ID", default, skip_serializing_if = "String::is_empty")]
    pub id: String,
    pub name: String,
    #[serde(rename = "UUID")]
    pub uuid: String,
    #[serde(rename = "orchestrationID")]
    pub orchestration_id: String,
    pub interfaces: Vec<ContainerInterface>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ContainerInterface {
    #[serde(rename = "MAC")]
    pub mac: String,
    #[serde(rename = "IPAddress")]
    pub ip: String,
    pub netmask: String,
    #[serde(rename = "attachedNetworkID")]
    pub attached_network_id: String,
}

/// A named singleton prefix representing a Service `clusterIP`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct NetworkMacro {
    #[serde(rename = "ID")]
    pub id: String,
    pub name: String,
    pub address: String,
    pub netmask: String,
}

/// A namespace-scoped collection of [`NetworkMacro`]s (spec: `"K8S services
/// in namespace " + namespace`).
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct NetworkMacroGroup {
    #[serde(rename = "ID")]
    pub id: String,
    pub name: String,
}

/// A filtered list response body carries either zero, one (expected) or, in
/// malformed states, more matches; callers only ever act on the zero/one
/// cases per spec §4.1.
pub type FilteredList<T> = Vec<T>;

impl Container {
    /// Derive `(ip, netmask)` from the container's sole interface.
    ///
    /// # Errors
    ///
    /// Returns [`crate::error::Error::MalformedContainer`] if the container
    /// does not carry exactly one interface — a structural precondition of
    /// this system (spec §4.1).
    pub fn ip_and_mask(&self) -> crate::error::Result<(&str, &str)> {
        match self.interfaces.as_slice() {
            [iface] => Ok((iface.ip.as_str(), iface.netmask.as_str())),
            other => Err(crate::error::Error::MalformedContainer {
                name: self.name.clone(),
                interface_count: other.len(),
            }),
        }
    }
}

#[cfg(test)]
mod test {
    use super::*;

    #[test]
    fn container_round_trips_through_json() {
        let container = Container {
            id: "abc123".into(),
            name: "p1_alpha".into(),
            uuid: "aaaaaaaabbbbccccddddeeeeeeeeeeeeaaaaaaaabbbbccccddddeeeeeeeeeeee".into(),
            orchestration_id: "Kubernetes".into(),
            interfaces: vec![ContainerInterface {
                mac: "02:00:00:00:00:01".into(),
                ip: "10.0.0.1".into(),
                netmask: "255.255.255.0".into(),
                attached_network_id: "subnet-1".into(),
            }],
        };
        let json = serde_json::to_string(&container).unwrap();
        assert!(json.contains("\"UUID\""));
        assert!(json.contains("\"orchestrationID\":\"Kubernetes\""));
        let back: Container = serde_json::from_str(&json).unwrap();
        assert_eq!(back, container);
    }

    #[test]
    fn ip_and_mask_requires_exactly_one_interface() {
        let mut container = Container {
            id: String::new(),
            name: "p1_alpha".into(),
            uuid: "x".into(),
            orchestration_id: "Kubernetes".into(),
            interfaces: vec![],
        };
        assert!(container.ip_and_mask().is_err());

        container.interfaces.push(ContainerInterface {
            mac: "02:00:00:00:00:01".into(),
            ip: "10.0.0.1".into(),
            netmask: "255.255.255.0".into(),
            attached_network_id: "subnet-1".into(),
        });
        assert_eq!(container.ip_and_mask().unwrap(), ("10.0.0.1", "255.255.255.0"));
    }
}
