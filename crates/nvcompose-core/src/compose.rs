//! Compose document and service definition types

use serde::{de, Deserialize, Deserializer, Serialize, Serializer};
use serde_yaml::{Mapping, Value};
use std::path::Path;
use tracing::{debug, warn};

use crate::{ComposeError, ComposeResult};

const SERVICES_KEY: &str = "services";
const VERSION_KEY: &str = "version";
const VOLUMES_KEY: &str = "volumes";
const DEVICES_KEY: &str = "devices";
const ENVIRONMENT_KEY: &str = "environment";

/// Environment variables of a service, in either compose spelling
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum Environment {
    /// `KEY: value` mapping
    Map(Mapping),
    /// `KEY=value` list
    List(Vec<String>),
}

#[cfg(test)]
impl Environment {
    /// Look up a variable by name
    pub fn get(&self, key: &str) -> Option<String> {
        match self {
            Environment::Map(map) => map.get(key).map(|v| match v {
                Value::String(s) => s.clone(),
                Value::Null => String::new(),
                other => scalar_to_string(other),
            }),
            Environment::List(list) => list.iter().find_map(|entry| {
                let (name, value) = entry.split_once('=').unwrap_or((entry.as_str(), ""));
                (name == key).then(|| value.to_string())
            }),
        }
    }
}

/// A single volume mount, short (`src:dst[:mode]`) or long syntax
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum VolumeEntry {
    Short(String),
    Long(Mapping),
}

impl VolumeEntry {
    /// The short-syntax spec, if this entry uses it
    pub fn as_short(&self) -> Option<&str> {
        match self {
            VolumeEntry::Short(s) => Some(s),
            VolumeEntry::Long(_) => None,
        }
    }
}

impl From<&str> for VolumeEntry {
    fn from(spec: &str) -> Self {
        VolumeEntry::Short(spec.to_string())
    }
}

/// One named service of a compose file
///
/// The fields the merge touches are typed; everything else lives in
/// `extra` untouched. The original key order is remembered so the
/// serialized record lists original fields first, in original order,
/// followed by fields added afterwards.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct ServiceDefinition {
    pub environment: Option<Environment>,
    pub volumes: Option<Vec<VolumeEntry>>,
    pub devices: Option<Vec<String>>,
    /// Fields not modelled above (image, command, ports, ...)
    pub extra: Mapping,
    key_order: Vec<String>,
}

impl ServiceDefinition {
    /// Build a service record from a raw YAML mapping
    pub fn from_mapping(mapping: Mapping) -> Result<Self, String> {
        let mut service = ServiceDefinition::default();

        for (key, value) in mapping {
            let key = match key {
                Value::String(k) => k,
                other => return Err(format!("non-string field name {:?}", other)),
            };

            match key.as_str() {
                ENVIRONMENT_KEY if !value.is_null() => {
                    service.environment = Some(
                        serde_yaml::from_value(value)
                            .map_err(|e| format!("invalid environment: {}", e))?,
                    );
                }
                VOLUMES_KEY if !value.is_null() => {
                    service.volumes = Some(
                        serde_yaml::from_value(value)
                            .map_err(|e| format!("invalid volumes: {}", e))?,
                    );
                }
                DEVICES_KEY if !value.is_null() => {
                    service.devices = Some(
                        serde_yaml::from_value(value)
                            .map_err(|e| format!("invalid devices: {}", e))?,
                    );
                }
                ENVIRONMENT_KEY | VOLUMES_KEY | DEVICES_KEY => {}
                _ => {
                    service.extra.insert(Value::String(key.clone()), value);
                }
            }

            service.key_order.push(key);
        }

        Ok(service)
    }

    /// Render the record back into a YAML mapping
    pub fn to_mapping(&self) -> Mapping {
        let mut out = Mapping::new();

        for key in &self.key_order {
            out.insert(Value::String(key.clone()), self.field_value(key));
        }

        for key in [DEVICES_KEY, VOLUMES_KEY, ENVIRONMENT_KEY] {
            if !self.has_key(key) && self.is_set(key) {
                out.insert(Value::String(key.to_string()), self.field_value(key));
            }
        }

        for (key, value) in &self.extra {
            if !out.contains_key(key) {
                out.insert(key.clone(), value.clone());
            }
        }

        out
    }

    /// Append device entries that are not already listed
    ///
    /// Returns the number of entries added.
    pub fn append_devices<'a>(&mut self, devices: impl IntoIterator<Item = &'a str>) -> usize {
        let existing = self.devices.get_or_insert_with(Vec::new);
        let mut added = 0;
        for device in devices {
            if !existing.iter().any(|d| d == device) {
                existing.push(device.to_string());
                added += 1;
            }
        }
        added
    }

    /// Append short-syntax volume entries that are not already listed
    ///
    /// Returns the number of entries added.
    pub fn append_volumes<'a>(&mut self, volumes: impl IntoIterator<Item = &'a str>) -> usize {
        let existing = self.volumes.get_or_insert_with(Vec::new);
        let mut added = 0;
        for volume in volumes {
            if !existing.iter().any(|v| v.as_short() == Some(volume)) {
                existing.push(VolumeEntry::from(volume));
                added += 1;
            }
        }
        added
    }

    /// Field names in the order they appeared in the source document
    #[cfg(test)]
    pub fn key_order(&self) -> &[String] {
        &self.key_order
    }

    fn has_key(&self, key: &str) -> bool {
        self.key_order.iter().any(|k| k == key)
    }

    fn is_set(&self, key: &str) -> bool {
        match key {
            ENVIRONMENT_KEY => self.environment.is_some(),
            VOLUMES_KEY => self.volumes.is_some(),
            DEVICES_KEY => self.devices.is_some(),
            _ => self.extra.contains_key(key),
        }
    }

    fn field_value(&self, key: &str) -> Value {
        let typed = match key {
            ENVIRONMENT_KEY => self.environment.as_ref().map(serde_yaml::to_value),
            VOLUMES_KEY => self.volumes.as_ref().map(serde_yaml::to_value),
            DEVICES_KEY => self.devices.as_ref().map(serde_yaml::to_value),
            _ => return self.extra.get(key).cloned().unwrap_or(Value::Null),
        };

        match typed {
            Some(Ok(value)) => value,
            Some(Err(e)) => {
                warn!(field = key, error = %e, "Failed to render service field");
                Value::Null
            }
            None => Value::Null,
        }
    }
}

impl<'de> Deserialize<'de> for ServiceDefinition {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        let mapping = Mapping::deserialize(deserializer)?;
        ServiceDefinition::from_mapping(mapping).map_err(de::Error::custom)
    }
}

impl Serialize for ServiceDefinition {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        self.to_mapping().serialize(serializer)
    }
}

/// How services are laid out in a compose file
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Layout {
    /// Version 1: the root mapping is the service mapping
    Legacy,
    /// Version 2 and later: services live under `services`
    Versioned,
}

/// What the source document had under the `services` key
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum ServicesKey {
    Absent,
    Null,
    Mapping,
}

/// A parsed compose file
#[derive(Debug, Clone, PartialEq)]
pub struct ComposeFile {
    layout: Layout,
    /// Top-level keys other than the services (versioned layout only).
    /// The `services` slot holds a placeholder that keeps its position.
    root: Mapping,
    services_key: ServicesKey,
    services: Vec<(String, ServiceDefinition)>,
}

impl ComposeFile {
    /// Load and parse a compose file from disk
    pub fn from_path(path: &Path) -> ComposeResult<Self> {
        let content = std::fs::read_to_string(path).map_err(|e| {
            ComposeError::malformed(path, format!("Failed to read compose file: {}", e))
        })?;
        Self::parse(&content, path)
    }

    /// Parse compose YAML; `path` is only used for error reporting
    pub fn parse(content: &str, path: &Path) -> ComposeResult<Self> {
        let mut value: Value =
            serde_yaml::from_str(content).map_err(|e| ComposeError::parse(path, &e))?;
        // Resolve `<<: *anchor` merge keys so services see their inherited fields
        value
            .apply_merge()
            .map_err(|e| ComposeError::malformed(path, format!("invalid merge key: {}", e)))?;

        let mut root = match value {
            Value::Mapping(m) => m,
            Value::Null => return Err(ComposeError::malformed(path, "document is empty")),
            _ => return Err(ComposeError::malformed(path, "root is not a mapping")),
        };

        let layout = if root.contains_key(VERSION_KEY) || root.contains_key(SERVICES_KEY) {
            Layout::Versioned
        } else {
            Layout::Legacy
        };

        let (raw_services, services_key) = match layout {
            Layout::Legacy => (std::mem::take(&mut root), ServicesKey::Absent),
            Layout::Versioned => match root.get_mut(SERVICES_KEY) {
                Some(slot) => match std::mem::replace(slot, Value::Null) {
                    Value::Mapping(m) => (m, ServicesKey::Mapping),
                    Value::Null => (Mapping::new(), ServicesKey::Null),
                    _ => {
                        return Err(ComposeError::malformed(path, "'services' is not a mapping"))
                    }
                },
                None => (Mapping::new(), ServicesKey::Absent),
            },
        };

        let mut services = Vec::with_capacity(raw_services.len());
        for (name, definition) in raw_services {
            let name = match name {
                Value::String(n) => n,
                other => scalar_to_string(&other),
            };
            let definition = match definition {
                Value::Mapping(m) => m,
                _ => {
                    return Err(ComposeError::malformed(
                        path,
                        format!("service '{}' is not a mapping", name),
                    ))
                }
            };
            let service = ServiceDefinition::from_mapping(definition).map_err(|e| {
                ComposeError::malformed(path, format!("service '{}': {}", name, e))
            })?;
            services.push((name, service));
        }

        debug!(
            path = %path.display(),
            layout = ?layout,
            services = services.len(),
            "Loaded compose file"
        );

        Ok(Self {
            layout,
            root,
            services_key,
            services,
        })
    }

    /// The service layout of this file
    pub fn layout(&self) -> Layout {
        self.layout
    }

    /// The declared `version`, if any
    pub fn version(&self) -> Option<String> {
        self.root.get(VERSION_KEY).map(scalar_to_string)
    }

    /// Services in document order
    pub fn services(&self) -> impl Iterator<Item = (&str, &ServiceDefinition)> {
        self.services.iter().map(|(name, s)| (name.as_str(), s))
    }

    /// Mutable access to services in document order
    pub fn services_mut(&mut self) -> impl Iterator<Item = (&str, &mut ServiceDefinition)> {
        self.services.iter_mut().map(|(name, s)| (name.as_str(), s))
    }

    /// Look up a service by name
    pub fn service(&self, name: &str) -> Option<&ServiceDefinition> {
        self.services
            .iter()
            .find(|(n, _)| n == name)
            .map(|(_, s)| s)
    }

    /// Declare a named volume as external in the top-level `volumes`
    ///
    /// Only meaningful for the versioned layout. Returns whether a new
    /// declaration was added; existing declarations are left alone.
    pub fn declare_external_volume(&mut self, name: &str) -> bool {
        if self.layout != Layout::Versioned {
            return false;
        }

        let key = Value::String(VOLUMES_KEY.to_string());
        let volumes = self
            .root
            .entry(key)
            .or_insert_with(|| Value::Mapping(Mapping::new()));
        if volumes.is_null() {
            *volumes = Value::Mapping(Mapping::new());
        }

        let Value::Mapping(volumes) = volumes else {
            warn!(volume = name, "Top-level 'volumes' is not a mapping, skipping declaration");
            return false;
        };

        if volumes.contains_key(name) {
            return false;
        }

        let mut external = Mapping::new();
        external.insert(Value::String("external".to_string()), Value::Bool(true));
        volumes.insert(Value::String(name.to_string()), Value::Mapping(external));
        true
    }

    /// Render the whole document as a YAML value
    pub fn to_value(&self) -> Value {
        let mut services = Mapping::new();
        for (name, service) in &self.services {
            services.insert(Value::String(name.clone()), Value::Mapping(service.to_mapping()));
        }

        match self.layout {
            Layout::Legacy => Value::Mapping(services),
            Layout::Versioned => {
                let mut root = self.root.clone();
                // An absent or null `services` key stays that way unless services were added
                if !services.is_empty() || self.services_key == ServicesKey::Mapping {
                    root.insert(Value::String(SERVICES_KEY.to_string()), Value::Mapping(services));
                }
                Value::Mapping(root)
            }
        }
    }

    /// Render the whole document as YAML text
    pub fn to_yaml(&self) -> ComposeResult<String> {
        Ok(serde_yaml::to_string(&self.to_value())?)
    }
}

fn scalar_to_string(value: &Value) -> String {
    match value {
        Value::String(s) => s.clone(),
        Value::Number(n) => n.to_string(),
        Value::Bool(b) => b.to_string(),
        Value::Null => String::new(),
        other => serde_yaml::to_string(other)
            .map(|s| s.trim_end().to_string())
            .unwrap_or_default(),
    }
}
