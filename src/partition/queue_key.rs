//! Logical queue identity

use serde::{Deserialize, Serialize};
use std::fmt;

/// Queue name used when none is given
pub const MAIN_QUEUE_NAME: &str = "Main";

const SYSTEM_TENANT: &str = "13814000-1dd2-11b2-8080-808080808080";

/// Platform service that consumes a queue
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ServiceType {
    TbCore,
    TbRuleEngine,
    TbTransport,
    JsExecutor,
    TbVersionControl,
    Edqs,
}

impl ServiceType {
    pub fn as_str(&self) -> &'static str {
        match self {
            ServiceType::TbCore => "TB_CORE",
            ServiceType::TbRuleEngine => "TB_RULE_ENGINE",
            ServiceType::TbTransport => "TB_TRANSPORT",
            ServiceType::JsExecutor => "JS_EXECUTOR",
            ServiceType::TbVersionControl => "TB_VC_EXECUTOR",
            ServiceType::Edqs => "EDQS",
        }
    }
}

impl fmt::Display for ServiceType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Tenant identifier
///
/// Queues that are not isolated to a tenant belong to the system tenant.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(transparent)]
pub struct TenantId(String);

impl TenantId {
    pub fn new(id: impl Into<String>) -> Self {
        Self(id.into())
    }

    pub fn system() -> Self {
        Self(SYSTEM_TENANT.to_string())
    }

    pub fn is_system(&self) -> bool {
        self.0 == SYSTEM_TENANT
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl Default for TenantId {
    fn default() -> Self {
        Self::system()
    }
}

impl fmt::Display for TenantId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

/// Identity of a logical queue namespace
///
/// Used as the key of the owned-partitions map. Equality and hashing are by
/// value over all three components.
///
/// # Example
///
/// ```rust
/// use queuestate::partition::api::{QueueKey, ServiceType, TenantId};
///
/// let main = QueueKey::new(ServiceType::TbRuleEngine);
/// assert_eq!(main.queue_name(), "Main");
/// assert!(main.tenant_id().is_system());
///
/// let hp = QueueKey::new(ServiceType::TbRuleEngine)
///     .with_queue_name("HighPriority")
///     .with_tenant_id(TenantId::new("tenant-a"));
/// assert_ne!(main, hp);
/// ```
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct QueueKey {
    service_type: ServiceType,
    #[serde(default = "default_queue_name")]
    queue_name: String,
    #[serde(default)]
    tenant_id: TenantId,
}

fn default_queue_name() -> String {
    MAIN_QUEUE_NAME.to_string()
}

impl QueueKey {
    /// Key for the main queue of a service, owned by the system tenant
    pub fn new(service_type: ServiceType) -> Self {
        Self {
            service_type,
            queue_name: default_queue_name(),
            tenant_id: TenantId::system(),
        }
    }

    pub fn with_queue_name(self, queue_name: impl Into<String>) -> Self {
        Self {
            queue_name: queue_name.into(),
            ..self
        }
    }

    pub fn with_tenant_id(self, tenant_id: TenantId) -> Self {
        Self { tenant_id, ..self }
    }

    pub fn service_type(&self) -> ServiceType {
        self.service_type
    }

    pub fn queue_name(&self) -> &str {
        &self.queue_name
    }

    pub fn tenant_id(&self) -> &TenantId {
        &self.tenant_id
    }
}

impl fmt::Display for QueueKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        if self.tenant_id.is_system() {
            write!(f, "QK({},{},system)", self.queue_name, self.service_type)
        } else {
            write!(
                f,
                "QK({},{},{})",
                self.queue_name, self.service_type, self.tenant_id
            )
        }
    }
}
