// Error codes implementation
// Stable codes shared by every crate of the permission platform

pub mod authorization {
    pub const INSUFFICIENT_PERMISSIONS: &str = "AUTHZ_3002";
    pub const ACCOUNT_INACTIVE: &str = "AUTHZ_3003";
    pub const NOT_OWNER: &str = "AUTHZ_3004";
    pub const UNKNOWN_ROLE: &str = "AUTHZ_3005";
    pub const ROLE_CONFLICT: &str = "AUTHZ_3006";
}

pub mod database {
    pub const NOT_FOUND: &str = "DB_4004";
}

pub mod registry {
    pub const DUPLICATE_ACTION: &str = "REGISTRY_5001";
    pub const REGISTRY_EXHAUSTED: &str = "REGISTRY_5002";
    pub const UNKNOWN_ACTION: &str = "REGISTRY_5003";
    pub const MASK_OUT_OF_RANGE: &str = "REGISTRY_5004";
}

pub mod integrity {
    pub const DETACHED_ENTITY: &str = "INTEGRITY_6001";
    pub const REPARENTING: &str = "INTEGRITY_6002";
}

pub mod configuration {
    pub const INVALID_POLICY: &str = "CONFIG_7001";
    pub const LOAD_FAILED: &str = "CONFIG_7002";
}
