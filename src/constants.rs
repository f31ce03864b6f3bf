//! Well-known MBIM 1.0 identifiers.
//!
//! Device-service UUIDs, the basic-connect CID table, and control status
//! codes as defined by the MBIM 1.0 specification. Values are transmitted
//! on the wire exactly as listed here: UUIDs as their 16 canonical bytes,
//! CIDs and status codes as little-endian u32.

use uuid::{uuid, Uuid};

/// Basic connectivity device service.
pub const UUID_BASIC_CONNECT: Uuid = uuid!("a289cc33-bcbb-8b4f-b6b0-133ec2aae6df");

/// SMS device service.
pub const UUID_SMS: Uuid = uuid!("533fbe4b-14fe-4467-9f90-33a223e56c3f");

/// USSD device service.
pub const UUID_USSD: Uuid = uuid!("e550a0c8-5e82-479e-82f7-10abf4c3351f");

/// Phonebook device service.
pub const UUID_PHONEBOOK: Uuid = uuid!("4bf38476-1e6a-41db-b1d8-bed289c25bdb");

/// SIM toolkit device service.
pub const UUID_STK: Uuid = uuid!("d8f20131-fcb5-4e17-8602-d6ed3816164c");

/// Authentication device service.
pub const UUID_AUTH: Uuid = uuid!("1d2b5ff7-0aa1-48b2-aa52-50f15767174e");

/// Device service stream service.
pub const UUID_DSS: Uuid = uuid!("c08a26dd-7718-4382-8482-6e0d583c4d0e");

/// Command identifiers for the basic-connect service.
pub mod cid {
    /// MBIM_CID_DEVICE_CAPS
    pub const DEVICE_CAPS: u32 = 1;
    /// MBIM_CID_SUBSCRIBER_READY_STATUS
    pub const SUBSCRIBER_READY_STATUS: u32 = 2;
    /// MBIM_CID_RADIO_STATE
    pub const RADIO_STATE: u32 = 3;
    /// MBIM_CID_PIN
    pub const PIN: u32 = 4;
    /// MBIM_CID_PIN_LIST
    pub const PIN_LIST: u32 = 5;
    /// MBIM_CID_HOME_PROVIDER
    pub const HOME_PROVIDER: u32 = 6;
    /// MBIM_CID_PREFERRED_PROVIDERS
    pub const PREFERRED_PROVIDERS: u32 = 7;
    /// MBIM_CID_VISIBLE_PROVIDERS
    pub const VISIBLE_PROVIDERS: u32 = 8;
    /// MBIM_CID_REGISTER_STATE
    pub const REGISTER_STATE: u32 = 9;
    /// MBIM_CID_PACKET_SERVICE
    pub const PACKET_SERVICE: u32 = 10;
    /// MBIM_CID_SIGNAL_STATE
    pub const SIGNAL_STATE: u32 = 11;
    /// MBIM_CID_CONNECT
    pub const CONNECT: u32 = 12;
    /// MBIM_CID_PROVISIONED_CONTEXTS
    pub const PROVISIONED_CONTEXTS: u32 = 13;
    /// MBIM_CID_SERVICE_ACTIVATION
    pub const SERVICE_ACTIVATION: u32 = 14;
    /// MBIM_CID_IP_CONFIGURATION
    pub const IP_CONFIGURATION: u32 = 15;
    /// MBIM_CID_DEVICE_SERVICES
    pub const DEVICE_SERVICES: u32 = 16;
    /// MBIM_CID_DEVICE_SERVICE_SUBSCRIBE_LIST
    pub const DEVICE_SERVICE_SUBSCRIBE_LIST: u32 = 19;
    /// MBIM_CID_PACKET_STATISTICS
    pub const PACKET_STATISTICS: u32 = 20;
    /// MBIM_CID_NETWORK_IDLE_HINT
    pub const NETWORK_IDLE_HINT: u32 = 21;
    /// MBIM_CID_EMERGENCY_MODE
    pub const EMERGENCY_MODE: u32 = 22;
    /// MBIM_CID_IP_PACKET_FILTERS
    pub const IP_PACKET_FILTERS: u32 = 23;
    /// MBIM_CID_MULTICARRIER_PROVIDERS
    pub const MULTICARRIER_PROVIDERS: u32 = 24;
}

/// Status codes carried in MBIM_COMMAND_DONE and the *_DONE handshakes.
pub mod status {
    /// MBIM_STATUS_SUCCESS
    pub const SUCCESS: u32 = 0;
    /// MBIM_STATUS_BUSY
    pub const BUSY: u32 = 1;
    /// MBIM_STATUS_FAILURE
    pub const FAILURE: u32 = 2;
    /// MBIM_STATUS_SIM_NOT_INSERTED
    pub const SIM_NOT_INSERTED: u32 = 3;
    /// MBIM_STATUS_BAD_SIM
    pub const BAD_SIM: u32 = 4;
    /// MBIM_STATUS_PIN_REQUIRED
    pub const PIN_REQUIRED: u32 = 5;
    /// MBIM_STATUS_PIN_DISABLED
    pub const PIN_DISABLED: u32 = 6;
    /// MBIM_STATUS_NOT_REGISTERED
    pub const NOT_REGISTERED: u32 = 7;
    /// MBIM_STATUS_PROVIDERS_NOT_FOUND
    pub const PROVIDERS_NOT_FOUND: u32 = 8;
    /// MBIM_STATUS_NO_DEVICE_SUPPORT
    pub const NO_DEVICE_SUPPORT: u32 = 9;
    /// MBIM_STATUS_NOT_OPENED
    pub const NOT_OPENED: u32 = 16;
    /// MBIM_STATUS_OPERATION_NOT_ALLOWED
    pub const OPERATION_NOT_ALLOWED: u32 = 18;
    /// MBIM_STATUS_NO_MATCH
    pub const NO_MATCH: u32 = 19;
    /// MBIM_STATUS_INVALID_PARAMETERS
    pub const INVALID_PARAMETERS: u32 = 21;
}
