// Control unit addresses per transport flavor
pub const ENGINE_ADDR_ISO14230: u32 = 0x10;
pub const ENGINE_ADDR_ISO15765: u32 = 0x7E0;
pub const TRANSMISSION_ADDR_ISO14230: u32 = 0x18;
pub const TRANSMISSION_ADDR_ISO15765: u32 = 0x7E1;

// Identity fallbacks (ISO14230 only). Some CUs answer only at these.
pub const FALLBACK_ADDR_ANY_CU: u32 = 0x01;
pub const FALLBACK_ADDR_ENGINE: u32 = 0x02;

/// Retry count configured on the transport once the CU has answered.
pub const DEFAULT_RETRIES_ON_ERROR: u8 = 2;
/// Retry count used while polling for ignition off.
pub const IGNITION_POLL_RETRIES: u8 = 1;

// Status byte: test mode / D-check
pub const ADDR_STATUS: u32 = 0x000061;
pub const STATUS_TEST_MODE_BIT: u8 = 0x20;
pub const STATUS_D_CHECK_BIT: u8 = 0x80;

// Ignition switch
pub const ADDR_IGNITION: u32 = 0x000062;
pub const IGNITION_ON_BIT: u8 = 0x08;

// Engine speed measuring block (raw byte)
pub const ADDR_ENGINE_SPEED: u32 = 0x00000E;
/// Raw engine speed values above this count as "running".
pub const ENGINE_RUNNING_THRESHOLD: u8 = 3;

// Clear memory
pub const ADDR_CLEAR_MEMORY: u32 = 0x000060;
pub const CLEAR_MEMORY_LEVEL1: u8 = 0x40;
pub const CLEAR_MEMORY_LEVEL2: u8 = 0x20;

// VIN pointer (24 bit, big endian)
pub const ADDR_VIN_POINTER: [u32; 3] = [0x0000DA, 0x0000DB, 0x0000DC];
pub const VIN_LENGTH: usize = 17;

// Immobilizer communication line test
pub const ADDR_IMMO_TEST_WRITE: u32 = 0x0000E0;
pub const IMMO_TEST_PATTERN: u8 = 0xAA;
pub const ADDR_IMMO_TEST_RESULT: u32 = 0x00008B;
pub const IMMO_SHORTED_TO_GROUND: u8 = 0x01;
pub const IMMO_SHORTED_TO_BATTERY: u8 = 0x02;

// Actuators
pub const ACTUATOR_OFF: u8 = 0x00;
/// Refresh interval of the repeating actuator write.
pub const ACTUATOR_REFRESH_MS: u64 = 100;
