//! Central place for crate-wide constants and default values.

/// Default application name (can be overridden in config)
pub const DEFAULT_APP_NAME: &str = "Meshwork";

/// Left padding used to align console log lines with those that carry an
/// emoji prefix elsewhere.
pub const ICON_PLACEHOLDER: &str = "   "; // Three spaces for alignment

/// Protocol branding shown in logs and peer descriptors
pub const PROTOCOL_NAME: &str = "Meshwork";
/// Protocol version for compatibility checks (bump when the wire format changes)
pub const PROTOCOL_VERSION: u32 = 1;

/// Frame tag written before every data frame on the wire.
pub const FRAME_DATA: u8 = 0x00;
/// Frame tag of a bare low-level acknowledgement (no body follows).
pub const FRAME_ACK: u8 = 0x01;

/// Default number of delivery-pool workers.
pub const DEFAULT_POOL_WORKERS: usize = 2;
/// Default delivery-pool queue capacity.
pub const DEFAULT_POOL_CAPACITY: usize = 256;

/// Application / crate version (populated from Cargo.toml via env! macro)
pub const APP_VERSION: &str = env!("CARGO_PKG_VERSION");

/// Human friendly composite version string used in logs.
pub fn full_version() -> String {
    format!("v{} (protocol={})", APP_VERSION, PROTOCOL_VERSION)
}
