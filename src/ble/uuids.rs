//! BTHome identifiers.
//!
//! Contains the company id and service UUID under which BTHome data is
//! advertised.

use uuid::Uuid;

/// Company id carried in the first two bytes of BTHome manufacturer data.
///
/// `0xFCD2` is the 16-bit UUID the Bluetooth SIG assigned to BTHome.
pub const BTHOME_COMPANY_ID: u16 = 0xFCD2;

/// BTHome 16-bit service UUID expanded onto the Bluetooth base UUID.
///
/// Standard BTHome devices put their payload in service data under this UUID.
pub const BTHOME_SERVICE_UUID: Uuid = Uuid::from_u128(0x0000_fcd2_0000_1000_8000_00805f9b34fb);

/// Check if a service UUID is the BTHome service.
pub fn is_bthome_service(uuid: &Uuid) -> bool {
    *uuid == BTHOME_SERVICE_UUID
}
