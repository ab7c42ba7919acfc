//! BTHome v2 payload codec.
//!
//! This module contains the implementations for:
//! - The object id table (width, signedness, resolution)
//! - The device information byte
//! - Payload encoding and decoding

pub mod decoder;
pub mod device_info;
pub mod encoder;
pub mod objects;

pub use decoder::{decode, decode_service_data, BthomePacket, Measurement};
pub use device_info::DeviceInfo;
pub use encoder::{encode, AdvertisementPayload, PayloadBuilder};
pub use objects::ObjectId;
