//! BLE scanning for BTHome advertisements.
//!
//! Listens for BTHome data, either as manufacturer data under company id
//! `0xFCD2` (as the beacon in this crate sends it) or as service data under
//! the BTHome service UUID, and decodes every packet it sees. Devices that
//! pass the name filter but carry some other manufacturer data are reported
//! raw.

use btleplug::api::{Central, Manager as _, Peripheral as _, ScanFilter};
use btleplug::platform::{Adapter, Manager};
use chrono::{DateTime, Utc};
use futures::stream::StreamExt;
use parking_lot::RwLock;
use std::collections::{BTreeMap, HashMap};
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::broadcast;
use tracing::{debug, error, info, trace};
use uuid::Uuid;

use crate::ble::uuids::{BTHOME_COMPANY_ID, BTHOME_SERVICE_UUID};
use crate::bthome::{decode_service_data, BthomePacket};
use crate::error::{Error, Result};

/// What a matching device advertised.
#[derive(Debug, Clone, PartialEq)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub enum AdvertisedData {
    /// Decoded BTHome payload.
    Bthome(BthomePacket),
    /// Manufacturer data from other companies, keyed by company id.
    Other(BTreeMap<u16, Vec<u8>>),
}

/// An advertisement from a device that passed the name filter.
#[derive(Debug, Clone, PartialEq)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub struct BthomeObservation {
    /// The BLE peripheral identifier.
    pub identifier: String,
    /// Advertised local name, if any.
    pub local_name: Option<String>,
    /// Signal strength in dBm.
    pub rssi: Option<i16>,
    /// When the advertisement was processed.
    pub received_at: DateTime<Utc>,
    /// Decoded or raw payload.
    pub data: AdvertisedData,
}

impl BthomeObservation {
    /// The BTHome packet, if the device sent one.
    pub fn packet(&self) -> Option<&BthomePacket> {
        match &self.data {
            AdvertisedData::Bthome(packet) => Some(packet),
            AdvertisedData::Other(_) => None,
        }
    }
}

/// BLE scanner for BTHome devices.
pub struct BthomeScanner {
    /// The BLE adapter to use for scanning.
    adapter: Adapter,
    /// Only report devices whose name starts with this prefix.
    name_prefix: Option<String>,
    /// Whether scanning is currently active.
    is_scanning: Arc<RwLock<bool>>,
    /// Latest observation per peripheral.
    observations: Arc<RwLock<HashMap<String, BthomeObservation>>>,
    /// Channel for observation events.
    event_tx: broadcast::Sender<BthomeObservation>,
    /// Handle to the scanning task.
    scan_handle: Arc<RwLock<Option<tokio::task::JoinHandle<()>>>>,
}

impl BthomeScanner {
    /// Create a scanner on the first Bluetooth adapter.
    ///
    /// # Errors
    ///
    /// Returns an error if Bluetooth is not available.
    pub async fn new() -> Result<Self> {
        let manager = Manager::new()
            .await
            .map_err(|_e| Error::BluetoothUnavailable)?;

        let adapters = manager.adapters().await.map_err(Error::Bluetooth)?;

        let adapter = adapters
            .into_iter()
            .next()
            .ok_or(Error::BluetoothUnavailable)?;

        info!(
            "Using Bluetooth adapter: {:?}",
            adapter.adapter_info().await.ok()
        );

        Ok(Self::with_adapter(adapter))
    }

    /// Create a scanner with a specific adapter.
    pub fn with_adapter(adapter: Adapter) -> Self {
        let (event_tx, _) = broadcast::channel(100);

        Self {
            adapter,
            name_prefix: None,
            is_scanning: Arc::new(RwLock::new(false)),
            observations: Arc::new(RwLock::new(HashMap::new())),
            event_tx,
            scan_handle: Arc::new(RwLock::new(None)),
        }
    }

    /// Only report devices whose local name starts with `prefix`.
    pub fn with_name_prefix(mut self, prefix: impl Into<String>) -> Self {
        self.name_prefix = Some(prefix.into());
        self
    }

    /// Start scanning.
    ///
    /// # Errors
    ///
    /// Returns an error if scanning cannot be started.
    pub async fn start_scanning(&self) -> Result<()> {
        if *self.is_scanning.read() {
            debug!("Already scanning, ignoring start request");
            return Ok(());
        }

        info!("Starting BLE scan for BTHome devices");

        self.adapter
            .start_scan(ScanFilter::default())
            .await
            .map_err(Error::Bluetooth)?;

        *self.is_scanning.write() = true;

        let adapter = self.adapter.clone();
        let name_prefix = self.name_prefix.clone();
        let is_scanning = self.is_scanning.clone();
        let observations = self.observations.clone();
        let event_tx = self.event_tx.clone();

        let handle = tokio::spawn(async move {
            let mut events = match adapter.events().await {
                Ok(events) => events,
                Err(e) => {
                    error!("Failed to get adapter events: {}", e);
                    return;
                }
            };

            while *is_scanning.read() {
                tokio::select! {
                    Some(event) = events.next() => {
                        Self::handle_event(
                            event,
                            &adapter,
                            name_prefix.as_deref(),
                            &observations,
                            &event_tx,
                        ).await;
                    }
                    _ = tokio::time::sleep(Duration::from_millis(100)) => {
                        if !*is_scanning.read() {
                            break;
                        }
                    }
                }
            }

            debug!("Scan event loop ended");
        });

        *self.scan_handle.write() = Some(handle);

        Ok(())
    }

    /// Stop scanning.
    pub async fn stop_scanning(&self) -> Result<()> {
        if !*self.is_scanning.read() {
            debug!("Not scanning, ignoring stop request");
            return Ok(());
        }

        info!("Stopping BLE scan");

        *self.is_scanning.write() = false;

        self.adapter.stop_scan().await.map_err(Error::Bluetooth)?;

        let handle = self.scan_handle.write().take();
        if let Some(handle) = handle {
            let _ = handle.await;
        }

        Ok(())
    }

    /// Check if currently scanning.
    pub fn is_scanning(&self) -> bool {
        *self.is_scanning.read()
    }

    /// Latest observation for every device seen so far.
    pub fn observations(&self) -> HashMap<String, BthomeObservation> {
        self.observations.read().clone()
    }

    /// Subscribe to observation events.
    pub fn subscribe(&self) -> broadcast::Receiver<BthomeObservation> {
        self.event_tx.subscribe()
    }

    /// Get the underlying adapter.
    pub fn adapter(&self) -> &Adapter {
        &self.adapter
    }

    /// Handle a BLE central event.
    async fn handle_event(
        event: btleplug::api::CentralEvent,
        adapter: &Adapter,
        name_prefix: Option<&str>,
        observations: &Arc<RwLock<HashMap<String, BthomeObservation>>>,
        event_tx: &broadcast::Sender<BthomeObservation>,
    ) {
        use btleplug::api::CentralEvent;

        match event {
            CentralEvent::ManufacturerDataAdvertisement {
                id,
                manufacturer_data,
            } => {
                trace!(
                    "Manufacturer data from {:?}: {:04X?}",
                    id,
                    manufacturer_data.keys().collect::<Vec<_>>()
                );
                Self::process_peripheral(adapter, id, name_prefix, observations, event_tx).await;
            }
            CentralEvent::ServiceDataAdvertisement { id, service_data } => {
                if service_data.contains_key(&BTHOME_SERVICE_UUID) {
                    trace!("BTHome service data from {:?}", id);
                    Self::process_peripheral(adapter, id, name_prefix, observations, event_tx)
                        .await;
                }
            }
            CentralEvent::DeviceDiscovered(id) => {
                trace!("Device discovered: {:?}", id);
            }
            CentralEvent::DeviceUpdated(_) => {}
            CentralEvent::DeviceConnected(_) => {}
            CentralEvent::DeviceDisconnected(_) => {}
            CentralEvent::ServicesAdvertisement { .. } => {}
            CentralEvent::StateUpdate(_) => {}
        }
    }

    /// Classify the latest advertisement of a peripheral.
    async fn process_peripheral(
        adapter: &Adapter,
        id: btleplug::platform::PeripheralId,
        name_prefix: Option<&str>,
        observations: &Arc<RwLock<HashMap<String, BthomeObservation>>>,
        event_tx: &broadcast::Sender<BthomeObservation>,
    ) {
        let peripheral = match adapter.peripheral(&id).await {
            Ok(p) => p,
            Err(e) => {
                trace!("Failed to get peripheral: {}", e);
                return;
            }
        };

        let properties = match peripheral.properties().await {
            Ok(Some(p)) => p,
            _ => return,
        };

        if !matches_prefix(properties.local_name.as_deref(), name_prefix) {
            return;
        }

        let Some(data) =
            classify_advertisement(&properties.manufacturer_data, &properties.service_data)
        else {
            return;
        };

        let identifier = id.to_string();
        let observation = BthomeObservation {
            identifier: identifier.clone(),
            local_name: properties.local_name,
            rssi: properties.rssi,
            received_at: Utc::now(),
            data,
        };

        observations.write().insert(identifier, observation.clone());

        let _ = event_tx.send(observation);
    }
}

impl Drop for BthomeScanner {
    fn drop(&mut self) {
        *self.is_scanning.write() = false;
    }
}

/// Check a local name against an optional prefix filter.
fn matches_prefix(local_name: Option<&str>, prefix: Option<&str>) -> bool {
    match prefix {
        None => true,
        Some(prefix) => local_name.map(|n| n.starts_with(prefix)).unwrap_or(false),
    }
}

/// Find and decode BTHome data, preferring manufacturer data.
///
/// Without BTHome data, any manufacturer data is returned raw. Scanners key
/// manufacturer data by company id, so the slices handed in here already
/// start at the device information byte.
fn classify_advertisement(
    manufacturer_data: &HashMap<u16, Vec<u8>>,
    service_data: &HashMap<Uuid, Vec<u8>>,
) -> Option<AdvertisedData> {
    let bthome = manufacturer_data
        .get(&BTHOME_COMPANY_ID)
        .or_else(|| service_data.get(&BTHOME_SERVICE_UUID));

    match bthome {
        Some(data) => match decode_service_data(data) {
            Ok(packet) => Some(AdvertisedData::Bthome(packet)),
            Err(e) => {
                debug!("Failed to decode BTHome data: {}", e);
                None
            }
        },
        None if manufacturer_data.is_empty() => None,
        None => Some(AdvertisedData::Other(
            manufacturer_data
                .iter()
                .map(|(id, data)| (*id, data.clone()))
                .collect(),
        )),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::bthome::encode;

    #[test]
    fn test_observation_clone() {
        fn assert_clone<T: Clone>() {}
        assert_clone::<BthomeObservation>();
    }

    #[test]
    fn test_matches_prefix() {
        assert!(matches_prefix(Some("MAKE-ESP32-S3-TS"), Some("MAKE")));
        assert!(!matches_prefix(Some("Other"), Some("MAKE")));
        assert!(!matches_prefix(None, Some("MAKE")));
        assert!(matches_prefix(None, None));
    }

    #[test]
    fn test_extract_from_manufacturer_data() {
        let payload = encode(25.06).unwrap();
        let mut manufacturer_data = HashMap::new();
        manufacturer_data.insert(BTHOME_COMPANY_ID, payload.service_data().to_vec());

        let data = classify_advertisement(&manufacturer_data, &HashMap::new()).unwrap();
        let packet = match data {
            AdvertisedData::Bthome(packet) => packet,
            other => panic!("expected BTHome data, got {:?}", other),
        };
        assert_eq!(packet.temperature_centi(), Some(2506));
    }

    #[test]
    fn test_extract_from_service_data() {
        let mut service_data = HashMap::new();
        service_data.insert(BTHOME_SERVICE_UUID, vec![0x40, 0x02, 0x1A, 0xFC]);

        let data = classify_advertisement(&HashMap::new(), &service_data).unwrap();
        let packet = match data {
            AdvertisedData::Bthome(packet) => packet,
            other => panic!("expected BTHome data, got {:?}", other),
        };
        assert_eq!(packet.temperature_centi(), Some(-998));
    }

    #[test]
    fn test_other_manufacturer_data_is_reported_raw() {
        let mut manufacturer_data = HashMap::new();
        manufacturer_data.insert(0xFFFF, vec![0x01, 0x02, 0x03, 0x04]);
        manufacturer_data.insert(0x004C, vec![0x02, 0x15]);

        let data = classify_advertisement(&manufacturer_data, &HashMap::new()).unwrap();
        let expected: BTreeMap<u16, Vec<u8>> = [
            (0x004C, vec![0x02, 0x15]),
            (0xFFFF, vec![0x01, 0x02, 0x03, 0x04]),
        ]
        .into_iter()
        .collect();
        assert_eq!(data, AdvertisedData::Other(expected));
    }

    #[test]
    fn test_bthome_wins_over_other_manufacturer_data() {
        let mut manufacturer_data = HashMap::new();
        manufacturer_data.insert(0xFFFF, vec![0x01]);
        let mut service_data = HashMap::new();
        service_data.insert(BTHOME_SERVICE_UUID, vec![0x40, 0x02, 0x00, 0x00]);

        let data = classify_advertisement(&manufacturer_data, &service_data).unwrap();
        assert!(matches!(data, AdvertisedData::Bthome(_)));
    }

    #[test]
    fn test_classify_ignores_empty_and_broken_data() {
        assert!(classify_advertisement(&HashMap::new(), &HashMap::new()).is_none());

        let mut service_data = HashMap::new();
        service_data.insert(BTHOME_SERVICE_UUID, Vec::new());
        assert!(classify_advertisement(&HashMap::new(), &service_data).is_none());
    }

    #[test]
    fn test_observation_packet_accessor() {
        let observation = BthomeObservation {
            identifier: "hci0/dev_AA".to_string(),
            local_name: Some("MAKE-TS".to_string()),
            rssi: Some(-60),
            received_at: Utc::now(),
            data: AdvertisedData::Other(BTreeMap::new()),
        };
        assert!(observation.packet().is_none());

        let packet = decode_service_data(&[0x40, 0x02, 0xCA, 0x09]).unwrap();
        let observation = BthomeObservation {
            data: AdvertisedData::Bthome(packet.clone()),
            ..observation
        };
        assert_eq!(observation.packet(), Some(&packet));
    }
}
