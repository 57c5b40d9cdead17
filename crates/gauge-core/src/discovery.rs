//! Deduplication and filtering of sensors seen during a scan.
//!
//! Every advertisement is recorded by address, so turning the compatibility
//! filter off brings back devices hidden while it was on. The visible list is
//! recomputed after each change and replaced whole.

use serde::{Deserialize, Serialize};
use uuid::{Uuid, uuid};

/// Service UUID advertised by the cylinder scale.
pub const DEFAULT_SENSOR_SERVICE: Uuid = uuid!("4fafc201-1fb5-459e-8fcc-c5c9c331914b");

/// A device seen during a scan.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct DiscoveredDevice {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub name: Option<String>,
    pub address: String,
    pub rssi: i16,
    #[serde(default)]
    pub advertised_services: Vec<Uuid>,
    pub is_connectable: bool,
}

impl DiscoveredDevice {
    /// Whether the device advertises the given service.
    pub fn advertises(&self, service: &Uuid) -> bool {
        self.advertised_services.contains(service)
    }
}

/// Scan-session state for discovered devices.
#[derive(Debug, Clone)]
pub struct DiscoveryFilter {
    expected_service: Uuid,
    filter_enabled: bool,
    scanning: bool,
    devices: Vec<DiscoveredDevice>,
    visible: Vec<DiscoveredDevice>,
}

impl Default for DiscoveryFilter {
    fn default() -> Self {
        Self::new(DEFAULT_SENSOR_SERVICE)
    }
}

impl DiscoveryFilter {
    /// Creates a filter matching `expected_service`, filtering enabled.
    pub const fn new(expected_service: Uuid) -> Self {
        Self {
            expected_service,
            filter_enabled: true,
            scanning: false,
            devices: Vec::new(),
            visible: Vec::new(),
        }
    }

    /// Starts a scan session. Does nothing if one is already running.
    ///
    /// Devices from a previous session are forgotten.
    pub fn start(&mut self) -> bool {
        if self.scanning {
            return false;
        }
        self.scanning = true;
        self.devices.clear();
        self.visible.clear();
        tracing::debug!(service = %self.expected_service, "scan started");
        true
    }

    /// Stops the scan session, keeping the visible list.
    pub fn stop(&mut self) -> bool {
        if !self.scanning {
            return false;
        }
        self.scanning = false;
        tracing::debug!(devices = self.devices.len(), "scan stopped");
        true
    }

    pub const fn is_scanning(&self) -> bool {
        self.scanning
    }

    pub const fn is_filter_enabled(&self) -> bool {
        self.filter_enabled
    }

    /// Records an advertisement. Ignored while no scan is running.
    pub fn on_discovered(&mut self, mut device: DiscoveredDevice) {
        if !self.scanning {
            return;
        }
        device.address = normalize_address(&device.address);
        if let Some(existing) = self
            .devices
            .iter_mut()
            .find(|known| known.address == device.address)
        {
            *existing = device;
        } else {
            tracing::debug!(address = %device.address, rssi = device.rssi, "device discovered");
            self.devices.push(device);
        }
        self.refresh();
    }

    /// Toggles the compatibility filter and recomputes the visible list.
    pub fn set_filter(&mut self, enabled: bool) {
        self.filter_enabled = enabled;
        self.refresh();
    }

    /// Devices currently shown to the user, in discovery order.
    pub fn visible(&self) -> &[DiscoveredDevice] {
        &self.visible
    }

    /// Every device seen this session, compatible or not.
    pub fn all(&self) -> &[DiscoveredDevice] {
        &self.devices
    }

    pub fn is_compatible(&self, device: &DiscoveredDevice) -> bool {
        device.advertises(&self.expected_service)
    }

    fn refresh(&mut self) {
        self.visible = if self.filter_enabled {
            self.devices
                .iter()
                .filter(|device| self.is_compatible(device))
                .cloned()
                .collect()
        } else {
            self.devices.clone()
        };
    }
}

fn normalize_address(address: &str) -> String {
    address.trim().to_ascii_uppercase()
}
