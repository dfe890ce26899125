// SPDX-License-Identifier: MIT
// Copyright (c) 2026 Alfred Jean LLC

//! Network quality monitoring.
//!
//! The platform layer forwards connectivity callbacks as
//! [`ConnectivityEvent`]s. The monitor turns each one into a
//! [`NetworkSample`] and publishes it on a `watch` channel. Subscribers only
//! wake when the classification (connectivity, transport, tier or metered
//! flag) changes; a sample that classifies identically still replaces the
//! current value, with a fresher timestamp.

use std::fmt;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use tokio::sync::watch;
use tracing::{debug, info};

/// Physical transport carrying traffic.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum TransportType {
    Wifi,
    #[serde(rename = "cellular_2g")]
    Cellular2G,
    #[serde(rename = "cellular_3g")]
    Cellular3G,
    #[serde(rename = "cellular_4g")]
    Cellular4G,
    #[serde(rename = "cellular_5g")]
    Cellular5G,
    Ethernet,
    Unknown,
}

impl TransportType {
    /// Nominal downstream bandwidth at full signal, in kbps.
    fn nominal_kbps(self) -> Option<u32> {
        match self {
            TransportType::Cellular2G => Some(64),
            TransportType::Cellular3G => Some(1_000),
            TransportType::Cellular4G => Some(6_000),
            TransportType::Cellular5G => Some(20_000),
            TransportType::Wifi => Some(10_000),
            TransportType::Ethernet => Some(50_000),
            TransportType::Unknown => None,
        }
    }

    fn from_link_speed(kbps: u32) -> Self {
        match kbps {
            0..=149 => TransportType::Cellular2G,
            150..=1_999 => TransportType::Cellular3G,
            2_000..=49_999 => TransportType::Cellular4G,
            _ => TransportType::Cellular5G,
        }
    }
}

impl fmt::Display for TransportType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            TransportType::Wifi => "wifi",
            TransportType::Cellular2G => "cellular_2g",
            TransportType::Cellular3G => "cellular_3g",
            TransportType::Cellular4G => "cellular_4g",
            TransportType::Cellular5G => "cellular_5g",
            TransportType::Ethernet => "ethernet",
            TransportType::Unknown => "unknown",
        };
        write!(f, "{s}")
    }
}

/// Link quality bucket derived from estimated bandwidth.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum QualityTier {
    Excellent,
    Good,
    Fair,
    Poor,
    VeryPoor,
    Unknown,
}

impl QualityTier {
    pub const ALL: [QualityTier; 6] = [
        QualityTier::Excellent,
        QualityTier::Good,
        QualityTier::Fair,
        QualityTier::Poor,
        QualityTier::VeryPoor,
        QualityTier::Unknown,
    ];

    pub fn as_str(&self) -> &'static str {
        match self {
            QualityTier::Excellent => "excellent",
            QualityTier::Good => "good",
            QualityTier::Fair => "fair",
            QualityTier::Poor => "poor",
            QualityTier::VeryPoor => "very_poor",
            QualityTier::Unknown => "unknown",
        }
    }
}

impl fmt::Display for QualityTier {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

impl std::str::FromStr for QualityTier {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        QualityTier::ALL
            .into_iter()
            .find(|t| t.as_str() == s)
            .ok_or_else(|| format!("unknown quality tier '{s}'"))
    }
}

/// Lower bandwidth bounds (kbps, inclusive) for each tier.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct QualityThresholds {
    pub excellent_kbps: u32,
    pub good_kbps: u32,
    pub fair_kbps: u32,
    pub poor_kbps: u32,
}

impl Default for QualityThresholds {
    fn default() -> Self {
        QualityThresholds { excellent_kbps: 5_000, good_kbps: 2_000, fair_kbps: 500, poor_kbps: 100 }
    }
}

impl QualityThresholds {
    /// Buckets a bandwidth estimate. No estimate means `Unknown`.
    pub fn tier_for(&self, bandwidth_kbps: Option<u32>) -> QualityTier {
        match bandwidth_kbps {
            None => QualityTier::Unknown,
            Some(b) if b >= self.excellent_kbps => QualityTier::Excellent,
            Some(b) if b >= self.good_kbps => QualityTier::Good,
            Some(b) if b >= self.fair_kbps => QualityTier::Fair,
            Some(b) if b >= self.poor_kbps => QualityTier::Poor,
            Some(_) => QualityTier::VeryPoor,
        }
    }

    /// Thresholds must strictly decrease from excellent to poor.
    pub fn validate(&self) -> Result<(), String> {
        let ordered = self.excellent_kbps > self.good_kbps
            && self.good_kbps > self.fair_kbps
            && self.fair_kbps > self.poor_kbps;
        if ordered {
            Ok(())
        } else {
            Err(format!(
                "thresholds must decrease: excellent {} > good {} > fair {} > poor {}",
                self.excellent_kbps, self.good_kbps, self.fair_kbps, self.poor_kbps
            ))
        }
    }
}

/// A classified observation of the network.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct NetworkSample {
    pub timestamp: DateTime<Utc>,
    pub transport: TransportType,
    pub bandwidth_kbps: Option<u32>,
    pub metered: bool,
    pub connected: bool,
}

impl NetworkSample {
    pub fn disconnected(timestamp: DateTime<Utc>) -> Self {
        NetworkSample {
            timestamp,
            transport: TransportType::Unknown,
            bandwidth_kbps: None,
            metered: false,
            connected: false,
        }
    }

    pub fn connected(transport: TransportType, bandwidth_kbps: Option<u32>, metered: bool) -> Self {
        NetworkSample { timestamp: Utc::now(), transport, bandwidth_kbps, metered, connected: true }
    }

    pub fn tier(&self, thresholds: &QualityThresholds) -> QualityTier {
        if self.connected {
            thresholds.tier_for(self.bandwidth_kbps)
        } else {
            QualityTier::Unknown
        }
    }

    fn same_class(&self, other: &NetworkSample, thresholds: &QualityThresholds) -> bool {
        self.connected == other.connected
            && self.transport == other.transport
            && self.metered == other.metered
            && self.tier(thresholds) == other.tier(thresholds)
    }
}

/// Cellular radio generation as reported by the platform.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum CellularGeneration {
    #[serde(rename = "2g")]
    G2,
    #[serde(rename = "3g")]
    G3,
    #[serde(rename = "4g")]
    G4,
    #[serde(rename = "5g")]
    G5,
}

/// Platform-reported capabilities of the active network.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct Capabilities {
    pub wifi: bool,
    pub ethernet: bool,
    pub cellular: bool,
    pub generation: Option<CellularGeneration>,
    /// Platform downstream estimate. Takes precedence over nominal speeds.
    pub link_down_kbps: Option<u32>,
    /// Signal strength, 0 (none) to 4 (full).
    pub signal_level: Option<u8>,
    pub not_metered: bool,
}

impl Capabilities {
    pub fn wifi(link_down_kbps: u32) -> Self {
        Capabilities {
            wifi: true,
            link_down_kbps: Some(link_down_kbps),
            not_metered: true,
            ..Default::default()
        }
    }

    pub fn cellular(generation: CellularGeneration, signal_level: u8) -> Self {
        Capabilities {
            cellular: true,
            generation: Some(generation),
            signal_level: Some(signal_level),
            ..Default::default()
        }
    }

    fn transport(&self) -> TransportType {
        if self.ethernet {
            TransportType::Ethernet
        } else if self.wifi {
            TransportType::Wifi
        } else if self.cellular {
            match (self.generation, self.link_down_kbps) {
                (Some(CellularGeneration::G2), _) => TransportType::Cellular2G,
                (Some(CellularGeneration::G3), _) => TransportType::Cellular3G,
                (Some(CellularGeneration::G4), _) => TransportType::Cellular4G,
                (Some(CellularGeneration::G5), _) => TransportType::Cellular5G,
                (None, Some(kbps)) => TransportType::from_link_speed(kbps),
                (None, None) => TransportType::Unknown,
            }
        } else {
            TransportType::Unknown
        }
    }

    fn estimate_kbps(&self, transport: TransportType) -> Option<u32> {
        if let Some(kbps) = self.link_down_kbps {
            return Some(kbps);
        }
        let nominal = transport.nominal_kbps()?;
        let scale = match self.signal_level {
            Some(0) => 0.1,
            Some(1) => 0.25,
            Some(2) => 0.5,
            Some(3) => 0.75,
            Some(_) | None => 1.0,
        };
        Some((f64::from(nominal) * scale) as u32)
    }

    /// Derives a connected sample from these capabilities.
    pub fn to_sample(&self, timestamp: DateTime<Utc>) -> NetworkSample {
        let transport = self.transport();
        NetworkSample {
            timestamp,
            transport,
            bandwidth_kbps: self.estimate_kbps(transport),
            metered: !self.not_metered,
            connected: true,
        }
    }
}

/// Connectivity callback from the platform.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ConnectivityEvent {
    /// A network is available. `None` when the platform reports no capabilities.
    Changed(Option<Capabilities>),
    Lost,
}

/// Publishes the current [`NetworkSample`] to any number of subscribers.
///
/// Starts disconnected until the platform reports a network.
pub struct NetworkQualityMonitor {
    thresholds: QualityThresholds,
    tx: watch::Sender<NetworkSample>,
}

impl NetworkQualityMonitor {
    pub fn new(thresholds: QualityThresholds) -> Self {
        let (tx, _rx) = watch::channel(NetworkSample::disconnected(Utc::now()));
        NetworkQualityMonitor { thresholds, tx }
    }

    /// Classifies a connectivity event and publishes the resulting sample.
    ///
    /// Returns true if subscribers were notified.
    pub fn handle(&self, event: ConnectivityEvent) -> bool {
        let now = Utc::now();
        let sample = match event {
            ConnectivityEvent::Lost => NetworkSample::disconnected(now),
            ConnectivityEvent::Changed(None) => NetworkSample {
                timestamp: now,
                transport: TransportType::Unknown,
                bandwidth_kbps: None,
                metered: false,
                connected: true,
            },
            ConnectivityEvent::Changed(Some(caps)) => caps.to_sample(now),
        };
        self.publish(sample)
    }

    /// Replaces the current sample. Returns true if subscribers were notified.
    pub fn publish(&self, sample: NetworkSample) -> bool {
        let thresholds = self.thresholds;
        self.tx.send_if_modified(|current| {
            let changed = !current.same_class(&sample, &thresholds);
            if changed {
                info!(
                    connected = sample.connected,
                    transport = %sample.transport,
                    tier = %sample.tier(&thresholds),
                    metered = sample.metered,
                    "network quality changed"
                );
            } else {
                debug!(bandwidth_kbps = ?sample.bandwidth_kbps, "network sample refreshed");
            }
            *current = sample;
            changed
        })
    }

    /// The most recent sample.
    pub fn current(&self) -> NetworkSample {
        self.tx.borrow().clone()
    }

    pub fn subscribe(&self) -> watch::Receiver<NetworkSample> {
        self.tx.subscribe()
    }
}

impl Default for NetworkQualityMonitor {
    fn default() -> Self {
        NetworkQualityMonitor::new(QualityThresholds::default())
    }
}

#[cfg(test)]
#[path = "network_tests.rs"]
mod tests;
