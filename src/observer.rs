//! Finding broadcast sources in advertising reports.
//!
//! A broadcast source advertises with non-connectable extended advertising that points at its
//! periodic advertising train and carries a Broadcast Audio Announcement:
//!
//! ```notrust
//! len | 0x16 | 0x52 0x18 | broadcast_id(3) | ...
//! ```
//!
//! The [`ScanObserver`] turns those reports into [`SourceSighting`]s, which carry everything an
//! Add-Source command needs.
//!
//! [`ScanObserver`]: struct.ScanObserver.html
//! [`SourceSighting`]: struct.SourceSighting.html

use crate::{
    ad_structure::AdStructure,
    address::DeviceAddress,
    bytes::ByteReader,
    codec::BroadcastId,
    uuid::BROADCAST_AUDIO_ANNOUNCEMENT,
    Error,
};
use bitflags::bitflags;

bitflags! {
    /// Event type bits of an extended advertising report.
    pub struct ReportProperties: u8 {
        const CONNECTABLE   = 0x01;
        const SCANNABLE     = 0x02;
        const DIRECTED      = 0x04;
        const SCAN_RESPONSE = 0x08;
        const LEGACY        = 0x10;
    }
}

/// One extended advertising report.
#[derive(Debug, Copy, Clone)]
pub struct ScanReport<'a> {
    pub address: DeviceAddress,
    /// Advertising set ID.
    pub sid: u8,
    /// Periodic advertising interval in 1.25 ms units, 0 if the set has no PA train.
    pub interval: u16,
    pub properties: ReportProperties,
    /// Advertising data.
    pub data: &'a [u8],
}

/// A broadcast source seen on air.
#[derive(Debug, Copy, Clone, PartialEq, Eq)]
pub struct SourceSighting {
    pub address: DeviceAddress,
    pub sid: u8,
    pub interval: u16,
    pub broadcast_id: BroadcastId,
}

impl SourceSighting {
    /// Extracts a sighting from a report, if it is from a broadcast source.
    ///
    /// Only non-connectable reports of sets with a PA train are considered. The first Broadcast
    /// Audio Announcement wins. Malformed advertising data ends the search.
    pub fn from_report(report: &ScanReport<'_>) -> Option<Self> {
        if report.properties.contains(ReportProperties::CONNECTABLE) || report.interval == 0 {
            return None;
        }

        for ad in AdStructure::iter(report.data) {
            match ad {
                Ok(AdStructure::ServiceData16 { uuid, data })
                    if uuid == BROADCAST_AUDIO_ANNOUNCEMENT && data.len() >= 3 =>
                {
                    let raw = ByteReader::new(data).read_u24_le().ok()?;
                    return Some(Self {
                        address: report.address,
                        sid: report.sid,
                        interval: report.interval,
                        broadcast_id: BroadcastId::new(raw)?,
                    });
                }
                Ok(_) => {}
                Err(_) => return None,
            }
        }
        None
    }
}

/// Controls the radio's scanner.
pub trait Scanner {
    fn start(&mut self) -> Result<(), Error>;
    fn stop(&mut self) -> Result<(), Error>;
}

/// Receives the broadcast sources found while scanning.
pub trait ScanCallback {
    fn source_found(&mut self, sighting: &SourceSighting);
}

/// Filters advertising reports for broadcast sources.
#[derive(Debug, Default)]
pub struct ScanObserver {
    scanning: bool,
}

impl ScanObserver {
    pub fn new() -> Self {
        Self { scanning: false }
    }

    pub fn is_scanning(&self) -> bool {
        self.scanning
    }

    /// Starts scanning. Fails with `Busy` if already scanning.
    pub fn start<S: Scanner>(&mut self, scanner: &mut S) -> Result<(), Error> {
        if self.scanning {
            return Err(Error::Busy);
        }
        scanner.start()?;
        self.scanning = true;
        debug!("scanning for broadcast sources");
        Ok(())
    }

    /// Stops scanning. Stopping an idle observer does nothing.
    pub fn stop<S: Scanner>(&mut self, scanner: &mut S) -> Result<(), Error> {
        if !self.scanning {
            return Ok(());
        }
        scanner.stop()?;
        self.scanning = false;
        Ok(())
    }

    /// Processes an advertising report, passing any broadcast source in it to `callback`.
    pub fn report<F: ScanCallback>(&mut self, report: &ScanReport<'_>, callback: &mut F) {
        if !self.scanning {
            return;
        }
        if let Some(sighting) = SourceSighting::from_report(report) {
            trace!("broadcast source {:?}", sighting);
            callback.source_found(&sighting);
        }
    }
}
