//! Broadcast Audio Source Endpoint (BASE) parsing.
//!
//! A broadcast source describes its BIG in the Basic Audio Announcement service data it sends on
//! the PA train. The delegator only needs the per-subgroup BIS indices and metadata out of it, so
//! codec configurations are skipped.
//!
//! ```notrust
//! presentation_delay(3) | num_subgroups(1)
//! | num_subgroups * { num_bis(1) | codec_id(5) | codec_cfg_len(1) | codec_cfg
//!                   | metadata_len(1) | metadata
//!                   | num_bis * { bis_index(1) | codec_cfg_len(1) | codec_cfg } }
//! ```

use crate::{
    ad_structure::AdStructure,
    bytes::*,
    codec::{BisSync, Metadata},
    config::MAX_SUBGROUPS,
    uuid::BASIC_AUDIO_ANNOUNCEMENT,
    Error,
};
use heapless::Vec;

/// What a BASE says about one subgroup.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct BaseSubgroup {
    /// The BIS indices in this subgroup.
    pub bis: BisSync,
    pub metadata: Metadata,
}

/// The parts of a BASE the delegator uses.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Base {
    pub presentation_delay: u32,
    pub subgroups: Vec<BaseSubgroup, MAX_SUBGROUPS>,
}

impl Base {
    /// Finds and parses the BASE in a periodic advertising payload.
    ///
    /// Returns `None` if the payload has no Basic Audio Announcement or it does not parse.
    pub fn find(pa_data: &[u8]) -> Option<Self> {
        for ad in AdStructure::iter(pa_data) {
            match ad {
                Ok(AdStructure::ServiceData16 { uuid, data })
                    if uuid == BASIC_AUDIO_ANNOUNCEMENT =>
                {
                    return Base::from_bytes(&mut ByteReader::new(data)).ok();
                }
                Ok(_) => {}
                Err(_) => return None,
            }
        }
        None
    }
}

impl FromBytes<'_> for Base {
    fn from_bytes(bytes: &mut ByteReader<'_>) -> Result<Self, Error> {
        let presentation_delay = bytes.read_u24_le()?;
        let num_subgroups = bytes.read_u8()?;
        if num_subgroups == 0 {
            return Err(Error::InvalidValue);
        }

        let mut subgroups = Vec::new();
        for _ in 0..num_subgroups {
            let num_bis = bytes.read_u8()?;
            bytes.read_slice(5)?;
            let cfg_len = bytes.read_u8()?;
            bytes.read_slice(usize::from(cfg_len))?;
            let metadata_len = bytes.read_u8()?;
            let metadata = bytes.read_slice(usize::from(metadata_len))?;

            let mut bis = 0;
            for _ in 0..num_bis {
                let index = bytes.read_u8()?;
                let cfg_len = bytes.read_u8()?;
                bytes.read_slice(usize::from(cfg_len))?;
                bis |= BisSync::from_index(index)
                    .ok_or(Error::InvalidValue)?
                    .as_u32();
            }

            let metadata = match Metadata::from_slice(metadata) {
                Ok(metadata) => metadata,
                Err(()) => {
                    debug!("BASE metadata too long ({} bytes), ignored", metadata.len());
                    Metadata::new()
                }
            };
            // Subgroups beyond what a Receive State can hold are of no use.
            let subgroup = BaseSubgroup {
                bis: BisSync::from_raw(bis),
                metadata,
            };
            if subgroups.push(subgroup).is_err() {
                debug!("BASE subgroup beyond the first {} ignored", MAX_SUBGROUPS);
            }
        }

        Ok(Self {
            presentation_delay,
            subgroups,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[rustfmt::skip]
    const PA_DATA: &[u8] = &[
        // Basic Audio Announcement service data
        0x20, 0x16, 0x51, 0x18,
        // presentation delay 40 ms
        0x40, 0x9C, 0x00,
        // 1 subgroup
        0x01,
        // 2 BIS, LC3
        0x02, 0x06, 0x00, 0x00, 0x00, 0x00,
        // codec config
        0x03, 0x02, 0x01, 0x08,
        // metadata: streaming context
        0x04, 0x03, 0x02, 0x04, 0x00,
        // BIS 1
        0x01, 0x03, 0x02, 0x03, 0x01,
        // BIS 2
        0x02, 0x03, 0x02, 0x03, 0x02,
    ];

    #[test]
    fn parse() {
        let base = Base::find(PA_DATA).unwrap();
        assert_eq!(base.presentation_delay, 40_000);
        assert_eq!(base.subgroups.len(), 1);
        assert_eq!(base.subgroups[0].bis, BisSync::from_raw(0b11));
        assert_eq!(base.subgroups[0].metadata, [0x03, 0x02, 0x04, 0x00]);
    }

    #[test]
    fn truncated() {
        assert_eq!(Base::find(&PA_DATA[..PA_DATA.len() - 1]), None);
        let mut data = PA_DATA.to_vec();
        data[0] -= 2;
        data.truncate(data.len() - 2);
        assert_eq!(Base::find(&data), None);
    }

    #[test]
    fn oversized_parts_dropped() {
        fn subgroup(bis_index: u8, metadata: &[u8]) -> std::vec::Vec<u8> {
            let mut bytes = vec![0x01, 0x06, 0x00, 0x00, 0x00, 0x00, 0x00, metadata.len() as u8];
            bytes.extend_from_slice(metadata);
            bytes.extend_from_slice(&[bis_index, 0x00]);
            bytes
        }

        let mut body = vec![0x40, 0x9C, 0x00, 5];
        body.extend(subgroup(1, &[0xAB; 33]));
        for index in 2..=5 {
            body.extend(subgroup(index, &[0x02, 0x01, 0x02]));
        }
        let mut data = vec![body.len() as u8 + 3, 0x16, 0x51, 0x18];
        data.extend(body);

        let base = Base::find(&data).unwrap();
        assert_eq!(base.subgroups.len(), MAX_SUBGROUPS);
        assert!(base.subgroups[0].metadata.is_empty());
        assert_eq!(base.subgroups[0].bis, BisSync::from_raw(0b0001));
        assert_eq!(base.subgroups[1].metadata, [0x02, 0x01, 0x02]);
        assert_eq!(base.subgroups[3].bis, BisSync::from_raw(0b1000));
    }

    #[test]
    fn other_service_data() {
        assert_eq!(Base::find(&[0x03, 0x16, 0x52, 0x18]), None);
        assert_eq!(Base::find(&[]), None);
    }
}
