use crate::access::NvmTable;
use crate::error::Error;
use crate::raw::{Integrity, SettingsFrame, ERASED_MAGIC, STORE_HEADER_SIZE, STORE_MAGIC, STORE_SIZE};
#[cfg(feature = "defmt")]
use defmt::trace;

/// State of a settings partition as inferred by the last scan.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub(crate) enum PartitionState {
    /// Holds at least one readable frame; appends continue after it.
    Clean,
    /// Fully erased, the first write lands at offset zero.
    Empty,
    /// Malformed chain or no readable frame; must be erased before writing.
    Corrupt,
}

/// Outcome of searching a partition for its newest readable frame.
pub(crate) enum PartitionScan {
    Corrupt,
    Empty,
    Stale { frame: SettingsFrame, free_offset: u32 },
    Valid { frame: SettingsFrame, free_offset: u32 },
}

/// Walk a partition's frame chain and return the offset of the last frame
/// header before the erased tail, looking no further than `limit`.
///
/// Makes no guarantee that the frame found is sound. Fails with
/// [`Error::NotFound`] when the partition starts erased and with
/// [`Error::IllSequence`] when the chain ends in anything but erased
/// memory, including a header whose length could not possibly frame a
/// store.
pub(crate) fn parse_partition(
    nvm: &mut NvmTable<'_>,
    area: u32,
    part: u32,
    limit: u32,
) -> Result<u32, Error> {
    let mut buffer = [0u8; 6];
    let mut offset = 0u32;
    let mut prev_offset = 0u32;
    let mut magic = ERASED_MAGIC;

    while offset < limit {
        nvm.read(area, part, offset, &mut buffer)?;

        magic = u32::from_le_bytes([buffer[0], buffer[1], buffer[2], buffer[3]]);
        if magic != STORE_MAGIC {
            break;
        }

        let len = u16::from_le_bytes([buffer[4], buffer[5]]) as u32;
        if len < (STORE_HEADER_SIZE + 2) as u32 {
            // A link this short cannot frame a store and would stall the
            // walk; the partition contains invalid data.
            return Err(Error::IllSequence);
        }

        prev_offset = offset;
        offset += len;
    }

    if magic != ERASED_MAGIC {
        return Err(Error::IllSequence); // Partition contains invalid data
    }
    if offset == prev_offset {
        return Err(Error::NotFound); // Empty partition
    }

    Ok(prev_offset)
}

/// Read the frame starting at `offset`, honoring shorter lengths written
/// by older firmware. No integrity check happens here.
pub(crate) fn read_store(
    nvm: &mut NvmTable<'_>,
    area: u32,
    part: u32,
    offset: u32,
) -> Result<SettingsFrame, Error> {
    let mut buffer = [0u8; STORE_SIZE];
    nvm.read(area, part, offset, &mut buffer[..STORE_HEADER_SIZE])?;

    let length = u16::from_le_bytes([buffer[4], buffer[5]]) as usize;
    if length > STORE_SIZE {
        return Err(Error::TooLarge);
    }
    if length < STORE_HEADER_SIZE + 2 {
        return Err(Error::InvalidArgument);
    }

    nvm.read(
        area,
        part,
        offset + STORE_HEADER_SIZE as u32,
        &mut buffer[STORE_HEADER_SIZE..length],
    )?;

    SettingsFrame::from_stored_bytes(&buffer[..length])
}

/// Find the newest frame in a partition that still validates, along with
/// the offset of the free space behind the newest frame of any kind.
///
/// A corrupt frame at the tail (a torn write) makes the search back off
/// and retry on the frames before it; the reported free offset stays past
/// the corruption so that the next save notices the wasted space.
pub(crate) fn find_latest_valid_store(
    nvm: &mut NvmTable<'_>,
    area: u32,
    part: u32,
) -> Result<PartitionScan, Error> {
    let info = nvm.partition(area, part)?;

    let mut end_limit = info.size;
    let mut free_offset = 0u32;

    while end_limit > 0 {
        let read_offset = match parse_partition(nvm, area, part, end_limit) {
            Ok(offset) => offset,
            Err(Error::IllSequence) => return Ok(PartitionScan::Corrupt),
            Err(Error::NotFound) => return Ok(PartitionScan::Empty),
            Err(e) => return Err(e),
        };

        let frame = read_store(nvm, area, part, read_offset)?;

        if free_offset == 0 {
            free_offset = read_offset + frame.length as u32;
        }

        match frame.integrity() {
            Integrity::Valid => return Ok(PartitionScan::Valid { frame, free_offset }),
            Integrity::Stale => return Ok(PartitionScan::Stale { frame, free_offset }),
            Integrity::Corrupt => {
                // Limit the next walk to end before the frame just rejected.
                end_limit -= frame.length as u32;
            }
        }
    }

    // No frame validated, the partition is considered corrupted.
    Ok(PartitionScan::Corrupt)
}

/// Append a frame to a partition, erasing it first when requested or when
/// the frame no longer fits. `offset` is advanced past the written frame
/// and rewinds to zero on erase.
pub(crate) fn write_store(
    nvm: &mut NvmTable<'_>,
    area: u32,
    part: u32,
    frame: &SettingsFrame,
    offset: &mut u32,
    mut erase: bool,
) -> Result<(), Error> {
    let info = nvm.partition(area, part)?;

    // Check if we have enough space to append the frame.
    if *offset + STORE_SIZE as u32 > info.size {
        erase = true;
    }

    if erase {
        #[cfg(feature = "defmt")]
        trace!("write_store: erasing partition {}", part);

        match nvm.erase(area, part, 0, info.size) {
            Err(Error::NotSupported) => {
                // The device cannot erase (file-backed emulation); restore
                // the erased state manually with 0xFF fills.
                let ones = [0xFFu8; 4];
                let mut i = 0u32;
                while i < info.size - 4 {
                    nvm.write(area, part, i, &ones)?;
                    i += 4;
                }
                while i < info.size {
                    nvm.write(area, part, i, &ones[..1])?;
                    i += 1;
                }
            }
            Err(e) => return Err(e),
            Ok(()) => {}
        }

        *offset = 0;
    }

    #[cfg(feature = "defmt")]
    trace!("write_store: part {} @{:#08x}", part, *offset);

    nvm.write(area, part, *offset, &frame.to_bytes())?;
    *offset += STORE_SIZE as u32;

    Ok(())
}
