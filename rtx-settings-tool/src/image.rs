use std::fs;
use std::io::Write;
use std::path::Path;

use crate::error::Error;
use rtx_settings::raw::{
    Integrity, SettingsFrame, ERASED_MAGIC, STORE_HEADER_SIZE, STORE_MAGIC, STORE_SIZE,
};
use rtx_settings::Settings;
use serde::Serialize;

/// One frame found in a partition image.
#[derive(Debug, Clone)]
pub struct FrameRecord {
    pub offset: usize,
    pub counter: u16,
    pub length: u16,
    pub integrity: Integrity,
    pub settings: Settings,
}

/// Scan a settings partition image file. See [`scan_image`].
pub fn scan_image_file<P: AsRef<Path>>(path: P) -> Result<Vec<FrameRecord>, Error> {
    let data = fs::read(path)?;
    scan_image(&data)
}

/// Walk the frame chain of a partition image and classify every frame.
///
/// The chain must end in erased (`0xFF`) space or exactly at the end of
/// the image; anything else is reported as an error with the offending
/// offset, like the firmware would treat the partition as corrupt.
pub fn scan_image(data: &[u8]) -> Result<Vec<FrameRecord>, Error> {
    let mut records = vec![];
    let mut offset = 0usize;

    while offset + 6 <= data.len() {
        let magic = u32::from_le_bytes([
            data[offset],
            data[offset + 1],
            data[offset + 2],
            data[offset + 3],
        ]);
        if magic == ERASED_MAGIC {
            return Ok(records);
        }
        if magic != STORE_MAGIC {
            return Err(Error::InvalidChain { offset });
        }

        let length = u16::from_le_bytes([data[offset + 4], data[offset + 5]]) as usize;
        if length < STORE_HEADER_SIZE + 2 {
            return Err(Error::InvalidChain { offset });
        }
        if offset + length > data.len() {
            return Err(Error::TruncatedFrame { offset });
        }

        let frame = SettingsFrame::from_stored_bytes(&data[offset..offset + length])
            .map_err(|source| Error::Frame { offset, source })?;
        records.push(FrameRecord {
            offset,
            counter: frame.counter,
            length: frame.length,
            integrity: frame.integrity(),
            settings: frame.settings,
        });

        offset += length;
    }

    // Whatever is left is too short for a header; accept it only if it
    // looks erased.
    if data[offset..].iter().all(|&b| b == 0xFF) {
        Ok(records)
    } else {
        Err(Error::InvalidChain { offset })
    }
}

/// The newest frame of the chain that still validates, i.e. the one the
/// firmware would load from this partition.
pub fn newest_readable(records: &[FrameRecord]) -> Option<&FrameRecord> {
    records
        .iter()
        .rev()
        .find(|record| record.integrity != Integrity::Corrupt)
}

/// Build a fresh partition image: erased flash with one valid frame at
/// offset zero, counter zero.
pub fn generate_image(settings: &Settings, size: usize) -> Result<Vec<u8>, Error> {
    if size < STORE_SIZE {
        return Err(Error::ImageTooSmall(size));
    }

    let mut data = vec![0xFFu8; size];
    data[..STORE_SIZE].copy_from_slice(&SettingsFrame::new(0, *settings).to_bytes());
    Ok(data)
}

/// Write a fresh partition image to `path`. See [`generate_image`].
pub fn generate_image_file<P: AsRef<Path>>(
    path: P,
    settings: &Settings,
    size: usize,
) -> Result<(), Error> {
    let data = generate_image(settings, size)?;
    fs::write(path, data)?;
    Ok(())
}

#[derive(Serialize)]
struct CsvRecord<'a> {
    offset: usize,
    counter: u16,
    length: u16,
    status: String,
    callsign: &'a str,
    destination: &'a str,
    brightness: u8,
    contrast: u8,
    sql_level: u8,
    vox_level: u8,
    utc_timezone: i8,
    gps_enabled: bool,
}

/// Serialize scanned frames as CSV, one row per frame.
pub fn write_csv<W: Write>(records: &[FrameRecord], writer: W) -> Result<(), Error> {
    let mut csv_writer = csv::Writer::from_writer(writer);

    for record in records {
        csv_writer.serialize(CsvRecord {
            offset: record.offset,
            counter: record.counter,
            length: record.length,
            status: record.integrity.to_string(),
            callsign: record.settings.callsign_str(),
            destination: record.settings.m17_dest_str(),
            brightness: record.settings.brightness,
            contrast: record.settings.contrast,
            sql_level: record.settings.sql_level,
            vox_level: record.settings.vox_level,
            utc_timezone: record.settings.utc_timezone,
            gps_enabled: record.settings.gps_enabled,
        })?;
    }

    csv_writer.flush()?;
    Ok(())
}

/// Write the scanned frames to a CSV file. See [`write_csv`].
pub fn write_csv_file<P: AsRef<Path>>(records: &[FrameRecord], path: P) -> Result<(), Error> {
    let file = fs::File::create(path)?;
    write_csv(records, file)
}
