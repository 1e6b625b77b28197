use crate::error::Error;

/// Length of the callsign and destination fields, including the NUL
/// padding byte that terminates shorter strings.
pub const CALLSIGN_LENGTH: usize = 10;

/// Size of the serialized settings payload in bytes.
pub const SETTINGS_SIZE: usize = 31;

/// Display standby timer steps.
#[derive(strum::FromRepr, Debug, Clone, Copy, PartialEq, Eq, Default)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
#[repr(u8)]
pub enum DisplayTimer {
    Off = 0,
    Secs5 = 1,
    Secs10 = 2,
    Secs15 = 3,
    Secs20 = 4,
    Secs25 = 5,
    #[default]
    Secs30 = 6,
    Min1 = 7,
    Min2 = 8,
    Min3 = 9,
    Min4 = 10,
    Min5 = 11,
    Min15 = 12,
    Min30 = 13,
    Min45 = 14,
    Hour1 = 15,
}

/// Device settings as exposed to the rest of the firmware.
///
/// The serialized layout is part of the on-disk contract and must not
/// change shape; new fields may only be appended, so that records written
/// by older firmware keep loading (see [`crate::raw`]).
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub struct Settings {
    /// Display brightness
    pub brightness: u8,
    /// Display contrast
    pub contrast: u8,
    /// Squelch level
    pub sql_level: u8,
    /// Vox level
    pub vox_level: u8,
    /// Timezone, in units of half hours
    pub utc_timezone: i8,
    /// GPS active
    pub gps_enabled: bool,
    /// Plaintext callsign, NUL padded
    pub callsign: [u8; CALLSIGN_LENGTH],
    /// Display standby timer
    pub display_timer: DisplayTimer,
    /// M17 channel access number, 0..=15
    pub m17_can: u8,
    /// Voice prompt level, 0..=7
    pub vp_level: u8,
    /// Phonetic spell enabled
    pub vp_phonetic_spell: bool,
    /// Automatic latch of the macro menu
    pub macro_menu_latch: bool,
    /// Check M17 CAN on RX
    pub m17_can_rx: bool,
    /// M17 destination, NUL padded
    pub m17_dest: [u8; CALLSIGN_LENGTH],
    /// Battery display, true: icon, false: percentage
    pub show_battery_icon: bool,
    /// Use GPS to adjust RTC time
    pub gps_set_time: bool,
}

impl Default for Settings {
    fn default() -> Self {
        Self {
            brightness: 100,
            contrast: 255,
            sql_level: 4,
            vox_level: 0,
            utc_timezone: 0,
            gps_enabled: false,
            callsign: [0; CALLSIGN_LENGTH],
            display_timer: DisplayTimer::Secs30,
            m17_can: 0,
            vp_level: 0,
            vp_phonetic_spell: false,
            macro_menu_latch: true,
            m17_can_rx: false,
            m17_dest: [0; CALLSIGN_LENGTH],
            show_battery_icon: false,
            gps_set_time: false,
        }
    }
}

impl Settings {
    /// Serialize to the packed on-disk payload layout, little-endian with
    /// two bitfield bytes at offsets 16 and 17.
    pub fn to_bytes(&self) -> [u8; SETTINGS_SIZE] {
        let mut buf = [0u8; SETTINGS_SIZE];
        buf[0] = self.brightness;
        buf[1] = self.contrast;
        buf[2] = self.sql_level;
        buf[3] = self.vox_level;
        buf[4] = self.utc_timezone as u8;
        buf[5] = self.gps_enabled as u8;
        buf[6..16].copy_from_slice(&self.callsign);
        buf[16] = (self.display_timer as u8 & 0x0F) | ((self.m17_can & 0x0F) << 4);
        buf[17] = (self.vp_level & 0x07)
            | ((self.vp_phonetic_spell as u8) << 3)
            | ((self.macro_menu_latch as u8) << 4);
        buf[18] = self.m17_can_rx as u8;
        buf[19..29].copy_from_slice(&self.m17_dest);
        buf[29] = self.show_battery_icon as u8;
        buf[30] = self.gps_set_time as u8;
        buf
    }

    /// Deserialize from the packed on-disk payload layout.
    pub fn from_bytes(buf: &[u8; SETTINGS_SIZE]) -> Self {
        let mut callsign = [0u8; CALLSIGN_LENGTH];
        callsign.copy_from_slice(&buf[6..16]);
        let mut m17_dest = [0u8; CALLSIGN_LENGTH];
        m17_dest.copy_from_slice(&buf[19..29]);

        Self {
            brightness: buf[0],
            contrast: buf[1],
            sql_level: buf[2],
            vox_level: buf[3],
            utc_timezone: buf[4] as i8,
            gps_enabled: buf[5] != 0,
            callsign,
            // All 16 four-bit values map to a timer step, the fallback is
            // unreachable.
            display_timer: DisplayTimer::from_repr(buf[16] & 0x0F).unwrap_or_default(),
            m17_can: buf[16] >> 4,
            vp_level: buf[17] & 0x07,
            vp_phonetic_spell: buf[17] & 0x08 != 0,
            macro_menu_latch: buf[17] & 0x10 != 0,
            m17_can_rx: buf[18] != 0,
            m17_dest,
            show_battery_icon: buf[29] != 0,
            gps_set_time: buf[30] != 0,
        }
    }

    /// The callsign as a string slice, stopping at the NUL padding.
    pub fn callsign_str(&self) -> &str {
        nul_trimmed(&self.callsign)
    }

    /// Set the callsign. At most `CALLSIGN_LENGTH - 1` bytes, so that the
    /// stored field always keeps its NUL terminator.
    pub fn set_callsign(&mut self, callsign: &str) -> Result<(), Error> {
        set_padded(&mut self.callsign, callsign)
    }

    /// The M17 destination as a string slice, stopping at the NUL padding.
    pub fn m17_dest_str(&self) -> &str {
        nul_trimmed(&self.m17_dest)
    }

    /// Set the M17 destination. At most `CALLSIGN_LENGTH - 1` bytes.
    pub fn set_m17_dest(&mut self, dest: &str) -> Result<(), Error> {
        set_padded(&mut self.m17_dest, dest)
    }
}

/// Callsigns are stored in fixed NUL-padded arrays; slice before the first
/// NUL byte to recover the string.
fn nul_trimmed(raw: &[u8]) -> &str {
    let end = raw.iter().position(|&b| b == 0).unwrap_or(raw.len());
    core::str::from_utf8(&raw[..end]).unwrap_or("")
}

fn set_padded(field: &mut [u8; CALLSIGN_LENGTH], value: &str) -> Result<(), Error> {
    let bytes = value.as_bytes();
    if bytes.len() >= CALLSIGN_LENGTH {
        return Err(Error::InvalidArgument);
    }

    field.fill(0);
    field[..bytes.len()].copy_from_slice(bytes);
    Ok(())
}
