//! Nonvolatile memory device abstraction.
//!
//! A device is anything with a flat byte address space that can at least
//! be read. Write, erase and sync are optional capabilities: backends that
//! lack them keep the default implementations, which report
//! [`Error::NotSupported`]. Writes on real flash can only clear bits, so
//! higher layers must target erased regions; erased memory reads as `0xFF`.
//!
//! All dispatch from the access layer goes through [`DeviceOps`], which
//! enforces the device's declared write and erase granularity before the
//! backend is reached. Misaligned writes on some flash controllers corrupt
//! data silently, so they are rejected here with [`Error::InvalidArgument`].

use crate::error::Error;
use embedded_storage::nor_flash::NorFlash;

/// A nonvolatile memory backend.
pub trait NvmDevice {
    /// Human readable device name.
    fn name(&self) -> &str;

    /// Total device size in bytes.
    fn size(&self) -> u32;

    /// Minimum write granularity in bytes, at least 1.
    fn write_size(&self) -> u32;

    /// Minimum erase granularity in bytes. Zero means the device cannot
    /// be erased.
    fn erase_size(&self) -> u32;

    /// Read `data.len()` bytes starting at the device-absolute `address`.
    fn read(&mut self, address: u32, data: &mut [u8]) -> Result<(), Error>;

    /// Program `data` starting at `address`. Both must already respect the
    /// device's write granularity; [`DeviceOps::dev_write`] checks this.
    fn write(&mut self, address: u32, data: &[u8]) -> Result<(), Error> {
        let _ = (address, data);
        Err(Error::NotSupported)
    }

    /// Erase `len` bytes starting at `address` back to the all-ones state.
    fn erase(&mut self, address: u32, len: u32) -> Result<(), Error> {
        let _ = (address, len);
        Err(Error::NotSupported)
    }

    /// Flush any deferred state to the underlying hardware.
    fn sync(&mut self) -> Result<(), Error> {
        Err(Error::NotSupported)
    }
}

/// Checked operations over any [`NvmDevice`].
///
/// Alignment and size-multiple violations fail with
/// [`Error::InvalidArgument`] without invoking the backend hook.
pub trait DeviceOps: NvmDevice {
    /// Byte-aligned read, no granularity restriction.
    fn dev_read(&mut self, address: u32, data: &mut [u8]) -> Result<(), Error> {
        self.read(address, data)
    }

    /// Write with the device's declared granularity enforced.
    fn dev_write(&mut self, address: u32, data: &[u8]) -> Result<(), Error> {
        let align = self.write_size();
        if !address.is_multiple_of(align) || !(data.len() as u32).is_multiple_of(align) {
            return Err(Error::InvalidArgument);
        }

        self.write(address, data)
    }

    /// Erase with the device's declared granularity enforced.
    fn dev_erase(&mut self, address: u32, len: u32) -> Result<(), Error> {
        let align = self.erase_size();
        if align == 0 {
            return Err(Error::NotSupported);
        }
        if !address.is_multiple_of(align) || !len.is_multiple_of(align) {
            return Err(Error::InvalidArgument);
        }

        self.erase(address, len)
    }

    /// Sync device cache and state to its underlying hardware.
    fn dev_sync(&mut self) -> Result<(), Error> {
        self.sync()
    }
}

impl<T: NvmDevice + ?Sized> DeviceOps for T {}

/// Adapter binding any [`embedded_storage`] NOR flash implementation (MCU
/// internal flash, SPI flash drivers) to [`NvmDevice`]. Geometry comes from
/// the trait constants; backend errors collapse to [`Error::Io`].
pub struct NorDevice<T> {
    name: &'static str,
    inner: T,
}

impl<T> NorDevice<T> {
    pub fn new(name: &'static str, inner: T) -> Self {
        Self { name, inner }
    }

    /// Hand back the wrapped flash driver.
    pub fn into_inner(self) -> T {
        self.inner
    }
}

impl<T: NorFlash> NvmDevice for NorDevice<T> {
    fn name(&self) -> &str {
        self.name
    }

    fn size(&self) -> u32 {
        self.inner.capacity() as u32
    }

    fn write_size(&self) -> u32 {
        T::WRITE_SIZE as u32
    }

    fn erase_size(&self) -> u32 {
        T::ERASE_SIZE as u32
    }

    fn read(&mut self, address: u32, data: &mut [u8]) -> Result<(), Error> {
        self.inner.read(address, data).map_err(|_| Error::Io)
    }

    fn write(&mut self, address: u32, data: &[u8]) -> Result<(), Error> {
        self.inner.write(address, data).map_err(|_| Error::Io)
    }

    fn erase(&mut self, address: u32, len: u32) -> Result<(), Error> {
        self.inner.erase(address, address + len).map_err(|_| Error::Io)
    }

    // NOR writes complete synchronously, the default sync stays NotSupported.
}

#[cfg(feature = "std")]
mod file {
    use super::NvmDevice;
    use crate::error::Error;
    use std::fs::{File, OpenOptions};
    use std::io::{Read, Seek, SeekFrom, Write};
    use std::path::Path;

    /// File-backed NVM emulation for hosted builds.
    ///
    /// Writes are byte granular and erase is unsupported, which exercises
    /// the settings layer's manual `0xFF` fill fallback exactly like the
    /// real hosted targets do.
    pub struct FileDevice {
        name: String,
        file: File,
        size: u32,
    }

    impl FileDevice {
        /// Create a new backing file of `size` bytes, filled with `0xFF`
        /// like erased flash. An existing file is truncated.
        pub fn create<P: AsRef<Path>>(path: P, size: u32) -> Result<Self, Error> {
            let mut file = OpenOptions::new()
                .read(true)
                .write(true)
                .create(true)
                .truncate(true)
                .open(path.as_ref())
                .map_err(|_| Error::Io)?;

            let blank = vec![0xFFu8; size as usize];
            file.write_all(&blank).map_err(|_| Error::Io)?;

            Ok(Self {
                name: path.as_ref().display().to_string(),
                file,
                size,
            })
        }

        /// Open an existing backing file; the device size is the file size.
        pub fn open<P: AsRef<Path>>(path: P) -> Result<Self, Error> {
            let file = OpenOptions::new()
                .read(true)
                .write(true)
                .open(path.as_ref())
                .map_err(|_| Error::Io)?;

            let size = file.metadata().map_err(|_| Error::Io)?.len();
            let size = u32::try_from(size).map_err(|_| Error::InvalidArgument)?;

            Ok(Self {
                name: path.as_ref().display().to_string(),
                file,
                size,
            })
        }
    }

    impl NvmDevice for FileDevice {
        fn name(&self) -> &str {
            &self.name
        }

        fn size(&self) -> u32 {
            self.size
        }

        fn write_size(&self) -> u32 {
            1
        }

        fn erase_size(&self) -> u32 {
            0
        }

        fn read(&mut self, address: u32, data: &mut [u8]) -> Result<(), Error> {
            self.file
                .seek(SeekFrom::Start(address as u64))
                .map_err(|_| Error::Io)?;
            self.file.read_exact(data).map_err(|_| Error::Io)
        }

        fn write(&mut self, address: u32, data: &[u8]) -> Result<(), Error> {
            self.file
                .seek(SeekFrom::Start(address as u64))
                .map_err(|_| Error::Io)?;
            self.file.write_all(data).map_err(|_| Error::Io)
        }

        fn sync(&mut self) -> Result<(), Error> {
            self.file.sync_all().map_err(|_| Error::Io)
        }
    }
}

#[cfg(feature = "std")]
pub use file::FileDevice;
