use embedded_sdmmc::{
    Error, Mode, SdCard, SdCardError, TimeSource, Timestamp, VolumeIdx, VolumeManager,
};

use attend_core::storage::Storage;

/// These SD card operations are blocking, same as the rest of the SPI bus
/// traffic. Every call opens the volume, does its work and closes everything
/// again, so nothing is left half-written if power drops between calls.
pub struct SdStorage<S, D, T>
where
    S: embedded_hal::spi::SpiDevice<u8>,
    D: embedded_hal::delay::DelayNs,
    T: TimeSource,
{
    volume_mgr: VolumeManager<SdCard<S, D>, T, 4, 4, 1>,
}

impl<S, D, T> SdStorage<S, D, T>
where
    S: embedded_hal::spi::SpiDevice<u8>,
    D: embedded_hal::delay::DelayNs,
    T: TimeSource,
{
    pub fn new(sd_card: SdCard<S, D>, ts: T) -> Self {
        let volume_mgr = VolumeManager::new(sd_card, ts);

        Self { volume_mgr }
    }

    /// Check that the card answers and has a FAT volume.
    pub fn mount(&self) -> Result<(), Error<SdCardError>> {
        let volume0 = self.volume_mgr.open_volume(VolumeIdx(0))?;
        volume0.close()
    }

    fn write_file(&self, name: &str, mode: Mode, data: &[u8]) -> Result<(), Error<SdCardError>> {
        let volume0 = self.volume_mgr.open_volume(VolumeIdx(0))?;
        let root_dir = volume0.open_root_dir()?;
        let file = root_dir.open_file_in_dir(name, mode)?;

        if !data.is_empty() {
            file.write(data)?;
        }

        // Explicitly close them to flush and handle errors
        file.close()?;
        root_dir.close()?;
        volume0.close()?;
        Ok(())
    }
}

impl<S, D, T> Storage for SdStorage<S, D, T>
where
    S: embedded_hal::spi::SpiDevice<u8>,
    D: embedded_hal::delay::DelayNs,
    T: TimeSource,
{
    type Error = Error<SdCardError>;

    fn exists(&mut self, name: &str) -> Result<bool, Self::Error> {
        let volume0 = self.volume_mgr.open_volume(VolumeIdx(0))?;
        let root_dir = volume0.open_root_dir()?;

        let found = match root_dir.find_directory_entry(name) {
            Ok(_) => true,
            Err(Error::NotFound) => false,
            Err(e) => return Err(e),
        };

        root_dir.close()?;
        volume0.close()?;
        Ok(found)
    }

    fn read_at(&mut self, name: &str, offset: u32, buf: &mut [u8]) -> Result<usize, Self::Error> {
        let volume0 = self.volume_mgr.open_volume(VolumeIdx(0))?;
        let root_dir = volume0.open_root_dir()?;
        let file = root_dir.open_file_in_dir(name, Mode::ReadOnly)?;

        let n = if offset >= file.length() {
            0
        } else {
            file.seek_from_start(offset)?;
            let mut n = 0;
            while n < buf.len() && !file.is_eof() {
                n += file.read(&mut buf[n..])?;
            }
            n
        };

        file.close()?;
        root_dir.close()?;
        volume0.close()?;
        Ok(n)
    }

    fn append(&mut self, name: &str, data: &[u8]) -> Result<(), Self::Error> {
        self.write_file(name, Mode::ReadWriteCreateOrAppend, data)
    }

    fn truncate(&mut self, name: &str) -> Result<(), Self::Error> {
        self.write_file(name, Mode::ReadWriteCreateOrTruncate, &[])
    }

    fn remove(&mut self, name: &str) -> Result<(), Self::Error> {
        let volume0 = self.volume_mgr.open_volume(VolumeIdx(0))?;
        let root_dir = volume0.open_root_dir()?;

        match root_dir.delete_file_in_dir(name) {
            Ok(()) | Err(Error::NotFound) => {}
            Err(e) => return Err(e),
        }

        root_dir.close()?;
        volume0.close()?;
        Ok(())
    }
}

/// The device has no RTC; files get a fixed timestamp.
#[derive(Debug, Default, Clone, Copy)]
pub struct FixedClock;

impl TimeSource for FixedClock {
    fn get_timestamp(&self) -> Timestamp {
        Timestamp {
            year_since_1970: 55,
            zero_indexed_month: 0,
            zero_indexed_day: 0,
            hours: 0,
            minutes: 0,
            seconds: 0,
        }
    }
}
