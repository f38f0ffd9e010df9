//! SPI SD-card storage
//!
//! `platform::Storage` over `embedded-sdmmc`'s raw-handle API: every file
//! operation multiplexes through the one volume manager, which is exactly
//! the shape the trait was cut for.
//!
//! Known limitation: the FAT layer speaks 8.3 short names, so the produced
//! timestring filenames land in their truncated short form on the card.
//! Files remain unambiguous within a deployment (names differ in their
//! leading fields) but a long-filename layer is the eventual fix.

use core::cell::Cell;

use embassy_sync::blocking_mutex::raw::CriticalSectionRawMutex;
use embassy_sync::blocking_mutex::Mutex;
use embedded_sdmmc::{
    BlockDevice, Mode, RawDirectory, RawFile, RawVolume, TimeSource, VolumeIdx, VolumeManager,
};

use platform::storage::Storage;

/// Card-storage failure.
#[derive(Debug, thiserror_no_std::Error)]
pub enum CardError<E: core::fmt::Debug> {
    /// Operation attempted before `mount`.
    #[error("card not mounted")]
    NotMounted,
    /// The filesystem layer failed.
    #[error("filesystem error")]
    Fat(#[from] embedded_sdmmc::Error<E>),
}

/// FAT timestamp source fed from the external RTC.
///
/// The volume manager owns its time source, so updates arrive through a
/// shared cell: the schedule controller refreshes it from the DS3231 at
/// each wake and the FAT layer stamps directory entries from it.
pub struct SharedClock {
    stamp: Mutex<CriticalSectionRawMutex, Cell<embedded_sdmmc::Timestamp>>,
}

impl SharedClock {
    /// A clock reading the FAT epoch until first refreshed.
    #[must_use]
    pub const fn new() -> Self {
        Self {
            stamp: Mutex::new(Cell::new(embedded_sdmmc::Timestamp {
                year_since_1970: 30,
                zero_indexed_month: 0,
                zero_indexed_day: 0,
                hours: 0,
                minutes: 0,
                seconds: 0,
            })),
        }
    }

    /// Refresh from an RTC reading (two-digit years are 20xx).
    pub fn refresh(&self, now: &platform::rtc::Timestamp) {
        let stamp = embedded_sdmmc::Timestamp {
            year_since_1970: now.year.saturating_add(30),
            zero_indexed_month: now.month.saturating_sub(1),
            zero_indexed_day: now.day.saturating_sub(1),
            hours: now.hours,
            minutes: now.minutes,
            seconds: now.seconds,
        };
        self.stamp.lock(|cell| cell.set(stamp));
    }
}

impl Default for SharedClock {
    fn default() -> Self {
        Self::new()
    }
}

impl TimeSource for &'static SharedClock {
    fn get_timestamp(&self) -> embedded_sdmmc::Timestamp {
        self.stamp.lock(Cell::get)
    }
}

/// The card filesystem behind the `Storage` seam.
pub struct CardStorage<D: BlockDevice> {
    vol_mgr: VolumeManager<D, &'static SharedClock>,
    mounted: Option<(RawVolume, RawDirectory)>,
}

impl<D: BlockDevice> CardStorage<D> {
    /// Wrap a block device (an `SdCard`) and the shared FAT clock.
    pub fn new(device: D, clock: &'static SharedClock) -> Self {
        Self {
            vol_mgr: VolumeManager::new(device, clock),
            mounted: None,
        }
    }

    fn root(&self) -> Result<RawDirectory, CardError<D::Error>> {
        self.mounted
            .map(|(_, dir)| dir)
            .ok_or(CardError::NotMounted)
    }
}

impl<D: BlockDevice> Storage for CardStorage<D> {
    type Error = CardError<D::Error>;
    type File = RawFile;

    async fn mount(&mut self) -> Result<(), Self::Error> {
        if self.mounted.is_some() {
            return Ok(());
        }
        let volume = self.vol_mgr.open_raw_volume(VolumeIdx(0))?;
        let root = self.vol_mgr.open_root_dir(volume)?;
        self.mounted = Some((volume, root));
        Ok(())
    }

    async fn unmount(&mut self) -> Result<(), Self::Error> {
        if let Some((volume, root)) = self.mounted.take() {
            self.vol_mgr.close_dir(root)?;
            self.vol_mgr.close_volume(volume)?;
        }
        Ok(())
    }

    async fn create(&mut self, name: &str) -> Result<Self::File, Self::Error> {
        let root = self.root()?;
        let file = self
            .vol_mgr
            .open_file_in_dir(root, name, Mode::ReadWriteCreateOrTruncate)?;
        Ok(file)
    }

    async fn write(&mut self, file: &mut Self::File, buf: &[u8]) -> Result<usize, Self::Error> {
        // The FAT layer writes all-or-nothing; success means every byte.
        self.vol_mgr.write(*file, buf)?;
        Ok(buf.len())
    }

    async fn close(&mut self, file: Self::File) -> Result<(), Self::Error> {
        self.vol_mgr.close_file(file)?;
        Ok(())
    }

    async fn exists(&mut self, name: &str) -> Result<bool, Self::Error> {
        let root = self.root()?;
        Ok(self.vol_mgr.find_directory_entry(root, name).is_ok())
    }

    async fn delete(&mut self, name: &str) -> Result<(), Self::Error> {
        let root = self.root()?;
        self.vol_mgr.delete_file_in_dir(root, name)?;
        Ok(())
    }
}
