//! Storage abstraction for the removable card (write side)
//!
//! File operations go through the storage handle rather than a free-standing
//! file object because card filesystem drivers (FAT over SPI) multiplex every
//! file operation through one volume manager. `File` is therefore an opaque
//! handle, not an independent object.

/// Storage trait for card file access.
///
/// The recording core treats a short write (`write` returning fewer bytes
/// than requested) as a data-integrity fault and a failed `close` after a
/// complete capture as non-fatal-but-logged; those policies live in the
/// core, not here.
pub trait Storage {
    /// Error type
    type Error: core::fmt::Debug;
    /// Opaque open-file handle
    type File;

    /// Mount the card volume. Must precede any file operation.
    fn mount(&mut self) -> impl core::future::Future<Output = Result<(), Self::Error>>;

    /// Unmount the card volume.
    fn unmount(&mut self) -> impl core::future::Future<Output = Result<(), Self::Error>>;

    /// Open `name` for writing, creating it or truncating an existing file.
    fn create(
        &mut self,
        name: &str,
    ) -> impl core::future::Future<Output = Result<Self::File, Self::Error>>;

    /// Append `buf` to the open file, returning the number of bytes written.
    fn write(
        &mut self,
        file: &mut Self::File,
        buf: &[u8],
    ) -> impl core::future::Future<Output = Result<usize, Self::Error>>;

    /// Close the file, flushing directory metadata.
    fn close(
        &mut self,
        file: Self::File,
    ) -> impl core::future::Future<Output = Result<(), Self::Error>>;

    /// Check whether `name` exists.
    fn exists(
        &mut self,
        name: &str,
    ) -> impl core::future::Future<Output = Result<bool, Self::Error>>;

    /// Delete `name`. Deleting a missing file is an error.
    fn delete(
        &mut self,
        name: &str,
    ) -> impl core::future::Future<Output = Result<(), Self::Error>>;
}
