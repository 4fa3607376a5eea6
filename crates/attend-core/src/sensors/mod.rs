//! Fingerprint sensor abstraction
//!
//! [`FingerprintSensor`] exposes the primitive operations of an optical
//! fingerprint module. [`FingerprintSensor::scan`] composes them into the
//! single identify step attendance mode needs; enrollment drives the
//! primitives directly.

pub mod r30x;

pub use r30x::R30xSensor;

use thiserror_no_std::Error;

/// Template slot number on the sensor. Enrollment ids run `1..=capacity`.
pub type PersonId = u16;

#[derive(Error, Debug, Clone, Copy, PartialEq, Eq)]
pub enum SensorError {
    #[error("sensor did not answer in time")]
    Timeout,
    #[error("communication error")]
    Communication,
    #[error("imaging error")]
    ImageFailed,
    #[error("image too messy")]
    ImageMessy,
    #[error("could not find fingerprint features")]
    FeatureFailed,
    #[error("fingerprints did not match")]
    EnrollMismatch,
    #[error("could not store in that location")]
    BadLocation,
    #[error("error writing to flash")]
    FlashError,
    #[error("sensor not found")]
    NotFound,
    #[error("malformed response packet")]
    Protocol,
    #[error("unknown error (code {0:#04x})")]
    Other(u8),
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ImageStatus {
    Captured,
    NoFinger,
}

/// Character buffer an image is converted into
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TemplateSlot {
    First = 1,
    Second = 2,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct SearchMatch {
    pub id: PersonId,
    pub confidence: u16,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ScanOutcome {
    Match(SearchMatch),
    /// A readable finger that is not enrolled
    NoMatch,
    NoFinger,
    /// A finger was there but the image could not be used
    Unreadable,
}

pub trait FingerprintSensor {
    /// Check the sensor is present and accepts our password.
    fn verify(&mut self) -> impl Future<Output = Result<(), SensorError>>;

    fn capture_image(&mut self) -> impl Future<Output = Result<ImageStatus, SensorError>>;

    /// Convert the last captured image into features in `slot`.
    fn convert_image(
        &mut self,
        slot: TemplateSlot,
    ) -> impl Future<Output = Result<(), SensorError>>;

    /// Combine both slots into a template.
    fn create_model(&mut self) -> impl Future<Output = Result<(), SensorError>>;

    fn store_model(&mut self, id: PersonId) -> impl Future<Output = Result<(), SensorError>>;

    /// Search the library for the features in the first slot.
    fn search(&mut self) -> impl Future<Output = Result<Option<SearchMatch>, SensorError>>;

    fn empty_database(&mut self) -> impl Future<Output = Result<(), SensorError>>;

    fn template_count(&mut self) -> impl Future<Output = Result<u16, SensorError>>;

    fn capacity(&self) -> u16;

    /// Capture, convert and search in one go.
    fn scan(&mut self) -> impl Future<Output = Result<ScanOutcome, SensorError>> {
        async move {
            if self.capture_image().await? == ImageStatus::NoFinger {
                return Ok(ScanOutcome::NoFinger);
            }
            match self.convert_image(TemplateSlot::First).await {
                Ok(()) => {}
                Err(
                    SensorError::ImageFailed | SensorError::ImageMessy | SensorError::FeatureFailed,
                ) => return Ok(ScanOutcome::Unreadable),
                Err(e) => return Err(e),
            }
            Ok(match self.search().await? {
                Some(found) => ScanOutcome::Match(found),
                None => ScanOutcome::NoMatch,
            })
        }
    }
}

impl<T: FingerprintSensor + ?Sized> FingerprintSensor for &mut T {
    fn verify(&mut self) -> impl Future<Output = Result<(), SensorError>> {
        (**self).verify()
    }

    fn capture_image(&mut self) -> impl Future<Output = Result<ImageStatus, SensorError>> {
        (**self).capture_image()
    }

    fn convert_image(
        &mut self,
        slot: TemplateSlot,
    ) -> impl Future<Output = Result<(), SensorError>> {
        (**self).convert_image(slot)
    }

    fn create_model(&mut self) -> impl Future<Output = Result<(), SensorError>> {
        (**self).create_model()
    }

    fn store_model(&mut self, id: PersonId) -> impl Future<Output = Result<(), SensorError>> {
        (**self).store_model(id)
    }

    fn search(&mut self) -> impl Future<Output = Result<Option<SearchMatch>, SensorError>> {
        (**self).search()
    }

    fn empty_database(&mut self) -> impl Future<Output = Result<(), SensorError>> {
        (**self).empty_database()
    }

    fn template_count(&mut self) -> impl Future<Output = Result<u16, SensorError>> {
        (**self).template_count()
    }

    fn capacity(&self) -> u16 {
        (**self).capacity()
    }
}
