//! Fingerprint sensor stand-in.
//!
//! The "finger" alternates between placed and lifted on every capture, so an
//! enrollment runs straight through. During attendance every `match_every`th
//! scan matches the next enrolled id in turn; the others see no finger.

use std::collections::BTreeSet;

use attend_core::sensors::{
    FingerprintSensor, ImageStatus, PersonId, ScanOutcome, SearchMatch, SensorError, TemplateSlot,
};
use log::debug;

pub struct MockSensor {
    templates: BTreeSet<PersonId>,
    capacity: u16,
    match_every: u32,
    scans: u32,
    finger_down: bool,
    next_match: usize,
}

impl MockSensor {
    pub fn new(capacity: u16, match_every: u32) -> Self {
        Self {
            templates: BTreeSet::new(),
            capacity,
            match_every: match_every.max(1),
            scans: 0,
            finger_down: false,
            next_match: 0,
        }
    }

    fn next_enrolled(&mut self) -> Option<PersonId> {
        let id = self.templates.iter().copied().cycle().nth(self.next_match)?;
        self.next_match = (self.next_match + 1) % self.templates.len();
        Some(id)
    }
}

impl FingerprintSensor for MockSensor {
    async fn verify(&mut self) -> Result<(), SensorError> {
        Ok(())
    }

    async fn capture_image(&mut self) -> Result<ImageStatus, SensorError> {
        self.finger_down = !self.finger_down;
        Ok(if self.finger_down {
            ImageStatus::Captured
        } else {
            ImageStatus::NoFinger
        })
    }

    async fn convert_image(&mut self, _slot: TemplateSlot) -> Result<(), SensorError> {
        Ok(())
    }

    async fn create_model(&mut self) -> Result<(), SensorError> {
        Ok(())
    }

    async fn store_model(&mut self, id: PersonId) -> Result<(), SensorError> {
        if id == 0 || id > self.capacity {
            return Err(SensorError::BadLocation);
        }
        debug!("Mock sensor stored template #{}", id);
        self.templates.insert(id);
        Ok(())
    }

    async fn search(&mut self) -> Result<Option<SearchMatch>, SensorError> {
        Ok(self
            .next_enrolled()
            .map(|id| SearchMatch { id, confidence: 150 }))
    }

    async fn empty_database(&mut self) -> Result<(), SensorError> {
        self.templates.clear();
        self.next_match = 0;
        Ok(())
    }

    async fn template_count(&mut self) -> Result<u16, SensorError> {
        Ok(self.templates.len() as u16)
    }

    fn capacity(&self) -> u16 {
        self.capacity
    }

    async fn scan(&mut self) -> Result<ScanOutcome, SensorError> {
        self.scans += 1;
        if self.scans % self.match_every != 0 {
            return Ok(ScanOutcome::NoFinger);
        }
        Ok(match self.search().await? {
            Some(found) => ScanOutcome::Match(found),
            None => ScanOutcome::NoMatch,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use embassy_futures::block_on;

    #[test]
    fn test_scans_cycle_through_enrolled_ids() {
        let mut sensor = MockSensor::new(127, 2);
        block_on(sensor.store_model(3)).unwrap();
        block_on(sensor.store_model(9)).unwrap();

        let outcomes: Vec<ScanOutcome> = (0..4).map(|_| block_on(sensor.scan()).unwrap()).collect();
        assert_eq!(outcomes[0], ScanOutcome::NoFinger);
        assert!(matches!(outcomes[1], ScanOutcome::Match(SearchMatch { id: 3, .. })));
        assert_eq!(outcomes[2], ScanOutcome::NoFinger);
        assert!(matches!(outcomes[3], ScanOutcome::Match(SearchMatch { id: 9, .. })));
    }

    #[test]
    fn test_empty_library_never_matches() {
        let mut sensor = MockSensor::new(127, 1);
        assert_eq!(block_on(sensor.scan()).unwrap(), ScanOutcome::NoMatch);
    }

    #[test]
    fn test_store_rejects_out_of_range_slot() {
        let mut sensor = MockSensor::new(10, 1);
        assert_eq!(
            block_on(sensor.store_model(11)),
            Err(SensorError::BadLocation)
        );
    }
}
