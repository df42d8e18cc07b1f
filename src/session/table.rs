use super::participant::Participant;
use crate::error::AppleMidiError;

/// Fixed-capacity participant storage.
///
/// Slots are addressed by index; a freed slot is reused by the next
/// insertion. The table never grows past its capacity.
#[derive(Debug)]
pub struct ParticipantTable {
    slots: Vec<Option<Participant>>,
}

impl ParticipantTable {
    /// Create a table with `capacity` slots
    #[must_use]
    pub fn new(capacity: usize) -> Self {
        Self {
            slots: (0..capacity).map(|_| None).collect(),
        }
    }

    /// Number of slots
    #[must_use]
    pub fn capacity(&self) -> usize {
        self.slots.len()
    }

    /// Number of occupied slots
    #[must_use]
    pub fn len(&self) -> usize {
        self.slots.iter().filter(|s| s.is_some()).count()
    }

    /// Whether no slot is occupied
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.slots.iter().all(Option::is_none)
    }

    /// Whether every slot is occupied
    #[must_use]
    pub fn is_full(&self) -> bool {
        self.slots.iter().all(Option::is_some)
    }

    /// Store a participant in the first free slot
    ///
    /// # Errors
    ///
    /// `NoFreeSlot` when the table is full.
    pub fn insert(&mut self, participant: Participant) -> Result<usize, AppleMidiError> {
        let capacity = self.capacity();
        let (index, slot) = self
            .slots
            .iter_mut()
            .enumerate()
            .find(|(_, s)| s.is_none())
            .ok_or(AppleMidiError::NoFreeSlot { capacity })?;
        *slot = Some(participant);
        Ok(index)
    }

    /// Participant in slot `index`
    #[must_use]
    pub fn get(&self, index: usize) -> Option<&Participant> {
        self.slots.get(index).and_then(Option::as_ref)
    }

    /// Mutable participant in slot `index`
    pub fn get_mut(&mut self, index: usize) -> Option<&mut Participant> {
        self.slots.get_mut(index).and_then(Option::as_mut)
    }

    /// Free slot `index`
    pub fn remove(&mut self, index: usize) -> Option<Participant> {
        self.slots.get_mut(index).and_then(Option::take)
    }

    /// Slot holding the participant with `ssrc`; zero never matches
    #[must_use]
    pub fn find_by_ssrc(&self, ssrc: u32) -> Option<usize> {
        if ssrc == 0 {
            return None;
        }
        self.position(|p| p.ssrc == ssrc)
    }

    /// Participant with `ssrc`
    #[must_use]
    pub fn by_ssrc(&self, ssrc: u32) -> Option<&Participant> {
        self.find_by_ssrc(ssrc).and_then(|i| self.get(i))
    }

    /// Occupied slots with their indices
    pub fn iter(&self) -> impl Iterator<Item = (usize, &Participant)> {
        self.slots
            .iter()
            .enumerate()
            .filter_map(|(i, s)| s.as_ref().map(|p| (i, p)))
    }

    /// Indices of occupied slots, snapshot for mutation loops
    #[must_use]
    pub fn indices(&self) -> Vec<usize> {
        self.iter().map(|(i, _)| i).collect()
    }

    /// Empty every slot, returning the former occupants
    pub fn drain(&mut self) -> Vec<Participant> {
        self.slots.iter_mut().filter_map(Option::take).collect()
    }

    fn position(&self, pred: impl Fn(&Participant) -> bool) -> Option<usize> {
        self.iter().find(|(_, p)| pred(p)).map(|(i, _)| i)
    }
}
