//! Urgency levels and triage tickets.
//!
//! A [`Ticket`] is what the front desk hands a patient after triage: the urgency [`Level`] plus a
//! sequence number drawn from a [`TicketCounter`]. The level decides which bucket of the waiting
//! queue the patient joins; the sequence provides the printed label.

use crate::{TriageError, TriageResult};
use serde::{Deserialize, Serialize};
use std::fmt;

/// Number of urgency levels.
pub const LEVEL_COUNT: usize = 5;

/// Ordered urgency classes. Lower values are seen first.
#[derive(Clone, Copy, Debug, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub enum Level {
    Immediate = 0,
    VeryUrgent = 1,
    Urgent = 2,
    Standard = 3,
    NonUrgent = 4,
}

impl Level {
    /// All levels in dispatch order.
    pub const ALL: [Level; LEVEL_COUNT] = [
        Level::Immediate,
        Level::VeryUrgent,
        Level::Urgent,
        Level::Standard,
        Level::NonUrgent,
    ];

    /// Zero-based index, 0 being the most urgent.
    pub fn index(self) -> usize {
        self as usize
    }

    /// Level for a zero-based index, or `None` if out of range.
    pub fn from_index(index: usize) -> Option<Self> {
        Self::ALL.get(index).copied()
    }

    /// Two-letter code printed on tickets.
    pub fn code(self) -> &'static str {
        match self {
            Level::Immediate => "IM",
            Level::VeryUrgent => "VU",
            Level::Urgent => "UR",
            Level::Standard => "ST",
            Level::NonUrgent => "NU",
        }
    }

    pub fn description(self) -> &'static str {
        match self {
            Level::Immediate => "Immediate",
            Level::VeryUrgent => "Very urgent",
            Level::Urgent => "Urgent",
            Level::Standard => "Standard",
            Level::NonUrgent => "Non-urgent",
        }
    }

    /// Parses a level from its index (`"0"`..`"4"`) or its code (case-insensitive).
    ///
    /// # Errors
    ///
    /// Returns [`TriageError::InvalidInput`] for anything else.
    pub fn parse(input: &str) -> TriageResult<Self> {
        let input = input.trim();
        if let Ok(index) = input.parse::<usize>() {
            return Self::from_index(index).ok_or_else(|| {
                TriageError::InvalidInput(format!(
                    "level must be between 0 and {}, got {index}",
                    LEVEL_COUNT - 1
                ))
            });
        }

        Self::ALL
            .into_iter()
            .find(|level| level.code().eq_ignore_ascii_case(input))
            .ok_or_else(|| TriageError::InvalidInput(format!("unknown level '{input}'")))
    }
}

impl fmt::Display for Level {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{} ({})", self.description(), self.index())
    }
}

/// A patient's place in the waiting room.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct Ticket {
    level: Level,
    sequence: u32,
}

impl Ticket {
    pub fn new(level: Level, sequence: u32) -> Self {
        Self { level, sequence }
    }

    pub fn level(&self) -> Level {
        self.level
    }

    pub fn sequence(&self) -> u32 {
        self.sequence
    }

    /// Position printed on the ticket, cycling through 1..=999.
    pub fn position(&self) -> u32 {
        self.sequence % 999 + 1
    }
}

impl fmt::Display for Ticket {
    /// Formats as `<code>-<NNN>`, e.g. `IM-001`.
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}-{:03}", self.level.code(), self.position())
    }
}

/// Source of ticket sequence numbers.
///
/// Owned by the dispatch queue and handed in at construction, so two queues never share hidden
/// numbering state.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub struct TicketCounter {
    next: u32,
}

impl TicketCounter {
    /// Counter whose first issued sequence is `next`.
    pub fn starting_at(next: u32) -> Self {
        Self { next }
    }

    /// Issues a ticket at `level` and advances the counter.
    pub fn issue(&mut self, level: Level) -> Ticket {
        let ticket = Ticket::new(level, self.next);
        self.next = self.next.wrapping_add(1);
        ticket
    }

    /// Makes sure future tickets come after `sequence`.
    pub fn observe(&mut self, sequence: u32) {
        if sequence >= self.next {
            self.next = sequence.wrapping_add(1);
        }
    }

    pub fn peek_next(&self) -> u32 {
        self.next
    }
}
