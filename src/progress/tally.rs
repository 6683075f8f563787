//! Masbaha tally milestones.
//!
//! The session counter drives celebration tiers: the 33-count rounds of
//! dhikr, the full round of 100, and every thousandth count. The lifetime
//! total never triggers anything; it only ever grows.

/// Celebration tiers, evaluated on the session counter.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Milestone {
  /// One round of 33 (at 33, 66 and 99).
  ThirtyThree,
  /// The full round of 100.
  Hundred,
  /// Every multiple of 1000.
  Thousand,
}

/// Result of one tap on the masbaha.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct TallyTap {
  pub session: u64,
  pub total: u64,
  pub milestone: Option<Milestone>,
}

/// Current session and lifetime counters.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Tally {
  pub session: u64,
  pub total: u64,
}

pub fn milestone_for(session: u64) -> Option<Milestone> {
  match session {
    33 | 66 | 99 => Some(Milestone::ThirtyThree),
    100 => Some(Milestone::Hundred),
    n if n > 0 && n % 1000 == 0 => Some(Milestone::Thousand),
    _ => None,
  }
}

#[cfg(test)]
mod tests {
  use super::*;

  #[test]
  fn test_rounds_of_thirty_three() {
    for session in [33, 66, 99] {
      assert_eq!(milestone_for(session), Some(Milestone::ThirtyThree));
    }
  }

  #[test]
  fn test_full_round_of_one_hundred() {
    assert_eq!(milestone_for(100), Some(Milestone::Hundred));
  }

  #[test]
  fn test_every_thousandth_count() {
    assert_eq!(milestone_for(1000), Some(Milestone::Thousand));
    assert_eq!(milestone_for(2000), Some(Milestone::Thousand));
    assert_eq!(milestone_for(33_000), Some(Milestone::Thousand));
  }

  #[test]
  fn test_ordinary_counts_are_quiet() {
    for session in [1, 32, 34, 67, 98, 101, 200, 999, 1001] {
      assert_eq!(milestone_for(session), None, "session {}", session);
    }
  }
}
