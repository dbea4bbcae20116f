// SPDX-License-Identifier: Apache-2.0
// © James Ross Ω FLYING•ROBOTS <https://github.com/flyingrobots>
//! Access policies and access kinds.

/// The threading contract declared for a guarded object.
///
/// | Policy | Read | Modify |
/// |---|---|---|
/// | [`Disabled`](Policy::Disabled) | allowed | allowed |
/// | [`ReadOnly`](Policy::ReadOnly) | allowed | `ReadOnly` violation |
/// | [`OwnerThreadOnly`](Policy::OwnerThreadOnly) | owner only | owner only |
/// | [`ExternallySynchronized`](Policy::ExternallySynchronized) | one holder at a time | one holder at a time |
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
pub enum Policy {
    /// The object may be read by any thread and never modified.
    ReadOnly,
    /// Only the thread that declared the policy may touch the object.
    OwnerThreadOnly,
    /// Any thread may touch the object, but accesses must never overlap.
    ExternallySynchronized,
    /// No checking.
    #[default]
    Disabled,
}

impl Policy {
    pub(crate) const fn to_bits(self) -> u8 {
        match self {
            Self::ReadOnly => 1,
            Self::OwnerThreadOnly => 2,
            Self::ExternallySynchronized => 3,
            Self::Disabled => 0,
        }
    }

    /// Decodes a stored policy byte. Unknown bytes yield `None`; callers
    /// treat that as "no rule applies".
    pub(crate) const fn from_bits(bits: u8) -> Option<Self> {
        match bits {
            0 => Some(Self::Disabled),
            1 => Some(Self::ReadOnly),
            2 => Some(Self::OwnerThreadOnly),
            3 => Some(Self::ExternallySynchronized),
            _ => None,
        }
    }

    /// Whether `enter`/`leave` track a holder thread and reentrancy depth
    /// under this policy.
    pub const fn is_bracketed(self) -> bool {
        matches!(self, Self::OwnerThreadOnly | Self::ExternallySynchronized)
    }
}

impl std::fmt::Display for Policy {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let s = match self {
            Self::ReadOnly => "read-only",
            Self::OwnerThreadOnly => "owner-thread-only",
            Self::ExternallySynchronized => "externally-synchronized",
            Self::Disabled => "disabled",
        };
        f.write_str(s)
    }
}

/// What a guarded operation does to its target.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum AccessKind {
    /// Observes state without changing it.
    Read,
    /// Changes state.
    Modify,
}

impl std::fmt::Display for AccessKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Read => f.write_str("read"),
            Self::Modify => f.write_str("modify"),
        }
    }
}

#[cfg(test)]
mod tests {
    #![allow(clippy::unwrap_used)]
    use super::*;

    #[test]
    fn bits_round_trip_for_every_policy() {
        for policy in [
            Policy::ReadOnly,
            Policy::OwnerThreadOnly,
            Policy::ExternallySynchronized,
            Policy::Disabled,
        ] {
            assert_eq!(Policy::from_bits(policy.to_bits()), Some(policy));
        }
    }

    #[test]
    fn unknown_bits_decode_to_none() {
        assert_eq!(Policy::from_bits(0xff), None);
    }

    #[test]
    fn only_thread_bound_policies_are_bracketed() {
        assert!(Policy::OwnerThreadOnly.is_bracketed());
        assert!(Policy::ExternallySynchronized.is_bracketed());
        assert!(!Policy::ReadOnly.is_bracketed());
        assert!(!Policy::Disabled.is_bracketed());
    }
}
