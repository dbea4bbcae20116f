// SPDX-License-Identifier: Apache-2.0
// © James Ross Ω FLYING•ROBOTS <https://github.com/flyingrobots>
//! Object identity and identity indirection.
//!
//! The registry keys records by the address of an `Arc` allocation. Each
//! [`Identity`] also carries a `Weak` handle to that allocation:
//!
//! - The `Weak` keeps the allocation (not the value) from being freed, so an
//!   address cannot be handed to a different object while a record still
//!   refers to it.
//! - Once the last strong owner is gone the `Weak` no longer upgrades, and the
//!   record is treated as stale: invisible to lookups and evicted by the next
//!   sweep. The registry therefore never extends a guarded value's lifetime.
//! - The value is dropped with its last strong owner, but the `Arc`
//!   allocation itself, including the inline storage of `T`, stays reserved
//!   until the stale record is swept. Hosts that guard large inline values
//!   and churn through them should call [`Registry::sweep`](crate::Registry::sweep)
//!   at quiet points.
//!
//! [`MonitorTarget`] is the indirection seam. A façade (for example a view
//! over a collection) implements it by returning its backing object's
//! identity, so every façade over that backing object shares one record.

use std::any::Any;
use std::sync::{Arc, Weak};

/// Stable identity of a guarded allocation.
#[derive(Clone)]
pub struct Identity {
    addr: usize,
    handle: Weak<dyn Any + Send + Sync>,
}

impl Identity {
    /// Identity of the allocation behind `arc`.
    pub fn of<T>(arc: &Arc<T>) -> Self
    where
        T: Any + Send + Sync,
    {
        let handle = Arc::downgrade(arc);
        let handle: Weak<dyn Any + Send + Sync> = handle;
        Self {
            addr: Arc::as_ptr(arc).cast::<()>() as usize,
            handle,
        }
    }

    /// Address used as the table key.
    pub const fn addr(&self) -> usize {
        self.addr
    }

    /// Whether the identified value still has a strong owner.
    pub fn is_alive(&self) -> bool {
        self.handle.strong_count() > 0
    }

    /// Whether `self` and `other` name the same allocation.
    pub fn same_as(&self, other: &Self) -> bool {
        self.addr == other.addr
    }

    pub(crate) fn downgrade(&self) -> Weak<dyn Any + Send + Sync> {
        self.handle.clone()
    }
}

impl std::fmt::Debug for Identity {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Identity")
            .field("addr", &format_args!("{:#x}", self.addr))
            .field("alive", &self.is_alive())
            .finish()
    }
}

impl PartialEq for Identity {
    fn eq(&self, other: &Self) -> bool {
        self.same_as(other)
    }
}

impl Eq for Identity {}

/// Anything the registry can monitor.
///
/// Implemented for every `Arc<T>`. Wrapper types implement it by forwarding
/// to the object whose contract they share.
///
/// # Example
///
/// ```
/// use std::sync::Arc;
/// use access_cop::{Identity, MonitorTarget, Policy, Registry};
///
/// struct Backing(Vec<u8>);
///
/// struct View {
///     backing: Arc<Backing>,
/// }
///
/// impl MonitorTarget for View {
///     fn monitor_identity(&self) -> Identity {
///         self.backing.monitor_identity()
///     }
/// }
///
/// let registry = Registry::new();
/// let backing = Arc::new(Backing(vec![1, 2, 3]));
/// let view = View { backing: Arc::clone(&backing) };
///
/// registry.monitor(&backing, Policy::ReadOnly);
/// assert_eq!(registry.current_policy(&view), Policy::ReadOnly);
/// ```
pub trait MonitorTarget {
    /// Identity whose record governs accesses to `self`.
    fn monitor_identity(&self) -> Identity;
}

impl<T> MonitorTarget for Arc<T>
where
    T: Any + Send + Sync,
{
    fn monitor_identity(&self) -> Identity {
        Identity::of(self)
    }
}

impl MonitorTarget for Identity {
    fn monitor_identity(&self) -> Identity {
        self.clone()
    }
}

impl<M> MonitorTarget for &M
where
    M: MonitorTarget + ?Sized,
{
    fn monitor_identity(&self) -> Identity {
        (**self).monitor_identity()
    }
}
