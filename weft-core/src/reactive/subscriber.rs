//! Subscriber types for the reactive system.
//!
//! A subscriber entry is one registration of interest: a notification
//! callback paired with the cycle it was registered in. Entries live in a
//! generational arena owned by the runtime. Signals only hold the IDs of the
//! entries that read them, and computations hold the IDs they registered, so
//! removal is O(1) by ID and a freed slot can never be confused with the
//! entry that replaces it.

use std::cell::RefCell;
use std::fmt;
use std::rc::Rc;

use smallvec::SmallVec;

/// Signals prune dead IDs lazily, once a list has grown to at least this size
/// and is about to reallocate.
const PRUNE_THRESHOLD: usize = 16;

/// Notification class of a registration.
///
/// Trigger-class callbacks always run before dependant-class callbacks for the
/// same change. Derived caches register as triggers so they are fresh by the
/// time ordinary watchers look at them.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
pub enum Priority {
    /// High priority; used by memos, lazies, trigger pipes and reconcilers.
    Trigger,

    /// Ordinary watchers and effects.
    #[default]
    Dependant,
}

/// Stable handle to an entry in the subscriber arena.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct SubscriberId {
    index: u32,
    generation: u32,
}

impl SubscriberId {
    /// Slot index of this entry.
    pub fn index(&self) -> u32 {
        self.index
    }

    /// Generation of the slot when this entry was inserted.
    pub fn generation(&self) -> u32 {
        self.generation
    }
}

/// Callback invoked with the cycle stamped at registration time.
pub(crate) type Callback = Rc<dyn Fn(u64)>;

/// IDs a single computation registered during its current cycle.
pub(crate) type Registrations = Rc<RefCell<SmallVec<[SubscriberId; 4]>>>;

/// One registration of interest.
#[derive(Clone)]
pub(crate) struct Subscriber {
    callback: Callback,
    cycle: u64,
}

impl Subscriber {
    pub(crate) fn new(callback: Callback, cycle: u64) -> Self {
        Self { callback, cycle }
    }

    /// The cycle this entry was stamped with.
    pub(crate) fn cycle(&self) -> u64 {
        self.cycle
    }

    /// Invoke the callback. The owner decides whether the stamp is stale.
    pub(crate) fn notify(&self) {
        (self.callback)(self.cycle);
    }
}

impl fmt::Debug for Subscriber {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Subscriber")
            .field("cycle", &self.cycle)
            .finish_non_exhaustive()
    }
}

/// The access listener a computation installs while it is being tracked.
///
/// Reading a signal inside the listener's frame inserts a fresh
/// [`Subscriber`] stamped with `cycle` and records its ID in `owned`, and
/// in the lists of any enclosing owners.
#[derive(Clone)]
pub(crate) struct Listener {
    callback: Callback,
    cycle: u64,
    owned: Registrations,
    owners: SmallVec<[Registrations; 2]>,
}

impl Listener {
    pub(crate) fn new(callback: Callback, cycle: u64, owned: Registrations) -> Self {
        Self {
            callback,
            cycle,
            owned,
            owners: SmallVec::new(),
        }
    }

    /// Also record every entry in `owners`, so releasing any of them frees
    /// this listener's entries too.
    pub(crate) fn owned_by(mut self, owners: impl IntoIterator<Item = Registrations>) -> Self {
        self.owners.extend(owners);
        self
    }

    pub(crate) fn owned(&self) -> &Registrations {
        &self.owned
    }

    pub(crate) fn entry(&self) -> Subscriber {
        Subscriber::new(Rc::clone(&self.callback), self.cycle)
    }

    pub(crate) fn record(&self, id: SubscriberId) {
        self.owned.borrow_mut().push(id);
        for owner in &self.owners {
            owner.borrow_mut().push(id);
        }
    }
}

struct Slot {
    generation: u32,
    entry: Option<Subscriber>,
}

/// Generational arena of subscriber entries.
#[derive(Default)]
pub(crate) struct SubscriberArena {
    slots: Vec<Slot>,
    free: Vec<u32>,
    live: usize,
}

impl SubscriberArena {
    pub(crate) fn insert(&mut self, entry: Subscriber) -> SubscriberId {
        self.live += 1;

        if let Some(index) = self.free.pop() {
            let slot = &mut self.slots[index as usize];
            slot.entry = Some(entry);
            return SubscriberId {
                index,
                generation: slot.generation,
            };
        }

        let index = self.slots.len() as u32;
        self.slots.push(Slot {
            generation: 0,
            entry: Some(entry),
        });
        SubscriberId {
            index,
            generation: 0,
        }
    }

    pub(crate) fn remove(&mut self, id: SubscriberId) -> Option<Subscriber> {
        let slot = self.slots.get_mut(id.index as usize)?;
        if slot.generation != id.generation {
            return None;
        }
        let entry = slot.entry.take()?;
        slot.generation = slot.generation.wrapping_add(1);
        self.free.push(id.index);
        self.live -= 1;
        Some(entry)
    }

    pub(crate) fn get(&self, id: SubscriberId) -> Option<&Subscriber> {
        let slot = self.slots.get(id.index as usize)?;
        if slot.generation != id.generation {
            return None;
        }
        slot.entry.as_ref()
    }

    pub(crate) fn contains(&self, id: SubscriberId) -> bool {
        self.get(id).is_some()
    }

    /// Number of live entries.
    pub(crate) fn len(&self) -> usize {
        self.live
    }
}

/// The two ordered registration lists a signal keeps.
#[derive(Debug, Default)]
pub(crate) struct Subscriptions {
    pub(crate) triggers: SmallVec<[SubscriberId; 2]>,
    pub(crate) dependants: SmallVec<[SubscriberId; 4]>,
}

impl Subscriptions {
    pub(crate) fn push(&mut self, priority: Priority, id: SubscriberId, arena: &SubscriberArena) {
        match priority {
            Priority::Trigger => push_pruned(&mut self.triggers, id, arena),
            Priority::Dependant => push_pruned(&mut self.dependants, id, arena),
        }
    }

    pub(crate) fn is_empty(&self) -> bool {
        self.triggers.is_empty() && self.dependants.is_empty()
    }

    /// Registrations that still point at a live entry.
    pub(crate) fn live_count(&self, arena: &SubscriberArena) -> usize {
        self.triggers
            .iter()
            .chain(self.dependants.iter())
            .filter(|id| arena.contains(**id))
            .count()
    }
}

fn push_pruned<A>(list: &mut SmallVec<A>, id: SubscriberId, arena: &SubscriberArena)
where
    A: smallvec::Array<Item = SubscriberId>,
{
    if list.len() >= PRUNE_THRESHOLD && list.len() == list.capacity() {
        list.retain(|id| arena.contains(*id));
    }
    list.push(id);
}
