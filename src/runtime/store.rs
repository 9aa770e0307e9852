use std::any::Any;
use std::marker::PhantomData;
use std::sync::Arc;

use dashmap::DashMap;
use dashmap::mapref::entry::Entry;

use crate::runtime::blueprint::NodeIndex;
use crate::runtime::context::NodeContext;

/// Values a node may keep in a store cell.
pub trait StoreValue: Clone + Default + Send + Sync + 'static {}

impl<T: Clone + Default + Send + Sync + 'static> StoreValue for T {}

type Cell = Arc<dyn Any + Send + Sync>;

/// Store cells keyed by `(node, slot)`.
///
/// The node index is part of every key, so two node instances never share
/// a cell. Reads of a missing cell (or a cell holding another type) return
/// `T::default()`.
#[derive(Clone, Default)]
pub(crate) struct StoreArena {
    cells: DashMap<(NodeIndex, usize), Cell>,
}

impl StoreArena {
    pub(crate) fn read<T: StoreValue>(&self, node: NodeIndex, slot: usize) -> T {
        self.cells
            .get(&(node, slot))
            .and_then(|cell| cell.value().as_ref().downcast_ref::<T>().cloned())
            .unwrap_or_default()
    }

    pub(crate) fn write<T: StoreValue>(&self, node: NodeIndex, slot: usize, value: T) {
        self.cells.insert((node, slot), Arc::new(value));
    }

    /// Stores `value` and returns the previous one in a single step.
    pub(crate) fn replace<T: StoreValue>(&self, node: NodeIndex, slot: usize, value: T) -> T {
        match self.cells.entry((node, slot)) {
            Entry::Occupied(mut entry) => {
                let previous = std::mem::replace(entry.get_mut(), Arc::new(value));
                previous.as_ref().downcast_ref::<T>().cloned().unwrap_or_default()
            }
            Entry::Vacant(entry) => {
                entry.insert(Arc::new(value));
                T::default()
            }
        }
    }

    #[cfg(test)]
    pub(crate) fn len(&self) -> usize {
        self.cells.len()
    }
}

/// A cell that lives as long as the field, scoped to one node instance.
pub struct GlobalStore<T> {
    slot: usize,
    _marker: PhantomData<fn() -> T>,
}

/// A cell that lives as long as one pulse (and the pulses forked from it),
/// scoped to one node instance.
pub struct LocalStore<T> {
    slot: usize,
    _marker: PhantomData<fn() -> T>,
}

impl<T: StoreValue> GlobalStore<T> {
    pub const fn new(slot: usize) -> Self {
        Self {
            slot,
            _marker: PhantomData,
        }
    }

    pub fn read(&self, ctx: &NodeContext<'_>) -> T {
        ctx.field().globals().read(ctx.node(), self.slot)
    }

    pub fn write(&self, ctx: &NodeContext<'_>, value: T) {
        ctx.field().globals().write(ctx.node(), self.slot, value);
    }

    pub fn replace(&self, ctx: &NodeContext<'_>, value: T) -> T {
        ctx.field().globals().replace(ctx.node(), self.slot, value)
    }
}

impl<T: StoreValue> LocalStore<T> {
    pub const fn new(slot: usize) -> Self {
        Self {
            slot,
            _marker: PhantomData,
        }
    }

    pub fn read(&self, ctx: &NodeContext<'_>) -> T {
        ctx.pulse().locals().read(ctx.node(), self.slot)
    }

    pub fn write(&self, ctx: &NodeContext<'_>, value: T) {
        ctx.pulse().locals().write(ctx.node(), self.slot, value);
    }

    pub fn replace(&self, ctx: &NodeContext<'_>, value: T) -> T {
        ctx.pulse().locals().replace(ctx.node(), self.slot, value)
    }
}

impl<T> std::fmt::Debug for GlobalStore<T> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "GlobalStore({})", self.slot)
    }
}

impl<T> std::fmt::Debug for LocalStore<T> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "LocalStore({})", self.slot)
    }
}
