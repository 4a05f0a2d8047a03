/// Generational slot registry for actors.
///
/// Handles are `(index, generation)`. Removing an entry bumps the slot's
/// generation, so every handle issued before the removal resolves to `None`
/// afterwards instead of aliasing whatever is stored in the slot next.

#[derive(Clone, Copy, PartialEq, Eq, Hash, Debug)]
pub struct ActorId {
    index: u32,
    generation: u32,
}

#[derive(Clone, Debug)]
struct Slot<T> {
    generation: u32,
    value: Option<T>,
}

#[derive(Clone, Debug)]
pub struct Registry<T> {
    slots: Vec<Slot<T>>,
    free: Vec<u32>,
    len: usize,
}

impl<T> Default for Registry<T> {
    fn default() -> Self {
        Registry { slots: Vec::new(), free: Vec::new(), len: 0 }
    }
}

impl<T> Registry<T> {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn len(&self) -> usize { self.len }

    pub fn insert(&mut self, value: T) -> ActorId {
        self.len += 1;
        if let Some(index) = self.free.pop() {
            let slot = &mut self.slots[index as usize];
            slot.value = Some(value);
            return ActorId { index, generation: slot.generation };
        }
        let index = self.slots.len() as u32;
        self.slots.push(Slot { generation: 0, value: Some(value) });
        ActorId { index, generation: 0 }
    }

    /// Insert a value that needs to know its own handle (e.g. an owner
    /// reference held by a sub-object).
    pub fn insert_with(&mut self, make: impl FnOnce(ActorId) -> T) -> ActorId {
        let id = match self.free.last() {
            Some(&index) => ActorId { index, generation: self.slots[index as usize].generation },
            None => ActorId { index: self.slots.len() as u32, generation: 0 },
        };
        let inserted = self.insert(make(id));
        debug_assert_eq!(inserted, id);
        inserted
    }

    pub fn remove(&mut self, id: ActorId) -> Option<T> {
        let slot = self.slots.get_mut(id.index as usize)?;
        if slot.generation != id.generation {
            return None;
        }
        let value = slot.value.take()?;
        slot.generation = slot.generation.wrapping_add(1);
        self.free.push(id.index);
        self.len -= 1;
        Some(value)
    }

    pub fn get(&self, id: ActorId) -> Option<&T> {
        self.slots
            .get(id.index as usize)
            .filter(|s| s.generation == id.generation)
            .and_then(|s| s.value.as_ref())
    }

    pub fn get_mut(&mut self, id: ActorId) -> Option<&mut T> {
        self.slots
            .get_mut(id.index as usize)
            .filter(|s| s.generation == id.generation)
            .and_then(|s| s.value.as_mut())
    }

    pub fn iter(&self) -> impl Iterator<Item = (ActorId, &T)> + '_ {
        self.slots.iter().enumerate().filter_map(|(i, s)| {
            s.value
                .as_ref()
                .map(|v| (ActorId { index: i as u32, generation: s.generation }, v))
        })
    }

    pub fn iter_mut(&mut self) -> impl Iterator<Item = (ActorId, &mut T)> + '_ {
        self.slots.iter_mut().enumerate().filter_map(|(i, s)| {
            let generation = s.generation;
            s.value
                .as_mut()
                .map(move |v| (ActorId { index: i as u32, generation }, v))
        })
    }

    /// Visit every entry mutably and drop those for which `keep` is false.
    pub fn retain(&mut self, mut keep: impl FnMut(&mut T) -> bool) {
        let doomed: Vec<ActorId> = self
            .iter_mut()
            .filter_map(|(id, v)| (!keep(v)).then_some(id))
            .collect();
        for id in doomed {
            self.remove(id);
        }
    }
}
