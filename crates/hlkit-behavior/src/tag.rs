//! Attachment tags
//!
//! Generation-checked slot map handing out the opaque tags that cross the
//! native boundary. A retired slot bumps its generation, so a stale tag
//! never resolves again even after the slot is reused.

/// Bits of a raw tag holding the slot index; the rest hold the generation.
const INDEX_BITS: u32 = usize::BITS / 2;
const INDEX_MASK: usize = (1 << INDEX_BITS) - 1;
const GENERATION_MASK: u32 = (usize::MAX >> INDEX_BITS) as u32;

/// Opaque attachment tag
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct Tag {
    index: u32,
    generation: u32,
}

impl Tag {
    /// Encode for the native boundary. Never zero.
    pub fn to_raw(self) -> usize {
        ((self.generation as usize) << INDEX_BITS) | (self.index as usize + 1)
    }

    /// Decode a raw tag; `None` for zero.
    pub fn from_raw(raw: usize) -> Option<Self> {
        let slot = raw & INDEX_MASK;
        if slot == 0 {
            return None;
        }
        Some(Self {
            index: (slot - 1) as u32,
            generation: (raw >> INDEX_BITS) as u32,
        })
    }
}

/// Slot map from tags to values.
#[derive(Debug)]
pub struct TagTable<T> {
    items: Vec<Option<(T, u32)>>,
    free_list: Vec<u32>,
    generations: Vec<u32>,
}

impl<T> TagTable<T> {
    pub fn new() -> Self {
        Self {
            items: Vec::new(),
            free_list: Vec::new(),
            generations: Vec::new(),
        }
    }

    /// Mint a tag for `value`.
    pub fn insert(&mut self, value: T) -> Tag {
        if let Some(index) = self.free_list.pop() {
            let generation = self.generations[index as usize];
            self.items[index as usize] = Some((value, generation));
            Tag { index, generation }
        } else {
            let index = self.items.len() as u32;
            self.items.push(Some((value, 0)));
            self.generations.push(0);
            Tag { index, generation: 0 }
        }
    }

    pub fn get(&self, tag: Tag) -> Option<&T> {
        self.items
            .get(tag.index as usize)
            .and_then(|slot| slot.as_ref())
            .filter(|(_, g)| *g == tag.generation)
            .map(|(value, _)| value)
    }

    pub fn contains(&self, tag: Tag) -> bool {
        self.get(tag).is_some()
    }

    /// Retire `tag`, returning its value.
    pub fn remove(&mut self, tag: Tag) -> Option<T> {
        let slot = self.items.get_mut(tag.index as usize)?;
        if !slot.as_ref().is_some_and(|(_, g)| *g == tag.generation) {
            return None;
        }
        let (value, _) = slot.take()?;
        let generation = &mut self.generations[tag.index as usize];
        *generation = generation.wrapping_add(1) & GENERATION_MASK;
        self.free_list.push(tag.index);
        Some(value)
    }

    pub fn len(&self) -> usize {
        self.items.iter().filter(|i| i.is_some()).count()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

impl<T> Default for TagTable<T> {
    fn default() -> Self {
        Self::new()
    }
}
