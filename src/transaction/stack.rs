use crate::error::{Error, Result};

/// One logical transaction on the stack.
///
/// The bottom layer stands for the physical transaction, every layer above it
/// for a savepoint of the same name.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TransactionLayer {
    id: u64,
    name: String,
    active: bool,
}

impl TransactionLayer {
    /// Identifies this layer across its whole life, even if another layer
    /// later reuses the name.
    pub fn id(&self) -> u64 {
        self.id
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    /// `false` once the owning scope has ended and the layer only waits to
    /// be committed.
    pub fn is_active(&self) -> bool {
        self.active
    }
}

/// Transaction layers in nesting order, outermost first.
///
/// Names are unique among the layers currently on the stack.
#[derive(Debug, Default)]
pub struct TransactionStack {
    layers: Vec<TransactionLayer>,
    next_id: u64,
}

impl TransactionStack {
    pub fn new() -> Self {
        Self::default()
    }

    /// Pushes an active layer and returns its id.
    pub fn push(&mut self, name: &str) -> Result<u64> {
        if self.contains(name) {
            return Err(Error::DuplicateTransactionName(name.to_string()));
        }
        let id = self.next_id;
        self.next_id += 1;
        self.layers.push(TransactionLayer {
            id,
            name: name.to_string(),
            active: true,
        });
        Ok(id)
    }

    pub fn pop(&mut self) -> Option<TransactionLayer> {
        self.layers.pop()
    }

    pub fn top(&self) -> Option<&TransactionLayer> {
        self.layers.last()
    }

    pub fn root(&self) -> Option<&TransactionLayer> {
        self.layers.first()
    }

    pub fn get(&self, name: &str) -> Option<&TransactionLayer> {
        self.layers.iter().find(|layer| layer.name == name)
    }

    pub fn contains(&self, name: &str) -> bool {
        self.get(name).is_some()
    }

    /// `true` if the exact layer `id` named `name` is still on the stack.
    pub fn contains_layer(&self, name: &str, id: u64) -> bool {
        self.get(name).is_some_and(|layer| layer.id == id)
    }

    /// Marks `name` as resolved. Returns `false` if it is not on the stack.
    pub fn resolve(&mut self, name: &str) -> bool {
        match self.layers.iter_mut().find(|layer| layer.name == name) {
            Some(layer) => {
                layer.active = false;
                true
            }
            None => false,
        }
    }

    /// Like [`resolve`](Self::resolve), but only for the exact layer `id`.
    pub fn resolve_layer(&mut self, name: &str, id: u64) -> bool {
        self.contains_layer(name, id) && self.resolve(name)
    }

    pub fn clear(&mut self) {
        self.layers.clear();
    }

    pub fn len(&self) -> usize {
        self.layers.len()
    }

    pub fn is_empty(&self) -> bool {
        self.layers.is_empty()
    }

    pub fn layers(&self) -> &[TransactionLayer] {
        &self.layers
    }

    pub fn names(&self) -> impl Iterator<Item = &str> {
        self.layers.iter().map(|layer| layer.name.as_str())
    }
}
