pub mod expr;
pub mod vocabulary;

pub use vocabulary::{convolve, dot, mat_vec, Vocabulary};

use std::sync::{Arc, RwLock, RwLockReadGuard, RwLockWriteGuard};

/// A vocabulary shared between a model's modules and the components inspecting them
pub type SharedVocab = Arc<RwLock<Vocabulary>>;

pub fn shared(vocab: Vocabulary) -> SharedVocab {
    Arc::new(RwLock::new(vocab))
}

pub fn read_vocab(vocab: &SharedVocab) -> RwLockReadGuard<'_, Vocabulary> {
    vocab.read().unwrap_or_else(|e| e.into_inner())
}

pub fn write_vocab(vocab: &SharedVocab) -> RwLockWriteGuard<'_, Vocabulary> {
    vocab.write().unwrap_or_else(|e| e.into_inner())
}
