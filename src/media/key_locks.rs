//! Striped locks over storage keys.
//!
//! Attaching a key and deleting its file must not interleave: the file delete
//! runs after the record deletion commits, so an attach that slipped in
//! between would bind a key whose file is about to vanish. Both sides hold
//! the key's stripe from their existence check (or record removal) until the
//! file operation is done.
//!
//! Stripes are always taken in ascending order and before any catalog
//! transaction is opened.

use std::collections::hash_map::DefaultHasher;
use std::collections::BTreeSet;
use std::hash::{Hash, Hasher};
use std::sync::Arc;

use tokio::sync::{Mutex, OwnedMutexGuard};

const STRIPES: usize = 64;

#[derive(Clone)]
pub struct KeyLocks {
    stripes: Arc<Vec<Arc<Mutex<()>>>>,
}

/// Held stripes; released on drop.
pub struct KeyGuard {
    _held: Vec<OwnedMutexGuard<()>>,
}

impl Default for KeyLocks {
    fn default() -> Self {
        Self::new()
    }
}

impl KeyLocks {
    pub fn new() -> Self {
        Self {
            stripes: Arc::new((0..STRIPES).map(|_| Arc::new(Mutex::new(()))).collect()),
        }
    }

    /// Lock the stripes covering `keys`.
    pub async fn lock<'a, I>(&self, keys: I) -> KeyGuard
    where
        I: IntoIterator<Item = &'a str>,
    {
        let indices: BTreeSet<usize> = keys.into_iter().map(stripe_of).collect();
        self.acquire(indices).await
    }

    /// Lock every stripe, for operations whose keys are only known once the
    /// catalog transaction is open.
    pub async fn lock_all(&self) -> KeyGuard {
        self.acquire((0..STRIPES).collect()).await
    }

    async fn acquire(&self, indices: BTreeSet<usize>) -> KeyGuard {
        let mut held = Vec::with_capacity(indices.len());
        for index in indices {
            held.push(self.stripes[index].clone().lock_owned().await);
        }
        KeyGuard { _held: held }
    }
}

fn stripe_of(key: &str) -> usize {
    let mut hasher = DefaultHasher::new();
    key.hash(&mut hasher);
    (hasher.finish() % STRIPES as u64) as usize
}
