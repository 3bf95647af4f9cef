use std::collections::HashMap;
use std::sync::{Arc, Mutex, PoisonError};

use learn_core::model::LessonId;
use tokio::sync::{Mutex as AsyncMutex, OwnedMutexGuard};

/// One async mutex per lesson so writes for the same lesson run one at a time.
#[derive(Default)]
pub(crate) struct LessonLocks {
    slots: Mutex<HashMap<LessonId, Arc<AsyncMutex<()>>>>,
}

impl LessonLocks {
    pub(crate) async fn acquire(&self, lesson_id: LessonId) -> OwnedMutexGuard<()> {
        let slot = {
            let mut slots = self.slots.lock().unwrap_or_else(PoisonError::into_inner);
            // slots nobody holds or waits on can go
            slots.retain(|id, slot| *id == lesson_id || Arc::strong_count(slot) > 1);
            Arc::clone(slots.entry(lesson_id).or_default())
        };
        slot.lock_owned().await
    }
}
