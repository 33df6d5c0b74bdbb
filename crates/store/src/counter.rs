use confgate_core::dependency::CountedEntity;
use confgate_core::error::StoreResult;
use confgate_core::store::RowCounter;
use dashmap::DashMap;

/// Row counter answering from counts set by the embedding application.
/// Entities that were never set count as zero.
#[derive(Default)]
pub struct FixedRowCounter {
    counts: DashMap<CountedEntity, u64>,
}

impl FixedRowCounter {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_count(entity: CountedEntity, count: u64) -> Self {
        let counter = Self::new();
        counter.set(entity, count);
        counter
    }

    pub fn set(&self, entity: CountedEntity, count: u64) {
        self.counts.insert(entity, count);
    }
}

impl RowCounter for FixedRowCounter {
    fn count(&self, entity: CountedEntity) -> StoreResult<u64> {
        Ok(self.counts.get(&entity).map(|c| *c).unwrap_or(0))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_counts_default_to_zero() {
        let counter = FixedRowCounter::new();
        assert_eq!(counter.count(CountedEntity::User).unwrap(), 0);
        counter.set(CountedEntity::User, 3);
        assert_eq!(counter.count(CountedEntity::User).unwrap(), 3);
    }
}
