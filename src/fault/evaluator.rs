//! # Fault-signal evaluation.
//!
//! Pure mapping from a communication-fault value to a supervision status,
//! plus the guard conditions applied before a fault update may drive the
//! state machine.

use tracing::warn;

use crate::fault::tracker::FaultRecord;
use crate::status::SupervisionStatus;
use crate::topology::EntityRef;

/// Maps a fault value to the status it implies: `Down` iff the fault is set.
#[inline]
pub fn evaluate(fault_value: bool) -> SupervisionStatus {
    if fault_value {
        SupervisionStatus::Down
    } else {
        SupervisionStatus::Running
    }
}

/// Guard: a fault record may drive the state machine only once its tag has
/// actually received a value. A tag that was never written must not be
/// interpreted as "no fault".
///
/// Logs and returns false for unset records.
pub fn can_update(record: &FaultRecord) -> bool {
    if record.value.is_none() {
        warn!(
            entity = %record.entity,
            "ignoring fault record whose tag never received a value"
        );
        return false;
    }
    true
}

/// Guard: detects a fault channel wired to the wrong supervision record.
///
/// Flags the inconsistency without failing; the caller logs it and still
/// attempts the update.
pub fn has_id_mismatch(fault_entity: &EntityRef, state_entity: &EntityRef) -> bool {
    fault_entity.kind != state_entity.kind
        || fault_entity.id != state_entity.id
        || fault_entity.name != state_entity.name
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_evaluate() {
        assert_eq!(evaluate(true), SupervisionStatus::Down);
        assert_eq!(evaluate(false), SupervisionStatus::Running);
    }

    #[test]
    fn test_can_update_requires_a_value() {
        let entity = EntityRef::equipment(1, "E1");
        let unset = FaultRecord {
            entity: entity.clone(),
            value: None,
            timestamp: 0,
        };
        assert!(!can_update(&unset));

        let set = FaultRecord {
            entity,
            value: Some(false),
            timestamp: 10,
        };
        assert!(can_update(&set));
    }

    #[test]
    fn test_id_mismatch_detects_miswiring() {
        let a = EntityRef::equipment(1, "E1");
        let b = EntityRef::equipment(1, "E1");
        assert!(!has_id_mismatch(&a, &b));

        let renamed = EntityRef::equipment(1, "E1_OTHER");
        assert!(has_id_mismatch(&a, &renamed));

        let sub = EntityRef::subequipment(1, "E1");
        assert!(has_id_mismatch(&a, &sub));
    }
}
