use std::collections::HashMap;
use std::hash::Hash;

/// Outcome of diffing a desired collection against the stored one.
#[derive(Debug)]
pub struct Reconciliation<E, D> {
    /// Desired entries with no stored counterpart.
    pub to_add: Vec<D>,
    /// Stored entries absent from the desired collection.
    pub to_remove: Vec<E>,
    /// Desired entries whose stored counterpart differs.
    pub to_update: Vec<D>,
}

/// Three-way diff of two collections keyed by a natural key.
///
/// Used for full-replace updates of a deed's borrowers and cooperative
/// signers, both keyed by person number. `changed` decides whether an entry
/// present on both sides needs an in-place update.
pub fn reconcile<E, D, K, KE, KD, C>(
    existing: Vec<E>,
    desired: Vec<D>,
    existing_key: KE,
    desired_key: KD,
    changed: C,
) -> Reconciliation<E, D>
where
    K: Eq + Hash,
    KE: Fn(&E) -> K,
    KD: Fn(&D) -> K,
    C: Fn(&E, &D) -> bool,
{
    let mut existing_by_key: HashMap<K, E> = existing
        .into_iter()
        .map(|entry| (existing_key(&entry), entry))
        .collect();

    let mut to_add = Vec::new();
    let mut to_update = Vec::new();

    for entry in desired {
        let key = desired_key(&entry);
        match existing_by_key.remove(&key) {
            Some(stored) => {
                if changed(&stored, &entry) {
                    to_update.push(entry);
                }
            }
            None => to_add.push(entry),
        }
    }

    // Whatever was not claimed by a desired entry gets removed.
    let to_remove: Vec<E> = existing_by_key.into_values().collect();

    Reconciliation {
        to_add,
        to_remove,
        to_update,
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[derive(Debug, Clone, PartialEq)]
    struct Stored {
        person_number: String,
        name: String,
    }

    #[derive(Debug, Clone, PartialEq)]
    struct Desired {
        person_number: String,
        name: String,
    }

    fn run(existing: Vec<Stored>, desired: Vec<Desired>) -> Reconciliation<Stored, Desired> {
        reconcile(
            existing,
            desired,
            |s| s.person_number.clone(),
            |d| d.person_number.clone(),
            |s, d| s.name != d.name,
        )
    }

    #[test]
    fn test_add_remove_and_update_branches() {
        let existing = vec![
            Stored {
                person_number: "198001011234".into(),
                name: "Anna".into(),
            },
            Stored {
                person_number: "198502021234".into(),
                name: "Bertil".into(),
            },
        ];
        let desired = vec![
            Desired {
                person_number: "198001011234".into(),
                name: "Anna Andersson".into(),
            },
            Desired {
                person_number: "199003031234".into(),
                name: "Cecilia".into(),
            },
        ];

        let result = run(existing, desired);

        assert_eq!(result.to_add.len(), 1);
        assert_eq!(result.to_add[0].person_number, "199003031234");

        assert_eq!(result.to_remove.len(), 1);
        assert_eq!(result.to_remove[0].person_number, "198502021234");

        assert_eq!(result.to_update.len(), 1);
        assert_eq!(result.to_update[0].name, "Anna Andersson");
    }

    #[test]
    fn test_identical_collections_are_a_no_op() {
        let existing = vec![Stored {
            person_number: "198001011234".into(),
            name: "Anna".into(),
        }];
        let desired = vec![Desired {
            person_number: "198001011234".into(),
            name: "Anna".into(),
        }];

        let result = run(existing, desired);
        assert!(result.to_add.is_empty());
        assert!(result.to_remove.is_empty());
        assert!(result.to_update.is_empty());
    }

    #[test]
    fn test_empty_desired_removes_everything() {
        let existing = vec![Stored {
            person_number: "198001011234".into(),
            name: "Anna".into(),
        }];

        let result = run(existing, vec![]);
        assert_eq!(result.to_remove.len(), 1);
        assert!(result.to_add.is_empty());
    }
}
