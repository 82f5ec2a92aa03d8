//! Chat-list reconciliation: merges the live conversation snapshot with the
//! locally-pending contact list into one ordered display list.
//!
//! The reconciler is a pure function of its inputs and holds no state
//! across runs. A full recompute per input change trades a little
//! redundant work for the absence of incremental-staleness bugs; list
//! sizes are user-scale.

use std::collections::{HashMap, HashSet};

use crate::{
    error::{ClientError, ClientErrorCategory},
    types::{
        Conversation, DisplayRow, ParticipantSummary, PENDING_ROW_PLACEHOLDER, RowProvenance,
    },
};

/// Outcome of activating (tapping) a display row.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum RowSelection {
    /// The row maps to a persisted conversation; open it directly.
    Open {
        conversation_id: String,
        participant: ParticipantSummary,
    },
    /// Pending row: a direct conversation must be found-or-created first.
    NeedsDirectCreation { contact: ParticipantSummary },
}

/// Build the ordered display list from the current inputs.
///
/// `profiles` is a best-effort cache of participant summaries keyed by
/// user id; a missing or failed entry falls back to a placeholder and
/// never blocks rendering of other rows.
pub fn reconcile(
    conversations: &[Conversation],
    pending_contacts: &[ParticipantSummary],
    current_identity_id: &str,
    profiles: &HashMap<String, ParticipantSummary>,
) -> Vec<DisplayRow> {
    let mut existing_direct_partner_ids: HashSet<&str> = HashSet::new();
    let mut persisted_rows = Vec::with_capacity(conversations.len());

    for conversation in conversations {
        match conversation {
            Conversation::Group(group) => {
                persisted_rows.push(DisplayRow {
                    conversation_id: Some(group.id.clone()),
                    participant: ParticipantSummary::from_group(group),
                    last_message_text: group.last_message_text.clone().unwrap_or_default(),
                    last_message_at: group.last_message_at,
                    provenance: RowProvenance::Persisted,
                });
            }
            Conversation::Direct(direct) => {
                // The subscription only matches conversations the current
                // identity participates in; anything else is skipped.
                let Some(other_id) = direct.other_participant(current_identity_id) else {
                    continue;
                };
                existing_direct_partner_ids.insert(other_id);

                let participant = profiles
                    .get(other_id)
                    .cloned()
                    .unwrap_or_else(|| ParticipantSummary::placeholder(other_id));
                persisted_rows.push(DisplayRow {
                    conversation_id: Some(direct.id.clone()),
                    participant,
                    last_message_text: direct.last_message_text.clone().unwrap_or_default(),
                    last_message_at: direct.last_message_at,
                    provenance: RowProvenance::Persisted,
                });
            }
        }
    }

    // A pending contact is suppressed the moment a real direct
    // conversation with that contact exists, however it came to exist.
    let mut rows: Vec<DisplayRow> = pending_contacts
        .iter()
        .filter(|contact| !existing_direct_partner_ids.contains(contact.id.as_str()))
        .map(|contact| DisplayRow {
            conversation_id: None,
            participant: contact.clone(),
            last_message_text: PENDING_ROW_PLACEHOLDER.to_owned(),
            last_message_at: None,
            provenance: RowProvenance::Pending,
        })
        .collect();
    rows.extend(persisted_rows);

    // Most recent first; rows without a timestamp sort above everything.
    // The sort is stable, so equal keys keep their relative order
    // (pending rows before timestamp-less persisted rows).
    rows.sort_by(|a, b| match (a.last_message_at, b.last_message_at) {
        (None, None) => std::cmp::Ordering::Equal,
        (None, Some(_)) => std::cmp::Ordering::Less,
        (Some(_), None) => std::cmp::Ordering::Greater,
        (Some(a_ts), Some(b_ts)) => b_ts.cmp(&a_ts),
    });

    rows
}

/// Resolve a row activation to its selection outcome.
pub fn resolve_selection(row: &DisplayRow) -> Result<RowSelection, ClientError> {
    match row.provenance {
        RowProvenance::Pending => Ok(RowSelection::NeedsDirectCreation {
            contact: row.participant.clone(),
        }),
        RowProvenance::Persisted => {
            let conversation_id = row.conversation_id.clone().ok_or_else(|| {
                ClientError::new(
                    ClientErrorCategory::Internal,
                    "malformed_row",
                    "persisted display row is missing its conversation id",
                )
            })?;
            Ok(RowSelection::Open {
                conversation_id,
                participant: row.participant.clone(),
            })
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::types::{DirectConversation, GroupConversation, direct_conversation_id};

    const ME: &str = "uid-me";

    fn direct(other: &str, text: Option<&str>, at: Option<u64>) -> Conversation {
        Conversation::Direct(DirectConversation {
            id: direct_conversation_id(ME, other),
            participant_ids: [ME.to_owned(), other.to_owned()],
            last_message_text: text.map(str::to_owned),
            last_message_at: at,
        })
    }

    fn group(id: &str, name: &str, at: Option<u64>) -> Conversation {
        Conversation::Group(GroupConversation {
            id: id.to_owned(),
            name: name.to_owned(),
            participant_ids: vec![ME.to_owned(), "uid-b".to_owned(), "uid-c".to_owned()],
            avatar_url: None,
            created_by: ME.to_owned(),
            last_message_text: None,
            last_message_at: at,
        })
    }

    fn contact(id: &str, name: &str) -> ParticipantSummary {
        ParticipantSummary {
            id: id.to_owned(),
            display_name: name.to_owned(),
            avatar_url: None,
            is_group: false,
            group_name: None,
        }
    }

    fn profiles(entries: &[(&str, &str)]) -> HashMap<String, ParticipantSummary> {
        entries
            .iter()
            .map(|(id, name)| ((*id).to_owned(), contact(id, name)))
            .collect()
    }

    #[test]
    fn identical_inputs_produce_identical_output() {
        let conversations = vec![direct("uid-b", Some("hi"), Some(20)), group("g1", "Team", None)];
        let pending = vec![contact("uid-c", "Cara")];
        let profiles = profiles(&[("uid-b", "Bob")]);

        let first = reconcile(&conversations, &pending, ME, &profiles);
        let second = reconcile(&conversations, &pending, ME, &profiles);
        assert_eq!(first, second);
    }

    #[test]
    fn pending_contact_is_suppressed_by_existing_direct_conversation() {
        let conversations = vec![direct("uid-b", Some("hey"), Some(5))];
        let pending = vec![contact("uid-b", "Bob"), contact("uid-c", "Cara")];

        let rows = reconcile(&conversations, &pending, ME, &HashMap::new());
        let pending_ids: Vec<&str> = rows
            .iter()
            .filter(|row| row.provenance == RowProvenance::Pending)
            .map(|row| row.participant.id.as_str())
            .collect();
        assert_eq!(pending_ids, vec!["uid-c"]);
    }

    #[test]
    fn group_conversations_never_suppress_pending_contacts() {
        let conversations = vec![group("g1", "Team", Some(10))];
        let pending = vec![contact("uid-b", "Bob")];

        let rows = reconcile(&conversations, &pending, ME, &HashMap::new());
        assert_eq!(rows.len(), 2);
        assert_eq!(rows[0].provenance, RowProvenance::Pending);
        assert!(rows[1].participant.is_group);
    }

    #[test]
    fn rows_without_timestamp_sort_first_in_insertion_order() {
        let conversations = vec![
            direct("uid-b", Some("old"), Some(10)),
            direct("uid-c", None, None),
            direct("uid-d", Some("new"), Some(30)),
        ];
        let pending = vec![contact("uid-e", "Eve"), contact("uid-f", "Fay")];
        let profiles = profiles(&[("uid-b", "Bob"), ("uid-c", "Cara"), ("uid-d", "Dan")]);

        let rows = reconcile(&conversations, &pending, ME, &profiles);
        let order: Vec<&str> = rows.iter().map(|row| row.participant.id.as_str()).collect();
        // Pending rows keep their insertion order, followed by the
        // timestamp-less persisted row, then newest-first.
        assert_eq!(order, vec!["uid-e", "uid-f", "uid-c", "uid-d", "uid-b"]);
    }

    #[test]
    fn pending_rows_carry_the_placeholder_text() {
        let rows = reconcile(&[], &[contact("uid-b", "Bob")], ME, &HashMap::new());
        assert_eq!(rows.len(), 1);
        assert_eq!(rows[0].last_message_text, PENDING_ROW_PLACEHOLDER);
        assert_eq!(rows[0].last_message_at, None);
        assert_eq!(rows[0].conversation_id, None);
    }

    #[test]
    fn failed_profile_lookup_falls_back_to_placeholder_per_row() {
        let conversations = vec![
            direct("uid-b", Some("hi"), Some(2)),
            direct("uid-c", Some("yo"), Some(1)),
        ];
        let profiles = profiles(&[("uid-b", "Bob")]);

        let rows = reconcile(&conversations, &[], ME, &profiles);
        assert_eq!(rows.len(), 2);
        assert_eq!(rows[0].participant.display_name, "Bob");
        assert_eq!(rows[1].participant.display_name, "User");
    }

    #[test]
    fn conversations_not_involving_current_identity_are_skipped() {
        let foreign = Conversation::Direct(DirectConversation {
            id: direct_conversation_id("uid-x", "uid-y"),
            participant_ids: ["uid-x".to_owned(), "uid-y".to_owned()],
            last_message_text: None,
            last_message_at: Some(1),
        });
        let rows = reconcile(&[foreign], &[], ME, &HashMap::new());
        assert!(rows.is_empty());
    }

    #[test]
    fn selection_resolves_by_provenance() {
        let conversations = vec![direct("uid-b", Some("hi"), Some(2)), group("g1", "Team", None)];
        let pending = vec![contact("uid-c", "Cara")];
        let rows = reconcile(
            &conversations,
            &pending,
            ME,
            &profiles(&[("uid-b", "Bob")]),
        );

        for row in &rows {
            let selection = resolve_selection(row).expect("rows built here are well-formed");
            match (&row.provenance, selection) {
                (RowProvenance::Pending, RowSelection::NeedsDirectCreation { contact }) => {
                    assert_eq!(contact.id, "uid-c");
                }
                (RowProvenance::Persisted, RowSelection::Open { conversation_id, .. }) => {
                    assert_eq!(row.conversation_id.as_deref(), Some(conversation_id.as_str()));
                }
                (provenance, selection) => {
                    panic!("unexpected selection {selection:?} for {provenance:?}")
                }
            }
        }
    }

    #[test]
    fn selecting_a_group_row_never_requires_creation() {
        let rows = reconcile(&[group("g1", "Team", None)], &[], ME, &HashMap::new());
        let selection = resolve_selection(&rows[0]).expect("group row is well-formed");
        assert!(matches!(selection, RowSelection::Open { .. }));
    }
}
