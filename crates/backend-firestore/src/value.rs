//! Typed-value codec for the Firestore REST API.
//!
//! Firestore documents carry `{"fields": {"name": {"stringValue": ".."}}}`
//! shaped JSON; integers travel as decimal strings. This module holds the
//! generic encode/decode helpers plus the document codecs for the domain
//! types.

use serde_json::{Map, Value, json};

use client_core::{
    ClientError, ClientErrorCategory, Conversation, DirectConversation, GroupConversation,
    Message, ParticipantSummary, UserProfile,
};

pub fn string_value(value: impl Into<String>) -> Value {
    json!({ "stringValue": value.into() })
}

pub fn integer_value(value: u64) -> Value {
    // Firestore encodes 64-bit integers as decimal strings.
    json!({ "integerValue": value.to_string() })
}

pub fn boolean_value(value: bool) -> Value {
    json!({ "booleanValue": value })
}

pub fn array_value(values: Vec<Value>) -> Value {
    json!({ "arrayValue": { "values": values } })
}

pub fn map_value(fields: Map<String, Value>) -> Value {
    json!({ "mapValue": { "fields": fields } })
}

fn decode_error(message: impl Into<String>) -> ClientError {
    ClientError::new(
        ClientErrorCategory::Serialization,
        "document_decode",
        message,
    )
}

/// Fields map of a Firestore document body.
pub fn document_fields(document: &Value) -> Result<&Map<String, Value>, ClientError> {
    document
        .get("fields")
        .and_then(Value::as_object)
        .ok_or_else(|| decode_error("document has no fields object"))
}

/// Trailing path segment of a document `name`.
pub fn document_id(document: &Value) -> Result<&str, ClientError> {
    document
        .get("name")
        .and_then(Value::as_str)
        .and_then(|name| name.rsplit('/').next())
        .ok_or_else(|| decode_error("document has no name"))
}

pub fn field_str(fields: &Map<String, Value>, name: &str) -> Option<String> {
    fields
        .get(name)?
        .get("stringValue")?
        .as_str()
        .map(str::to_owned)
}

pub fn field_u64(fields: &Map<String, Value>, name: &str) -> Option<u64> {
    fields
        .get(name)?
        .get("integerValue")?
        .as_str()?
        .parse()
        .ok()
}

pub fn field_bool(fields: &Map<String, Value>, name: &str) -> Option<bool> {
    fields.get(name)?.get("booleanValue")?.as_bool()
}

pub fn field_str_array(fields: &Map<String, Value>, name: &str) -> Option<Vec<String>> {
    let values = fields
        .get(name)?
        .get("arrayValue")?
        .get("values")?
        .as_array()?;
    values
        .iter()
        .map(|value| value.get("stringValue")?.as_str().map(str::to_owned))
        .collect()
}

fn insert_opt_string(fields: &mut Map<String, Value>, name: &str, value: Option<&str>) {
    if let Some(value) = value {
        fields.insert(name.to_owned(), string_value(value));
    }
}

/// Encode a user profile into `users/{uid}` fields.
pub fn profile_fields(profile: &UserProfile) -> Map<String, Value> {
    let mut fields = Map::new();
    fields.insert("displayName".to_owned(), string_value(&profile.display_name));
    insert_opt_string(&mut fields, "username", profile.username.as_deref());
    insert_opt_string(&mut fields, "dateOfBirth", profile.date_of_birth.as_deref());
    insert_opt_string(&mut fields, "gender", profile.gender.as_deref());
    insert_opt_string(&mut fields, "photoURL", profile.avatar_url.as_deref());
    fields.insert(
        "isProfileComplete".to_owned(),
        boolean_value(profile.is_complete),
    );
    fields
}

/// Decode a `users/{uid}` document.
pub fn decode_profile(document: &Value) -> Result<UserProfile, ClientError> {
    let fields = document_fields(document)?;
    Ok(UserProfile {
        id: document_id(document)?.to_owned(),
        display_name: field_str(fields, "displayName").unwrap_or_default(),
        username: field_str(fields, "username"),
        date_of_birth: field_str(fields, "dateOfBirth"),
        gender: field_str(fields, "gender"),
        avatar_url: field_str(fields, "photoURL"),
        is_complete: field_bool(fields, "isProfileComplete").unwrap_or(false),
    })
}

/// Encode a conversation into `chats/{chatId}` fields.
pub fn conversation_fields(conversation: &Conversation) -> Map<String, Value> {
    let mut fields = Map::new();
    match conversation {
        Conversation::Direct(direct) => {
            fields.insert("isGroup".to_owned(), boolean_value(false));
            fields.insert(
                "participantIds".to_owned(),
                array_value(
                    direct
                        .participant_ids
                        .iter()
                        .map(|id| string_value(id))
                        .collect(),
                ),
            );
            insert_opt_string(
                &mut fields,
                "lastMessageText",
                direct.last_message_text.as_deref(),
            );
            if let Some(at) = direct.last_message_at {
                fields.insert("lastMessageAt".to_owned(), integer_value(at));
            }
        }
        Conversation::Group(group) => {
            fields.insert("isGroup".to_owned(), boolean_value(true));
            fields.insert("groupName".to_owned(), string_value(&group.name));
            fields.insert(
                "participantIds".to_owned(),
                array_value(
                    group
                        .participant_ids
                        .iter()
                        .map(|id| string_value(id))
                        .collect(),
                ),
            );
            fields.insert("createdBy".to_owned(), string_value(&group.created_by));
            insert_opt_string(&mut fields, "groupPhotoURL", group.avatar_url.as_deref());
            insert_opt_string(
                &mut fields,
                "lastMessageText",
                group.last_message_text.as_deref(),
            );
            if let Some(at) = group.last_message_at {
                fields.insert("lastMessageAt".to_owned(), integer_value(at));
            }
        }
    }
    fields
}

/// Decode a `chats/{chatId}` document into the conversation sum type.
pub fn decode_conversation(document: &Value) -> Result<Conversation, ClientError> {
    let fields = document_fields(document)?;
    let id = document_id(document)?.to_owned();
    let participant_ids = field_str_array(fields, "participantIds")
        .ok_or_else(|| decode_error("conversation has no participantIds"))?;
    let last_message_text = field_str(fields, "lastMessageText");
    let last_message_at = field_u64(fields, "lastMessageAt");

    if field_bool(fields, "isGroup").unwrap_or(false) {
        if participant_ids.len() < 2 {
            return Err(decode_error("group conversation has fewer than 2 members"));
        }
        Ok(Conversation::Group(GroupConversation {
            id,
            name: field_str(fields, "groupName").unwrap_or_default(),
            participant_ids,
            avatar_url: field_str(fields, "groupPhotoURL"),
            created_by: field_str(fields, "createdBy").unwrap_or_default(),
            last_message_text,
            last_message_at,
        }))
    } else {
        let [a, b] = participant_ids.as_slice() else {
            return Err(decode_error(
                "direct conversation must have exactly 2 participants",
            ));
        };
        Ok(Conversation::Direct(DirectConversation {
            id,
            participant_ids: [a.clone(), b.clone()],
            last_message_text,
            last_message_at,
        }))
    }
}

/// Encode a message into `chats/{chatId}/messages/{messageId}` fields.
pub fn message_fields(message: &Message) -> Map<String, Value> {
    let mut fields = Map::new();
    fields.insert("text".to_owned(), string_value(&message.text));
    fields.insert("senderId".to_owned(), string_value(&message.sender_id));
    fields.insert("createdAt".to_owned(), integer_value(message.created_at_ms));
    insert_opt_string(
        &mut fields,
        "senderDisplayName",
        message.sender_display_name.as_deref(),
    );
    insert_opt_string(
        &mut fields,
        "senderPhotoURL",
        message.sender_avatar_url.as_deref(),
    );
    fields
}

/// Decode a message document.
pub fn decode_message(document: &Value) -> Result<Message, ClientError> {
    let fields = document_fields(document)?;
    Ok(Message {
        id: document_id(document)?.to_owned(),
        text: field_str(fields, "text").unwrap_or_default(),
        sender_id: field_str(fields, "senderId").unwrap_or_default(),
        created_at_ms: field_u64(fields, "createdAt").unwrap_or(0),
        sender_display_name: field_str(fields, "senderDisplayName"),
        sender_avatar_url: field_str(fields, "senderPhotoURL"),
    })
}

/// Encode a participant summary as a map value (pending-contact mirror).
pub fn participant_map(contact: &ParticipantSummary) -> Value {
    let mut fields = Map::new();
    fields.insert("id".to_owned(), string_value(&contact.id));
    fields.insert("displayName".to_owned(), string_value(&contact.display_name));
    insert_opt_string(&mut fields, "photoURL", contact.avatar_url.as_deref());
    fields.insert("isGroup".to_owned(), boolean_value(contact.is_group));
    insert_opt_string(&mut fields, "groupName", contact.group_name.as_deref());
    map_value(fields)
}

/// Decode one participant summary map value.
pub fn decode_participant(value: &Value) -> Result<ParticipantSummary, ClientError> {
    let fields = value
        .get("mapValue")
        .and_then(|map| map.get("fields"))
        .and_then(Value::as_object)
        .ok_or_else(|| decode_error("participant entry is not a map value"))?;
    Ok(ParticipantSummary {
        id: field_str(fields, "id")
            .ok_or_else(|| decode_error("participant entry has no id"))?,
        display_name: field_str(fields, "displayName").unwrap_or_default(),
        avatar_url: field_str(fields, "photoURL"),
        is_group: field_bool(fields, "isGroup").unwrap_or(false),
        group_name: field_str(fields, "groupName"),
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use client_core::direct_conversation_id;

    fn document(name: &str, fields: Map<String, Value>) -> Value {
        json!({
            "name": format!(
                "projects/demo/databases/(default)/documents/{name}"
            ),
            "fields": fields,
        })
    }

    #[test]
    fn profile_document_round_trip() {
        let profile = UserProfile {
            id: "uid-a".to_owned(),
            display_name: "Alex Morgan".to_owned(),
            username: Some("alexm".to_owned()),
            date_of_birth: Some("2000-05-20".to_owned()),
            gender: Some("non-binary".to_owned()),
            avatar_url: Some("https://cdn.example.org/a.png".to_owned()),
            is_complete: true,
        };

        let doc = document("users/uid-a", profile_fields(&profile));
        let decoded = decode_profile(&doc).expect("profile should decode");
        assert_eq!(decoded, profile);
    }

    #[test]
    fn absent_optional_profile_fields_decode_to_none() {
        let profile = UserProfile {
            id: "uid-b".to_owned(),
            display_name: "Bob".to_owned(),
            ..UserProfile::default()
        };
        let doc = document("users/uid-b", profile_fields(&profile));
        let decoded = decode_profile(&doc).expect("profile should decode");
        assert_eq!(decoded.username, None);
        assert!(!decoded.is_complete);
    }

    #[test]
    fn direct_conversation_document_round_trip() {
        let id = direct_conversation_id("uid-a", "uid-b");
        let conversation = Conversation::Direct(DirectConversation {
            id: id.clone(),
            participant_ids: ["uid-a".to_owned(), "uid-b".to_owned()],
            last_message_text: Some("hello".to_owned()),
            last_message_at: Some(1_756_000_000_000),
        });

        let doc = document(&format!("chats/{id}"), conversation_fields(&conversation));
        let decoded = decode_conversation(&doc).expect("conversation should decode");
        assert_eq!(decoded, conversation);
    }

    #[test]
    fn group_conversation_document_round_trip() {
        let conversation = Conversation::Group(GroupConversation {
            id: "group-1".to_owned(),
            name: "Product Team".to_owned(),
            participant_ids: vec!["uid-a".to_owned(), "uid-b".to_owned(), "uid-c".to_owned()],
            avatar_url: None,
            created_by: "uid-a".to_owned(),
            last_message_text: None,
            last_message_at: None,
        });

        let doc = document("chats/group-1", conversation_fields(&conversation));
        let decoded = decode_conversation(&doc).expect("conversation should decode");
        assert_eq!(decoded, conversation);
    }

    #[test]
    fn rejects_direct_conversation_without_two_participants() {
        let mut fields = Map::new();
        fields.insert("isGroup".to_owned(), boolean_value(false));
        fields.insert(
            "participantIds".to_owned(),
            array_value(vec![string_value("uid-a")]),
        );
        let doc = document("chats/bad", fields);
        let err = decode_conversation(&doc).expect_err("one participant must be rejected");
        assert_eq!(err.code, "document_decode");
    }

    #[test]
    fn message_document_round_trip() {
        let message = Message {
            id: "m-1".to_owned(),
            text: "hello".to_owned(),
            sender_id: "uid-a".to_owned(),
            created_at_ms: 42,
            sender_display_name: Some("Alex".to_owned()),
            sender_avatar_url: None,
        };
        let doc = document("chats/c/messages/m-1", message_fields(&message));
        assert_eq!(decode_message(&doc).expect("message decodes"), message);
    }

    #[test]
    fn participant_map_round_trip() {
        let contact = ParticipantSummary {
            id: "uid-x".to_owned(),
            display_name: "Xena".to_owned(),
            avatar_url: None,
            is_group: false,
            group_name: None,
        };
        let decoded =
            decode_participant(&participant_map(&contact)).expect("participant decodes");
        assert_eq!(decoded, contact);
    }

    #[test]
    fn integers_travel_as_decimal_strings() {
        let value = integer_value(1_756_000_000_000);
        assert_eq!(
            value.get("integerValue").and_then(Value::as_str),
            Some("1756000000000")
        );
    }
}
