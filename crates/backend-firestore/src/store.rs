//! Firestore REST adapter for the [`CloudStore`] boundary.
//!
//! Collections mirror the backend layout: `users/{uid}`, `chats/{chatId}`,
//! `chats/{chatId}/messages/{messageId}`, and `pendingChats/{uid}` for the
//! remote pending-contact mirror.

use std::sync::Arc;
use std::time::{Duration, SystemTime, UNIX_EPOCH};

use async_trait::async_trait;
use reqwest::StatusCode;
use serde_json::{Map, Value, json};
use tracing::debug;
use uuid::Uuid;

use client_core::{
    ClientError, ClientErrorCategory, CloudStore, Conversation, Message, OutgoingMessage,
    ParticipantSummary, UserProfile, classify_http_status, direct_conversation_id,
};

use crate::auth::TokenProvider;
use crate::value;

const DEFAULT_FIRESTORE_BASE_URL: &str = "https://firestore.googleapis.com";
const HTTP_TIMEOUT: Duration = Duration::from_secs(30);

/// Sentinel past the last code point, used for prefix range queries.
const PREFIX_UPPER_BOUND: char = '\u{f8ff}';

#[derive(Debug, Clone)]
pub struct FirestoreConfig {
    pub project_id: String,
    /// Override for tests; defaults to the public Firestore endpoint.
    pub base_url: String,
}

impl FirestoreConfig {
    pub fn new(project_id: impl Into<String>) -> Self {
        Self {
            project_id: project_id.into(),
            base_url: DEFAULT_FIRESTORE_BASE_URL.to_owned(),
        }
    }
}

/// Firestore-backed [`CloudStore`].
pub struct FirestoreStore {
    http: reqwest::Client,
    config: FirestoreConfig,
    tokens: Arc<dyn TokenProvider>,
}

fn now_ms() -> u64 {
    SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .map(|elapsed| elapsed.as_millis() as u64)
        .unwrap_or(0)
}

fn transport_error(err: reqwest::Error) -> ClientError {
    ClientError::new(ClientErrorCategory::Network, "store_request", err.to_string())
}

impl FirestoreStore {
    pub fn new(
        config: FirestoreConfig,
        tokens: Arc<dyn TokenProvider>,
    ) -> Result<Self, ClientError> {
        let http = reqwest::Client::builder()
            .timeout(HTTP_TIMEOUT)
            .build()
            .map_err(|err| {
                ClientError::new(
                    ClientErrorCategory::Config,
                    "http_client_build",
                    err.to_string(),
                )
            })?;
        Ok(Self {
            http,
            config,
            tokens,
        })
    }

    /// `projects/{p}/databases/(default)/documents` resource prefix.
    fn documents_root(&self) -> String {
        format!(
            "projects/{}/databases/(default)/documents",
            self.config.project_id
        )
    }

    fn documents_url(&self, path: &str) -> String {
        format!("{}/v1/{}/{path}", self.config.base_url, self.documents_root())
    }

    fn authorized(&self, request: reqwest::RequestBuilder) -> reqwest::RequestBuilder {
        match self.tokens.bearer_token() {
            Some(token) => request.bearer_auth(token),
            None => request,
        }
    }

    async fn fail_for_status(
        op: &'static str,
        response: reqwest::Response,
    ) -> Result<reqwest::Response, ClientError> {
        let status = response.status();
        if status.is_success() {
            return Ok(response);
        }
        let detail = response.text().await.unwrap_or_default();
        Err(ClientError::new(
            classify_http_status(status.as_u16()),
            op,
            format!("{op} rejected with status {status}: {detail}"),
        ))
    }

    /// Fetch one document; missing documents become `None`.
    async fn get_document(
        &self,
        op: &'static str,
        path: &str,
    ) -> Result<Option<Value>, ClientError> {
        let response = self
            .authorized(self.http.get(self.documents_url(path)))
            .send()
            .await
            .map_err(transport_error)?;
        if response.status() == StatusCode::NOT_FOUND {
            return Ok(None);
        }
        let response = Self::fail_for_status(op, response).await?;
        let document = response.json().await.map_err(|err| {
            ClientError::new(ClientErrorCategory::Serialization, op, err.to_string())
        })?;
        Ok(Some(document))
    }

    /// Merge-write a document, creating it when absent.
    async fn patch_document(
        &self,
        op: &'static str,
        path: &str,
        fields: Map<String, Value>,
    ) -> Result<(), ClientError> {
        let response = self
            .authorized(self.http.patch(self.documents_url(path)))
            .json(&json!({ "fields": fields }))
            .send()
            .await
            .map_err(transport_error)?;
        Self::fail_for_status(op, response).await?;
        Ok(())
    }

    /// Create a document with a caller-chosen id. `ALREADY_EXISTS` surfaces
    /// as a Conflict error for the caller to interpret.
    async fn create_document(
        &self,
        op: &'static str,
        collection: &str,
        document_id: &str,
        fields: Map<String, Value>,
    ) -> Result<(), ClientError> {
        let url = format!(
            "{}/v1/{}/{collection}?documentId={document_id}",
            self.config.base_url,
            self.documents_root()
        );
        let response = self
            .authorized(self.http.post(url))
            .json(&json!({ "fields": fields }))
            .send()
            .await
            .map_err(transport_error)?;
        Self::fail_for_status(op, response).await?;
        Ok(())
    }

    /// Run a structured query, returning the matched document bodies.
    async fn run_query(
        &self,
        op: &'static str,
        parent: Option<&str>,
        structured_query: Value,
    ) -> Result<Vec<Value>, ClientError> {
        let url = match parent {
            Some(parent) => format!("{}:runQuery", self.documents_url(parent)),
            None => format!(
                "{}/v1/{}:runQuery",
                self.config.base_url,
                self.documents_root()
            ),
        };
        let response = self
            .authorized(self.http.post(url))
            .json(&json!({ "structuredQuery": structured_query }))
            .send()
            .await
            .map_err(transport_error)?;
        let response = Self::fail_for_status(op, response).await?;
        let entries: Vec<Value> = response.json().await.map_err(|err| {
            ClientError::new(ClientErrorCategory::Serialization, op, err.to_string())
        })?;
        // The stream interleaves read-time markers with documents.
        Ok(entries
            .into_iter()
            .filter_map(|mut entry| {
                entry
                    .get_mut("document")
                    .map(Value::take)
            })
            .collect())
    }

    /// Atomic multi-write commit.
    async fn commit(&self, op: &'static str, writes: Vec<Value>) -> Result<(), ClientError> {
        let url = format!(
            "{}/v1/{}:commit",
            self.config.base_url,
            self.documents_root()
        );
        let response = self
            .authorized(self.http.post(url))
            .json(&json!({ "writes": writes }))
            .send()
            .await
            .map_err(transport_error)?;
        Self::fail_for_status(op, response).await?;
        Ok(())
    }

    fn prefix_filter(field: &str, prefix: &str) -> Value {
        let upper = format!("{prefix}{PREFIX_UPPER_BOUND}");
        json!({
            "compositeFilter": {
                "op": "AND",
                "filters": [
                    {
                        "fieldFilter": {
                            "field": { "fieldPath": field },
                            "op": "GREATER_THAN_OR_EQUAL",
                            "value": { "stringValue": prefix },
                        }
                    },
                    {
                        "fieldFilter": {
                            "field": { "fieldPath": field },
                            "op": "LESS_THAN",
                            "value": { "stringValue": upper },
                        }
                    },
                ],
            }
        })
    }

    async fn users_by_prefix(
        &self,
        field: &str,
        prefix: &str,
        limit: usize,
    ) -> Result<Vec<UserProfile>, ClientError> {
        let documents = self
            .run_query(
                "search_users",
                None,
                json!({
                    "from": [{ "collectionId": "users" }],
                    "where": Self::prefix_filter(field, prefix),
                    "limit": limit,
                }),
            )
            .await?;
        documents.iter().map(value::decode_profile).collect()
    }
}

#[async_trait]
impl CloudStore for FirestoreStore {
    async fn profile(&self, user_id: &str) -> Result<Option<UserProfile>, ClientError> {
        let path = format!("users/{user_id}");
        match self.get_document("load_profile", &path).await? {
            Some(document) => Ok(Some(value::decode_profile(&document)?)),
            None => Ok(None),
        }
    }

    async fn is_profile_complete(&self, user_id: &str) -> Result<bool, ClientError> {
        // Missing document reads as incomplete, not as an error.
        Ok(self
            .profile(user_id)
            .await?
            .map(|profile| profile.is_complete)
            .unwrap_or(false))
    }

    async fn upsert_profile(&self, profile: &UserProfile) -> Result<(), ClientError> {
        let path = format!("users/{}", profile.id);
        self.patch_document("save_profile", &path, value::profile_fields(profile))
            .await
    }

    async fn is_username_taken(&self, username: &str) -> Result<bool, ClientError> {
        let documents = self
            .run_query(
                "check_username",
                None,
                json!({
                    "from": [{ "collectionId": "users" }],
                    "where": {
                        "fieldFilter": {
                            "field": { "fieldPath": "username" },
                            "op": "EQUAL",
                            "value": { "stringValue": username },
                        }
                    },
                    "limit": 1,
                }),
            )
            .await?;
        Ok(!documents.is_empty())
    }

    async fn search_users(
        &self,
        query: &str,
        limit: usize,
    ) -> Result<Vec<ParticipantSummary>, ClientError> {
        let by_username = self.users_by_prefix("username", query, limit).await?;
        let by_display_name = self.users_by_prefix("displayName", query, limit).await?;

        let mut results: Vec<ParticipantSummary> = Vec::new();
        for profile in by_username.iter().chain(by_display_name.iter()) {
            if results.iter().any(|existing| existing.id == profile.id) {
                continue;
            }
            results.push(ParticipantSummary::from_profile(profile));
            if results.len() == limit {
                break;
            }
        }
        Ok(results)
    }

    async fn conversations_for(&self, user_id: &str) -> Result<Vec<Conversation>, ClientError> {
        let documents = self
            .run_query(
                "load_conversations",
                None,
                json!({
                    "from": [{ "collectionId": "chats" }],
                    "where": {
                        "fieldFilter": {
                            "field": { "fieldPath": "participantIds" },
                            "op": "ARRAY_CONTAINS",
                            "value": { "stringValue": user_id },
                        }
                    },
                }),
            )
            .await?;
        documents.iter().map(value::decode_conversation).collect()
    }

    async fn find_or_create_direct(&self, a: &str, b: &str) -> Result<String, ClientError> {
        let id = direct_conversation_id(a, b);
        let path = format!("chats/{id}");
        if self.get_document("find_direct", &path).await?.is_some() {
            return Ok(id);
        }

        let (first, second) = if a <= b { (a, b) } else { (b, a) };
        let conversation = Conversation::Direct(client_core::DirectConversation {
            id: id.clone(),
            participant_ids: [first.to_owned(), second.to_owned()],
            last_message_text: None,
            last_message_at: None,
        });
        debug!(conversation_id = %id, "creating direct conversation");
        match self
            .create_document(
                "create_direct",
                "chats",
                &id,
                value::conversation_fields(&conversation),
            )
            .await
        {
            Ok(()) => Ok(id),
            // Lost the creation race; the other writer produced the same
            // canonical document.
            Err(err) if err.category == ClientErrorCategory::Conflict => Ok(id),
            Err(err) => Err(err),
        }
    }

    async fn create_group(
        &self,
        creator_id: &str,
        name: &str,
        participant_ids: &[String],
        avatar_url: Option<&str>,
    ) -> Result<String, ClientError> {
        let id = format!("group-{}", Uuid::new_v4());
        let mut members: Vec<String> = participant_ids.to_vec();
        if !members.iter().any(|member| member == creator_id) {
            members.push(creator_id.to_owned());
        }
        let conversation = Conversation::Group(client_core::GroupConversation {
            id: id.clone(),
            name: name.to_owned(),
            participant_ids: members,
            avatar_url: avatar_url.map(str::to_owned),
            created_by: creator_id.to_owned(),
            last_message_text: None,
            last_message_at: None,
        });
        debug!(conversation_id = %id, "creating group conversation");
        self.create_document(
            "create_group",
            "chats",
            &id,
            value::conversation_fields(&conversation),
        )
        .await?;
        Ok(id)
    }

    async fn messages(&self, conversation_id: &str) -> Result<Vec<Message>, ClientError> {
        let parent = format!("chats/{conversation_id}");
        let documents = self
            .run_query(
                "load_messages",
                Some(&parent),
                json!({
                    "from": [{ "collectionId": "messages" }],
                    "orderBy": [{
                        "field": { "fieldPath": "createdAt" },
                        "direction": "ASCENDING",
                    }],
                }),
            )
            .await?;
        documents.iter().map(value::decode_message).collect()
    }

    async fn send_message(
        &self,
        conversation_id: &str,
        outgoing: &OutgoingMessage,
    ) -> Result<String, ClientError> {
        let message_id = Uuid::new_v4().to_string();
        let message = Message {
            id: message_id.clone(),
            text: outgoing.text.clone(),
            sender_id: outgoing.sender_id.clone(),
            created_at_ms: now_ms(),
            sender_display_name: outgoing.sender_display_name.clone(),
            sender_avatar_url: outgoing.sender_avatar_url.clone(),
        };

        let root = self.documents_root();
        let mut last_message_fields = Map::new();
        last_message_fields.insert(
            "lastMessageText".to_owned(),
            value::string_value(&message.text),
        );
        last_message_fields.insert(
            "lastMessageAt".to_owned(),
            value::integer_value(message.created_at_ms),
        );

        // One commit covers both writes, so the appended message and the
        // parent's last-message fields land together or not at all.
        self.commit(
            "send_message",
            vec![
                json!({
                    "update": {
                        "name": format!(
                            "{root}/chats/{conversation_id}/messages/{message_id}"
                        ),
                        "fields": value::message_fields(&message),
                    },
                    "currentDocument": { "exists": false },
                }),
                json!({
                    "update": {
                        "name": format!("{root}/chats/{conversation_id}"),
                        "fields": last_message_fields,
                    },
                    "updateMask": {
                        "fieldPaths": ["lastMessageText", "lastMessageAt"],
                    },
                }),
            ],
        )
        .await?;
        Ok(message_id)
    }

    async fn pending_contacts(
        &self,
        user_id: &str,
    ) -> Result<Vec<ParticipantSummary>, ClientError> {
        let path = format!("pendingChats/{user_id}");
        let Some(document) = self.get_document("load_pending", &path).await? else {
            return Ok(Vec::new());
        };
        let fields = value::document_fields(&document)?;
        let Some(entries) = fields
            .get("contacts")
            .and_then(|field| field.get("arrayValue"))
            .and_then(|array| array.get("values"))
            .and_then(Value::as_array)
        else {
            return Ok(Vec::new());
        };
        entries.iter().map(value::decode_participant).collect()
    }

    async fn put_pending_contacts(
        &self,
        user_id: &str,
        contacts: &[ParticipantSummary],
    ) -> Result<(), ClientError> {
        let path = format!("pendingChats/{user_id}");
        let mut fields = Map::new();
        fields.insert(
            "contacts".to_owned(),
            value::array_value(contacts.iter().map(value::participant_map).collect()),
        );
        self.patch_document("save_pending", &path, fields).await
    }
}
