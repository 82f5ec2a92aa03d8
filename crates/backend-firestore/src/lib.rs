//! Firebase-backed implementations of the client boundary traits.
//!
//! [`FirebaseAuth`] covers sign-in, [`FirestoreStore`] covers document
//! storage, and [`CloudinaryUploader`] covers media hosting, all over plain
//! REST. [`InMemoryBackend`] backs the smoke binary and scenario tests with
//! the same trait surface.

pub mod auth;
pub mod listener;
pub mod media;
pub mod memory;
pub mod store;
pub mod value;

pub use auth::{FirebaseAuth, FirebaseAuthConfig, TokenProvider};
pub use listener::{ListenerHandle, spawn_conversation_listener, spawn_message_listener};
pub use media::{CloudinaryConfig, CloudinaryUploader};
pub use memory::{InMemoryAuth, InMemoryBackend};
pub use store::{FirestoreConfig, FirestoreStore};
