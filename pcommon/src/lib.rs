//! Shared utilities and strongly-typed common values for workspace crates.
//!
//! ```rust
//! use pcommon::{ClientId, ConversationId, MessageId, MetadataMap, SamplingOptions};
//!
//! let client = ClientId::from("client-1");
//! let conversation = ConversationId::new("conv-1");
//! let message = MessageId::generate();
//! let mut metadata = MetadataMap::new();
//! metadata.insert("tenant".to_string(), "acme".to_string());
//!
//! let options = SamplingOptions::default().with_temperature(0.3).with_top_p(0.9);
//! assert_eq!(client.as_str(), "client-1");
//! assert_eq!(conversation.to_string(), "conv-1");
//! assert!(!message.as_str().is_empty());
//! assert_eq!(options.top_p, Some(0.9));
//! ```

pub mod future {
    //! Shared async future aliases.
    //!
    //! ```rust
    //! use pcommon::BoxFuture;
    //!
    //! fn str_len<'a>(value: &'a str) -> BoxFuture<'a, usize> {
    //!     Box::pin(async move { value.len() })
    //! }
    //!
    //! let _future = str_len("hello");
    //! ```

    use std::future::Future;
    use std::pin::Pin;

    pub type BoxFuture<'a, T> = Pin<Box<dyn Future<Output = T> + Send + 'a>>;
}

pub mod context {
    //! Shared metadata and cross-crate identifier newtypes.
    //!
    //! Identifiers are opaque strings. Server-assigned ones are UUID v4.
    //!
    //! ```rust
    //! use pcommon::{ClientId, MessageId};
    //!
    //! let client = ClientId::generate();
    //! let message = MessageId::from("msg-42");
    //!
    //! assert_eq!(client.as_str().len(), 36);
    //! assert_eq!(message.as_str(), "msg-42");
    //! ```

    use std::collections::HashMap;

    use serde::{Deserialize, Serialize};

    pub type MetadataMap = HashMap<String, String>;

    macro_rules! string_id {
        ($(#[$meta:meta])* $name:ident) => {
            $(#[$meta])*
            #[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
            #[serde(transparent)]
            pub struct $name(String);

            impl $name {
                pub fn new(value: impl Into<String>) -> Self {
                    Self(value.into())
                }

                pub fn generate() -> Self {
                    Self(uuid::Uuid::new_v4().to_string())
                }

                pub fn as_str(&self) -> &str {
                    self.0.as_str()
                }
            }

            impl std::fmt::Display for $name {
                fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
                    f.write_str(&self.0)
                }
            }

            impl From<String> for $name {
                fn from(value: String) -> Self {
                    Self(value)
                }
            }

            impl From<&str> for $name {
                fn from(value: &str) -> Self {
                    Self(value.to_string())
                }
            }
        };
    }

    string_id!(
        /// Identifies one connected client channel.
        ClientId
    );
    string_id!(
        /// Identifies one conversation tree.
        ConversationId
    );
    string_id!(
        /// Identifies one message node inside a conversation tree.
        MessageId
    );
}

pub mod model {
    //! Sampling parameters forwarded to model providers.
    //!
    //! ```rust
    //! use pcommon::SamplingOptions;
    //!
    //! let options = SamplingOptions::default()
    //!     .with_temperature(0.2)
    //!     .with_max_tokens(128);
    //!
    //! assert_eq!(options.temperature, Some(0.2));
    //! assert_eq!(options.max_tokens, Some(128));
    //! ```

    use serde::{Deserialize, Serialize};

    #[derive(Debug, Clone, Copy, PartialEq, Default, Serialize, Deserialize)]
    pub struct SamplingOptions {
        #[serde(default, skip_serializing_if = "Option::is_none")]
        pub temperature: Option<f32>,
        #[serde(default, skip_serializing_if = "Option::is_none")]
        pub top_p: Option<f32>,
        #[serde(default, skip_serializing_if = "Option::is_none")]
        pub max_tokens: Option<u32>,
    }

    impl SamplingOptions {
        pub fn with_temperature(mut self, temperature: f32) -> Self {
            self.temperature = Some(temperature);
            self
        }

        pub fn with_top_p(mut self, top_p: f32) -> Self {
            self.top_p = Some(top_p);
            self
        }

        pub fn with_max_tokens(mut self, max_tokens: u32) -> Self {
            self.max_tokens = Some(max_tokens);
            self
        }
    }
}

pub mod registry {
    //! Ordered name-to-handle map shared by the provider and tool registries.
    //!
    //! Iteration follows key order, so anything listed from a registry (tool
    //! definitions sent upstream, provider ids in logs) is stable between runs.
    //!
    //! ```rust
    //! use pcommon::Registry;
    //!
    //! let mut registry = Registry::new();
    //! registry.insert("beta".to_string(), 2_u32);
    //! registry.insert("alpha".to_string(), 1_u32);
    //!
    //! assert_eq!(registry.get("alpha"), Some(&1));
    //! assert_eq!(registry.keys().collect::<Vec<_>>(), ["alpha", "beta"]);
    //! ```

    use std::borrow::Borrow;
    use std::collections::BTreeMap;

    #[derive(Debug, Clone)]
    pub struct Registry<K, V> {
        entries: BTreeMap<K, V>,
    }

    impl<K: Ord, V> Default for Registry<K, V> {
        fn default() -> Self {
            Self {
                entries: BTreeMap::new(),
            }
        }
    }

    impl<K: Ord, V> Registry<K, V> {
        pub fn new() -> Self {
            Self::default()
        }

        /// Returns the entry previously stored under `key`, if any.
        pub fn insert(&mut self, key: K, value: V) -> Option<V> {
            self.entries.insert(key, value)
        }

        pub fn get<Q>(&self, key: &Q) -> Option<&V>
        where
            K: Borrow<Q>,
            Q: Ord + ?Sized,
        {
            self.entries.get(key)
        }

        pub fn remove<Q>(&mut self, key: &Q) -> Option<V>
        where
            K: Borrow<Q>,
            Q: Ord + ?Sized,
        {
            self.entries.remove(key)
        }

        pub fn contains_key<Q>(&self, key: &Q) -> bool
        where
            K: Borrow<Q>,
            Q: Ord + ?Sized,
        {
            self.entries.contains_key(key)
        }

        /// First value, in key order, accepted by `predicate`.
        pub fn find(&self, mut predicate: impl FnMut(&V) -> bool) -> Option<&V> {
            self.entries.values().find(|value| predicate(value))
        }

        pub fn keys(&self) -> impl Iterator<Item = &K> {
            self.entries.keys()
        }

        pub fn values(&self) -> impl Iterator<Item = &V> {
            self.entries.values()
        }

        pub fn len(&self) -> usize {
            self.entries.len()
        }

        pub fn is_empty(&self) -> bool {
            self.entries.is_empty()
        }
    }
}

pub use context::{ClientId, ConversationId, MessageId, MetadataMap};
pub use future::BoxFuture;
pub use model::SamplingOptions;
pub use registry::Registry;
