//! Client-side state layer for the prompt playground.
//!
//! One remote resource, the list of prompt variants for an app, is cached per
//! [`ResourceKey`] and shared by every consumer. Consumers attach through
//! [`Playground::use_playground`]; a stack of middlewares gives each of them:
//! - change detection limited to the slices it actually read
//! - optimistic local mutation with rollback on remote failure
//! - per-variant dirty tracking against the last-synced baseline
//! - selector-driven projections of the snapshot

#![deny(clippy::print_stdout, clippy::print_stderr)]

pub mod api;
pub mod cache;
pub mod compare;
pub mod config;
pub mod editor;
pub mod enhanced;
pub mod errors;
pub mod generation;
pub mod hook;
pub mod ids;
pub mod middleware;
pub mod mutation;
pub mod notify;
pub mod references;
pub mod schema;
pub mod selector;
pub mod snapshot;
pub mod variant;

pub use api::PlaygroundApi;
pub use cache::SnapshotCache;
pub use compare::base_compare;
pub use compare::selected_compare;
pub use compare::variant_compare;
pub use compare::variants_compare;
pub use config::PlaygroundConfig;
pub use editor::PropertyEditor;
pub use enhanced::EnhancedNode;
pub use enhanced::EnhancedValue;
pub use enhanced::PropertyArena;
pub use enhanced::PropertyKind;
pub use enhanced::PropertyMetadata;
pub use errors::ApiError;
pub use errors::ErrorCategory;
pub use errors::Result;
pub use errors::StateError;
pub use generation::GenerationData;
pub use generation::InputRow;
pub use generation::InputValue;
pub use generation::RunResult;
pub use generation::sync_input_rows;
pub use hook::Playground;
pub use hook::PlaygroundHandle;
pub use hook::PlaygroundHook;
pub use hook::PlaygroundOptions;
pub use ids::NodeId;
pub use ids::ResourceKey;
pub use ids::VariantId;
pub use middleware::variant::ConfigProperty;
pub use mutation::MutateOptions;
pub use mutation::MutationOutcome;
pub use notify::Notification;
pub use notify::NotificationLevel;
pub use notify::Notifier;
pub use references::ReferenceTracker;
pub use references::ValueReference;
pub use schema::AppSchema;
pub use schema::PromptTransformer;
pub use schema::VariantTransformer;
pub use selector::SelectedData;
pub use selector::Selector;
pub use snapshot::PlaygroundSnapshot;
pub use snapshot::SnapshotPatch;
pub use variant::Prompt;
pub use variant::RawVariant;
pub use variant::Variant;
