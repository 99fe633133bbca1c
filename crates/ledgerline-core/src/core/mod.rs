// ledgerline-core/src/core/mod.rs
// ============================================================================
// Module: Ledgerline Core Types
// Description: Canonical Ledgerline data model.
// Purpose: Provide stable, serializable types for entities, versions, and content.
// Dependencies: serde, serde_jcs, sha2
// ============================================================================

//! ## Overview
//! Core types define entity and watcher identifiers, version numbers, content
//! fingerprints, and the ledger/watch/signal records. These types are the
//! canonical source of truth for any derived API surface.

// ============================================================================
// SECTION: Submodules
// ============================================================================

pub mod hashing;
pub mod identifiers;
pub mod media;
pub mod records;
pub mod time;
pub mod version;

// ============================================================================
// SECTION: Re-Exports
// ============================================================================

pub use hashing::DEFAULT_HASH_ALGORITHM;
pub use hashing::FINGERPRINT_LEN;
pub use hashing::Fingerprint;
pub use hashing::HashAlgorithm;
pub use hashing::HashError;
pub use hashing::MAX_POINTER_BYTES;
pub use identifiers::EntityId;
pub use identifiers::IdentifierError;
pub use identifiers::MAX_ENTITY_KEY_BYTES;
pub use identifiers::WatcherUrl;
pub use media::guess_media_type;
pub use records::ChangeNotice;
pub use records::ChangeSignal;
pub use records::LedgerEntry;
pub use records::SignalId;
pub use records::SignalLease;
pub use records::VersionRecord;
pub use records::WatchRecord;
pub use time::unix_millis;
pub use version::Version;
pub use version::VersionRequest;
pub use version::VersionStrategy;
