//! TigerStyle Constants
//!
//! Limits use big-endian naming: CATEGORY_SPECIFICS_UNIT_LIMIT.

// =============================================================================
// Bus Vocabulary
// =============================================================================

/// Role every store registration answers to
pub const ROLE_STORE: &str = "store";

/// Pattern field naming the role
pub const PATTERN_FIELD_ROLE: &str = "role";

/// Pattern field naming the command
pub const PATTERN_FIELD_CMD: &str = "cmd";

/// Pattern field naming the entity type
pub const PATTERN_FIELD_TYPE: &str = "type";

/// Pattern field naming one adapter by its store name
pub const PATTERN_FIELD_STORE: &str = "store";

/// Fetch one record, with optional include expansion
pub const CMD_GET: &str = "get";

/// Upsert one record (full replace)
pub const CMD_SET: &str = "set";

/// Delete one record, reporting whether it existed
pub const CMD_REMOVE: &str = "remove";

/// List records of a type in a channel
pub const CMD_SCAN: &str = "scan";

/// Fetch many records, dropping the ones that fail
pub const CMD_BATCH_GET: &str = "batchGet";

/// Free-text search
pub const CMD_QUERY: &str = "query";

/// Add or replace a record's searchable text
pub const CMD_INDEX: &str = "index";

// =============================================================================
// Key Scheme
// =============================================================================

/// The tenant-root type. Channels have no channel of their own.
pub const CHANNEL_TYPE: &str = "channel";

/// Reserved separator for synthesized string keys (`channel:id`).
/// Must not appear in raw `id` or `channel` values.
pub const KEY_SEPARATOR: char = ':';

// =============================================================================
// Limits
// =============================================================================

/// Scan page size when the caller gives no limit
pub const SCAN_LIMIT_DEFAULT: usize = 10;

/// Hard ceiling on a single scan
pub const SCAN_LIMIT_MAX: usize = 1000;

/// Maximum hits returned by a single search query
pub const SEARCH_RESULTS_COUNT_MAX: usize = 100;

// =============================================================================
// Defaults
// =============================================================================

/// Default DynamoDB table prefix
pub const TABLE_PREFIX_DEFAULT: &str = "oddworks_";

/// Default Riak bucket prefix
pub const BUCKET_PREFIX_DEFAULT: &str = "oddworks_";

/// Content types registered when the config names none
pub const CONTENT_TYPES_DEFAULT: &[&str] = &["channel", "collection", "video", "promotion", "view"];

/// Types indexed for search when the config names none
pub const SEARCH_TYPES_DEFAULT: &[&str] = &["collection", "video"];
