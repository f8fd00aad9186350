//! Domain-level constants.

// =============================================================================
// Security groups
// =============================================================================

/// Group granting administrative access
pub const ADMIN_GROUP: &str = "admin";

/// Group every regular account belongs to
pub const USER_GROUP: &str = "user";

/// Group appended to every principal resolved from a bearer token
pub const AUTHENTICATED_GROUP: &str = "authenticated";

// =============================================================================
// Sorting
// =============================================================================

/// Separator between field and order in a sort expression (`field:order`)
pub const SORT_SEPARATOR: char = ':';

// =============================================================================
// Entity fields
// =============================================================================

pub const FIELD_ID: &str = "id";
pub const FIELD_CREATED_AT: &str = "created_at";
pub const FIELD_UPDATED_AT: &str = "updated_at";
