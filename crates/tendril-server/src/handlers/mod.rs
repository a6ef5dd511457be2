//! HTTP handlers, grouped by surface: moderation endpoints (bearer-token
//! protected) and form-encoded submission endpoints.

pub mod moderation;
pub mod submit;
