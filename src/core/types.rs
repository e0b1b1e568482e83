/*!
 * Core Types
 * Common types used across the boundary layer
 */

/// Socket descriptor type
pub type SockFd = u32;

/// Network port type
pub type Port = u16;

/// Common result type for boundary operations
pub type NetResult<T> = Result<T, super::errors::NetError>;
