//! Authentication and authorization module
//!
//! This module provides JWT-based authentication with the following components:
//! - Password policy and Argon2id hashing
//! - Access token issuing and validation, opaque refresh/reset tokens
//! - Middleware for request authentication and role gates
//! - Authentication service for account and session management
//! - Request/response models with field validation

pub mod delivery;
pub mod jwt;
pub mod middleware;
pub mod models;
pub mod password;
pub mod service;
pub mod validation;

pub use delivery::{LogResetDelivery, ResetDelivery};
pub use jwt::{
    digest_token, generate_access_token, generate_opaque_token, issue_access_token,
    validate_access_token, Claims, JwtConfig, JwtError,
};
pub use middleware::{
    auth_middleware, require_any_role, require_role, AuthError, AuthenticatedUser,
};
pub use models::{
    AdminRegisterRequest, AuthResponse, ChangePasswordRequest, ForgotPasswordRequest,
    LoginRequest, MessageResponse, PasswordResetTicket, RefreshRequest, RegisterRequest,
    ResetPasswordRequest, SetActiveRequest, UpdateProfileRequest,
};
pub use password::{
    hash_password, validate_password_strength, verify_password, PasswordConfig, PasswordError,
    PasswordHasherPool, PasswordPolicyError,
};
pub use service::{AuthConfig, AuthService};
pub use validation::{FieldError, Validate};

#[cfg(any(test, feature = "test-utils"))]
pub use delivery::CapturingResetDelivery;
