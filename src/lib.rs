//! # Gardi (Zero-Knowledge Backup Code Vault)
//!
//! `gardi` stores one-time two-factor backup codes on behalf of user
//! accounts without ever being able to read them. Clients derive an
//! AES-256-GCM key from their password (PBKDF2-SHA256, 100k iterations, per
//! envelope salt), seal each 8-digit code into a self-contained envelope,
//! and upload only the envelopes; the server's job is custody, not crypto.
//!
//! ## Redemption Model
//!
//! Envelopes are redeemed strictly in registration order, one at a time,
//! with a per-account cooldown (5 minutes by default) between successful
//! retrievals. A redeemed index is never reissued; once every envelope is
//! consumed the account is exhausted until it is reset and re-registered.
//!
//! Both operations are atomic per account: the in-memory store serializes
//! them behind per-account locks, the `PostgreSQL` store behind row locks
//! and a uniqueness constraint on `username`.
//!
//! ## Layout
//!
//! - [`envelope`] — the client-side codec (key derivation, seal/open).
//! - [`vault`] — the store trait, policy, and the two backings.
//! - [`gardi`] — the HTTP surface under `/api` plus OpenAPI docs.
//! - [`cli`] — argument parsing, telemetry bootstrap, server action.

pub mod cli;
pub mod envelope;
pub mod gardi;
pub mod vault;
