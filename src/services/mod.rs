//! Domain services used by websocket and HTTP routes.
//!
//! ARCHITECTURE
//! ============
//! Service modules own business logic and persistence concerns so route
//! handlers can stay focused on protocol translation and auth plumbing.
//! `feed` is the exception: it owns live fan-out and is called by routes
//! after a service call succeeds.

pub mod access;
pub mod chat;
pub mod dashboard;
pub mod email_auth;
pub mod feed;
pub mod invite;
pub mod mailer;
pub mod overview;
pub mod profile;
pub mod session;
pub mod sweeper;
pub mod timer;
