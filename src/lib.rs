//! LIBRIS book library service.
//!
//! Domain modules (`books`, `auth`, `admin`, `url`) plug into the kernel's
//! module registry; [`app`] wires them to PostgreSQL, the cache and the HTTP
//! server.

pub mod app;
pub mod health;
pub mod modules;
pub mod validation;

#[cfg(test)]
mod testing;
