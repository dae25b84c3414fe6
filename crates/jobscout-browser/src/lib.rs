//! Browser automation for JavaScript-heavy job boards.
//!
//! Sessions are opened through the [`BrowserDriver`] seam. [`ChromiumDriver`]
//! drives a real Chromium over the DevTools protocol with a per-session
//! [`SessionIdentity`] (user agent, viewport, locale, timezone, cookies) and
//! stealth scripts. [`FixtureDriver`] replays recorded HTML for offline use.

pub mod actions;
pub mod engine;
pub mod error;
pub mod fingerprint;
pub mod fixture;

pub use actions::{BrowserDriver, BrowserSession, SessionOptions, TeardownReport};
pub use engine::{ChromiumDriver, ChromiumSession};
pub use error::{BrowserError, Result};
pub use fingerprint::{BehaviorProfile, SessionCookie, SessionIdentity, Viewport};
pub use fixture::FixtureDriver;
