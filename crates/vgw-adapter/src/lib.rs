//! # vgw-adapter
//!
//! Venue-agnostic broker protocol adapter core.
//!
//! A venue's native API is callback-driven and multi-endpoint: several
//! sub-channels connect independently, asynchronous responses must be matched
//! back to the requests that caused them, and the venue's own order/report
//! taxonomy has to be collapsed onto the platform's canonical lifecycle. This
//! crate turns all of that into a single stream of
//! [`AdapterEvent`](vgw_core::AdapterEvent)s.
//!
//! ## Architecture
//!
//! ```text
//! platform ──► Adapter::send(Command) ──► NativeSession call
//! NativeSession ──► callback ──► isolate::wrap ──► Dispatcher
//!     ├── channels   (sub-channel states → one Connect/Disconnect edge)
//!     ├── correlator (internal ⇄ venue order ids)
//!     ├── order_state (venue reports → canonical lifecycle)
//!     └── coalesce   (quote fragments → coherent level-1 snapshots)
//!                               │
//!                               └──► AdapterEvent channel ──► platform
//! ```
//!
//! The native seam is the [`session::NativeSession`] trait; `sim` provides an
//! in-memory venue behind it for the runner and integration tests.

pub mod channels;
pub mod coalesce;
pub mod correlator;
pub mod dispatch;
pub mod facade;
pub mod isolate;
pub mod order_state;
pub mod session;
pub mod sim;

pub use facade::Adapter;
pub use session::NativeSession;
