//! `latchkey-net` – network-facing adapters.
//!
//! From the core's point of view these are just more producers and
//! consumers on the fabric: the link and broker adapters inject
//! pre-classified command messages into the actuator channel, and the
//! broker adapter drains the status channel to publish state changes.
//! Transport stacks (radio pairing, broker sessions) stay behind traits.
//!
//! # Modules
//!
//! - [`link`] – [`LinkSession`][link::LinkSession]: scans a free-text
//!   short-range-link byte stream for the fixed open token and acknowledges
//!   with literal `OK`/`ERROR` lines.
//! - [`broker`] – [`BrokerAdapter`][broker::BrokerAdapter]: topic layout,
//!   `ON`/`OFF` command parsing, discovery announcement, and the
//!   state-publishing loop.
//! - [`provisioning`] – [`CredentialStore`][provisioning::CredentialStore]
//!   and the task that services credential-reset requests.

pub mod broker;
pub mod link;
pub mod provisioning;

pub use broker::{BrokerAdapter, BrokerTransport, DoorTopics, TransportError};
pub use link::LinkSession;
pub use provisioning::{CredentialStore, SimCredentialStore};
