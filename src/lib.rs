//! # Hawk
//!
//! Sitemap generation and search-engine update notifications for static
//! sites. The site's files are the data source: every page matching the
//! lookup patterns becomes a route, its modification time decides whether it
//! changed since the last run, and the changed routes (or the whole sitemap)
//! are pushed to a search engine through one of four strategies.
//!
//! # Architecture
//!
//! ```text
//! CLI → Hawk::hawk(strategy)
//!         ├─ route-based:   peek last run → advance → changed routes → IndexNow / Indexing API
//!         └─ sitemap-based: sitemap (+upload) + robots → Search Console (+feedback)
//!       → console report
//! ```
//!
//! Every component receives the config explicitly; nothing is global. Library
//! code never exits the process: failures are typed errors and "nothing
//! changed" is a normal [`dispatcher::RunOutcome`].
//!
//! # Module Map
//!
//! | Module | Role |
//! |--------|------|
//! | [`config`] | `hawk.toml` loading, validation, env credential overrides, stock config |
//! | [`state`] | The JSON run-state file: last run, IndexNow key, submitted sitemap |
//! | [`routes`] | Page discovery, route canonicalisation, modification times |
//! | [`changes`] | Routes modified since the previous run |
//! | [`sitemap`] | `sitemap.xml` and `robots.txt` generation |
//! | [`transfer`] | Upload seam ([`transfer::FileTransfer`]) and its FTP implementation |
//! | [`auth`] | Google service-account JWT authorization |
//! | [`indexnow`] | IndexNow key management and submission |
//! | [`google`] | Search Console submission/feedback and Indexing API fan-out |
//! | [`types`] | Response classification shared by the strategies |
//! | [`dispatcher`] | [`dispatcher::Strategy`] selection and the [`dispatcher::Hawk`] entry point |
//! | [`output`] | CLI report formatting |
//! | [`logging`] | `tracing` subscriber setup |
//!
//! # Design Decisions
//!
//! ## Peek, Then Advance
//!
//! The "last run" marker moves to now at the start of every route-based run,
//! before any request goes out. A page edited while hawk runs is reported on
//! the next run rather than lost. The cost is that a failed run does not
//! retry its routes; a fresh edit (or deleting `.hawk.lrs`) does.
//!
//! ## One Upload Seam
//!
//! Sitemaps and the IndexNow key file reach the server through
//! [`transfer::FileTransfer`], so every strategy is testable with a recording
//! mock and the FTP client stays in one place.
//!
//! ## Deterministic Reports
//!
//! Indexing API calls run concurrently but are regrouped in route order
//! before reporting, so two runs against the same responses print the same
//! report.

pub mod auth;
pub mod changes;
pub mod config;
pub mod dispatcher;
pub mod google;
pub mod indexnow;
pub mod logging;
pub mod output;
pub mod routes;
pub mod sitemap;
pub mod state;
pub mod transfer;
pub mod types;

#[cfg(test)]
pub(crate) mod test_helpers;
