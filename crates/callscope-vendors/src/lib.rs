//! CallScope Vendor Integrations
//!
//! This crate talks to the third-party call-tracking platforms and turns
//! their heterogeneous call-log payloads into canonical `CallRecord`s.
//! It includes:
//!
//! - The field mapper (ordered candidate keys, first present non-null wins)
//! - One client per vendor (Ringba, Retreaver, Twilio) over reqwest
//! - The Ringba endpoint/auth prober
//! - Deterministic sample data for development and outage fallback

pub mod client;
pub mod mapping;
pub mod prober;
pub mod registry;
pub mod retreaver;
pub mod ringba;
pub mod sample;
pub mod twilio;

pub use client::{HttpRecordingFetcher, VendorClient, VendorError};
pub use prober::{AuthStyle, ProbeAttempt, ProbeReport, ProbeTarget};
pub use registry::{VendorClientFactory, VendorRegistry};
pub use retreaver::RetreaverClient;
pub use ringba::RingbaClient;
pub use twilio::TwilioClient;
