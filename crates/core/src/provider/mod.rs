//! Remote document provider and the fetch client wrapped around it.
//!
//! A [`DocumentProvider`] performs one remote call for an (item, period) and
//! reports a raw classification. The [`FetchClient`] bounds that call with a
//! hard timeout and turns the classification into what callers act on:
//! an [`Artifact`] (live or fallback) or a [`FetchError`].

mod client;
mod demo;
mod http;
mod types;

pub use client::FetchClient;
pub use demo::DemoProvider;
pub use http::HttpProvider;
pub use types::{
    Artifact, ArtifactKey, DocumentProvider, FallbackReason, FetchError, Provenance,
    ProviderError, RemoteDocument,
};
