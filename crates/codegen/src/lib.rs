//! Typed API client generation for the Nexus front-end.
//!
//! Reads one OpenAPI document per API domain and produces TypeScript request
//! functions, query-key helpers and React Query hooks, plus an endpoint
//! manifest consumed by the runtime client.

pub mod config;
pub mod error;
pub mod generator;
pub mod ir;
pub mod spec;

pub use config::{
    CONFIG_FILENAME, ClientKind, DomainConfig, GeneratorConfig, MutatorConfig, OutputConfig,
    OutputMode, OverrideConfig, QueryOverride,
};
pub use error::{GenerationError, Result};
pub use generator::{
    GeneratedDomain, StaleFile, WriteSummary, check_domain, generate_all, generate_domain,
    generate_from_spec, write_domain,
};
pub use spec::OpenApiSpec;
