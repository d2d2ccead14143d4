//! Verification harness for the movie catalog.
//!
//! Three independent layers: an isolated in-process contract against an
//! ephemeral store, static assertions over the configuration artifacts, and a
//! live pass against the two running processes.

pub mod artifacts;
pub mod contract;
pub mod error;
pub mod live;
pub mod profile;
pub mod report;

pub use artifacts::run_artifact_layer;
pub use contract::{run_contract_layer, ContractFixture, FixtureResponse, SEEDED_TITLE};
pub use error::{CheckError, FailureKind};
pub use live::{run_live_layer, LiveHarness, LiveResponse, Preflight, Target};
pub use profile::{
    ArtifactExpectations, HarnessProfile, LiveEnvironment, ProcessExpectation, ProfileError,
};
pub use report::{CheckOutcome, Failure, HarnessReport, Layer, LayerReport};

pub const HARNESS_CONTRACT_VERSION: &str = "harness.v1";

/// Run the requested layers in order and collect one report.
#[must_use]
pub fn run_layers(profile: &HarnessProfile, layers: &[Layer]) -> HarnessReport {
    let reports = layers
        .iter()
        .map(|layer| {
            tracing::info!(layer = layer.as_str(), "running layer");
            match layer {
                Layer::Contract => run_contract_layer(),
                Layer::Artifacts => run_artifact_layer(&profile.artifacts),
                Layer::Live => run_live_layer(profile.live.clone()),
            }
        })
        .collect();
    HarnessReport::new(reports)
}
