//! Fixture builder: turns a specification into a running container.

use fixtura_common::constants::FIXTURE_LABEL;
use fixtura_common::error::Result;
use fixtura_runtime::backend::{InstanceRef, RunRequest};
use fixtura_runtime::engine::Engine;
use fixtura_runtime::image::BuildContext;

use crate::identity::{IdentityProvider, instance_name};
use crate::spec::FixtureSpec;

/// Builds the image for `spec` and starts one auto-removing container under
/// a freshly generated name.
///
/// # Errors
///
/// Returns `FixturaError::Build` if the build file is invalid or the image
/// fails to build, `FixturaError::Start` if the engine refuses to start the
/// container, and `FixturaError::Connection` if the engine is unreachable.
/// In every case no container is left behind.
pub fn build_instance(
    engine: &Engine,
    spec: &FixtureSpec,
    identity: &dyn IdentityProvider,
) -> Result<InstanceRef> {
    let build = BuildContext::resolve(spec.build_file())?;
    let label = spec.label_or_default();
    let name = instance_name(&engine.config().namespace_prefix, label, &identity.generate());

    let mut labels = spec.container_labels().to_vec();
    labels.push((FIXTURE_LABEL.to_string(), label.to_string()));

    let request = RunRequest {
        name,
        build,
        build_args: spec.build_args().to_vec(),
        auto_remove: spec.is_auto_remove(),
        publish_all: true,
        env: spec.env_vars().to_vec(),
        labels,
        command: spec.command_override().to_vec(),
    };

    tracing::info!(name = %request.name, image = %request.build.tag, "creating fixture");
    engine.build_and_run(&request)
}
