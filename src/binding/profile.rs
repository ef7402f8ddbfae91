//! Profile selection for a translated Pipe.

use tracing::debug;

use crate::cluster::{Cluster, RunContext};
use crate::error::{Result, ResultExt};
use crate::model::{Pipe, Profile};

/// Pick the profile of the Integration generated from `pipe`.
///
/// First decisive source wins: the Pipe's embedded integration, the
/// platform's resolved profile, the platform's requested profile, an
/// installed Knative serving, the platform's cluster type, then `default`.
pub fn determine_profile(
    cluster: &dyn Cluster,
    ctx: &RunContext,
    pipe: &Pipe,
    default: Profile,
) -> Result<Profile> {
    if let Some(profile) = pipe.spec.integration.as_ref().and_then(|it| it.profile) {
        return Ok(profile);
    }

    let namespace = &pipe.metadata.namespace;
    let platform = cluster
        .platform_for(ctx, namespace)
        .with_context(|| format!("cannot look up the platform for namespace {namespace}"))?;

    if let Some(pl) = &platform {
        if let Some(profile) = pl.status.profile.or(pl.spec.profile) {
            return Ok(profile);
        }
    }

    ctx.check()?;
    if cluster
        .is_serving_installed(ctx)
        .with_context(|| "cannot detect Knative serving")?
    {
        return Ok(Profile::Knative);
    }

    if let Some(profile) = platform.as_ref().and_then(|pl| pl.cluster_profile()) {
        return Ok(profile);
    }

    debug!(pipe = %pipe.metadata.name, %default, "Falling back to default profile");
    Ok(default)
}
