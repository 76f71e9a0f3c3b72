//! # Server-Side Apply
//!
//! Idempotent apply of generated objects. Only the fields present in the
//! generated object are claimed by the operator's field manager; ownership is
//! forced so a stale manager never blocks convergence.

use crate::controller::reconciler::ReconcilerError;
use kube::api::{Api, Patch, PatchParams};
use kube::{Resource, ResourceExt};
use serde::de::DeserializeOwned;
use serde::Serialize;
use std::fmt::Debug;
use tracing::debug;

/// Apply `object` through `api` with `field_manager`
///
/// # Errors
///
/// HTTP 409 maps to `ApplyConflict`; every other API failure to `Kube`.
pub async fn server_side_apply<K>(
    api: &Api<K>,
    field_manager: &str,
    object: &K,
) -> Result<K, ReconcilerError>
where
    K: Resource + Clone + Serialize + DeserializeOwned + Debug,
    <K as Resource>::DynamicType: Default,
{
    let name = object.name_any();
    let kind = K::kind(&K::DynamicType::default()).into_owned();
    let params = PatchParams::apply(field_manager).force();

    match api.patch(&name, &params, &Patch::Apply(object)).await {
        Ok(applied) => {
            debug!("Applied {} {}", kind, name);
            Ok(applied)
        }
        Err(kube::Error::Api(ae)) if ae.code == 409 => Err(ReconcilerError::ApplyConflict {
            kind,
            name,
            message: ae.message,
        }),
        Err(e) => Err(e.into()),
    }
}
