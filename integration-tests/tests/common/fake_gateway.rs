//! Cloud gateway served over HTTP on an ephemeral port, backed by a
//! [`SimulatedCloud`], so the real client can be driven end to end.

use axum::{
    extract::{Path, Query, State},
    http::StatusCode,
    routing::{delete, get, post, put},
    Json, Router,
};
use planb_cli::gateway::types::*;
use planb_orchestrator::error::ProviderError;
use planb_orchestrator::provider::{
    AccessControl, AddressPool, Compute, DnsRegistry, IdentityProvider, ImageCatalog, Monitoring,
};
use planb_orchestrator::sim::SimulatedCloud;
use planb_orchestrator::types::{
    AllocationHandle, AccessGroupHandle, InstanceId, InstanceSpec, Region, ServiceRecordSet,
    ZoneHandle,
};
use serde::Deserialize;
use serde_json::{json, Value};
use std::net::Ipv4Addr;
use std::sync::Arc;

type ApiResult<T> = Result<T, (StatusCode, Json<Value>)>;
type Cloud = State<Arc<SimulatedCloud>>;

fn failure(e: ProviderError) -> (StatusCode, Json<Value>) {
    (
        StatusCode::INTERNAL_SERVER_ERROR,
        Json(json!({ "error": e.message, "error_code": e.operation })),
    )
}

fn not_found() -> (StatusCode, Json<Value>) {
    (StatusCode::NOT_FOUND, Json(json!({ "error": "not found" })))
}

#[derive(Deserialize)]
struct PrefixQuery {
    prefix: String,
}

#[derive(Deserialize)]
struct PatternQuery {
    pattern: String,
}

/// Start the gateway and return its base URL
pub async fn start(cloud: Arc<SimulatedCloud>) -> String {
    let router = Router::new()
        .route("/api/regions/:region/subnets", get(subnets))
        .route("/api/regions/:region/addresses/:address", get(address_in_use))
        .route("/api/regions/:region/routable-addresses", post(allocate_address))
        .route(
            "/api/regions/:region/routable-addresses/:allocation",
            delete(release_address),
        )
        .route("/api/regions/:region/access-groups", post(create_group))
        .route("/api/regions/:region/access-groups/:group", delete(delete_group))
        .route("/api/regions/:region/bastion-group", get(bastion_group))
        .route("/api/regions/:region/machine-images/latest", get(machine_image))
        .route("/api/hosted-zones/:zone", get(hosted_zone))
        .route("/api/hosted-zones/:zone/records", put(upsert_records))
        .route("/api/identity-profiles/:cluster", put(identity_profile))
        .route("/api/regions/:region/alarm-topics/:topic", put(alarm_topic))
        .route("/api/regions/:region/recovery-alarms", post(recovery_alarm))
        .route("/api/regions/:region/volumes", post(create_volume))
        .route("/api/regions/:region/instances", post(create_instance))
        .route("/api/regions/:region/instances/:instance", get(instance_state))
        .route(
            "/api/regions/:region/instances/:instance/public-address",
            post(associate_address),
        )
        .route("/api/regions/:region/resources/:resource/tags", put(tag_resource))
        .with_state(cloud);

    let listener = tokio::net::TcpListener::bind("127.0.0.1:0")
        .await
        .expect("Failed to bind fake gateway");
    let addr = listener.local_addr().expect("No local address");
    tokio::spawn(async move {
        axum::serve(listener, router).await.expect("Fake gateway failed");
    });

    format!("http://{}", addr)
}

async fn subnets(
    State(cloud): Cloud,
    Path(region): Path<String>,
    Query(q): Query<PrefixQuery>,
) -> ApiResult<Json<SubnetsResponse>> {
    let subnets = cloud
        .enumerate_subnets(&Region::from(region), &q.prefix)
        .await
        .map_err(failure)?;
    Ok(Json(SubnetsResponse { subnets }))
}

async fn address_in_use(
    State(cloud): Cloud,
    Path((region, address)): Path<(String, Ipv4Addr)>,
) -> ApiResult<Json<AddressUsageResponse>> {
    let in_use = cloud
        .is_private_address_in_use(&Region::from(region), address)
        .await
        .map_err(failure)?;
    Ok(Json(AddressUsageResponse { in_use }))
}

async fn allocate_address(
    State(cloud): Cloud,
    Path(region): Path<String>,
) -> ApiResult<Json<RoutableAddressResponse>> {
    let (public_ip, allocation_id) = cloud
        .allocate_routable_address(&Region::from(region))
        .await
        .map_err(failure)?;
    Ok(Json(RoutableAddressResponse {
        public_ip,
        allocation_id,
    }))
}

async fn release_address(
    State(cloud): Cloud,
    Path((region, allocation)): Path<(String, String)>,
) -> ApiResult<StatusCode> {
    cloud
        .release_routable_address(&Region::from(region), &AllocationHandle(allocation))
        .await
        .map_err(failure)?;
    Ok(StatusCode::NO_CONTENT)
}

async fn create_group(
    State(cloud): Cloud,
    Path(region): Path<String>,
    Json(req): Json<CreateAccessGroupRequest>,
) -> ApiResult<Json<AccessGroupResponse>> {
    let group_id = cloud
        .create_access_group(&Region::from(region), &req.name, &req.rules)
        .await
        .map_err(failure)?;
    Ok(Json(AccessGroupResponse { group_id }))
}

async fn delete_group(
    State(cloud): Cloud,
    Path((region, group)): Path<(String, String)>,
) -> ApiResult<StatusCode> {
    cloud
        .delete_access_group(&Region::from(region), &AccessGroupHandle(group))
        .await
        .map_err(failure)?;
    Ok(StatusCode::NO_CONTENT)
}

async fn bastion_group(
    State(cloud): Cloud,
    Path(region): Path<String>,
) -> ApiResult<Json<AccessGroupResponse>> {
    let group_id = cloud
        .find_bastion_access_group(&Region::from(region))
        .await
        .map_err(failure)?
        .ok_or_else(not_found)?;
    Ok(Json(AccessGroupResponse { group_id }))
}

async fn machine_image(
    State(cloud): Cloud,
    Path(region): Path<String>,
    Query(q): Query<PatternQuery>,
) -> ApiResult<Json<MachineImageResponse>> {
    let image_id = cloud
        .resolve_latest_machine_image(&Region::from(region), &q.pattern)
        .await
        .map_err(failure)?
        .ok_or_else(not_found)?;
    Ok(Json(MachineImageResponse { image_id }))
}

async fn hosted_zone(
    State(cloud): Cloud,
    Path(zone): Path<String>,
) -> ApiResult<Json<HostedZoneResponse>> {
    let zone_id = cloud
        .find_hosted_zone(&zone)
        .await
        .map_err(failure)?
        .ok_or_else(not_found)?;
    Ok(Json(HostedZoneResponse { zone_id }))
}

async fn upsert_records(
    State(cloud): Cloud,
    Path(zone): Path<String>,
    Json(records): Json<ServiceRecordSet>,
) -> ApiResult<StatusCode> {
    cloud
        .upsert_service_records(&ZoneHandle(zone), &records)
        .await
        .map_err(failure)?;
    Ok(StatusCode::NO_CONTENT)
}

async fn identity_profile(
    State(cloud): Cloud,
    Path(cluster): Path<String>,
) -> ApiResult<Json<ProfileResponse>> {
    let profile = cloud
        .ensure_identity_profile(&cluster)
        .await
        .map_err(failure)?;
    Ok(Json(ProfileResponse { profile }))
}

async fn alarm_topic(
    State(cloud): Cloud,
    Path((region, topic)): Path<(String, String)>,
    Json(req): Json<AlarmTopicRequest>,
) -> ApiResult<Json<AlarmTopicResponse>> {
    let topic = cloud
        .ensure_alarm_topic(&Region::from(region), &topic, req.email.as_deref())
        .await
        .map_err(failure)?;
    Ok(Json(AlarmTopicResponse { topic }))
}

async fn recovery_alarm(
    State(cloud): Cloud,
    Path(region): Path<String>,
    Json(req): Json<RecoveryAlarmRequest>,
) -> ApiResult<StatusCode> {
    cloud
        .create_recovery_alarm(
            &Region::from(region),
            &req.cluster_name,
            &req.instance_id,
            &req.topic,
        )
        .await
        .map_err(failure)?;
    Ok(StatusCode::NO_CONTENT)
}

async fn create_volume(
    State(cloud): Cloud,
    Path(region): Path<String>,
    Json(req): Json<CreateVolumeRequest>,
) -> ApiResult<Json<VolumeResponse>> {
    let volume_id = cloud
        .create_volume(&Region::from(region), &req.availability_zone, &req.volume)
        .await
        .map_err(failure)?;
    Ok(Json(VolumeResponse { volume_id }))
}

async fn create_instance(
    State(cloud): Cloud,
    Path(region): Path<String>,
    Json(spec): Json<InstanceSpec>,
) -> ApiResult<Json<InstanceResponse>> {
    let instance_id = cloud
        .create_instance(&Region::from(region), &spec)
        .await
        .map_err(failure)?;
    Ok(Json(InstanceResponse { instance_id }))
}

async fn instance_state(
    State(cloud): Cloud,
    Path((region, instance)): Path<(String, String)>,
) -> ApiResult<Json<InstanceStateResponse>> {
    let state = cloud
        .get_instance_state(&Region::from(region), &InstanceId(instance))
        .await
        .map_err(failure)?;
    Ok(Json(InstanceStateResponse { state }))
}

async fn associate_address(
    State(cloud): Cloud,
    Path((region, instance)): Path<(String, String)>,
    Json(req): Json<AssociateAddressRequest>,
) -> ApiResult<StatusCode> {
    cloud
        .associate_public_address(&Region::from(region), &InstanceId(instance), &req.allocation_id)
        .await
        .map_err(failure)?;
    Ok(StatusCode::NO_CONTENT)
}

async fn tag_resource(
    State(cloud): Cloud,
    Path((region, resource)): Path<(String, String)>,
    Json(req): Json<TagsRequest>,
) -> ApiResult<StatusCode> {
    cloud
        .tag_resource(&Region::from(region), &resource, &req.tags)
        .await
        .map_err(failure)?;
    Ok(StatusCode::NO_CONTENT)
}
