//! Volume records and the client seam used to list, read and resize them.

use std::collections::HashSet;
use std::fmt;
use std::future::Future;

use parking_lot::RwLock;
use serde::de::{self, Deserializer, Visitor};
use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};

use crate::error::{CapacityError, Result};
use crate::tier::{HARDWARE_STORAGE_CLASS, effective_tier};

/// Region wildcard accepted by `list` to mean "every region".
pub const ALL_REGIONS: &str = "-";

/// Lifecycle state of a volume that can be resized.
pub const AVAILABLE_STATE: &str = "available";

/// Top-level fields to overwrite on a volume.
pub type FieldChanges = Map<String, Value>;

/// Field changes that set the allocated size to `new_size` bytes.
#[must_use]
pub fn quota_change(new_size: u64) -> FieldChanges {
    let mut changes = FieldChanges::new();
    changes.insert("quotaInBytes".to_string(), Value::from(new_size));
    changes
}

/// A volume as reported by the CVS API.
///
/// Unknown fields are ignored; numeric fields may arrive as numbers or
/// numeric strings.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Volume {
    /// Display name.
    #[serde(default)]
    pub name: String,
    /// Region the volume lives in.
    pub region: String,
    /// Stable identifier.
    pub volume_id: String,
    /// `hardware` or `software`.
    #[serde(default)]
    pub storage_class: String,
    /// API service level label.
    #[serde(default)]
    pub service_level: String,
    /// Allocated size in bytes.
    #[serde(deserialize_with = "lenient_u64")]
    pub quota_in_bytes: u64,
    /// Bytes in use.
    #[serde(default, deserialize_with = "lenient_u64")]
    pub used_bytes: u64,
    /// Snapshot reserve in percent.
    #[serde(default, deserialize_with = "lenient_u64")]
    pub snap_reserve: u64,
    /// Lifecycle state, e.g. `available` or `creating`.
    pub life_cycle_state: String,
    /// True for replication destinations.
    #[serde(default)]
    pub is_data_protection: bool,
    /// True while replication is active.
    #[serde(default)]
    pub in_replication: bool,
}

impl Volume {
    /// True if the volume is hardware-backed.
    #[must_use]
    pub fn is_hardware(&self) -> bool {
        self.storage_class == HARDWARE_STORAGE_CLASS
    }

    /// True if the volume is in a state that permits resizing.
    #[must_use]
    pub fn is_available(&self) -> bool {
        self.life_cycle_state == AVAILABLE_STATE
    }

    /// True for the secondary side of an active replication relationship.
    #[must_use]
    pub const fn is_replication_secondary(&self) -> bool {
        self.is_data_protection && self.in_replication
    }

    /// The tier label used for sizing.
    #[must_use]
    pub fn effective_tier(&self) -> &str {
        effective_tier(&self.storage_class, &self.service_level)
    }

    /// Applies `changes` by merging them into the volume's JSON form.
    ///
    /// # Errors
    ///
    /// Returns [`CapacityError::UpstreamApi`] if the merged document is no
    /// longer a valid volume.
    pub fn apply(&mut self, changes: &FieldChanges) -> Result<()> {
        let mut doc = serde_json::to_value(&*self)
            .map_err(|e| CapacityError::upstream("patch", None, e.to_string()))?;
        merge_fields(&mut doc, changes);
        *self = serde_json::from_value(doc)
            .map_err(|e| CapacityError::upstream("patch", None, e.to_string()))?;
        Ok(())
    }
}

/// Overwrites the top-level fields of `doc` with `changes`.
///
/// Non-object documents are left untouched.
pub fn merge_fields(doc: &mut Value, changes: &FieldChanges) {
    if let Value::Object(fields) = doc {
        for (key, value) in changes {
            fields.insert(key.clone(), value.clone());
        }
    }
}

fn lenient_u64<'de, D>(deserializer: D) -> std::result::Result<u64, D::Error>
where
    D: Deserializer<'de>,
{
    struct LenientU64;

    impl Visitor<'_> for LenientU64 {
        type Value = u64;

        fn expecting(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
            f.write_str("a non-negative integer or numeric string")
        }

        fn visit_u64<E: de::Error>(self, v: u64) -> std::result::Result<u64, E> {
            Ok(v)
        }

        fn visit_i64<E: de::Error>(self, v: i64) -> std::result::Result<u64, E> {
            u64::try_from(v).map_err(|_| E::custom(format!("negative byte count {v}")))
        }

        fn visit_f64<E: de::Error>(self, v: f64) -> std::result::Result<u64, E> {
            if v.is_finite() && v >= 0.0 {
                Ok(v as u64)
            } else {
                Err(E::custom(format!("invalid byte count {v}")))
            }
        }

        fn visit_str<E: de::Error>(self, v: &str) -> std::result::Result<u64, E> {
            let trimmed = v.trim();
            if let Ok(n) = trimmed.parse::<u64>() {
                return Ok(n);
            }
            match trimmed.parse::<f64>() {
                Ok(f) => self.visit_f64(f),
                Err(_) => Err(E::custom(format!("invalid numeric string {v:?}"))),
            }
        }
    }

    deserializer.deserialize_any(LenientU64)
}

/// Access to CVS volumes.
///
/// `region` is a concrete region name or [`ALL_REGIONS`] for `list`.
pub trait VolumeClient: Send + Sync {
    /// Lists volumes in `region`.
    ///
    /// # Errors
    ///
    /// Returns [`CapacityError::UpstreamApi`] on transport or status failure.
    fn list(&self, region: &str) -> impl Future<Output = Result<Vec<Volume>>> + Send;

    /// Fetches one volume, `None` if it does not exist.
    ///
    /// # Errors
    ///
    /// Returns [`CapacityError::UpstreamApi`] on transport or status failure.
    fn get(&self, region: &str, volume_id: &str)
    -> impl Future<Output = Result<Option<Volume>>> + Send;

    /// Overwrites `changes` on the volume in its own region.
    ///
    /// Read-modify-write; a concurrent external change between the read and
    /// the write is lost.
    ///
    /// # Errors
    ///
    /// Returns [`CapacityError::VolumeNotFound`] if the volume vanished, or
    /// [`CapacityError::UpstreamApi`] on transport or status failure.
    fn patch(
        &self,
        region: &str,
        volume_id: &str,
        changes: &FieldChanges,
    ) -> impl Future<Output = Result<()>> + Send;
}

/// A recorded `patch` call.
#[derive(Debug, Clone, PartialEq)]
pub struct PatchCall {
    /// Region passed to `patch`.
    pub region: String,
    /// Volume identifier.
    pub volume_id: String,
    /// Fields written.
    pub changes: FieldChanges,
}

/// In-memory volume store for tests and offline runs.
#[derive(Debug, Default)]
pub struct InMemoryVolumeClient {
    volumes: RwLock<Vec<Volume>>,
    patches: RwLock<Vec<PatchCall>>,
    failing_patches: RwLock<HashSet<String>>,
    list_failure: RwLock<Option<CapacityError>>,
}

impl InMemoryVolumeClient {
    /// Creates an empty store.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Creates a store holding `volumes`.
    #[must_use]
    pub fn with_volumes(volumes: impl IntoIterator<Item = Volume>) -> Self {
        let client = Self::new();
        client.volumes.write().extend(volumes);
        client
    }

    /// Adds or replaces a volume.
    pub fn upsert(&self, volume: Volume) {
        let mut volumes = self.volumes.write();
        match volumes.iter_mut().find(|v| v.volume_id == volume.volume_id) {
            Some(existing) => *existing = volume,
            None => volumes.push(volume),
        }
    }

    /// Makes every `patch` of `volume_id` fail.
    pub fn fail_patches_for(&self, volume_id: impl Into<String>) {
        self.failing_patches.write().insert(volume_id.into());
    }

    /// Makes `list` fail with `error`.
    pub fn fail_list(&self, error: CapacityError) {
        *self.list_failure.write() = Some(error);
    }

    /// Patch calls received so far, including failed ones.
    #[must_use]
    pub fn patch_calls(&self) -> Vec<PatchCall> {
        self.patches.read().clone()
    }

    /// Current state of a volume.
    #[must_use]
    pub fn volume(&self, volume_id: &str) -> Option<Volume> {
        self.volumes
            .read()
            .iter()
            .find(|v| v.volume_id == volume_id)
            .cloned()
    }
}

fn region_matches(filter: &str, region: &str) -> bool {
    filter == ALL_REGIONS || filter == region
}

impl VolumeClient for InMemoryVolumeClient {
    async fn list(&self, region: &str) -> Result<Vec<Volume>> {
        if let Some(err) = self.list_failure.read().clone() {
            return Err(err);
        }
        Ok(self
            .volumes
            .read()
            .iter()
            .filter(|v| region_matches(region, &v.region))
            .cloned()
            .collect())
    }

    async fn get(&self, region: &str, volume_id: &str) -> Result<Option<Volume>> {
        Ok(self
            .volumes
            .read()
            .iter()
            .find(|v| v.volume_id == volume_id && region_matches(region, &v.region))
            .cloned())
    }

    async fn patch(&self, region: &str, volume_id: &str, changes: &FieldChanges) -> Result<()> {
        self.patches.write().push(PatchCall {
            region: region.to_string(),
            volume_id: volume_id.to_string(),
            changes: changes.clone(),
        });

        if self.failing_patches.read().contains(volume_id) {
            return Err(CapacityError::upstream(
                "patch",
                Some(500),
                format!("injected failure for {volume_id}"),
            ));
        }

        let mut volumes = self.volumes.write();
        let volume = volumes
            .iter_mut()
            .find(|v| v.volume_id == volume_id && v.region == region)
            .ok_or_else(|| CapacityError::VolumeNotFound {
                region: region.to_string(),
                volume_id: volume_id.to_string(),
            })?;
        volume.apply(changes)
    }
}

#[cfg(test)]
pub(crate) mod tests {
    use super::*;
    use crate::planner::GIB;
    use serde_json::json;

    pub(crate) fn volume(id: &str, used: u64, quota: u64) -> Volume {
        Volume {
            name: format!("vol-{id}"),
            region: "europe-west1".to_string(),
            volume_id: id.to_string(),
            storage_class: "hardware".to_string(),
            service_level: "extreme".to_string(),
            quota_in_bytes: quota,
            used_bytes: used,
            snap_reserve: 0,
            life_cycle_state: "available".to_string(),
            is_data_protection: false,
            in_replication: false,
        }
    }

    #[test]
    fn deserializes_api_record() {
        let raw = json!({
            "name": "data",
            "region": "us-east4",
            "volumeId": "9f1c",
            "storageClass": "software",
            "serviceLevel": "basic",
            "quotaInBytes": 1_099_511_627_776_u64,
            "usedBytes": "536870912",
            "snapReserve": 5,
            "lifeCycleState": "available",
            "creationToken": "ignored"
        });
        let volume: Volume = serde_json::from_value(raw).expect("volume");
        assert_eq!(volume.quota_in_bytes, 1 << 40);
        assert_eq!(volume.used_bytes, 512 * 1024 * 1024);
        assert_eq!(volume.snap_reserve, 5);
        assert!(!volume.is_data_protection);
        assert!(!volume.in_replication);
        assert!(!volume.is_hardware());
        assert_eq!(volume.effective_tier(), "standard-sw");
    }

    #[test]
    fn rejects_negative_sizes() {
        let raw = json!({
            "region": "us-east4",
            "volumeId": "x",
            "quotaInBytes": -1,
            "lifeCycleState": "available"
        });
        assert!(serde_json::from_value::<Volume>(raw).is_err());
    }

    #[test]
    fn accepts_float_sizes() {
        let raw = json!({
            "region": "us-east4",
            "volumeId": "x",
            "quotaInBytes": 1024.0,
            "usedBytes": "2048.0",
            "lifeCycleState": "available"
        });
        let volume: Volume = serde_json::from_value(raw).expect("volume");
        assert_eq!(volume.quota_in_bytes, 1024);
        assert_eq!(volume.used_bytes, 2048);
    }

    #[test]
    fn replication_secondary_needs_both_flags() {
        let mut v = volume("a", 0, GIB);
        v.is_data_protection = true;
        assert!(!v.is_replication_secondary());
        v.in_replication = true;
        assert!(v.is_replication_secondary());
    }

    #[test]
    fn merge_overwrites_only_given_fields() {
        let mut doc = json!({"quotaInBytes": 1, "name": "keep"});
        merge_fields(&mut doc, &quota_change(5 * GIB));
        assert_eq!(doc["quotaInBytes"], 5 * GIB);
        assert_eq!(doc["name"], "keep");
    }

    #[tokio::test]
    async fn in_memory_list_honors_region_wildcard() {
        let mut other = volume("b", 0, GIB);
        other.region = "asia-east1".to_string();
        let client = InMemoryVolumeClient::with_volumes([volume("a", 0, GIB), other]);

        assert_eq!(client.list(ALL_REGIONS).await.expect("list").len(), 2);
        let asia = client.list("asia-east1").await.expect("list");
        assert_eq!(asia.len(), 1);
        assert_eq!(asia[0].volume_id, "b");
    }

    #[tokio::test]
    async fn in_memory_get_missing_is_none() {
        let client = InMemoryVolumeClient::with_volumes([volume("a", 0, GIB)]);
        assert!(client.get("europe-west1", "zzz").await.expect("get").is_none());
        assert!(client.get("asia-east1", "a").await.expect("get").is_none());
        assert!(client.get("europe-west1", "a").await.expect("get").is_some());
    }

    #[tokio::test]
    async fn in_memory_patch_updates_quota() {
        let client = InMemoryVolumeClient::with_volumes([volume("a", 0, GIB)]);
        client
            .patch("europe-west1", "a", &quota_change(3 * GIB))
            .await
            .expect("patch");
        assert_eq!(client.volume("a").expect("volume").quota_in_bytes, 3 * GIB);
        assert_eq!(client.patch_calls().len(), 1);
    }

    #[tokio::test]
    async fn in_memory_patch_failure_is_injected() {
        let client = InMemoryVolumeClient::with_volumes([volume("a", 0, GIB)]);
        client.fail_patches_for("a");
        let err = client
            .patch("europe-west1", "a", &quota_change(3 * GIB))
            .await
            .expect_err("should fail");
        assert!(matches!(err, CapacityError::UpstreamApi { status: Some(500), .. }));
        assert_eq!(client.volume("a").expect("volume").quota_in_bytes, GIB);
    }
}
