//! In-memory stand-ins for the provider traits and the notifier.
//!
//! `FakeCloud` keeps enough provider behavior to exercise the managers:
//! version tokens that go stale on every update, deletes refused while a
//! distribution is enabled or still propagating, paginated listings, and
//! failure injection per operation.

use std::collections::{BTreeMap, HashSet};
use std::sync::{Arc, Mutex};

use anyhow::{anyhow, bail, Result};
use async_trait::async_trait;

use crate::cloud::{
    AccessControl, AccessControlSpec, Cdn, ChangeAction, ContentItem, Distribution,
    DistributionSpec, Dns, HostedZone, KeyPage, ObjectStorage, PropagationStatus, RecordSet,
    RecordType, VersionedConfig,
};
use crate::notify::Notifier;

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct StoredObject {
    pub body: Vec<u8>,
    pub content_type: &'static str,
}

#[derive(Debug, Default)]
struct FakeBucket {
    region: String,
    objects: BTreeMap<String, StoredObject>,
    policy: Option<String>,
}

#[derive(Debug)]
struct FakeDistribution {
    distribution: Distribution,
    etag: u32,
    pending_polls: u32,
    re_enable_on_deploy: bool,
}

impl FakeDistribution {
    fn version(&self) -> String {
        format!("ETAG{}", self.etag)
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Invalidation {
    pub distribution_id: String,
    pub paths: Vec<String>,
    pub caller_reference: String,
}

#[derive(Debug)]
struct State {
    calls: Vec<String>,
    next_id: u32,
    buckets: BTreeMap<String, FakeBucket>,
    list_page_size: usize,
    failing_uploads: HashSet<String>,
    access_controls: Vec<AccessControl>,
    distributions: Vec<FakeDistribution>,
    distribution_specs: Vec<DistributionSpec>,
    disable_polls: u32,
    fail_list_distributions: bool,
    invalidations: Vec<Invalidation>,
    zones: Vec<HostedZone>,
    records: BTreeMap<(String, String), RecordSet>,
    fail_dns_changes: bool,
    fail_bucket_deletes: bool,
}

impl Default for State {
    fn default() -> Self {
        Self {
            calls: Vec::new(),
            next_id: 1,
            buckets: BTreeMap::new(),
            list_page_size: 1000,
            failing_uploads: HashSet::new(),
            access_controls: Vec::new(),
            distributions: Vec::new(),
            distribution_specs: Vec::new(),
            disable_polls: 0,
            fail_list_distributions: false,
            invalidations: Vec::new(),
            zones: Vec::new(),
            records: BTreeMap::new(),
            fail_dns_changes: false,
            fail_bucket_deletes: false,
        }
    }
}

impl State {
    fn next_id(&mut self) -> u32 {
        let id = self.next_id;
        self.next_id += 1;
        id
    }

    fn distribution_mut(&mut self, id: &str) -> Result<&mut FakeDistribution> {
        self.distributions
            .iter_mut()
            .find(|d| d.distribution.id == id)
            .ok_or_else(|| anyhow!("NoSuchDistribution: {}", id))
    }
}

/// Shared in-memory account; clones see the same state
#[derive(Clone, Default)]
pub struct FakeCloud {
    state: Arc<Mutex<State>>,
}

impl FakeCloud {
    pub fn new() -> Self {
        Self::default()
    }

    fn record(&self, call: String) {
        self.state.lock().unwrap().calls.push(call);
    }

    pub fn storage(&self) -> Arc<dyn ObjectStorage> {
        Arc::new(self.clone())
    }

    pub fn cdn(&self) -> Arc<dyn Cdn> {
        Arc::new(self.clone())
    }

    pub fn dns(&self) -> Arc<dyn Dns> {
        Arc::new(self.clone())
    }

    pub fn calls(&self) -> Vec<String> {
        self.state.lock().unwrap().calls.clone()
    }

    /// Number of recorded calls starting with `prefix`
    pub fn count_calls(&self, prefix: &str) -> usize {
        self.state
            .lock()
            .unwrap()
            .calls
            .iter()
            .filter(|c| c.starts_with(prefix))
            .count()
    }

    // Object storage

    pub fn add_bucket(&self, bucket: &str) {
        self.state.lock().unwrap().buckets.insert(
            bucket.to_string(),
            FakeBucket {
                region: "us-east-1".to_string(),
                ..Default::default()
            },
        );
    }

    pub fn add_object(&self, bucket: &str, key: &str) {
        let mut state = self.state.lock().unwrap();
        if let Some(b) = state.buckets.get_mut(bucket) {
            b.objects.insert(
                key.to_string(),
                StoredObject {
                    body: key.as_bytes().to_vec(),
                    content_type: "text/plain",
                },
            );
        }
    }

    pub fn buckets(&self) -> Vec<String> {
        self.state.lock().unwrap().buckets.keys().cloned().collect()
    }

    pub fn bucket_region(&self, bucket: &str) -> Option<String> {
        self.state
            .lock()
            .unwrap()
            .buckets
            .get(bucket)
            .map(|b| b.region.clone())
    }

    pub fn objects(&self, bucket: &str) -> BTreeMap<String, StoredObject> {
        self.state
            .lock()
            .unwrap()
            .buckets
            .get(bucket)
            .map(|b| b.objects.clone())
            .unwrap_or_default()
    }

    pub fn bucket_policy(&self, bucket: &str) -> Option<String> {
        self.state
            .lock()
            .unwrap()
            .buckets
            .get(bucket)
            .and_then(|b| b.policy.clone())
    }

    pub fn set_list_page_size(&self, size: usize) {
        self.state.lock().unwrap().list_page_size = size;
    }

    /// Reject every object and bucket delete
    pub fn fail_bucket_deletes(&self) {
        self.state.lock().unwrap().fail_bucket_deletes = true;
    }

    pub fn fail_upload_of(&self, key: &str) {
        self.state
            .lock()
            .unwrap()
            .failing_uploads
            .insert(key.to_string());
    }

    // CDN

    pub fn add_access_control(&self, name: &str) -> String {
        let mut state = self.state.lock().unwrap();
        let id = format!("OAC{}", state.next_id());
        state.access_controls.push(AccessControl {
            id: id.clone(),
            name: name.to_string(),
        });
        id
    }

    pub fn access_controls(&self) -> Vec<AccessControl> {
        self.state.lock().unwrap().access_controls.clone()
    }

    /// Seed a fully deployed distribution carrying `alias`
    pub fn add_distribution(&self, alias: &str, enabled: bool) -> String {
        let mut state = self.state.lock().unwrap();
        let n = state.next_id();
        let id = format!("E{}", n);
        state.distributions.push(FakeDistribution {
            distribution: Distribution {
                id: id.clone(),
                arn: format!("arn:aws:cloudfront::123456789012:distribution/{}", id),
                domain_name: format!("d{}.cloudfront.net", n),
                aliases: vec![alias.to_string()],
                enabled,
                status: PropagationStatus::Deployed,
            },
            etag: 1,
            pending_polls: 0,
            re_enable_on_deploy: false,
        });
        id
    }

    pub fn distributions(&self) -> Vec<Distribution> {
        self.state
            .lock()
            .unwrap()
            .distributions
            .iter()
            .map(|d| d.distribution.clone())
            .collect()
    }

    pub fn distribution_specs(&self) -> Vec<DistributionSpec> {
        self.state.lock().unwrap().distribution_specs.clone()
    }

    /// Number of status reads that still report InProgress after a disable
    pub fn set_disable_polls(&self, polls: u32) {
        self.state.lock().unwrap().disable_polls = polls;
    }

    /// Disable a distribution out of band, leaving the change in progress
    pub fn disable_distribution(&self, id: &str) {
        let mut state = self.state.lock().unwrap();
        let polls = state.disable_polls;
        if let Ok(d) = state.distribution_mut(id) {
            d.distribution.enabled = false;
            d.distribution.status = PropagationStatus::InProgress;
            d.pending_polls = polls;
            d.etag += 1;
        }
    }

    /// Have someone else re-enable the distribution as soon as its disable
    /// has deployed
    pub fn re_enable_after_wait(&self, id: &str) {
        if let Ok(d) = self.state.lock().unwrap().distribution_mut(id) {
            d.re_enable_on_deploy = true;
        }
    }

    pub fn fail_list_distributions(&self) {
        self.state.lock().unwrap().fail_list_distributions = true;
    }

    pub fn invalidations(&self) -> Vec<Invalidation> {
        self.state.lock().unwrap().invalidations.clone()
    }

    // DNS

    /// Seed a hosted zone; `name` is stored fully qualified
    pub fn add_zone(&self, name: &str) -> String {
        let mut state = self.state.lock().unwrap();
        let id = format!("Z{}", state.next_id());
        let name = if name.ends_with('.') {
            name.to_string()
        } else {
            format!("{}.", name)
        };
        state.zones.push(HostedZone {
            id: id.clone(),
            name,
        });
        state.zones.sort_by(|a, b| a.name.cmp(&b.name));
        id
    }

    pub fn add_record(&self, zone_id: &str, name: &str, ttl: i64, value: &str) {
        self.state.lock().unwrap().records.insert(
            (zone_id.to_string(), name.to_string()),
            RecordSet {
                name: name.to_string(),
                record_type: RecordType::Cname,
                ttl: Some(ttl),
                values: vec![value.to_string()],
            },
        );
    }

    pub fn records(&self, zone_id: &str) -> Vec<RecordSet> {
        self.state
            .lock()
            .unwrap()
            .records
            .iter()
            .filter(|((zone, _), _)| zone == zone_id)
            .map(|(_, record)| record.clone())
            .collect()
    }

    pub fn fail_dns_changes(&self) {
        self.state.lock().unwrap().fail_dns_changes = true;
    }
}

#[async_trait]
impl ObjectStorage for FakeCloud {
    async fn bucket_exists(&self, bucket: &str) -> Result<bool> {
        self.record(format!("bucket_exists {}", bucket));
        Ok(self.state.lock().unwrap().buckets.contains_key(bucket))
    }

    async fn create_bucket(&self, bucket: &str, region: &str) -> Result<()> {
        self.record(format!("create_bucket {} {}", bucket, region));
        self.state
            .lock()
            .unwrap()
            .buckets
            .entry(bucket.to_string())
            .or_insert_with(|| FakeBucket {
                region: region.to_string(),
                ..Default::default()
            });
        Ok(())
    }

    async fn put_object(&self, bucket: &str, item: ContentItem) -> Result<()> {
        self.record(format!("put_object {} {}", bucket, item.key));
        let mut state = self.state.lock().unwrap();
        if state.failing_uploads.contains(&item.key) {
            bail!("InternalError: injected failure");
        }
        let b = state
            .buckets
            .get_mut(bucket)
            .ok_or_else(|| anyhow!("NoSuchBucket: {}", bucket))?;
        b.objects.insert(
            item.key,
            StoredObject {
                body: item.body,
                content_type: item.content_type,
            },
        );
        Ok(())
    }

    async fn list_keys(&self, bucket: &str, continuation: Option<String>) -> Result<KeyPage> {
        self.record(format!("list_keys {}", bucket));
        let state = self.state.lock().unwrap();
        let b = state
            .buckets
            .get(bucket)
            .ok_or_else(|| anyhow!("NoSuchBucket: {}", bucket))?;

        let remaining: Vec<String> = b
            .objects
            .keys()
            .filter(|k| continuation.as_ref().map_or(true, |after| *k > after))
            .cloned()
            .collect();

        let keys: Vec<String> = remaining.iter().take(state.list_page_size).cloned().collect();
        let next_token = if remaining.len() > keys.len() {
            keys.last().cloned()
        } else {
            None
        };

        Ok(KeyPage { keys, next_token })
    }

    async fn delete_objects(&self, bucket: &str, keys: &[String]) -> Result<()> {
        self.record(format!("delete_objects {} {}", bucket, keys.len()));
        if keys.len() > 1000 {
            bail!("MalformedXML: more than 1000 keys in one request");
        }
        let mut state = self.state.lock().unwrap();
        if state.fail_bucket_deletes {
            bail!("AccessDenied: injected failure");
        }
        let b = state
            .buckets
            .get_mut(bucket)
            .ok_or_else(|| anyhow!("NoSuchBucket: {}", bucket))?;
        for key in keys {
            b.objects.remove(key);
        }
        Ok(())
    }

    async fn delete_bucket(&self, bucket: &str) -> Result<()> {
        self.record(format!("delete_bucket {}", bucket));
        let mut state = self.state.lock().unwrap();
        if state.fail_bucket_deletes {
            bail!("AccessDenied: injected failure");
        }
        match state.buckets.get(bucket) {
            None => bail!("NoSuchBucket: {}", bucket),
            Some(b) if !b.objects.is_empty() => bail!("BucketNotEmpty: {}", bucket),
            Some(_) => {
                state.buckets.remove(bucket);
                Ok(())
            }
        }
    }

    async fn put_bucket_policy(&self, bucket: &str, policy: &str) -> Result<()> {
        self.record(format!("put_bucket_policy {}", bucket));
        let mut state = self.state.lock().unwrap();
        let b = state
            .buckets
            .get_mut(bucket)
            .ok_or_else(|| anyhow!("NoSuchBucket: {}", bucket))?;
        b.policy = Some(policy.to_string());
        Ok(())
    }
}

#[async_trait]
impl Cdn for FakeCloud {
    async fn list_access_controls(&self) -> Result<Vec<AccessControl>> {
        self.record("list_access_controls".to_string());
        Ok(self.state.lock().unwrap().access_controls.clone())
    }

    async fn create_access_control(&self, spec: &AccessControlSpec) -> Result<AccessControl> {
        self.record(format!("create_access_control {}", spec.name));
        let mut state = self.state.lock().unwrap();
        if state.access_controls.iter().any(|a| a.name == spec.name) {
            bail!("OriginAccessControlAlreadyExists: {}", spec.name);
        }
        let control = AccessControl {
            id: format!("OAC{}", state.next_id()),
            name: spec.name.clone(),
        };
        state.access_controls.push(control.clone());
        Ok(control)
    }

    async fn list_distributions(&self) -> Result<Vec<Distribution>> {
        self.record("list_distributions".to_string());
        let state = self.state.lock().unwrap();
        if state.fail_list_distributions {
            bail!("AccessDenied: injected failure");
        }
        Ok(state
            .distributions
            .iter()
            .map(|d| d.distribution.clone())
            .collect())
    }

    async fn create_distribution(&self, spec: &DistributionSpec) -> Result<Distribution> {
        self.record(format!("create_distribution {}", spec.alias));
        let mut state = self.state.lock().unwrap();
        if state
            .distributions
            .iter()
            .any(|d| d.distribution.aliases.contains(&spec.alias))
        {
            bail!("CNAMEAlreadyExists: {}", spec.alias);
        }
        let n = state.next_id();
        let id = format!("E{}", n);
        let distribution = Distribution {
            id: id.clone(),
            arn: format!("arn:aws:cloudfront::123456789012:distribution/{}", id),
            domain_name: format!("d{}.cloudfront.net", n),
            aliases: vec![spec.alias.clone()],
            enabled: true,
            status: PropagationStatus::InProgress,
        };
        state.distributions.push(FakeDistribution {
            distribution: distribution.clone(),
            etag: 1,
            pending_polls: 0,
            re_enable_on_deploy: false,
        });
        state.distribution_specs.push(spec.clone());
        Ok(distribution)
    }

    async fn get_distribution(&self, id: &str) -> Result<Distribution> {
        self.record(format!("get_distribution {}", id));
        let mut state = self.state.lock().unwrap();
        let d = state.distribution_mut(id)?;

        if d.pending_polls > 0 {
            d.pending_polls -= 1;
        } else if d.distribution.status == PropagationStatus::InProgress {
            d.distribution.status = PropagationStatus::Deployed;
            if d.re_enable_on_deploy {
                d.distribution.enabled = true;
                d.etag += 1;
            }
        }

        Ok(d.distribution.clone())
    }

    async fn get_distribution_config(&self, id: &str) -> Result<VersionedConfig> {
        self.record(format!("get_distribution_config {}", id));
        let mut state = self.state.lock().unwrap();
        let d = state.distribution_mut(id)?;
        Ok(VersionedConfig {
            enabled: d.distribution.enabled,
            version: d.version(),
        })
    }

    async fn set_distribution_enabled(
        &self,
        id: &str,
        enabled: bool,
        if_match: &str,
    ) -> Result<()> {
        self.record(format!("set_distribution_enabled {} {}", id, enabled));
        let mut state = self.state.lock().unwrap();
        let polls = state.disable_polls;
        let d = state.distribution_mut(id)?;
        if d.version() != if_match {
            bail!("PreconditionFailed: stale version token {}", if_match);
        }
        d.distribution.enabled = enabled;
        d.distribution.status = PropagationStatus::InProgress;
        d.pending_polls = polls;
        d.etag += 1;
        Ok(())
    }

    async fn delete_distribution(&self, id: &str, if_match: &str) -> Result<()> {
        self.record(format!("delete_distribution {}", id));
        let mut state = self.state.lock().unwrap();
        let d = state.distribution_mut(id)?;
        if d.version() != if_match {
            bail!("PreconditionFailed: stale version token {}", if_match);
        }
        if d.distribution.enabled || d.distribution.status != PropagationStatus::Deployed {
            bail!("DistributionNotDisabled: {}", id);
        }
        state.distributions.retain(|d| d.distribution.id != id);
        Ok(())
    }

    async fn create_invalidation(
        &self,
        distribution_id: &str,
        paths: &[String],
        caller_reference: &str,
    ) -> Result<String> {
        self.record(format!("create_invalidation {}", distribution_id));
        let mut state = self.state.lock().unwrap();
        state.distribution_mut(distribution_id)?;
        let id = format!("I{}", state.next_id());
        state.invalidations.push(Invalidation {
            distribution_id: distribution_id.to_string(),
            paths: paths.to_vec(),
            caller_reference: caller_reference.to_string(),
        });
        Ok(id)
    }
}

#[async_trait]
impl Dns for FakeCloud {
    async fn list_hosted_zones_by_name(&self, dns_name: &str) -> Result<Vec<HostedZone>> {
        self.record(format!("list_hosted_zones_by_name {}", dns_name));
        Ok(self
            .state
            .lock()
            .unwrap()
            .zones
            .iter()
            .filter(|z| z.name.as_str() >= dns_name)
            .cloned()
            .collect())
    }

    async fn list_record_sets(
        &self,
        zone_id: &str,
        name: &str,
        _record_type: RecordType,
        max_items: i32,
    ) -> Result<Vec<RecordSet>> {
        self.record(format!("list_record_sets {} {}", zone_id, name));
        Ok(self
            .state
            .lock()
            .unwrap()
            .records
            .iter()
            .filter(|((zone, record_name), _)| zone == zone_id && record_name.as_str() >= name)
            .take(max_items.max(0) as usize)
            .map(|(_, record)| record.clone())
            .collect())
    }

    async fn change_record_set(
        &self,
        zone_id: &str,
        action: ChangeAction,
        record: &RecordSet,
    ) -> Result<()> {
        self.record(format!("change_record_set {} {:?} {}", zone_id, action, record.name));
        let mut state = self.state.lock().unwrap();
        if state.fail_dns_changes {
            bail!("Throttling: injected failure");
        }
        if !state.zones.iter().any(|z| z.id == zone_id) {
            bail!("NoSuchHostedZone: {}", zone_id);
        }

        let key = (zone_id.to_string(), record.name.clone());
        match action {
            ChangeAction::Upsert => {
                state.records.insert(key, record.clone());
            }
            ChangeAction::Delete => match state.records.get(&key) {
                Some(existing) if existing == record => {
                    state.records.remove(&key);
                }
                _ => bail!("InvalidChangeBatch: record {} not found", record.name),
            },
        }
        Ok(())
    }
}

/// A posted comment as seen by the recording notifier
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PostedComment {
    pub owner: String,
    pub repo: String,
    pub issue: u64,
    pub body: String,
}

#[derive(Clone, Default)]
pub struct RecordingNotifier {
    comments: Arc<Mutex<Vec<PostedComment>>>,
}

impl RecordingNotifier {
    pub fn comments(&self) -> Vec<PostedComment> {
        self.comments.lock().unwrap().clone()
    }
}

#[async_trait]
impl Notifier for RecordingNotifier {
    async fn post_comment(&self, owner: &str, repo: &str, issue: u64, body: &str) -> Result<()> {
        self.comments.lock().unwrap().push(PostedComment {
            owner: owner.to_string(),
            repo: repo.to_string(),
            issue,
            body: body.to_string(),
        });
        Ok(())
    }
}

pub struct FailingNotifier;

#[async_trait]
impl Notifier for FailingNotifier {
    async fn post_comment(&self, _owner: &str, _repo: &str, _issue: u64, _body: &str) -> Result<()> {
        bail!("GitHub API returned 401 Unauthorized")
    }
}
