use std::sync::Arc;

use tracing::info;

use crate::cloud::{ChangeAction, Dns, HostedZone, RecordSet, RecordType};
use crate::error::{PreviewError, Step};

pub const CNAME_TTL: i64 = 300;

/// Append the root dot if missing; the provider stores names fully qualified
pub fn fully_qualified(name: &str) -> String {
    if name.ends_with('.') {
        name.to_string()
    } else {
        format!("{}.", name)
    }
}

/// Manages the CNAME pointing an environment's hostname at its distribution
pub struct DnsRecordManager {
    dns: Arc<dyn Dns>,
}

impl DnsRecordManager {
    pub fn new(dns: Arc<dyn Dns>) -> Self {
        Self { dns }
    }

    /// Find the hosted zone named exactly `base_domain`.
    ///
    /// The provider lists zones in name order starting at the requested name,
    /// so the first result may be a different zone; that counts as not found.
    pub async fn resolve_zone(&self, base_domain: &str) -> Result<Option<HostedZone>, PreviewError> {
        let wanted = fully_qualified(base_domain);

        let zones = self
            .dns
            .list_hosted_zones_by_name(&wanted)
            .await
            .map_err(|e| PreviewError::lookup(Step::ResolveHostedZone, e))?;

        Ok(zones.into_iter().next().filter(|zone| zone.name == wanted))
    }

    /// Create or replace the CNAME `hostname -> target`
    pub async fn upsert(&self, zone: &HostedZone, hostname: &str, target: &str) -> Result<(), PreviewError> {
        info!("Creating Route53 DNS record...");

        let record = RecordSet {
            name: fully_qualified(hostname),
            record_type: RecordType::Cname,
            ttl: Some(CNAME_TTL),
            values: vec![target.to_string()],
        };

        self.dns
            .change_record_set(&zone.id, ChangeAction::Upsert, &record)
            .await
            .map_err(|e| PreviewError::mutation(Step::UpsertDnsRecord, e))?;

        info!(
            "✓ DNS record created: {} {} -> {}",
            record.record_type.as_str(),
            hostname,
            target
        );
        Ok(())
    }

    /// Delete the CNAME for `hostname` if there is one. Returns whether a
    /// record was deleted.
    ///
    /// A delete must repeat the stored record exactly, so the record is read
    /// first and submitted as read. Only a record whose name equals the
    /// hostname is touched; the listing starts at the hostname and may return
    /// its successor.
    pub async fn delete(&self, zone: &HostedZone, hostname: &str) -> Result<bool, PreviewError> {
        info!("Deleting Route53 DNS record...");
        let wanted = fully_qualified(hostname);

        let records = self
            .dns
            .list_record_sets(&zone.id, &wanted, RecordType::Cname, 1)
            .await
            .map_err(|e| PreviewError::lookup(Step::DeleteDnsRecord, e))?;

        let Some(record) = records
            .into_iter()
            .find(|r| r.name == wanted && r.record_type == RecordType::Cname)
        else {
            info!("DNS record {} not found, skipping", hostname);
            return Ok(false);
        };

        self.dns
            .change_record_set(&zone.id, ChangeAction::Delete, &record)
            .await
            .map_err(|e| PreviewError::mutation(Step::DeleteDnsRecord, e))?;

        info!("✓ DNS record deleted");
        Ok(true)
    }
}
